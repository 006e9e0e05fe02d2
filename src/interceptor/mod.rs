//! Request/response interception over raw body streams.
//!
//! [`TrafficLogger::intercept`] buffers the request body, logs it, hands a
//! replayable copy to the downstream handler together with an in-memory
//! response sink, then logs the captured response and forwards it to the
//! client stream. The exchange's own streams are swapped back on every exit
//! path, including errors, panics and a dropped future.

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Uri};
use std::{
    io::Cursor,
    mem,
    ops::{Deref, DerefMut},
    time::Instant,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::{error::InterceptError, logger::TrafficLogger, metrics::TRAFFIC_METRICS};

pub mod capture;

pub use capture::{read_body, ResponseCapture};

pub type BodyReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BodyWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct ExchangeRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: BodyReader,
}

pub struct ExchangeResponse {
    pub headers: HeaderMap,
    pub body: BodyWriter,
}

/// One HTTP transaction with swappable body streams.
pub struct Exchange {
    pub request: ExchangeRequest,
    pub response: ExchangeResponse,
}

impl Exchange {
    pub fn new<R, W>(method: Method, uri: Uri, request_body: R, response_body: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            request: ExchangeRequest {
                method,
                uri,
                headers: HeaderMap::new(),
                body: Box::new(request_body),
            },
            response: ExchangeResponse {
                headers: HeaderMap::new(),
                body: Box::new(response_body),
            },
        }
    }
}

/// The rest of the pipeline behind the interceptor.
#[async_trait]
pub trait Downstream: Send + Sync {
    type Error: Send;

    async fn call(&self, exchange: &mut Exchange) -> Result<(), Self::Error>;
}

/// Holds the exchange's original body streams while substitutes are installed.
///
/// Dropping the guard puts the originals back.
struct BodySwap<'a> {
    exchange: &'a mut Exchange,
    original_request: Option<BodyReader>,
    original_response: BodyWriter,
}

impl<'a> BodySwap<'a> {
    fn substitute(exchange: &'a mut Exchange, request: BodyReader, response: BodyWriter) -> Self {
        let original_request = mem::replace(&mut exchange.request.body, request);
        let original_response = mem::replace(&mut exchange.response.body, response);

        Self {
            exchange,
            original_request: Some(original_request),
            original_response,
        }
    }

    fn restore_request(&mut self) {
        if let Some(original) = self.original_request.take() {
            self.exchange.request.body = original;
        }
    }

    fn original_response(&mut self) -> &mut BodyWriter {
        &mut self.original_response
    }
}

impl Deref for BodySwap<'_> {
    type Target = Exchange;

    fn deref(&self) -> &Exchange {
        &*self.exchange
    }
}

impl DerefMut for BodySwap<'_> {
    fn deref_mut(&mut self) -> &mut Exchange {
        &mut *self.exchange
    }
}

impl Drop for BodySwap<'_> {
    fn drop(&mut self) {
        self.restore_request();
        self.exchange.response.body =
            mem::replace(&mut self.original_response, Box::new(tokio::io::sink()));
    }
}

impl TrafficLogger {
    /// Logs the request, runs `downstream` once, logs the response and forwards it to the client.
    ///
    /// Nested interception of the same exchange is not supported.
    pub async fn intercept<D>(
        &self,
        exchange: &mut Exchange,
        downstream: &D,
    ) -> Result<(), InterceptError<D::Error>>
    where
        D: Downstream + ?Sized,
    {
        let limit = self.settings().max_body_bytes;

        let request_body = read_body(&mut exchange.request.body, limit)
            .await
            .map_err(|e| {
                TRAFFIC_METRICS.failures_total.increment(1);
                InterceptError::Buffer(e)
            })?;
        TRAFFIC_METRICS
            .request_bytes_total
            .increment(request_body.len() as u64);

        self.log_request(
            &exchange.request.method,
            &exchange.request.uri,
            &exchange.request.headers,
            &request_body,
        );

        let capture = ResponseCapture::new(limit);
        let mut swap = BodySwap::substitute(
            exchange,
            Box::new(Cursor::new(request_body)),
            Box::new(capture.clone()),
        );

        let started = Instant::now();
        let outcome = downstream.call(&mut swap).await;
        TRAFFIC_METRICS
            .downstream_seconds
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = outcome {
            TRAFFIC_METRICS.failures_total.increment(1);
            return Err(InterceptError::Downstream(e));
        }

        swap.restore_request();

        let response_body = capture.take();
        self.log_response(&swap.response.headers, &response_body);

        // Zero-length bodies (304s, HEAD, cached files) are never written through.
        if response_body.is_empty() {
            TRAFFIC_METRICS.skipped_copies_total.increment(1);
        } else {
            copy_to_client(swap.original_response(), &response_body)
                .await
                .map_err(|e| {
                    TRAFFIC_METRICS.failures_total.increment(1);
                    InterceptError::CopyBack(e)
                })?;
            TRAFFIC_METRICS
                .response_bytes_total
                .increment(response_body.len() as u64);
        }

        TRAFFIC_METRICS.exchanges_total.increment(1);
        Ok(())
    }
}

async fn copy_to_client(client: &mut BodyWriter, body: &[u8]) -> std::io::Result<()> {
    client.write_all(body).await?;
    client.flush().await
}
