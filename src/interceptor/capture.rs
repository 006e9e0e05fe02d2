use bytes::Bytes;
use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// In-memory response sink handed to downstream in place of the client stream.
///
/// Clones share one buffer, so the interceptor keeps a handle while downstream
/// writes through the boxed copy.
#[derive(Debug, Clone, Default)]
pub struct ResponseCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    limit: Option<usize>,
}

impl ResponseCapture {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            buffer: Arc::default(),
            limit,
        }
    }

    /// Everything written so far, leaving the buffer empty.
    pub fn take(&self) -> Bytes {
        Bytes::from(std::mem::take(&mut *self.lock()))
    }

    pub fn contents(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AsyncWrite for ResponseCapture {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut buffer = self.lock();

        if let Some(limit) = self.limit {
            if buffer.len() + buf.len() > limit {
                return Poll::Ready(Err(too_large(limit)));
            }
        }

        buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Drains `body` into memory, failing once more than `limit` bytes arrive.
pub async fn read_body<R>(body: &mut R, limit: Option<usize>) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buffer = Vec::new();

    match limit {
        Some(limit) => {
            body.take((limit as u64).saturating_add(1))
                .read_to_end(&mut buffer)
                .await?;
            if buffer.len() > limit {
                return Err(too_large(limit));
            }
        }
        None => {
            body.read_to_end(&mut buffer).await?;
        }
    }

    Ok(Bytes::from(buffer))
}

fn too_large(limit: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("body exceeds the {} byte capture limit", limit),
    )
}
