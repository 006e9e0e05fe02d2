//! Rendering of the request/response traffic records and the sink they are written to.

use axum::http::{HeaderMap, Method, Uri};
use std::sync::{Arc, Mutex};
use tracing::Level;

use crate::config::TrafficLogConfig;

/// Event id carried by every traffic record.
pub const TRAFFIC_EVENT_ID: u32 = 1;

/// Destination for rendered traffic records.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, event_id: u32, message: &str);
}

/// Forwards records to the active `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, event_id: u32, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "traffic", event_id, "{}", message),
            Level::WARN => tracing::warn!(target: "traffic", event_id, "{}", message),
            Level::INFO => tracing::info!(target: "traffic", event_id, "{}", message),
            Level::DEBUG => tracing::debug!(target: "traffic", event_id, "{}", message),
            _ => tracing::trace!(target: "traffic", event_id, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    pub event_id: u32,
    pub message: String,
}

/// Keeps every record in memory. Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, event_id: u32, message: &str) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(LogRecord {
                level,
                event_id,
                message: message.to_string(),
            });
    }
}

/// Formats and emits the two records of one exchange.
#[derive(Clone)]
pub struct TrafficLogger {
    settings: TrafficLogConfig,
    sink: Arc<dyn LogSink>,
}

impl TrafficLogger {
    pub fn new(settings: TrafficLogConfig, sink: Arc<dyn LogSink>) -> Self {
        Self { settings, sink }
    }

    pub fn settings(&self) -> &TrafficLogConfig {
        &self.settings
    }

    pub fn log_request(&self, method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
        let url = display_url(uri, headers);
        let mut message = format!("REQUEST METHOD:[{}] REQUEST URL:[{}]", method, url);

        if self.settings.include_headers {
            message.push_str(&format!(" REQUEST HEADERS:[{}]", self.format_headers(headers)));
        }

        if body.is_empty() {
            message.push_str(&format!(" REQUEST BODY:{}", self.settings.empty_body_marker));
        } else {
            message.push_str(&format!(" REQUEST BODY:[{}]", String::from_utf8_lossy(body)));
        }

        self.sink.log(Level::INFO, TRAFFIC_EVENT_ID, &message);
    }

    pub fn log_response(&self, headers: &HeaderMap, body: &[u8]) {
        let display_body = if body.is_empty() {
            self.settings.empty_body_marker.clone()
        } else {
            format!("\r\n{}", String::from_utf8_lossy(body))
        };

        let message = if self.settings.include_headers {
            format!(
                "RESPONSE HEADERS:[{}] RESPONSE:{}",
                self.format_headers(headers),
                display_body
            )
        } else {
            format!("RESPONSE:{}", display_body)
        };

        self.sink.log(Level::INFO, TRAFFIC_EVENT_ID, &message);
    }

    /// Renders `headers` as `key:value` pairs joined by `", "`.
    ///
    /// Repeated headers are collapsed into one pair with their values joined by `","`.
    pub fn format_headers(&self, headers: &HeaderMap) -> String {
        headers
            .keys()
            .map(|key| {
                let values = headers
                    .get_all(key)
                    .iter()
                    .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                    .collect::<Vec<_>>()
                    .join(",");

                format!("{}:{}", self.clean_header_name(key.as_str()), values)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // Header names are always lowercase, fragments may not be.
    fn clean_header_name(&self, name: &str) -> String {
        self.settings
            .stripped_header_fragments
            .iter()
            .filter(|fragment| !fragment.is_empty())
            .fold(name.to_string(), |name, fragment| {
                name.replace(&fragment.to_ascii_lowercase(), "")
            })
    }
}

/// Scheme, host, path and query of a request as a client would have typed it.
///
/// Server-side URIs usually carry only the path, so the host falls back to the
/// `Host` header. Without any host the bare path and query are returned.
pub fn display_url(uri: &Uri, headers: &HeaderMap) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let host = uri.authority().map(|a| a.as_str().to_string()).or_else(|| {
        headers
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    match host {
        Some(host) => format!("{}://{}{}", uri.scheme_str().unwrap_or("http"), host, path_and_query),
        None => path_and_query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn logger(settings: TrafficLogConfig) -> (TrafficLogger, MemorySink) {
        let sink = MemorySink::new();
        (TrafficLogger::new(settings, Arc::new(sink.clone())), sink)
    }

    #[test]
    fn display_url_prefers_uri_authority() {
        let uri: Uri = "https://api.example.com/v1/items?page=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("ignored.example.com"));

        assert_eq!(display_url(&uri, &headers), "https://api.example.com/v1/items?page=2");
    }

    #[test]
    fn display_url_falls_back_to_host_header() {
        let uri: Uri = "/v1/items?page=2".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:3000"));

        assert_eq!(display_url(&uri, &headers), "http://localhost:3000/v1/items?page=2");
        assert_eq!(display_url(&uri, &HeaderMap::new()), "/v1/items?page=2");
    }

    #[test]
    fn headers_render_as_delimited_pairs() {
        let (logger, _) = logger(TrafficLogConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/xml"));

        assert_eq!(
            logger.format_headers(&headers),
            "content-type:application/json, accept:text/html,application/xml"
        );
        assert_eq!(logger.format_headers(&HeaderMap::new()), "");
    }

    #[test]
    fn configured_fragments_are_stripped_from_header_names() {
        let (logger, _) = logger(TrafficLogConfig {
            stripped_header_fragments: vec!["x-forwarded-".to_string(), String::new()],
            ..TrafficLogConfig::default()
        });
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));

        assert_eq!(logger.format_headers(&headers), "for:10.0.0.1");
    }

    #[test]
    fn uppercase_fragments_match_lowercase_header_names() {
        let (logger, _) = logger(TrafficLogConfig {
            stripped_header_fragments: vec!["X-Forwarded-".to_string()],
            ..TrafficLogConfig::default()
        });
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", HeaderValue::from_static("1.2.3.4"));

        assert_eq!(logger.format_headers(&headers), "for:1.2.3.4");
    }

    #[test]
    fn empty_request_body_logs_the_marker() {
        let (logger, sink) = logger(TrafficLogConfig::default());
        let uri: Uri = "/status".parse().unwrap();

        logger.log_request(&Method::GET, &uri, &HeaderMap::new(), b"");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Level::INFO);
        assert_eq!(records[0].event_id, TRAFFIC_EVENT_ID);
        assert_eq!(
            records[0].message,
            "REQUEST METHOD:[GET] REQUEST URL:[/status] REQUEST HEADERS:[] REQUEST BODY:[null]"
        );
    }

    #[test]
    fn terse_variant_omits_headers_and_uses_its_own_marker() {
        let (logger, sink) = logger(TrafficLogConfig {
            include_headers: false,
            empty_body_marker: "NULL".to_string(),
            ..TrafficLogConfig::default()
        });
        let uri: Uri = "/items".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        logger.log_request(&Method::POST, &uri, &headers, b"hello");
        logger.log_response(&headers, b"");

        assert_eq!(
            sink.messages(),
            vec![
                "REQUEST METHOD:[POST] REQUEST URL:[/items] REQUEST BODY:[hello]".to_string(),
                "RESPONSE:NULL".to_string(),
            ]
        );
    }

    #[test]
    fn response_body_starts_on_a_new_line() {
        let (logger, sink) = logger(TrafficLogConfig::default());
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        logger.log_response(&headers, br#"{"ok":true}"#);

        assert_eq!(
            sink.messages(),
            vec!["RESPONSE HEADERS:[content-type:application/json] RESPONSE:\r\n{\"ok\":true}".to_string()]
        );
    }
}
