//! Access logging in the NCSA extended format.
//!
//! One line per completed request, always prefixed with [`REQUEST_LOG_PREFIX`],
//! timestamped in UTC and never carrying cookies.
use std::{fmt::Write as _, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::HttpBody,
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::ports::RequestLogSink;

/// Tag that starts every access-log line.
pub const REQUEST_LOG_PREFIX: &str = "REQUEST_LOG: ";

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S +0000";

/// Writes access-log lines through `tracing` under the `request_log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RequestLogSink for TracingSink {
    fn write(&self, line: &str) {
        tracing::info!(target: "request_log", "{}", line);
    }
}

/// What one access-log line is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub remote: Option<SocketAddr>,
    pub request_line: String,
    pub status: u16,
    pub bytes: Option<u64>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessRecord {
    /// Render the record as it is written to the sink.
    pub fn format(&self, at: DateTime<Utc>) -> String {
        let mut line = String::with_capacity(160);
        line.push_str(REQUEST_LOG_PREFIX);

        match self.remote {
            Some(addr) => {
                let _ = write!(line, "{}", addr.ip());
            }
            None => line.push('-'),
        }
        let _ = write!(
            line,
            " - - [{}] \"{}\" {} ",
            at.format(TIMESTAMP_FORMAT),
            self.request_line,
            self.status
        );
        match self.bytes {
            Some(bytes) => {
                let _ = write!(line, "{bytes}");
            }
            None => line.push('-'),
        }
        let _ = write!(
            line,
            " \"{}\" \"{}\"",
            self.referer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-")
        );
        line
    }
}

/// Request logging handler state shared by every connection.
#[derive(Clone)]
pub struct RequestLog {
    sink: Arc<dyn RequestLogSink>,
}

impl RequestLog {
    pub fn new(sink: Arc<dyn RequestLogSink>) -> Self {
        Self { sink }
    }

    /// Wrap `router` so that every request it completes is logged.
    pub fn layer(self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(self, log_request))
    }

    fn record(&self, record: &AccessRecord) {
        self.sink.write(&record.format(Utc::now()));
    }
}

impl std::fmt::Debug for RequestLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLog").finish_non_exhaustive()
    }
}

async fn log_request(State(log): State<RequestLog>, req: Request, next: Next) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let request_line = format!("{} {} {:?}", req.method(), target, req.version());
    let referer = header_text(req.headers(), header::REFERER);
    let user_agent = header_text(req.headers(), header::USER_AGENT);

    let response = next.run(req).await;

    let bytes = header_text(response.headers(), header::CONTENT_LENGTH)
        .and_then(|len| len.parse().ok())
        .or_else(|| response.body().size_hint().exact());
    log.record(&AccessRecord {
        remote,
        request_line,
        status: response.status().as_u16(),
        bytes,
        referer,
        user_agent,
    });

    response
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
