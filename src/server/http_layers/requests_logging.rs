//! Request logging middleware

use super::super::state::ServerState;
use crate::server::listener::HEADER_LISTENER_ID_KEY;
use crate::server::metrics::record_http_request;
use axum::extract::State;
use axum::{
    body::{Body, Bytes},
    http::{header::HeaderMap, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Radio payloads are a few hundred bytes, anything bigger is elided.
const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .ok_or("content-length not set")?
        .to_str()
        .map_err(|_| "content-length is not a string")?
        .parse::<usize>()
        .map_err(|_| "content-length is not a number")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} headers:", label);
    for (name, value) in headers.iter() {
        info!("    {:?}: {:?}", name, value);
    }
}

/// Logs a body and hands back an equivalent one, since reading consumes it.
async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, StatusCode> {
    let size = match content_length(headers) {
        Ok(size) => size,
        Err(reason) => {
            info!("  {} body: {}", label, reason);
            return Ok(body);
        }
    };
    if size >= MAX_LOGGABLE_BODY_LENGTH {
        info!(
            "  {} body: too big to log ({:#})",
            label,
            byte_unit::Byte::from(size)
        );
        return Ok(body);
    }

    let bytes: Bytes = axum::body::to_bytes(body, size).await.map_err(|err| {
        error!("Failed to read {} body: {:?}", label, err);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!("  {} body: {}", label, String::from_utf8_lossy(&bytes));
    Ok(Body::from(bytes))
}

pub async fn log_requests(
    State(state): State<ServerState>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let listener = request
        .headers()
        .get(HEADER_LISTENER_ID_KEY)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = info_span!("request", %method, %path, %listener);
    let response = async {
        if level > RequestsLoggingLevel::None {
            info!(">>> {} {}", method, request.uri());
        }

        let (parts, body) = request.into_parts();
        if level >= RequestsLoggingLevel::Headers {
            log_headers("Request", &parts.headers);
        }
        let body = if level >= RequestsLoggingLevel::Body {
            match log_body("Request", &parts.headers, body).await {
                Ok(body) => body,
                Err(status) => return status.into_response(),
            }
        } else {
            body
        };

        let response = next.run(Request::from_parts(parts, body)).await;

        let (parts, body) = response.into_parts();
        if level >= RequestsLoggingLevel::Headers {
            log_headers("Response", &parts.headers);
        }
        let body = if level >= RequestsLoggingLevel::Body {
            match log_body("Response", &parts.headers, body).await {
                Ok(body) => body,
                Err(status) => return status.into_response(),
            }
        } else {
            body
        };

        if level > RequestsLoggingLevel::None {
            info!("<<< {} ({}ms)", parts.status.as_u16(), start.elapsed().as_millis());
        }
        Response::from_parts(parts, body)
    }
    .instrument(span)
    .await;

    // Path, not the full URI, to keep label cardinality bounded
    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
