use super::state::ServerState;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

/// Header the upstream gateway sets once it authenticated the listener.
pub const HEADER_LISTENER_ID_KEY: &str = "X-Listener-Id";

const MAX_LISTENER_ID_LENGTH: usize = 128;

/// A pre-validated listener identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub id: String,
}

pub enum ListenerExtractionError {
    AccessDenied,
}

impl IntoResponse for ListenerExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ListenerExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn extract_listener_from_headers(parts: &Parts) -> Option<Listener> {
    let value = parts.headers.get(HEADER_LISTENER_ID_KEY)?;
    let id = match value.to_str() {
        Ok(id) => id.trim(),
        Err(_) => {
            debug!("Listener id header is not valid ASCII");
            return None;
        }
    };
    if id.is_empty() || id.len() > MAX_LISTENER_ID_LENGTH {
        debug!("Rejecting listener id of length {}", id.len());
        return None;
    }
    Some(Listener { id: id.to_string() })
}

impl FromRequestParts<ServerState> for Listener {
    type Rejection = ListenerExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        _ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_listener_from_headers(parts).ok_or(ListenerExtractionError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/v1/radio/heartbeat");
        if let Some(value) = header {
            builder = builder.header(HEADER_LISTENER_ID_KEY, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_the_listener_header() {
        let parts = parts_with(Some(" listener-7 "));
        assert_eq!(
            extract_listener_from_headers(&parts),
            Some(Listener {
                id: "listener-7".to_string()
            })
        );
    }

    #[test]
    fn rejects_missing_or_blank_ids() {
        assert!(extract_listener_from_headers(&parts_with(None)).is_none());
        assert!(extract_listener_from_headers(&parts_with(Some("   "))).is_none());
        let too_long = "x".repeat(MAX_LISTENER_ID_LENGTH + 1);
        assert!(extract_listener_from_headers(&parts_with(Some(&too_long))).is_none());
    }
}
