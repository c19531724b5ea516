//! Random slowdown middleware for testing
#![allow(dead_code)] // Feature-gated middleware

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use rand::Rng;

/// Middleware that delays each request by a random amount between 0 and 2
/// seconds, handy to exercise concurrent advancement triggers by hand.
pub async fn slowdown_request(request: Request<Body>, next: Next) -> impl IntoResponse {
    let delay_ms = rand::rng().random_range(0..2000u64);
    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    next.run(request).await
}
