//! `/v1/radio` routes.

use super::listener::Listener;
use super::state::{GuardedRadioService, ServerState};
use crate::rotation::{CurrentTrack, IngestStatus, PlayOutcome, RotationError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct CurrentTrackResponse {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub audio_location: String,
    pub artwork_location: Option<String>,
    pub started_at: i64,
    pub epoch: u64,
    pub remaining_seconds: i64,
}

impl From<CurrentTrack> for CurrentTrackResponse {
    fn from(track: CurrentTrack) -> Self {
        CurrentTrackResponse {
            song_id: track.song.id,
            title: track.song.title,
            artist_id: track.song.artist_id,
            audio_location: track.song.audio_location,
            artwork_location: track.song.artwork_location,
            started_at: track.started_at,
            epoch: track.epoch,
            remaining_seconds: track.remaining_seconds,
        }
    }
}

#[derive(Deserialize, Debug)]
struct HeartbeatBody {
    pub epoch: u64,
    pub song_id: String,
}

#[derive(Deserialize, Debug)]
struct ReportBody {
    pub epoch: u64,
    pub song_id: String,
    pub outcome: PlayOutcome,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum IngestResponse {
    Ok,
    Stale { current_epoch: u64 },
}

impl From<IngestStatus> for IngestResponse {
    fn from(status: IngestStatus) -> Self {
        match status {
            IngestStatus::Ok => IngestResponse::Ok,
            IngestStatus::Stale { current_epoch } => IngestResponse::Stale { current_epoch },
        }
    }
}

impl IntoResponse for RotationError {
    fn into_response(self) -> Response {
        match self {
            RotationError::NoEligibleContent | RotationError::Catalog(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "no_content" })),
            )
                .into_response(),
            RotationError::StaleEpoch { current_epoch } => {
                Json(IngestResponse::Stale { current_epoch }).into_response()
            }
            RotationError::LedgerUnavailable(msg) => {
                warn!("Ledger failure reached the HTTP layer: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "ledger_unavailable" })),
                )
                    .into_response()
            }
            RotationError::InvariantViolation(msg) => {
                error!("Request failed on invariant violation: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal" })),
                )
                    .into_response()
            }
        }
    }
}

async fn get_current(State(radio): State<GuardedRadioService>) -> Response {
    match radio.current_track().await {
        Ok(track) => Json(CurrentTrackResponse::from(track)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn post_heartbeat(
    listener: Listener,
    State(radio): State<GuardedRadioService>,
    Json(body): Json<HeartbeatBody>,
) -> Response {
    match radio.heartbeat(&listener.id, body.epoch, &body.song_id).await {
        Ok(status) => Json(IngestResponse::from(status)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn post_report(
    listener: Listener,
    State(radio): State<GuardedRadioService>,
    Json(body): Json<ReportBody>,
) -> Response {
    match radio
        .report_play_outcome(&listener.id, body.epoch, &body.song_id, body.outcome)
        .await
    {
        Ok(status) => Json(IngestResponse::from(status)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub fn make_radio_routes(state: ServerState) -> Router {
    Router::new()
        .route("/current", get(get_current))
        .route("/heartbeat", post(post_heartbeat))
        .route("/report", post(post_report))
        .with_state(state)
}
