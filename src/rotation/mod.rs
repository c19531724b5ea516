//! The rotation core: which song plays next, and the shared "now playing"
//! state listeners observe.

pub mod catalog_view;
pub mod clock;
pub mod error;
pub mod fairness;
pub mod ingestion;
pub mod scheduler;
pub mod selection;
pub mod stream_state;
#[cfg(test)]
pub(crate) mod test_support;
pub mod ticker;

pub use catalog_view::CatalogView;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::RotationError;
pub use fairness::{FairnessSnapshot, FairnessTracker, SongStats};
pub use ingestion::{CurrentTrack, IngestStatus, ListenerRegistry, RadioService};
pub use scheduler::{AdvanceResult, AdvanceTrigger, PlayOutcome, RotationScheduler};
pub use selection::{select_next, Selection, SelectionKind, SelectionRequest};
pub use stream_state::{NowPlaying, StreamSnapshot, StreamState};
pub use ticker::spawn_advancement_ticker;
