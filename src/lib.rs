// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod archive;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod ingest;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod snapshot;
pub mod status;
pub mod stop;
pub mod supervisor;

// Subscriber settings and the channels notifications go out on
pub mod notify;
pub mod subscribers;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::model::{Category, Discovered, Item, ItemAttributes, Source, SourceId};
pub use crate::supervisor::{PipelineParts, PipelineSettings, Supervisor};
