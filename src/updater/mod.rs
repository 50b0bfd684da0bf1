//! Update orchestration
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────────┐
//! │ Synchronizer │────▶│   Fetcher   │     │ DirectoryLister  │
//! │ (decide and  │     │ (descriptor,│     │ (installed libs) │
//! │   update)    │     │  artifact)  │     └──────────────────┘
//! └──────────────┘     └─────────────┘              ▲
//!        │                                          │
//!        ▼                                          │
//! ┌──────────────┐     ┌─────────────┐              │
//! │ StagingArea  │────▶│   Archive   │──────────────┘
//! │ (download,   │     │  (extract)  │
//! │  merge)      │     └─────────────┘
//! └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`synchronizer`]: `Synchronizer`, the update decision and update sequence
//! - [`staging`]: Staging directory the artifact is downloaded and extracted into
//! - [`lock`]: Per-destination locks serializing concurrent updates
//! - [`stage`]: Update state machine
//! - [`error`]: `UpdateError` taxonomy

pub mod error;
pub mod lock;
pub mod stage;
pub mod staging;
pub mod synchronizer;

pub use error::UpdateError;
pub use stage::UpdateStage;
pub use synchronizer::Synchronizer;
