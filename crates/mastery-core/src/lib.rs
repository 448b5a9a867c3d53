//! mastery-core — Progress aggregation, resource matching, recommendations,
//! and analytics.
//!
//! This crate holds the data model, the storage seam traits, and the
//! engine that keeps per-student mastery summaries consistent with the raw
//! attempt log.

pub mod analytics;
pub mod config;
pub mod engine;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod progress;
pub mod recommend;
pub mod traits;

pub use config::{load_config, load_config_from, MasteryConfig};
pub use engine::MasteryEngine;
pub use error::{MasteryError, StoreError};
pub use ids::{RecordId, StoredId};
