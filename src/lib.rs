pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod fingerprint;
pub mod format;
pub mod import;
pub mod report;
pub mod stats;
pub mod store;

pub use config::Config;
pub use event::{Event, MediaKind};
pub use import::{ImportOptions, ImportSummary, Importer};
pub use store::HistoryStore;
