//! CLI command implementations.

mod ask;
mod config;
mod export;
mod ingest;
mod init;
mod search;
mod stats;

pub use ask::run_ask;
pub use config::run_config;
pub use export::run_export;
pub use ingest::run_ingest;
pub use init::run_init;
pub use search::run_search;
pub use stats::run_stats;
