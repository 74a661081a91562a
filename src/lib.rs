pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::IngestError;
pub use models::{Batch, BatchSettings, Config, OutputFormat};
pub use services::{BatchReport, Capabilities, Pipeline};
