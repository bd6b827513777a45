pub mod annotate;
pub mod bgzf;
pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod storage;
pub mod tabix;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
