pub mod config;
pub mod dataset;
pub mod error;

pub use config::Config;
pub use dataset::*;
pub use error::*;
