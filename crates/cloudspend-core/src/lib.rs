pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use types::*;
