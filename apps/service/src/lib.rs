pub mod config;
pub mod monitoring;
pub mod probes;
pub mod validation;

pub use config::Config;
