//! Shared tracing setup for the homewatch binaries.

mod tracing;

pub use self::tracing::{LogFormat, init as init_tracing, init_with_level};
