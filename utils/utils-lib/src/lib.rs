pub mod constants;
pub use constants::*;

#[macro_use]
mod macros;

pub mod tracing_telemetry;
