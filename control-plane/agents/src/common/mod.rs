/// Poller level errors.
pub mod errors;
