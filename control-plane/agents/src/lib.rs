#![warn(missing_docs)]
//! Control Plane Agents library with emphasis on the resource report polling of the
//! cluster nodes, including its errors.
//!
//! The poller periodically pulls the resource report of every known node, bounding
//! the number of outstanding pulls, and hands each received report to a sink.

mod common;

/// Agent level errors.
pub use common::errors;

/// The resource report poller.
pub mod poller;
