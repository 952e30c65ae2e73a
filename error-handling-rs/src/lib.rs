//! # Error Handling Framework
//!
//! Error taxonomy and fallback primitives for the stylist workspace.
//!
//! - [`ErrorKind`] names the five failure categories the pipeline knows about
//! - [`Classify`] maps a crate-level error onto a kind
//! - [`with_fallback`] turns any fallible stage call into a value plus an
//!   optional error, so a stage failure never aborts the request

pub mod fallback;
pub mod types;

pub use fallback::{with_fallback, FallbackResult, TimedFallback};
pub use types::{Classify, ErrorKind};
