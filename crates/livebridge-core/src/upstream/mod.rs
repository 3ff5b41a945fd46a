//! Upstream refresh endpoint.

pub mod client;
pub mod errors;

pub use client::{HttpUpstream, Upstream};
pub use errors::UpstreamError;
