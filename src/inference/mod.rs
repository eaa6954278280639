//! Remote model inference components

pub mod boundary;
pub mod client;
pub mod protocol;

pub use boundary::{BoundaryResponse, HttpBoundary, InferenceBoundary};
pub use client::{HealthStatus, InferenceClient};
pub use protocol::{InferInput, InferRequest};
