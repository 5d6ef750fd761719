//! HTTP request and response models
//!
//! Types that exist only at the HTTP boundary. Entity payloads and
//! representations are the serde types of `hiera_store` and are used as-is.

pub mod request;
pub mod response;

pub use request::{DefinitionListParams, ValuesParams};
pub use response::HealthCheckResponse;
