// ABOUTME: Validated domain types.
// ABOUTME: Names that end up inside remote commands are checked at parse time.

mod env_key;
mod service_name;

pub use env_key::{EnvKey, EnvKeyError};
pub use service_name::{ServiceName, ServiceNameError};
