// ABOUTME: SSH client module for the remote host session.
// ABOUTME: Supports agent, key file and password authentication with known_hosts verification.

mod client;
mod error;

pub use client::{Credential, CommandOutput, Session, SessionConfig};
pub use error::{Error, Result};
