// ABOUTME: Remote shell abstraction used by every deploy step.
// ABOUTME: Exposes the Shell trait and a quoting command builder.

mod command;

pub use command::{ShellCommand, quote};

use crate::ssh::{self, CommandOutput, Session};
use async_trait::async_trait;

/// A channel that runs shell command strings on the target host.
///
/// [`Session`] is the production implementation. Anything that can answer with
/// `(exit status, stdout, stderr)` can stand in for it.
#[async_trait]
pub trait Shell: Send + Sync {
    /// Run one command. Transport loss is an error; a non-zero exit is not.
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput>;

    /// Release the underlying channel. Must be idempotent.
    async fn close(&self) -> ssh::Result<()>;
}

#[async_trait]
impl Shell for Session {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        Session::exec(self, command).await
    }

    async fn close(&self) -> ssh::Result<()> {
        Session::close(self).await
    }
}
