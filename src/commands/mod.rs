// ABOUTME: Command module aggregator for the stevedore CLI.
// ABOUTME: Re-exports deploy, check and plan command handlers.

mod deploy;

pub use deploy::{check, deploy, plan};
