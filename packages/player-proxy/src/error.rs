//! Error types for the player proxy.
//!
//! Collaborator boundaries ([`Player::invoke`](crate::Player::invoke),
//! [`PlayerBackend`](crate::PlayerBackend)) speak `anyhow::Error`. Anything
//! that reaches a caller of the proxy is a [`ProxyError`].
//!
//! Confirmation that never arrives is not an error: a configured timeout
//! resolves the call successfully, and without one the call stays pending.

use thiserror::Error;

use crate::commands::CommandName;

/// Errors surfaced by the proxy and the player factory.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The player rejected the command when it was invoked.
    #[error("player command `{command}` failed: {source}")]
    Command {
        command: CommandName,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The player answered with a value of the wrong shape.
    #[error("player command `{command}` returned {actual}, expected {expected}")]
    UnexpectedValue {
        command: CommandName,
        expected: &'static str,
        actual: &'static str,
    },

    /// The backend has no mount point with this id.
    #[error("mount point \"{0}\" does not exist")]
    MountNotFound(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The factory was used outside a tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

impl ProxyError {
    /// Wrap a failure raised by the player while invoking `command`.
    pub fn command(command: CommandName, source: anyhow::Error) -> Self {
        ProxyError::Command {
            command,
            source: source.into(),
        }
    }

    /// The command this error is attributed to, if any.
    pub fn command_name(&self) -> Option<CommandName> {
        match self {
            ProxyError::Command { command, .. } | ProxyError::UnexpectedValue { command, .. } => {
                Some(*command)
            }
            ProxyError::MountNotFound(_) | ProxyError::Config(_) | ProxyError::NoRuntime(_) => {
                None
            }
        }
    }
}
