//! Command errors.

use std::fmt;

use banter_core::{ApiError, BoxError};
use thiserror::Error;

/// What went wrong while running a command.
#[derive(Debug, Error)]
pub enum CommandErrorKind {
    #[error("command not found")]
    NotFound,

    #[error("not enough arguments")]
    ArgCount,

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("operation '{0}' is not supported")]
    Unsupported(String),

    #[error("a command with this name is already registered")]
    AlreadyRegistered,

    #[error(transparent)]
    Api(ApiError),

    #[error("{0}")]
    Failed(BoxError),
}

/// Error raised by the command registry or a command handler.
///
/// `command` names the command the error belongs to. The registry fills it in
/// with `argv[0]` when a handler leaves it empty.
#[derive(Debug)]
pub struct CommandError {
    pub command: Option<String>,
    pub kind: CommandErrorKind,
}

impl CommandError {
    pub fn new(kind: CommandErrorKind) -> Self {
        Self {
            command: None,
            kind,
        }
    }

    pub fn not_found(command: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::NotFound).with_command(command)
    }

    pub fn arg_count(command: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::ArgCount).with_command(command)
    }

    pub fn permission_denied(command: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::PermissionDenied).with_command(command)
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Syntax(msg.into()))
    }

    pub fn unsupported(op: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Unsupported(op.into()))
    }

    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::new(CommandErrorKind::Failed(err.into()))
    }

    /// Names the command the error is reported for, replacing any earlier
    /// name.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn kind(&self) -> &CommandErrorKind {
        &self.kind
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, CommandErrorKind::NotFound)
    }

    pub fn is_arg_count(&self) -> bool {
        matches!(self.kind, CommandErrorKind::ArgCount)
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self.kind, CommandErrorKind::PermissionDenied)
    }

    /// Recovers a typed error from whatever a handler returned.
    pub fn from_handler(err: BoxError) -> Self {
        let err = match err.downcast::<CommandError>() {
            Ok(err) => return *err,
            Err(err) => err,
        };
        match err.downcast::<ApiError>() {
            Ok(err) => Self::from(*err),
            Err(err) => Self::new(CommandErrorKind::Failed(err)),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "{command}: {}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            CommandErrorKind::Api(err) => Some(err),
            CommandErrorKind::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<ApiError> for CommandError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unsupported(op) => Self::unsupported(op),
            err => Self::new(CommandErrorKind::Api(err)),
        }
    }
}

impl From<CommandErrorKind> for CommandError {
    fn from(kind: CommandErrorKind) -> Self {
        Self::new(kind)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;
