//! Process exit codes and the shutdown request handle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How the bot process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ExitCode {
    #[default]
    Normal = 0,
    /// Initialisation failed or the kernel hit an unrecoverable error.
    Error = 1,
    /// The caller should start the bot again.
    Restart = 42,
}

impl ExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitCode::Normal => "normal",
            ExitCode::Error => "error",
            ExitCode::Restart => "restart",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// Lets anyone (plugins, signal handlers, the backend) ask the kernel to stop.
///
/// The first request decides the exit code; later ones are ignored.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    code: Arc<Mutex<Option<ExitCode>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown with `code`. Returns `false` if a request was
    /// already made.
    pub fn request(&self, code: ExitCode) -> bool {
        {
            let mut slot = self.code.lock();
            if slot.is_some() {
                return false;
            }
            *slot = Some(code);
        }
        info!(code = %code, "Shutdown requested");
        self.token.cancel();
        true
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The requested exit code, or [`ExitCode::Normal`] if none was requested.
    pub fn exit_code(&self) -> ExitCode {
        self.code.lock().unwrap_or_default()
    }

    /// Resolves once shutdown was requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}

impl fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shutdown")
            .field("requested", &*self.code.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Normal.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Restart.code(), 42);
    }

    #[tokio::test]
    async fn test_first_request_wins() {
        let shutdown = Shutdown::new();
        let observer = shutdown.clone();
        assert!(!observer.is_requested());

        assert!(shutdown.request(ExitCode::Restart));
        assert!(!shutdown.request(ExitCode::Normal));

        observer.requested().await;
        assert_eq!(observer.exit_code(), ExitCode::Restart);
    }
}
