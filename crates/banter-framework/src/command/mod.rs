//! User commands encoded as chat messages.
//!
//! A message such as `!echo "hello world" again` is recognised by its prefix
//! (`!`), split shell-style into `argv = ["echo", "hello world", "again"]` and
//! routed to the [`Command`] registered under `argv[0]`.
//!
//! ```rust,ignore
//! let registry = CommandRegistry::new(["!"], ["root"]);
//! registry.register(
//!     Command::new("echo", |msg, argv| async move {
//!         msg.reply(&argv[1..].join(" ")).await?;
//!         Ok(())
//!     })
//!     .min_args(1)
//!     .help("Repeats its arguments."),
//! )?;
//! ```

mod error;
mod registry;
mod split;

use std::fmt;
use std::future::Future;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use banter_core::{BoxError, Message};
use futures::future::BoxFuture;

pub use error::{CommandError, CommandErrorKind, CommandResult};
pub use registry::CommandRegistry;
pub use split::{SplitError, shell_split};

/// Behaviour switches of a [`Command`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandFlags(u8);

impl CommandFlags {
    pub const NONE: Self = Self(0);
    /// Only users in the admin list may run it.
    pub const ADMIN: Self = Self(1);
    /// The handler receives exactly the `min_argc` required arguments instead
    /// of the whole argv.
    pub const EXPAND: Self = Self(1 << 1);
    /// Fallback handler, tried for names no normal command claims.
    pub const MISSING: Self = Self(1 << 2);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for CommandFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for CommandFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for CommandFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::ADMIN, "ADMIN"),
            (Self::EXPAND, "EXPAND"),
            (Self::MISSING, "MISSING"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();
        write!(f, "CommandFlags({})", names.join(" | "))
    }
}

type CommandFn = Arc<dyn Fn(Message, Vec<String>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A registered command.
///
/// The handler receives the triggering message and its arguments: the full
/// argv (name included) by default, or `argv[1..=min_argc]` when the command
/// carries [`CommandFlags::EXPAND`].
#[derive(Clone)]
pub struct Command {
    name: String,
    callback: CommandFn,
    min_argc: usize,
    flags: CommandFlags,
    help: Option<String>,
}

impl Command {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Message, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let callback: CommandFn = Arc::new(move |msg, argv| Box::pin(handler(msg, argv)));
        Self {
            name: name.into(),
            callback,
            min_argc: 0,
            flags: CommandFlags::NONE,
            help: None,
        }
    }

    /// Number of required arguments, not counting the command name.
    pub fn min_args(mut self, min_argc: usize) -> Self {
        self.min_argc = min_argc;
        self
    }

    pub fn flags(mut self, flags: CommandFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn admin(self) -> Self {
        self.flags(CommandFlags::ADMIN)
    }

    pub fn expand(self) -> Self {
        self.flags(CommandFlags::EXPAND)
    }

    pub fn missing(self) -> Self {
        self.flags(CommandFlags::MISSING)
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.help = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_argc(&self) -> usize {
        self.min_argc
    }

    pub fn command_flags(&self) -> CommandFlags {
        self.flags
    }

    pub fn is_admin(&self) -> bool {
        self.flags.contains(CommandFlags::ADMIN)
    }

    pub fn is_missing(&self) -> bool {
        self.flags.contains(CommandFlags::MISSING)
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub(crate) fn call(&self, msg: Message, args: Vec<String>) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.callback)(msg, args)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("min_argc", &self.min_argc)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_combine() {
        let flags = CommandFlags::ADMIN | CommandFlags::EXPAND;
        assert!(flags.contains(CommandFlags::ADMIN));
        assert!(flags.contains(CommandFlags::EXPAND));
        assert!(!flags.contains(CommandFlags::MISSING));
        assert_eq!(format!("{flags:?}"), "CommandFlags(ADMIN | EXPAND)");
    }

    #[test]
    fn test_builder() {
        let cmd = Command::new("kick", |_, _| async { Ok(()) })
            .min_args(1)
            .admin()
            .expand()
            .help("Kicks a user.");
        assert_eq!(cmd.name(), "kick");
        assert_eq!(cmd.min_argc(), 1);
        assert!(cmd.is_admin());
        assert!(!cmd.is_missing());
        assert_eq!(cmd.help_text(), Some("Kicks a user."));
    }
}
