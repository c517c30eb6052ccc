use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use banter_core::{Message, MessageType, UserId};
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{Command, CommandError, CommandErrorKind, CommandFlags, CommandResult, shell_split};

#[derive(Default)]
struct Table {
    normal: HashMap<String, Command>,
    /// Fallback handlers, tried in registration order.
    missing: Vec<Command>,
}

/// Recognises commands in messages and runs them.
///
/// Shared as `Arc<CommandRegistry>`; every method takes `&self`.
pub struct CommandRegistry {
    me: Weak<CommandRegistry>,
    prefixes: RwLock<Vec<String>>,
    admins: RwLock<HashSet<UserId>>,
    table: RwLock<Table>,
}

impl CommandRegistry {
    /// Creates a registry with the built-in `help` and `list` commands.
    pub fn new<P, A>(prefixes: P, admins: A) -> Arc<Self>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<UserId>,
    {
        let registry = Arc::new_cyclic(|me| CommandRegistry {
            me: me.clone(),
            prefixes: RwLock::new(prefixes.into_iter().map(Into::into).collect()),
            admins: RwLock::new(admins.into_iter().map(Into::into).collect()),
            table: RwLock::new(Table::default()),
        });
        registry.install_builtins();
        registry
    }

    // ─── Configuration ───────────────────────────────────────────────────────

    pub fn prefixes(&self) -> Vec<String> {
        self.prefixes.read().clone()
    }

    pub fn set_prefixes<P>(&self, prefixes: P)
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        *self.prefixes.write() = prefixes.into_iter().map(Into::into).collect();
    }

    pub fn set_admins<A>(&self, admins: A)
    where
        A: IntoIterator,
        A::Item: Into<UserId>,
    {
        *self.admins.write() = admins.into_iter().map(Into::into).collect();
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.read().contains(user_id)
    }

    // ─── Table ───────────────────────────────────────────────────────────────

    /// Adds a command. Commands flagged [`CommandFlags::MISSING`] go to the
    /// fallback table.
    pub fn register(&self, command: Command) -> CommandResult<()> {
        let mut table = self.table.write();
        let name = command.name().to_string();
        let taken = if command.is_missing() {
            table.missing.iter().any(|c| c.name() == name)
        } else {
            table.normal.contains_key(&name)
        };
        if taken {
            return Err(CommandError::new(CommandErrorKind::AlreadyRegistered)
                .with_command(name));
        }

        trace!(command = %name, flags = ?command.command_flags(), "Command registered");
        if command.is_missing() {
            table.missing.push(command);
        } else {
            table.normal.insert(name, command);
        }
        Ok(())
    }

    /// Removes `name` from both tables. Returns whether anything was removed.
    pub fn unregister(&self, name: &str) -> bool {
        let mut table = self.table.write();
        let before = table.missing.len();
        table.missing.retain(|c| c.name() != name);
        let removed = table.normal.remove(name).is_some() || table.missing.len() != before;
        if removed {
            trace!(command = %name, "Command unregistered");
        }
        removed
    }

    /// Looks up a normal command, falling back to the missing table.
    pub fn get(&self, name: &str) -> Option<Command> {
        let table = self.table.read();
        table
            .normal
            .get(name)
            .or_else(|| table.missing.iter().find(|c| c.name() == name))
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drops every user command and reinstalls the built-ins.
    pub fn clear(&self) {
        *self.table.write() = Table::default();
        self.install_builtins();
        debug!("Command registry cleared");
    }

    // ─── Parsing ─────────────────────────────────────────────────────────────

    /// Extracts `argv` from a message, or `None` if it is not a command.
    pub fn parse(&self, message: &Message) -> CommandResult<Option<Vec<String>>> {
        if message.kind() != MessageType::Normal {
            return Ok(None);
        }
        self.parse_text(message.text())
    }

    /// Extracts `argv` from raw text. The longest matching prefix wins; text
    /// whose remainder starts with another prefix (`!!cmd`) is not a command.
    pub fn parse_text(&self, text: &str) -> CommandResult<Option<Vec<String>>> {
        let rest = {
            let prefixes = self.prefixes.read();
            let Some(prefix) = prefixes
                .iter()
                .filter(|p| !p.is_empty() && text.starts_with(p.as_str()))
                .max_by_key(|p| p.len())
            else {
                return Ok(None);
            };
            let rest = &text[prefix.len()..];
            let stripped = rest.trim_start();
            if prefixes
                .iter()
                .any(|p| !p.is_empty() && stripped.starts_with(p.as_str()))
            {
                trace!(text, "Doubled command prefix, ignoring");
                return Ok(None);
            }
            rest
        };

        let argv = shell_split(rest).map_err(|e| CommandError::syntax(e.to_string()))?;
        if argv.is_empty() {
            return Ok(None);
        }
        Ok(Some(argv))
    }

    // ─── Execution ───────────────────────────────────────────────────────────

    /// Parses and dispatches `message`. Returns `false` if it was not a
    /// command.
    pub async fn handle(&self, message: &Message) -> CommandResult<bool> {
        match self.parse(message)? {
            Some(argv) => {
                self.dispatch(message, argv).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Routes `argv` to its command, then to the fallback handlers.
    pub async fn dispatch(&self, message: &Message, argv: Vec<String>) -> CommandResult<()> {
        let Some(name) = argv.first().cloned() else {
            return Err(CommandError::syntax("empty command line"));
        };

        let normal = self.table.read().normal.get(&name).cloned();
        if let Some(command) = normal {
            match self.exec(&command, message, &argv).await {
                Err(err) if err.is_not_found() => {
                    trace!(command = %name, "Command deferred to fallback handlers");
                }
                result => return result,
            }
        }

        let missing = self.table.read().missing.clone();
        for command in &missing {
            match self.exec(command, message, &argv).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_not_found() || err.is_arg_count() => continue,
                Err(err) => return Err(err.with_command(name)),
            }
        }

        Err(CommandError::not_found(name))
    }

    /// Runs one command against `argv` after the admin and arity checks.
    pub async fn exec(&self, command: &Command, message: &Message, argv: &[String]) -> CommandResult<()> {
        let name = argv.first().map(String::as_str).unwrap_or(command.name());

        if command.is_admin() && !self.is_admin(message.author().id()) {
            return Err(CommandError::permission_denied(name));
        }
        if argv.len() <= command.min_argc() {
            return Err(CommandError::arg_count(name));
        }

        let args = if command.command_flags().contains(CommandFlags::EXPAND) {
            argv[1..=command.min_argc()].to_vec()
        } else {
            argv.to_vec()
        };

        debug!(command = %name, user = %message.author().id(), "Executing command");
        command
            .call(message.clone(), args)
            .await
            .map_err(|err| CommandError::from_handler(err).with_command(name))
    }

    // ─── Built-ins ───────────────────────────────────────────────────────────

    /// Documentation of `name`, or `None` if no such command exists.
    pub fn help(&self, name: &str) -> Option<String> {
        self.get(name).map(|command| {
            command
                .help_text()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{name}: no help available."))
        })
    }

    /// Names every command, non-admin ones first.
    pub fn list(&self) -> String {
        let table = self.table.read();
        let (mut admin, mut user): (Vec<&str>, Vec<&str>) = table
            .normal
            .values()
            .chain(table.missing.iter())
            .map(|c| (c.is_admin(), c.name()))
            .fold((Vec::new(), Vec::new()), |(mut admin, mut user), (is_admin, name)| {
                if is_admin {
                    admin.push(name);
                } else {
                    user.push(name);
                }
                (admin, user)
            });
        user.sort_unstable();
        user.dedup();
        admin.sort_unstable();
        admin.dedup();

        let mut out = format!("Commands: {}", user.join(", "));
        if !admin.is_empty() {
            out.push_str(&format!("\nAdmin commands: {}", admin.join(", ")));
        }
        out
    }

    fn install_builtins(&self) {
        let me = self.me.clone();
        let help = Command::new("help", move |msg, argv| {
            let registry = me.upgrade();
            async move {
                let Some(registry) = registry else {
                    return Ok(());
                };
                let reply = match argv.get(1) {
                    Some(name) => registry
                        .help(name)
                        .unwrap_or_else(|| format!("Unknown command '{name}'.")),
                    None => "Usage: help <command>. Use 'list' to see every command.".to_string(),
                };
                msg.reply(&reply).await?;
                Ok(())
            }
        })
        .help("help [command]: shows the documentation of a command.");

        let me = self.me.clone();
        let list = Command::new("list", move |msg, _argv| {
            let registry = me.upgrade();
            async move {
                if let Some(registry) = registry {
                    msg.reply(&registry.list()).await?;
                }
                Ok(())
            }
        })
        .help("list: lists every available command.");

        let mut table = self.table.write();
        table.normal.insert("help".to_string(), help);
        table.normal.insert("list".to_string(), list);
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.read();
        f.debug_struct("CommandRegistry")
            .field("prefixes", &*self.prefixes.read())
            .field("normal", &table.normal.len())
            .field("missing", &table.missing.len())
            .finish()
    }
}
