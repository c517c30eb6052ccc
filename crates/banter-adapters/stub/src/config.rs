//! Stub backend options (`api.json`).

use serde::{Deserialize, Serialize};

/// Options of the stub backend.
///
/// ```json
/// {
///   "user_id": "bot",
///   "display_name": "Stub Bot",
///   "interactive": true,
///   "console_user": "console"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StubOptions {
    /// Id of the bot's own account.
    pub user_id: String,
    /// Initial display name of the bot.
    pub display_name: String,
    /// Read stdin lines as messages from [`console_user`](Self::console_user)
    /// and print outbound messages to stdout.
    pub interactive: bool,
    /// Id of the user typing on the console in interactive mode.
    pub console_user: String,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            user_id: "bot".to_string(),
            display_name: "Stub Bot".to_string(),
            interactive: false,
            console_user: "console".to_string(),
        }
    }
}
