//! The chat backend contract.
//!
//! A backend (Discord, Telegram, Tox, the stub, ...) implements [`ChatApi`].
//! The kernel only ever talks to backends through this trait.
//!
//! # Lifecycle
//!
//! ```text
//! from_options() ──► run() ── Ready ── events ... ──► close() ──► run() returns
//! ```
//!
//! `run` may be called at most once per instance. `close` is idempotent and may
//! be called from any task, including event callbacks.
//!
//! # Events
//!
//! Backends deliver events through [`EventSlots::trigger`] on their own slots
//! table. Exactly one callback is installed per [`EventKind`]; installing a new
//! one replaces the old one and `None` clears it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};
use crate::event::{EventCallback, EventKind, EventSlots};
use crate::model::{Chat, Message, MessageType, User};

/// The uniform contract over one chat backend session.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    /// Short machine name of the backend, e.g. `"stub"`.
    fn api_id(&self) -> &str;

    /// Human readable backend name.
    fn api_name(&self) -> &str;

    /// Backend version string.
    fn version(&self) -> &str;

    /// Starts the session and drives it until [`close`](Self::close) is
    /// called or a fatal error occurs.
    ///
    /// Must fire [`EventKind::Ready`] before any other event. A second call
    /// fails with [`ApiError::AlreadyRunning`].
    async fn run(&self) -> ApiResult<()>;

    /// Signals [`run`](Self::run) to return. Idempotent.
    fn close(&self);

    /// Returns the logged-in user.
    async fn get_user(&self) -> ApiResult<User>;

    /// Changes the bot's display name. A no-op if the name is unchanged.
    async fn set_display_name(&self, name: &str) -> ApiResult<()>;

    /// Looks up a user by id.
    async fn find_user(&self, id: &str) -> ApiResult<Option<User>>;

    /// Looks up a chat by id.
    async fn find_chat(&self, id: &str) -> ApiResult<Option<Chat>>;

    /// Creates a new group containing `users` and the bot.
    async fn create_group(&self, _users: &[User]) -> ApiResult<Chat> {
        Err(ApiError::Unsupported("create_group"))
    }

    /// Posts a message to `chat`.
    ///
    /// Backends fire [`EventKind::MessageSent`] for every message posted this
    /// way.
    async fn send_message(&self, chat: &Chat, text: &str, kind: MessageType)
    -> ApiResult<Message>;

    /// Replaces the text of a message previously sent by the bot.
    async fn edit_message(&self, _message: &Message, _text: &str) -> ApiResult<()> {
        Err(ApiError::Unsupported("edit_message"))
    }

    /// Leaves `chat`.
    async fn leave_chat(&self, _chat: &Chat) -> ApiResult<()> {
        Err(ApiError::Unsupported("leave_chat"))
    }

    /// Invites `user` into the group `chat`.
    async fn invite(&self, _chat: &Chat, _user: &User) -> ApiResult<()> {
        Err(ApiError::Unsupported("invite"))
    }

    /// The backend's single-callback event table.
    fn event_slots(&self) -> &EventSlots;

    /// Installs exactly one callback for `kind`; `None` clears it.
    fn register_event_handler(&self, kind: EventKind, callback: Option<EventCallback>) {
        self.event_slots().set(kind, callback);
    }
}

/// A shared backend trait object.
pub type BoxedApi = Arc<dyn ChatApi>;

/// Backends that can be constructed from JSON options.
///
/// Separates the static parts of a backend (name, option type, defaults)
/// from the object-safe [`ChatApi`] trait.
pub trait ConfigurableApi: ChatApi + Sized {
    /// Name used in `bot.json` (`"api": "<NAME>"`).
    const NAME: &'static str;

    /// Backend options, stored in `api.json`.
    type Options: Serialize + DeserializeOwned + Default;

    /// Options with their default values.
    fn get_default_options() -> Self::Options {
        Self::Options::default()
    }

    /// Creates a backend instance from its options.
    fn from_options(options: Self::Options) -> ApiResult<Arc<Self>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Backend that does nothing; only used to type weak references.
    pub(crate) struct NullApi {
        slots: EventSlots,
    }

    #[async_trait]
    impl ChatApi for NullApi {
        fn api_id(&self) -> &str {
            "null"
        }

        fn api_name(&self) -> &str {
            "Null"
        }

        fn version(&self) -> &str {
            "0"
        }

        async fn run(&self) -> ApiResult<()> {
            Ok(())
        }

        fn close(&self) {}

        async fn get_user(&self) -> ApiResult<User> {
            Ok(User::new("null", "Null"))
        }

        async fn set_display_name(&self, _name: &str) -> ApiResult<()> {
            Ok(())
        }

        async fn find_user(&self, _id: &str) -> ApiResult<Option<User>> {
            Ok(None)
        }

        async fn find_chat(&self, _id: &str) -> ApiResult<Option<Chat>> {
            Ok(None)
        }

        async fn send_message(
            &self,
            _chat: &Chat,
            _text: &str,
            _kind: MessageType,
        ) -> ApiResult<Message> {
            Err(ApiError::Closed)
        }

        fn event_slots(&self) -> &EventSlots {
            &self.slots
        }
    }

    #[tokio::test]
    async fn test_default_operations_are_unsupported() {
        let api = NullApi {
            slots: EventSlots::default(),
        };
        assert!(matches!(
            api.create_group(&[]).await,
            Err(ApiError::Unsupported("create_group"))
        ));
    }

    #[test]
    fn test_register_event_handler_uses_slots() {
        let api = NullApi {
            slots: EventSlots::default(),
        };
        let cb: EventCallback = Arc::new(|_| Box::pin(async { Ok(()) }));
        api.register_event_handler(EventKind::Message, Some(cb));
        assert!(api.event_slots().is_set(EventKind::Message));
        api.register_event_handler(EventKind::Message, None);
        assert!(!api.event_slots().is_set(EventKind::Message));
    }
}
