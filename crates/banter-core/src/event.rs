//! Backend events and the single-callback event slots.
//!
//! A backend produces [`Event`]s of a closed set of [`EventKind`]s. For every
//! kind it holds **at most one** callback, stored in its [`EventSlots`]. Fan-out
//! to many subscribers is the job of the dispatcher built on top of it.
//!
//! ```text
//! backend ──trigger──▶ EventSlots[kind] ──▶ one callback (the multiplexer)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{info, trace};

use crate::error::BoxError;
use crate::model::{Chat, FileTransfer, Message, Request, User};

// ============================================================================
// Event Kind
// ============================================================================

/// The closed set of event kinds a backend may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// The session is established. Fired exactly once, before anything else.
    Ready,
    /// A message written by someone other than the bot.
    Message,
    /// A message written by the bot itself.
    MessageSent,
    /// Someone asked to become a contact.
    FriendRequest,
    /// Someone invited the bot into a group.
    GroupInvite,
    /// A user joined a group the bot is in.
    GroupMemberJoin,
    /// A user left a group the bot is in.
    GroupMemberLeave,
    /// Someone offered a file.
    FiletransferReceived,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [EventKind; 8] = [
        EventKind::Ready,
        EventKind::Message,
        EventKind::MessageSent,
        EventKind::FriendRequest,
        EventKind::GroupInvite,
        EventKind::GroupMemberJoin,
        EventKind::GroupMemberLeave,
        EventKind::FiletransferReceived,
    ];

    /// Returns the snake_case name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::Message => "message",
            EventKind::MessageSent => "message_sent",
            EventKind::FriendRequest => "friend_request",
            EventKind::GroupInvite => "group_invite",
            EventKind::GroupMemberJoin => "group_member_join",
            EventKind::GroupMemberLeave => "group_member_leave",
            EventKind::FiletransferReceived => "filetransfer_received",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event
// ============================================================================

/// An event together with its fixed argument tuple.
#[derive(Debug, Clone)]
pub enum Event {
    Ready,
    /// `author` is never the bot.
    Message(Message),
    /// `author` is always the bot.
    MessageSent(Message),
    FriendRequest(Request),
    GroupInvite(Request),
    GroupMemberJoin { chat: Chat, user: User },
    GroupMemberLeave { chat: Chat, user: User },
    FiletransferReceived(FileTransfer),
}

impl Event {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ready => EventKind::Ready,
            Event::Message(_) => EventKind::Message,
            Event::MessageSent(_) => EventKind::MessageSent,
            Event::FriendRequest(_) => EventKind::FriendRequest,
            Event::GroupInvite(_) => EventKind::GroupInvite,
            Event::GroupMemberJoin { .. } => EventKind::GroupMemberJoin,
            Event::GroupMemberLeave { .. } => EventKind::GroupMemberLeave,
            Event::FiletransferReceived(_) => EventKind::FiletransferReceived,
        }
    }

    /// Returns the message carried by `Message` and `MessageSent` events.
    pub fn message(&self) -> Option<&Message> {
        match self {
            Event::Message(msg) | Event::MessageSent(msg) => Some(msg),
            _ => None,
        }
    }

    /// Returns the request carried by `FriendRequest` and `GroupInvite` events.
    pub fn request(&self) -> Option<&Request> {
        match self {
            Event::FriendRequest(req) | Event::GroupInvite(req) => Some(req),
            _ => None,
        }
    }
}

// ============================================================================
// Event Slots
// ============================================================================

/// The callback a backend invokes for one event kind.
pub type EventCallback = Arc<dyn Fn(Event) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Table holding exactly one callback per [`EventKind`].
///
/// Backends embed one `EventSlots` and expose it through
/// [`ChatApi::event_slots`](crate::api::ChatApi::event_slots).
pub struct EventSlots {
    handlers: RwLock<HashMap<EventKind, EventCallback>>,
    /// Log unhandled events at `info` instead of `trace`.
    stub: bool,
}

impl EventSlots {
    /// Creates an empty table.
    ///
    /// With `stub` set, events that arrive while no callback is installed are
    /// logged so they show up during development.
    pub fn new(stub: bool) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            stub,
        }
    }

    /// Installs `callback` for `kind`, replacing any previous one.
    /// `None` clears the slot.
    pub fn set(&self, kind: EventKind, callback: Option<EventCallback>) {
        let mut handlers = self.handlers.write();
        match callback {
            Some(cb) => {
                handlers.insert(kind, cb);
            }
            None => {
                handlers.remove(&kind);
            }
        }
    }

    /// Returns `true` if a callback is installed for `kind`.
    pub fn is_set(&self, kind: EventKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }

    /// Delivers `event` to the installed callback.
    ///
    /// The lock is released before the callback runs, so the callback may
    /// install or clear slots itself.
    pub async fn trigger(&self, event: Event) -> Result<(), BoxError> {
        let kind = event.kind();
        let callback = self.handlers.read().get(&kind).cloned();
        match callback {
            Some(cb) => cb(event).await,
            None => {
                if self.stub {
                    info!(kind = %kind, event = ?event, "Unhandled event");
                } else {
                    trace!(kind = %kind, "Unhandled event");
                }
                Ok(())
            }
        }
    }
}

impl Default for EventSlots {
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for EventSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<EventKind> = self.handlers.read().keys().copied().collect();
        kinds.sort();
        f.debug_struct("EventSlots")
            .field("installed", &kinds)
            .field("stub", &self.stub)
            .finish()
    }
}
