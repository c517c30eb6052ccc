//! # Banter Core
//!
//! The chat backend contract of the Banter bot runtime.
//!
//! Every chat network (Discord, Telegram, Tox, the stub, ...) is wrapped in a
//! [`ChatApi`] implementation that presents the same entities ([`User`],
//! [`Chat`], [`Message`], [`Request`]) and the same closed set of events
//! ([`EventKind`]).
//!
//! ```text
//! ┌─────────────┐  one callback  ┌────────────┐     ┌────────────┐
//! │   ChatApi   │───per kind────▶│ Dispatcher │────▶│ subscriber │
//! │  (backend)  │                │ (framework)│────▶│ subscriber │
//! └─────────────┘                └────────────┘────▶│ subscriber │
//!                                                   └────────────┘
//! ```
//!
//! Backends register themselves at link time in [`registry::CHAT_APIS`] so
//! the kernel can instantiate them by name.

pub mod api;
pub mod error;
pub mod event;
pub mod model;
pub mod registry;

#[doc(hidden)]
pub use linkme;

pub use api::{BoxedApi, ChatApi, ConfigurableApi};
pub use error::{ApiError, ApiResult, BoxError};
pub use event::{Event, EventCallback, EventKind, EventSlots};
pub use model::{
    ApiRef, Chat, ChatId, ChatInfo, ChatType, FileTransfer, Message, MessageType, Request,
    RequestResponder, TransferResponder, User, UserId,
};
pub use registry::{ApiDescriptor, api_names, find_api};

/// Prelude for backend implementations.
pub mod prelude {
    pub use super::api::{BoxedApi, ChatApi, ConfigurableApi};
    pub use super::error::{ApiError, ApiResult, BoxError};
    pub use super::event::{Event, EventKind, EventSlots};
    pub use super::model::*;
}
