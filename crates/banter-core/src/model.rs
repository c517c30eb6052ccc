//! Uniform view over the entities of a chat network.
//!
//! Every backend maps its own users, conversations and messages onto the
//! types in this module:
//!
//! - [`User`] - an account, compared by id
//! - [`Chat`] - a direct conversation or a group
//! - [`Message`] - an immutable snapshot of one message, with `edit`/`reply`
//! - [`Request`] - a pending friend request or group invite
//! - [`FileTransfer`] - an incoming file offer
//!
//! Handles that can act on the backend (`Chat`, `Message`) keep an
//! [`ApiRef`], a weak reference to the owning [`ChatApi`]. Once the backend is
//! dropped those actions fail with [`ApiError::Closed`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::api::ChatApi;
use crate::error::{ApiError, ApiResult};

/// Opaque user identifier, unique within one backend session.
pub type UserId = String;

/// Opaque chat identifier, unique within one backend session.
pub type ChatId = String;

/// Weak back-reference from an entity to the backend that produced it.
pub type ApiRef = Weak<dyn ChatApi>;

fn upgrade(api: &ApiRef) -> ApiResult<Arc<dyn ChatApi>> {
    api.upgrade().ok_or(ApiError::Closed)
}

// ============================================================================
// User
// ============================================================================

/// A user account on the chat network.
///
/// Two users are equal when their ids are equal.
#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    display_name: String,
    mention: String,
}

impl User {
    /// Creates a user whose mention form is `@display_name`.
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let mention = format!("@{display_name}");
        Self {
            id: id.into(),
            display_name,
            mention,
        }
    }

    /// Overrides the protocol-specific ping form.
    pub fn with_mention(mut self, mention: impl Into<String>) -> Self {
        self.mention = mention.into();
        self
    }

    /// Returns the user id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the text that pings this user on the backend.
    pub fn mention(&self) -> &str {
        &self.mention
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ============================================================================
// Chat
// ============================================================================

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatType {
    /// A one-to-one conversation.
    Normal,
    /// A group with any number of members.
    Group,
}

/// Backend-owned state of a chat. The backend keeps the same `Arc` so member
/// count changes are visible through every [`Chat`] handle.
#[derive(Debug)]
pub struct ChatInfo {
    id: ChatId,
    kind: ChatType,
    is_id_unique: bool,
    is_anonymous: bool,
    size: AtomicUsize,
}

impl ChatInfo {
    /// Creates the shared state of a chat.
    ///
    /// Direct chats always start with a size of 2.
    pub fn new(id: impl Into<ChatId>, kind: ChatType, size: usize) -> Self {
        let size = match kind {
            ChatType::Normal => 2,
            ChatType::Group => size,
        };
        Self {
            id: id.into(),
            kind,
            is_id_unique: true,
            is_anonymous: false,
            size: AtomicUsize::new(size),
        }
    }

    /// Marks the chat id as only unique for this session.
    pub fn with_session_id(mut self) -> Self {
        self.is_id_unique = false;
        self
    }

    /// Marks the group as anonymous.
    pub fn anonymous(mut self) -> Self {
        self.is_anonymous = true;
        self
    }

    /// Updates the member count (self included).
    pub fn set_size(&self, size: usize) {
        self.size.store(size, Ordering::SeqCst);
    }
}

/// Handle to a conversation.
///
/// Equality is defined by the chat id.
#[derive(Clone)]
pub struct Chat {
    info: Arc<ChatInfo>,
    api: ApiRef,
}

impl Chat {
    /// Creates a handle bound to `api`.
    pub fn new(info: Arc<ChatInfo>, api: ApiRef) -> Self {
        Self { info, api }
    }

    /// Returns the chat id.
    pub fn id(&self) -> &str {
        &self.info.id
    }

    /// Whether the id stays the same across sessions.
    pub fn is_id_unique(&self) -> bool {
        self.info.is_id_unique
    }

    /// Returns the chat kind.
    pub fn kind(&self) -> ChatType {
        self.info.kind
    }

    /// Number of members including the bot itself; 0 once the chat was left.
    pub fn size(&self) -> usize {
        self.info.size.load(Ordering::SeqCst)
    }

    /// Whether other members of this group cannot be uniquely identified.
    pub fn is_anonymous(&self) -> bool {
        self.info.is_anonymous
    }

    /// Returns the shared backend state.
    pub fn info(&self) -> &Arc<ChatInfo> {
        &self.info
    }

    /// Sends a normal text message to this chat.
    pub async fn send_message(&self, text: &str) -> ApiResult<Message> {
        upgrade(&self.api)?
            .send_message(self, text, MessageType::Normal)
            .await
    }

    /// Sends an action ("/me") message to this chat.
    pub async fn send_action(&self, text: &str) -> ApiResult<Message> {
        upgrade(&self.api)?
            .send_message(self, text, MessageType::Action)
            .await
    }

    /// Leaves the chat. The size drops to 0 on success.
    pub async fn leave(&self) -> ApiResult<()> {
        upgrade(&self.api)?.leave_chat(self).await
    }

    /// Invites `user` into this group.
    pub async fn invite(&self, user: &User) -> ApiResult<()> {
        upgrade(&self.api)?.invite(self, user).await
    }
}

impl PartialEq for Chat {
    fn eq(&self, other: &Self) -> bool {
        self.info.id == other.info.id
    }
}

impl Eq for Chat {}

impl Hash for Chat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.id.hash(state);
    }
}

impl fmt::Debug for Chat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chat")
            .field("id", &self.info.id)
            .field("kind", &self.info.kind)
            .field("size", &self.size())
            .field("is_anonymous", &self.info.is_anonymous)
            .finish()
    }
}

// ============================================================================
// Message
// ============================================================================

/// Kind of message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Ordinary text; the only kind commands are parsed from.
    Normal,
    /// An action ("/me waves").
    Action,
    /// A notice generated by the network itself.
    System,
}

/// Immutable snapshot of a message.
#[derive(Clone)]
pub struct Message {
    id: String,
    text: String,
    author: User,
    chat: Chat,
    kind: MessageType,
    is_editable: bool,
    api: ApiRef,
}

impl Message {
    /// Creates a message snapshot bound to `api`.
    pub fn new(
        id: impl Into<String>,
        author: User,
        chat: Chat,
        text: impl Into<String>,
        kind: MessageType,
        is_editable: bool,
        api: ApiRef,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author,
            chat,
            kind,
            is_editable,
            api,
        }
    }

    /// Backend message id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Message text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The user that wrote the message.
    pub fn author(&self) -> &User {
        &self.author
    }

    /// The chat the message was posted in.
    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    /// Message kind.
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Whether [`edit`](Self::edit) may succeed.
    pub fn is_editable(&self) -> bool {
        self.is_editable
    }

    /// Replaces the text of this message on the backend.
    ///
    /// The snapshot itself is not updated.
    pub async fn edit(&self, text: &str) -> ApiResult<()> {
        if !self.is_editable {
            return Err(ApiError::NotEditable);
        }
        upgrade(&self.api)?.edit_message(self, text).await
    }

    /// Sends `text` to the chat this message came from.
    pub async fn reply(&self, text: &str) -> ApiResult<Message> {
        self.chat.send_message(text).await
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("author", &self.author.id)
            .field("chat", &self.chat.id())
            .field("kind", &self.kind)
            .finish()
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Backend side of a [`Request`].
#[async_trait]
pub trait RequestResponder: Send + Sync {
    /// Accepts the request.
    async fn accept(&self) -> ApiResult<()>;

    /// Declines the request.
    async fn decline(&self) -> ApiResult<()>;
}

/// A pending inbound interaction: a friend request or a group invite.
#[derive(Clone)]
pub struct Request {
    author: User,
    text: String,
    responder: Arc<dyn RequestResponder>,
}

impl Request {
    /// Creates a request answered through `responder`.
    pub fn new(author: User, text: impl Into<String>, responder: Arc<dyn RequestResponder>) -> Self {
        Self {
            author,
            text: text.into(),
            responder,
        }
    }

    /// The user that sent the request.
    pub fn author(&self) -> &User {
        &self.author
    }

    /// The text attached to the request.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Accepts the request.
    pub async fn accept(&self) -> ApiResult<()> {
        self.responder.accept().await
    }

    /// Declines the request.
    pub async fn decline(&self) -> ApiResult<()> {
        self.responder.decline().await
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("author", &self.author.id)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// Backend side of a [`FileTransfer`].
#[async_trait]
pub trait TransferResponder: Send + Sync {
    /// Accepts the file and stores it at `destination`.
    async fn accept(&self, destination: &Path) -> ApiResult<()>;

    /// Rejects the file.
    async fn decline(&self) -> ApiResult<()>;
}

/// An incoming file offer.
#[derive(Clone)]
pub struct FileTransfer {
    author: User,
    chat: Chat,
    file_name: String,
    file_size: u64,
    responder: Arc<dyn TransferResponder>,
}

impl FileTransfer {
    /// Creates a file offer answered through `responder`.
    pub fn new(
        author: User,
        chat: Chat,
        file_name: impl Into<String>,
        file_size: u64,
        responder: Arc<dyn TransferResponder>,
    ) -> Self {
        Self {
            author,
            chat,
            file_name: file_name.into(),
            file_size,
            responder,
        }
    }

    pub fn author(&self) -> &User {
        &self.author
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Announced size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub async fn accept(&self, destination: &Path) -> ApiResult<()> {
        self.responder.accept(destination).await
    }

    pub async fn decline(&self) -> ApiResult<()> {
        self.responder.decline().await
    }
}

impl fmt::Debug for FileTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransfer")
            .field("author", &self.author.id)
            .field("chat", &self.chat.id())
            .field("file_name", &self.file_name)
            .field("file_size", &self.file_size)
            .finish_non_exhaustive()
    }
}
