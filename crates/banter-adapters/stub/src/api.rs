use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use banter_core::prelude::*;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StubOptions;
use crate::responder::StubResponder;

/// Id of the console chat used in interactive mode.
const CONSOLE_CHAT: &str = "console";

struct StubState {
    display_name: String,
    users: HashMap<UserId, User>,
    chats: HashMap<ChatId, Chat>,
    sent: Vec<Message>,
}

/// In-memory chat backend.
pub struct StubApi {
    me: Weak<StubApi>,
    options: StubOptions,
    slots: EventSlots,
    shutdown: CancellationToken,
    started: AtomicBool,
    state: Mutex<StubState>,
}

impl StubApi {
    /// Creates a backend with the given options.
    pub fn new(options: StubOptions) -> Arc<Self> {
        Arc::new_cyclic(|me| {
            let display_name = options.display_name.clone();
            StubApi {
                me: me.clone(),
                options,
                slots: EventSlots::new(true),
                shutdown: CancellationToken::new(),
                started: AtomicBool::new(false),
                state: Mutex::new(StubState {
                    display_name,
                    users: HashMap::new(),
                    chats: HashMap::new(),
                    sent: Vec::new(),
                }),
            }
        })
    }

    fn api_ref(&self) -> ApiRef {
        self.me.clone()
    }

    fn self_user(&self) -> User {
        let name = self.state.lock().display_name.clone();
        User::new(self.options.user_id.clone(), name)
    }

    // ─── Fixtures ─────────────────────────────────────────────────────────────────

    /// Adds (or replaces) a user.
    pub fn add_user(&self, id: &str, display_name: &str) -> User {
        let user = User::new(id, display_name);
        self.state
            .lock()
            .users
            .insert(id.to_string(), user.clone());
        user
    }

    /// Adds a chat; direct chats always have size 2, groups count `members`
    /// plus the bot.
    pub fn add_chat(&self, id: &str, kind: ChatType, members: usize) -> Chat {
        let size = match kind {
            ChatType::Normal => 2,
            ChatType::Group => members + 1,
        };
        let info = ChatInfo::new(id, kind, size);
        let chat = Chat::new(Arc::new(info), self.api_ref());
        self.state
            .lock()
            .chats
            .insert(id.to_string(), chat.clone());
        chat
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Every message the bot sent, oldest first.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.state.lock().sent.clone()
    }

    /// Texts of every message the bot sent, oldest first.
    pub fn sent_texts(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .map(|m| m.text().to_string())
            .collect()
    }

    /// Drains the list of sent messages.
    pub fn take_sent(&self) -> Vec<Message> {
        std::mem::take(&mut self.state.lock().sent)
    }

    // ─── Injection ────────────────────────────────────────────────────────────────

    /// Delivers `event` as if it came from the network.
    pub async fn inject(&self, event: Event) -> Result<(), BoxError> {
        self.slots.trigger(event).await
    }

    /// Delivers a message of type [`MessageType::Normal`] from `author`.
    pub async fn inject_message(
        &self,
        author: &User,
        chat: &Chat,
        text: &str,
    ) -> Result<(), BoxError> {
        self.inject_typed(author, chat, text, MessageType::Normal)
            .await
    }

    /// Delivers a message of the given type from `author`.
    pub async fn inject_typed(
        &self,
        author: &User,
        chat: &Chat,
        text: &str,
        kind: MessageType,
    ) -> Result<(), BoxError> {
        let msg = Message::new(
            Uuid::new_v4().to_string(),
            author.clone(),
            chat.clone(),
            text,
            kind,
            false,
            self.api_ref(),
        );
        self.inject(Event::Message(msg)).await
    }

    /// Delivers a friend request and returns the handle that records the
    /// answer.
    pub async fn inject_friend_request(
        &self,
        author: &User,
        text: &str,
    ) -> Result<Arc<StubResponder>, BoxError> {
        let responder = Arc::new(StubResponder::default());
        let request = Request::new(author.clone(), text, responder.clone());
        self.inject(Event::FriendRequest(request)).await?;
        Ok(responder)
    }

    /// Delivers a group invite and returns the handle that records the answer.
    pub async fn inject_group_invite(
        &self,
        author: &User,
        text: &str,
    ) -> Result<Arc<StubResponder>, BoxError> {
        let responder = Arc::new(StubResponder::default());
        let request = Request::new(author.clone(), text, responder.clone());
        self.inject(Event::GroupInvite(request)).await?;
        Ok(responder)
    }

    /// Delivers a file offer and returns the handle that records the answer.
    pub async fn inject_file(
        &self,
        author: &User,
        chat: &Chat,
        file_name: &str,
        file_size: u64,
    ) -> Result<Arc<StubResponder>, BoxError> {
        let responder = Arc::new(StubResponder::default());
        let transfer = FileTransfer::new(
            author.clone(),
            chat.clone(),
            file_name,
            file_size,
            responder.clone(),
        );
        self.inject(Event::FiletransferReceived(transfer)).await?;
        Ok(responder)
    }

    /// Adds `user` to the group and fires `GroupMemberJoin`.
    pub async fn inject_member_join(&self, chat: &Chat, user: &User) -> Result<(), BoxError> {
        chat.info().set_size(chat.size() + 1);
        self.inject(Event::GroupMemberJoin {
            chat: chat.clone(),
            user: user.clone(),
        })
        .await
    }

    /// Removes `user` from the group and fires `GroupMemberLeave`.
    pub async fn inject_member_leave(&self, chat: &Chat, user: &User) -> Result<(), BoxError> {
        chat.info().set_size(chat.size().saturating_sub(1));
        self.inject(Event::GroupMemberLeave {
            chat: chat.clone(),
            user: user.clone(),
        })
        .await
    }

    // ─── Interactive console ──────────────────────────────────────────────────────

    async fn run_console(&self) -> ApiResult<()> {
        let console = self.add_user(&self.options.console_user, &self.options.console_user);
        let chat = self.add_chat(CONSOLE_CHAT, ChatType::Normal, 1);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                line = lines.next_line() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if let Err(e) = self.inject_message(&console, &chat, &line).await {
                            warn!(error = %e, "Message handler failed");
                        }
                    }
                    None => {
                        info!("Console closed, stopping stub backend");
                        break;
                    }
                },
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChatApi for StubApi {
    fn api_id(&self) -> &str {
        "stub"
    }

    fn api_name(&self) -> &str {
        "Stub"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn run(&self) -> ApiResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ApiError::AlreadyRunning);
        }
        debug!(user = %self.options.user_id, "Stub backend started");

        if let Err(e) = self.slots.trigger(Event::Ready).await {
            warn!(error = %e, "Ready handler failed");
        }

        if self.options.interactive {
            self.run_console().await?;
        } else {
            self.shutdown.cancelled().await;
        }

        debug!("Stub backend stopped");
        Ok(())
    }

    fn close(&self) {
        self.shutdown.cancel();
    }

    async fn get_user(&self) -> ApiResult<User> {
        Ok(self.self_user())
    }

    async fn set_display_name(&self, name: &str) -> ApiResult<()> {
        let mut state = self.state.lock();
        if state.display_name != name {
            state.display_name = name.to_string();
        }
        Ok(())
    }

    async fn find_user(&self, id: &str) -> ApiResult<Option<User>> {
        if id == self.options.user_id {
            return Ok(Some(self.self_user()));
        }
        Ok(self.state.lock().users.get(id).cloned())
    }

    async fn find_chat(&self, id: &str) -> ApiResult<Option<Chat>> {
        Ok(self.state.lock().chats.get(id).cloned())
    }

    async fn create_group(&self, users: &[User]) -> ApiResult<Chat> {
        let id = Uuid::new_v4().to_string();
        Ok(self.add_chat(&id, ChatType::Group, users.len()))
    }

    async fn send_message(
        &self,
        chat: &Chat,
        text: &str,
        kind: MessageType,
    ) -> ApiResult<Message> {
        if chat.size() == 0 {
            return Err(ApiError::chat_not_found(chat.id()));
        }
        let msg = Message::new(
            Uuid::new_v4().to_string(),
            self.self_user(),
            chat.clone(),
            text,
            kind,
            true,
            self.api_ref(),
        );
        self.state.lock().sent.push(msg.clone());

        if self.options.interactive {
            match kind {
                MessageType::Action => println!("* {text}"),
                _ => println!("{text}"),
            }
        }

        if let Err(e) = self.slots.trigger(Event::MessageSent(msg.clone())).await {
            warn!(error = %e, "MessageSent handler failed");
        }
        Ok(msg)
    }

    async fn edit_message(&self, message: &Message, text: &str) -> ApiResult<()> {
        let mut state = self.state.lock();
        let slot = state
            .sent
            .iter_mut()
            .find(|m| m.id() == message.id())
            .ok_or_else(|| ApiError::NotFound {
                what: "message",
                id: message.id().to_string(),
            })?;
        *slot = Message::new(
            slot.id().to_string(),
            slot.author().clone(),
            slot.chat().clone(),
            text,
            slot.kind(),
            true,
            self.api_ref(),
        );
        Ok(())
    }

    async fn leave_chat(&self, chat: &Chat) -> ApiResult<()> {
        let removed = self.state.lock().chats.remove(chat.id());
        match removed {
            Some(chat) => {
                chat.info().set_size(0);
                Ok(())
            }
            None => Err(ApiError::chat_not_found(chat.id())),
        }
    }

    async fn invite(&self, chat: &Chat, user: &User) -> ApiResult<()> {
        if chat.kind() != ChatType::Group {
            return Err(ApiError::Unsupported("invite"));
        }
        debug!(chat = %chat.id(), user = %user.id(), "Invited user");
        Ok(())
    }

    fn event_slots(&self) -> &EventSlots {
        &self.slots
    }
}

impl ConfigurableApi for StubApi {
    const NAME: &'static str = "stub";
    type Options = StubOptions;

    fn from_options(options: StubOptions) -> ApiResult<Arc<Self>> {
        Ok(StubApi::new(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::Outcome;
    use banter_core::EventCallback;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn stub() -> Arc<StubApi> {
        StubApi::new(StubOptions::default())
    }

    #[tokio::test]
    async fn test_run_fires_ready_and_stops_on_close() {
        let api = stub();
        let ready = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ready);
        let on_ready: EventCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        });
        api.register_event_handler(EventKind::Ready, Some(on_ready));

        let runner = Arc::clone(&api);
        let task = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        api.close();
        api.close();

        task.await.unwrap().unwrap();
        assert_eq!(ready.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_twice_fails() {
        let api = stub();
        api.close();
        api.run().await.unwrap();
        assert!(matches!(api.run().await, Err(ApiError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_send_message_is_recorded_with_self_author() {
        let api = stub();
        let chat = api.add_chat("c", ChatType::Normal, 1);
        let msg = chat.send_message("hello").await.unwrap();

        assert_eq!(msg.author().id(), "bot");
        assert_eq!(api.sent_texts(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_edit_updates_recorded_message() {
        let api = stub();
        let chat = api.add_chat("c", ChatType::Normal, 1);
        let msg = chat.send_message("draft").await.unwrap();
        msg.edit("final").await.unwrap();

        assert_eq!(api.sent_texts(), vec!["final"]);
    }

    #[tokio::test]
    async fn test_leave_sets_size_to_zero() {
        let api = stub();
        let chat = api.add_chat("g", ChatType::Group, 3);
        assert_eq!(chat.size(), 4);

        chat.leave().await.unwrap();
        assert_eq!(chat.size(), 0);
        assert!(api.find_chat("g").await.unwrap().is_none());
        assert!(chat.send_message("anyone?").await.is_err());
    }

    #[tokio::test]
    async fn test_friend_request_outcome() {
        let api = stub();
        let accept_all: EventCallback = Arc::new(|event: Event| {
            Box::pin(async move {
                if let Some(req) = event.request() {
                    req.accept().await?;
                }
                Ok(())
            })
        });
        api.register_event_handler(EventKind::FriendRequest, Some(accept_all));

        let alice = api.add_user("alice", "Alice");
        let responder = api.inject_friend_request(&alice, "hi").await.unwrap();
        assert_eq!(responder.outcome(), Some(Outcome::Accepted));
    }

    #[test]
    fn test_chat_sizes() {
        let api = stub();
        assert_eq!(api.add_chat("d", ChatType::Normal, 5).size(), 2);
        assert_eq!(api.add_chat("g", ChatType::Group, 5).size(), 6);
    }

    #[tokio::test]
    async fn test_set_display_name() {
        let api = stub();
        api.set_display_name("Renamed").await.unwrap();
        assert_eq!(api.get_user().await.unwrap().display_name(), "Renamed");
    }

    #[test]
    fn test_registered_in_backend_registry() {
        let desc = banter_core::find_api("stub").expect("stub backend registered");
        let defaults = (desc.default_options)();
        assert_eq!(defaults["user_id"], "bot");

        let api = (desc.create)(serde_json::json!({ "user_id": "me" })).unwrap();
        assert_eq!(api.api_id(), "stub");
    }
}
