//! Stub chat backend for Banter.
//!
//! Keeps every user, chat and message in memory. It serves two purposes:
//!
//! - **Tests**: inject events with [`StubApi::inject_message`] and friends,
//!   then inspect what the bot sent with [`StubApi::sent_messages`].
//! - **Local runs**: with `interactive` set, stdin lines become messages from
//!   a console user and outbound messages are printed to stdout.
//!
//! Select it in `bot.json` with `"api": "stub"`.

mod api;
mod config;
mod responder;

pub use api::StubApi;
pub use config::StubOptions;
pub use responder::{Outcome, StubResponder};

banter_core::register_api!(StubApi);
