use std::path::{Path, PathBuf};

use async_trait::async_trait;
use banter_core::{ApiResult, RequestResponder, TransferResponder};
use parking_lot::Mutex;

/// How an injected request or file offer was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    /// A file offer accepted into the given path.
    Stored(PathBuf),
    Declined,
}

/// Records the answer to an injected [`Request`](banter_core::Request) or
/// [`FileTransfer`](banter_core::FileTransfer).
#[derive(Debug, Default)]
pub struct StubResponder {
    outcome: Mutex<Option<Outcome>>,
}

impl StubResponder {
    /// Returns the answer, or `None` if nobody answered yet.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.lock().clone()
    }

    fn answer(&self, outcome: Outcome) {
        *self.outcome.lock() = Some(outcome);
    }
}

#[async_trait]
impl RequestResponder for StubResponder {
    async fn accept(&self) -> ApiResult<()> {
        self.answer(Outcome::Accepted);
        Ok(())
    }

    async fn decline(&self) -> ApiResult<()> {
        self.answer(Outcome::Declined);
        Ok(())
    }
}

#[async_trait]
impl TransferResponder for StubResponder {
    async fn accept(&self, destination: &Path) -> ApiResult<()> {
        self.answer(Outcome::Stored(destination.to_path_buf()));
        Ok(())
    }

    async fn decline(&self) -> ApiResult<()> {
        self.answer(Outcome::Declined);
        Ok(())
    }
}
