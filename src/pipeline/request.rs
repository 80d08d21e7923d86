//! Pending requests

use crate::protocol::{BackendMessage, FrontendMessage};
use crate::{Error, Result};
use std::time::Instant;
use tokio::sync::mpsc;

/// A submitted command waiting for (or receiving) its response
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) message: FrontendMessage,
    pub(crate) responder: mpsc::Sender<Result<BackendMessage>>,
    pub(crate) submitted: Instant,
}

impl Request {
    pub(crate) fn new(message: FrontendMessage, responder: mpsc::Sender<Result<BackendMessage>>) -> Self {
        Self {
            message,
            responder,
            submitted: Instant::now(),
        }
    }

    /// Command name for spans and metrics
    pub(crate) fn command(&self) -> &'static str {
        self.message.name()
    }

    /// Complete with an error.
    ///
    /// The error is delivered even when the response buffer is full; a dropped stream
    /// simply never sees it.
    pub(crate) fn fail(self, err: Error) {
        crate::metrics::counters::request_completed(self.command(), crate::metrics::labels::OUTCOME_FAILED);
        fail_responder(self.responder, err);
    }
}

pub(crate) fn fail_responder(responder: mpsc::Sender<Result<BackendMessage>>, err: Error) {
    match responder.try_send(Err(err)) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(item)) => {
            tokio::spawn(async move {
                let _ = responder.send(item).await;
            });
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}
