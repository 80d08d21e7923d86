//! Caller side of an exchange

use crate::protocol::BackendMessage;
use crate::{Error, Result};
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Messages of one exchange, in arrival order, ending with the terminal message.
///
/// Rows are pulled lazily: the pipeline buffers at most `response_buffer` messages
/// before it waits for the caller. Dropping the stream early does not cancel the
/// command; the rest of the response is read and discarded.
///
/// # Examples
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut stream = client.submit(FrontendMessage::Query("SELECT id FROM t".into())).await?;
/// while let Some(msg) = stream.next().await {
///     if let BackendMessage::Row(row) = msg? {
///         println!("{:?}", row.values);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct ResponseStream {
    rx: mpsc::Receiver<Result<BackendMessage>>,
    command: &'static str,
    finished: bool,
}

impl ResponseStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<BackendMessage>>, command: &'static str) -> Self {
        Self {
            rx,
            command,
            finished: false,
        }
    }

    /// Command this stream answers
    pub fn command(&self) -> &'static str {
        self.command
    }

    /// Next message, `None` once the exchange is complete
    pub async fn recv(&mut self) -> Option<Result<BackendMessage>> {
        if self.finished {
            return None;
        }
        let item = self.rx.recv().await;
        self.observe(&item);
        item
    }

    /// Drain the stream and return its terminal message.
    ///
    /// # Errors
    ///
    /// A server ERR becomes `Error::Server`; a stream that ends without any message
    /// (commands without a response) is `Error::Protocol`.
    pub async fn terminal(mut self) -> Result<BackendMessage> {
        let mut last = None;
        while let Some(item) = self.recv().await {
            last = Some(item?);
        }
        match last {
            Some(BackendMessage::Error(err)) => Err(Error::Server(err)),
            Some(msg) => Ok(msg),
            None => Err(Error::Protocol(format!(
                "no terminal message for {}",
                self.command
            ))),
        }
    }

    /// Collect every message of the exchange, ERR included
    pub async fn collect_all(mut self) -> Result<Vec<BackendMessage>> {
        let mut messages = Vec::new();
        while let Some(item) = self.recv().await {
            messages.push(item?);
        }
        Ok(messages)
    }

    fn observe(&mut self, item: &Option<Result<BackendMessage>>) {
        if matches!(item, None | Some(Err(_))) {
            self.finished = true;
        }
    }
}

impl Stream for ResponseStream {
    type Item = Result<BackendMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let item = futures::ready!(self.rx.poll_recv(cx));
        self.observe(&item);
        Poll::Ready(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use futures::StreamExt;

    fn stream(items: Vec<Result<BackendMessage>>) -> ResponseStream {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.try_send(item).unwrap();
        }
        ResponseStream::new(rx, "query")
    }

    #[tokio::test]
    async fn test_terminal_returns_last() {
        let s = stream(vec![
            Ok(BackendMessage::ColumnCount(1)),
            Ok(BackendMessage::LocalInfileRequest("x".into())),
        ]);
        assert!(matches!(s.terminal().await, Ok(BackendMessage::LocalInfileRequest(_))));
    }

    #[tokio::test]
    async fn test_terminal_server_error() {
        let s = stream(vec![Ok(BackendMessage::Error(ServerError {
            code: 1146,
            sql_state: "42S02".into(),
            message: "Table 'db.t' doesn't exist".into(),
        }))]);
        let err = s.terminal().await.unwrap_err();
        assert_eq!(err.server_code(), Some(1146));
    }

    #[tokio::test]
    async fn test_terminal_empty_stream() {
        let s = stream(vec![]);
        assert!(matches!(s.terminal().await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let mut s = stream(vec![
            Ok(BackendMessage::ColumnCount(1)),
            Err(Error::ConnectionClosed),
        ]);
        assert!(matches!(s.next().await, Some(Ok(_))));
        assert!(matches!(s.next().await, Some(Err(Error::ConnectionClosed))));
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn test_collect_all_keeps_error_packet() {
        let s = stream(vec![Ok(BackendMessage::Error(ServerError {
            code: 1064,
            sql_state: "42000".into(),
            message: "syntax".into(),
        }))]);
        let all = s.collect_all().await.unwrap();
        assert_eq!(all.len(), 1);
    }
}
