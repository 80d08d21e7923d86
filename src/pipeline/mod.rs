//! Request/response pipeline
//!
//! One authenticated connection is shared by any number of callers. Submissions are
//! queued in order and serviced strictly one after another by the sequencer task; each
//! caller receives its own [`ResponseStream`].
//!
//! ```text
//! submit ──► requests (mpsc) ──► Sequencer ──► outbound (mpsc) ──► writer ──► socket
//!                                    ▲
//!            ResponseStream ◄────────┴──── decode ◄── read half ◄────────── socket
//! ```

mod request;
mod response;
mod sequencer;
mod tracker;

pub use response::ResponseStream;
pub use tracker::{Progress, ResponseTracker, Shape};

use crate::codec::CodecContext;
use crate::protocol::{FrontendMessage, PacketCodec};
use crate::{Error, Result};
use bytes::BytesMut;
use request::Request;
use sequencer::{Sequencer, SequencerOptions};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Negotiated capability flags
    pub capabilities: u32,
    /// Requests that may wait before `submit` applies backpressure
    pub queue_depth: usize,
    /// Messages buffered per response stream
    pub response_buffer: usize,
    /// Directory LOAD DATA LOCAL INFILE may read from
    pub local_infile_path: Option<PathBuf>,
    /// Settings for encoding statement parameters
    pub codec_context: CodecContext,
}

/// Caller-side handle of a running sequencer
#[derive(Debug)]
pub struct Pipeline {
    requests: mpsc::Sender<Request>,
    shutdown: watch::Sender<bool>,
    closed: watch::Receiver<bool>,
    response_buffer: usize,
}

impl Pipeline {
    /// Start the sequencer and writer tasks over an authenticated transport.
    ///
    /// `codec` and `read_buf` carry over the handshake's compression state and any bytes
    /// already read. Must be called within a tokio runtime.
    pub fn spawn<T>(transport: T, codec: PacketCodec, read_buf: BytesMut, config: PipelineConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let options = SequencerOptions {
            capabilities: config.capabilities,
            queue_depth: config.queue_depth.max(1),
            local_infile_path: config.local_infile_path,
            codec_context: config.codec_context,
        };
        let (sequencer, handles) = Sequencer::new(transport, codec, read_buf, options);
        tokio::spawn(sequencer.run());

        Self {
            requests: handles.requests,
            shutdown: handles.shutdown,
            closed: handles.closed,
            response_buffer: config.response_buffer.max(1),
        }
    }

    /// Queue a command; the returned stream yields its response.
    ///
    /// Waits when `queue_depth` requests are already queued.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidState` - handshake-only messages and `Quit` (use `close`)
    /// * `Error::ConnectionClosed` - the pipeline has shut down
    pub async fn submit(&self, message: FrontendMessage) -> Result<ResponseStream> {
        if message.is_handshake() || message == FrontendMessage::Quit {
            return Err(Error::InvalidState {
                expected: "command message".into(),
                actual: message.name().into(),
            });
        }
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let command = message.name();
        let (tx, rx) = mpsc::channel(self.response_buffer);
        self.requests
            .send(Request::new(message, tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        crate::metrics::counters::request_submitted(command);
        Ok(ResponseStream::new(rx, command))
    }

    /// Whether the sequencer has stopped
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow() || self.requests.is_closed()
    }

    /// Send COM_QUIT, fail pending requests with `ConnectionClosed` and wait for the
    /// transport to be released. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.send_replace(true);
        let mut closed = self.closed.clone();
        // Sender dropped means the sequencer is gone
        let _ = closed.wait_for(|done| *done).await;
        Ok(())
    }
}
