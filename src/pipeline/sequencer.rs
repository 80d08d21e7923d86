//! Sequencer task
//!
//! Single owner of the read half, the packet codec (sequence ids, compression state) and
//! the pending request queue. Requests are dispatched one at a time: the next command is
//! written only after the previous response reached its terminal message. Encoded bytes go
//! to a writer task; inbound payloads are decoded in the phase of the active exchange and
//! forwarded to its `ResponseStream`.

use super::request::{fail_responder, Request};
use super::tracker::{Progress, ResponseTracker, Shape};
use crate::codec::CodecContext;
use crate::metrics::labels;
use crate::protocol::{decode_message, encode_message, encode_message_with, BackendMessage, FrontendMessage, PacketCodec, Phase};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Local infile contents are sent in packets of this size
const INFILE_CHUNK: usize = 64 * 1024;

/// Bytes read ahead while a response stream is full
const READ_AHEAD_LIMIT: usize = 1 << 20;

/// Time the writer gets to flush COM_QUIT on close
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exchange on the wire
struct Exchange {
    responder: mpsc::Sender<Result<BackendMessage>>,
    command: &'static str,
    tracker: ResponseTracker,
    submitted: std::time::Instant,
    delivered: u64,
    /// Caller dropped the stream; the response is drained
    abandoned: bool,
    span: tracing::Span,
}

/// Settings the sequencer needs from the connection
#[derive(Debug, Clone)]
pub(crate) struct SequencerOptions {
    pub(crate) capabilities: u32,
    pub(crate) queue_depth: usize,
    pub(crate) local_infile_path: Option<PathBuf>,
    pub(crate) codec_context: CodecContext,
}

pub(crate) struct Sequencer<T> {
    reader: ReadHalf<T>,
    read_buf: BytesMut,
    codec: PacketCodec,
    options: SequencerOptions,
    requests: mpsc::Receiver<Request>,
    shutdown: watch::Receiver<bool>,
    closed: watch::Sender<bool>,
    outbound: mpsc::Sender<Bytes>,
    writer_failed: oneshot::Receiver<Error>,
    writer: JoinHandle<()>,
    queue: VecDeque<Request>,
    active: Option<Exchange>,
    /// Close was requested while a delivery was blocked
    closing: bool,
}

/// Channel ends the caller side keeps
pub(crate) struct SequencerHandles {
    pub(crate) requests: mpsc::Sender<Request>,
    pub(crate) shutdown: watch::Sender<bool>,
    pub(crate) closed: watch::Receiver<bool>,
}

impl<T> Sequencer<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Split the transport, start the writer task and return the sequencer with the
    /// caller-side channel ends.
    pub(crate) fn new(
        transport: T,
        codec: PacketCodec,
        read_buf: BytesMut,
        options: SequencerOptions,
    ) -> (Self, SequencerHandles) {
        let mut codec = codec;
        // Idle packets (an unsolicited ERR) arrive with sequence id 0
        codec.reset_sequence();
        let (reader, writer) = tokio::io::split(transport);
        let (outbound, outbound_rx) = mpsc::channel(options.queue_depth);
        let (failed_tx, writer_failed) = oneshot::channel();
        let writer = tokio::spawn(write_loop(writer, outbound_rx, failed_tx));

        let (requests_tx, requests) = mpsc::channel(options.queue_depth);
        let (shutdown_tx, shutdown) = watch::channel(false);
        let (closed, closed_rx) = watch::channel(false);

        let sequencer = Self {
            reader,
            read_buf,
            codec,
            options,
            requests,
            shutdown,
            closed,
            outbound,
            writer_failed,
            writer,
            queue: VecDeque::new(),
            active: None,
            closing: false,
        };
        let handles = SequencerHandles {
            requests: requests_tx,
            shutdown: shutdown_tx,
            closed: closed_rx,
        };
        (sequencer, handles)
    }

    /// Run until closed or a fatal error; every pending request is completed on exit
    pub(crate) async fn run(mut self) {
        let result = self.drive().await;

        let cause = match result {
            Ok(()) => {
                tracing::debug!("pipeline closed");
                Error::ConnectionClosed
            }
            Err(Error::Server(err)) => {
                tracing::warn!(code = err.code, sql_state = %err.sql_state, message = %err.message, "unsolicited server error, closing");
                Error::ConnectionClosed
            }
            Err(Error::ConnectionClosed) => {
                tracing::debug!("server closed the connection");
                Error::ConnectionClosed
            }
            Err(e) => {
                tracing::error!(error = %e, "pipeline failed, closing connection");
                if let Error::Protocol(_) = e {
                    crate::metrics::counters::protocol_error("desync");
                }
                e
            }
        };

        self.fail_pending(cause);

        let Sequencer {
            outbound,
            writer,
            closed,
            ..
        } = self;
        drop(outbound);
        if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, writer).await.is_err() {
            tracing::warn!("writer did not shut down in time");
        }
        let _ = closed.send(true);
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            self.dispatch_next().await?;

            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    // Close requested, or every handle dropped
                    let _ = changed;
                    return self.quit().await;
                }
                failed = &mut self.writer_failed => {
                    return Err(failed.unwrap_or(Error::ConnectionClosed));
                }
                read = self.reader.read_buf(&mut self.read_buf) => {
                    if read? == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                    self.process_inbound().await?;
                    if self.closing {
                        return self.quit().await;
                    }
                }
                request = self.requests.recv(), if self.queue.len() < self.options.queue_depth => {
                    match request {
                        Some(request) => self.queue.push_back(request),
                        None => return self.quit().await,
                    }
                }
            }
        }
    }

    /// Put the next queued command on the wire if nothing is in flight
    async fn dispatch_next(&mut self) -> Result<()> {
        while self.active.is_none() {
            let Some(request) = self.queue.pop_front() else {
                return Ok(());
            };

            let payload = match encode_message_with(&request.message, &self.options.codec_context) {
                Ok(payload) => payload,
                Err(e) => {
                    // Parameter conversion failures only concern this request
                    request.fail(e);
                    continue;
                }
            };

            let command = request.command();
            let span = tracing::debug_span!("exchange", command = command);
            self.codec.reset_sequence();
            self.write_payload(&payload).await?;
            tracing::debug!(parent: &span, len = payload.len(), "command sent");

            let shape = Shape::of(&request.message);
            if shape == Shape::NoResponse {
                // Stream ends with no messages when the responder drops
                crate::metrics::counters::request_completed(command, labels::OUTCOME_OK);
                self.codec.reset_sequence();
                continue;
            }

            self.active = Some(Exchange {
                responder: request.responder,
                command,
                tracker: ResponseTracker::new(shape, self.options.capabilities),
                submitted: request.submitted,
                delivered: 0,
                abandoned: false,
                span,
            });
        }
        Ok(())
    }

    async fn process_inbound(&mut self) -> Result<()> {
        while let Some(payload) = self.codec.decode(&mut self.read_buf)? {
            self.on_payload(payload).await?;
            if self.closing {
                break;
            }
        }
        Ok(())
    }

    async fn on_payload(&mut self, payload: Bytes) -> Result<()> {
        let caps = self.options.capabilities;
        let Some(exchange) = self.active.as_mut() else {
            return match decode_message(&payload, &Phase::CommandResponse, caps) {
                Ok(BackendMessage::Error(err)) => Err(Error::Server(err)),
                Ok(msg) => Err(Error::Protocol(format!(
                    "unsolicited {} with no pending request",
                    msg.kind()
                ))),
                Err(e) => Err(e),
            };
        };

        let msg = decode_message(&payload, &exchange.tracker.phase(), caps)?;
        let progress = exchange.tracker.advance(&msg)?;
        tracing::trace!(parent: &exchange.span, kind = msg.kind(), ?progress, "message received");

        let infile = match &msg {
            BackendMessage::LocalInfileRequest(name) => Some(name.clone()),
            _ => None,
        };
        let server_error = matches!(msg, BackendMessage::Error(_));

        self.deliver(msg).await?;
        if self.closing {
            return Ok(());
        }
        if let Some(name) = infile {
            self.send_local_infile(&name).await?;
        }
        if progress == Progress::Terminal {
            self.finish(server_error);
        }
        Ok(())
    }

    /// Forward a message to the active exchange's stream, waiting for buffer space.
    ///
    /// While the stream is full, a close request ends the wait and the transport is still
    /// read so that a lost connection fails the pipeline.
    async fn deliver(&mut self, msg: BackendMessage) -> Result<()> {
        let Some(exchange) = self.active.as_mut() else {
            return Ok(());
        };
        if exchange.abandoned {
            return Ok(());
        }
        exchange.delivered += 1;

        let send = exchange.responder.send(Ok(msg));
        tokio::pin!(send);
        loop {
            tokio::select! {
                biased;

                sent = &mut send => {
                    if sent.is_err() {
                        exchange.abandoned = true;
                        crate::metrics::counters::request_abandoned(exchange.command);
                        tracing::warn!(parent: &exchange.span, "response stream dropped, draining the rest of the response");
                    }
                    return Ok(());
                }
                changed = self.shutdown.changed(), if !self.closing => {
                    let _ = changed;
                    // The stream gets ConnectionClosed after what it already buffered
                    self.closing = true;
                    tracing::debug!(parent: &exchange.span, "close requested while the response stream is full");
                    return Ok(());
                }
                read = self.reader.read_buf(&mut self.read_buf), if self.read_buf.len() < READ_AHEAD_LIMIT => {
                    if read? == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                }
            }
        }
    }

    fn finish(&mut self, server_error: bool) {
        let Some(exchange) = self.active.take() else {
            return;
        };
        let outcome = if exchange.abandoned {
            labels::OUTCOME_ABANDONED
        } else if server_error {
            labels::OUTCOME_SERVER_ERROR
        } else {
            labels::OUTCOME_OK
        };
        crate::metrics::counters::request_completed(exchange.command, outcome);
        crate::metrics::histograms::exchange_duration(
            exchange.command,
            exchange.submitted.elapsed().as_millis() as u64,
        );
        crate::metrics::histograms::exchange_messages(exchange.command, exchange.delivered);
        tracing::debug!(parent: &exchange.span, outcome = outcome, messages = exchange.delivered, "exchange complete");
        self.codec.reset_sequence();
    }

    /// Answer a LOAD DATA LOCAL INFILE request: the file, then an empty packet
    async fn send_local_infile(&mut self, name: &str) -> Result<()> {
        let contents = match read_local_infile(self.options.local_infile_path.clone(), name).await {
            Ok(contents) => contents,
            Err(reason) => {
                tracing::warn!(file = %name, %reason, "local infile refused");
                Vec::new()
            }
        };
        for chunk in contents.chunks(INFILE_CHUNK) {
            self.write_payload(chunk).await?;
        }
        self.write_payload(&[]).await
    }

    /// Send COM_QUIT after failing everything still pending
    async fn quit(&mut self) -> Result<()> {
        self.fail_pending(Error::ConnectionClosed);
        self.codec.reset_sequence();
        let payload = encode_message(&FrontendMessage::Quit)?;
        self.write_payload(&payload).await
    }

    fn fail_pending(&mut self, cause: Error) {
        if let Some(exchange) = self.active.take() {
            crate::metrics::counters::request_completed(exchange.command, labels::OUTCOME_CLOSED);
            if !exchange.abandoned {
                fail_responder(exchange.responder, cause);
            }
        }

        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            self.queue.push_back(request);
        }
        for request in self.queue.drain(..) {
            request.fail(Error::ConnectionClosed);
        }
    }

    async fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        let mut out = BytesMut::with_capacity(payload.len() + 8);
        self.codec.encode(payload, &mut out)?;
        self.outbound
            .send(out.freeze())
            .await
            .map_err(|_| Error::ConnectionClosed)
    }
}

/// Read a file the server asked for, only from inside `dir`
async fn read_local_infile(dir: Option<PathBuf>, name: &str) -> std::result::Result<Vec<u8>, String> {
    let Some(dir) = dir else {
        return Err("local infile is disabled".into());
    };
    let dir = tokio::fs::canonicalize(dir).await.map_err(|e| e.to_string())?;
    let path = tokio::fs::canonicalize(dir.join(name))
        .await
        .map_err(|e| e.to_string())?;
    if !path.starts_with(&dir) {
        return Err(format!("{} is outside {}", path.display(), dir.display()));
    }
    tokio::fs::read(&path).await.map_err(|e| e.to_string())
}

/// Writer flow: write buffers in order; shut the write side down when the sequencer lets go
async fn write_loop<T: AsyncWrite>(
    mut writer: WriteHalf<T>,
    mut outbound: mpsc::Receiver<Bytes>,
    failed: oneshot::Sender<Error>,
) {
    let result: Result<()> = async {
        while let Some(buf) = outbound.recv().await {
            writer.write_all(&buf).await?;
            writer.flush().await?;
        }
        writer.shutdown().await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::debug!(error = %e, "writer failed");
        let _ = failed.send(e);
    }
}
