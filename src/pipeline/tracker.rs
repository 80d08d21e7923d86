//! Response shape tracking
//!
//! Each command answers with a fixed shape of messages. The tracker knows which phase the
//! next payload must be decoded in and recognizes the terminal message of the exchange.

use crate::protocol::constants::{capabilities, server_status};
use crate::protocol::{BackendMessage, ColumnType, Format, FrontendMessage, Phase};
use crate::{Error, Result};
use std::sync::Arc;

/// What the server answers a command with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// OK | ERR | result set(s) | local infile (`Query`, `StmtExecute`)
    ResultSet(Format),
    /// PrepareOk, parameter and column definitions (`StmtPrepare`)
    Prepare,
    /// OK | ERR (`Ping`, `InitDb`, `ResetConnection`, `StmtReset`)
    Simple,
    /// Nothing (`StmtClose`, `Quit`)
    NoResponse,
}

impl Shape {
    /// Shape of the response to `msg`
    pub fn of(msg: &FrontendMessage) -> Self {
        match msg {
            FrontendMessage::Query(_) => Shape::ResultSet(Format::Text),
            FrontendMessage::StmtExecute { .. } => Shape::ResultSet(Format::Binary),
            FrontendMessage::StmtPrepare(_) => Shape::Prepare,
            FrontendMessage::StmtClose(_) | FrontendMessage::Quit => Shape::NoResponse,
            FrontendMessage::InitDb(_)
            | FrontendMessage::Ping
            | FrontendMessage::ResetConnection
            | FrontendMessage::StmtReset(_)
            | FrontendMessage::SslRequest(_)
            | FrontendMessage::HandshakeResponse(_)
            | FrontendMessage::AuthResponse(_) => Shape::Simple,
        }
    }
}

/// Whether the exchange continues after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More messages belong to this exchange
    Continue,
    /// The message was the last one
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// First packet of a (next) result or of a simple response
    Start,
    /// Column definitions of a result set
    Columns { remaining: u64 },
    /// EOF closing the column definitions
    ColumnsEof,
    /// Rows until the terminator
    Rows,
    /// PrepareOk received; `remaining` definitions left in the current group
    PrepareDefinitions { remaining: u16, columns_next: u16 },
    /// EOF closing a prepare definition group
    PrepareEof { columns_next: u16 },
    Done,
}

/// Per-exchange phase state machine
#[derive(Debug, Clone)]
pub struct ResponseTracker {
    shape: Shape,
    step: Step,
    deprecate_eof: bool,
    column_types: Vec<ColumnType>,
    /// Built when rows start
    binary_columns: Option<Arc<[ColumnType]>>,
}

impl ResponseTracker {
    /// Tracker for a freshly sent command
    pub fn new(shape: Shape, capabilities: u32) -> Self {
        Self {
            shape,
            step: Step::Start,
            deprecate_eof: capabilities & capabilities::CLIENT_DEPRECATE_EOF != 0,
            column_types: Vec::new(),
            binary_columns: None,
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Whether the terminal message has been seen
    pub fn is_done(&self) -> bool {
        self.step == Step::Done
    }

    /// Phase to decode the next payload in
    pub fn phase(&self) -> Phase {
        match (&self.step, self.shape) {
            (Step::Start, Shape::Prepare) => Phase::PrepareResponse,
            (Step::Start, _) | (Step::Done, _) => Phase::CommandResponse,
            (Step::Columns { .. } | Step::ColumnsEof, _) => Phase::ColumnDefinition,
            (Step::PrepareDefinitions { .. } | Step::PrepareEof { .. }, _) => Phase::ColumnDefinition,
            (Step::Rows, Shape::ResultSet(Format::Binary)) => Phase::BinaryRows {
                columns: self
                    .binary_columns
                    .clone()
                    .unwrap_or_else(|| Arc::from(self.column_types.as_slice())),
            },
            (Step::Rows, _) => Phase::TextRows {
                columns: self.column_types.len(),
            },
        }
    }

    /// Account for a decoded message.
    ///
    /// # Errors
    ///
    /// `Error::Protocol` when the message does not fit the response shape.
    pub fn advance(&mut self, msg: &BackendMessage) -> Result<Progress> {
        let step = self.step.clone();
        let next = match (&step, msg) {
            (Step::Done, _) => return Err(self.unexpected(msg)),

            // ERR ends any exchange, including mid result set
            (_, BackendMessage::Error(_)) => Step::Done,

            (Step::Start, BackendMessage::Ok(ok)) => self.after_result(ok.status_flags),
            (Step::Start, BackendMessage::LocalInfileRequest(_)) if matches!(self.shape, Shape::ResultSet(_)) => {
                Step::Start
            }
            (Step::Start, BackendMessage::ColumnCount(count))
                if *count > 0 && matches!(self.shape, Shape::ResultSet(_)) =>
            {
                self.column_types.clear();
                self.binary_columns = None;
                Step::Columns { remaining: *count }
            }
            (Step::Start, BackendMessage::PrepareOk(prepare)) if self.shape == Shape::Prepare => {
                self.prepare_group(prepare.num_params, prepare.num_columns)
            }

            (Step::Columns { remaining }, BackendMessage::ColumnDefinition(def)) => {
                self.column_types.push(def.column_type);
                match remaining - 1 {
                    0 if self.deprecate_eof => self.start_rows(),
                    0 => Step::ColumnsEof,
                    left => Step::Columns { remaining: left },
                }
            }
            (Step::ColumnsEof, BackendMessage::Eof(_)) => self.start_rows(),

            (Step::Rows, BackendMessage::Row(_)) => Step::Rows,
            (Step::Rows, BackendMessage::Ok(ok)) => self.after_result(ok.status_flags),
            (Step::Rows, BackendMessage::Eof(eof)) => self.after_result(eof.status_flags),

            (Step::PrepareDefinitions { remaining, columns_next }, BackendMessage::ColumnDefinition(_)) => {
                match (remaining - 1, *columns_next) {
                    (0, columns) if !self.deprecate_eof => Step::PrepareEof { columns_next: columns },
                    (0, columns) => self.prepare_group(0, columns),
                    (left, columns) => Step::PrepareDefinitions {
                        remaining: left,
                        columns_next: columns,
                    },
                }
            }
            (Step::PrepareEof { columns_next }, BackendMessage::Eof(_)) => self.prepare_group(0, *columns_next),

            _ => return Err(self.unexpected(msg)),
        };

        self.step = next;
        Ok(if self.step == Step::Done {
            Progress::Terminal
        } else {
            Progress::Continue
        })
    }

    fn after_result(&self, status_flags: u16) -> Step {
        if matches!(self.shape, Shape::ResultSet(_))
            && status_flags & server_status::SERVER_MORE_RESULTS_EXISTS != 0
        {
            Step::Start
        } else {
            Step::Done
        }
    }

    fn start_rows(&mut self) -> Step {
        if self.shape == Shape::ResultSet(Format::Binary) {
            self.binary_columns = Some(Arc::from(self.column_types.as_slice()));
        }
        Step::Rows
    }

    /// Next non-empty definition group, parameters first
    fn prepare_group(&self, params: u16, columns: u16) -> Step {
        match (params, columns) {
            (0, 0) => Step::Done,
            (0, columns) => Step::PrepareDefinitions {
                remaining: columns,
                columns_next: 0,
            },
            (params, columns) => Step::PrepareDefinitions {
                remaining: params,
                columns_next: columns,
            },
        }
    }

    fn unexpected(&self, msg: &BackendMessage) -> Error {
        Error::Protocol(format!(
            "unexpected {} in {:?} response at {:?}",
            msg.kind(),
            self.shape,
            self.step
        ))
    }
}
