//! Label keys and values

pub const PLUGIN: &str = "plugin";
pub const COMMAND: &str = "command";
pub const OUTCOME: &str = "outcome";
pub const REASON: &str = "reason";
pub const ALGORITHM: &str = "algorithm";

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_SERVER_ERROR: &str = "server_error";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_CLOSED: &str = "closed";
pub const OUTCOME_ABANDONED: &str = "abandoned";
