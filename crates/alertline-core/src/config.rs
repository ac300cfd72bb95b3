//! Shared constants and defaults.

/// Warnings an open group may collect before it escalates.
/// The report that pushes the count past this value escalates the group.
pub const ESCALATION_WARNING_THRESHOLD: u64 = 10;

/// Wire value of `resolvedByUserId` for reports of open groups.
pub const UNRESOLVED_USER_ID: i64 = -1;

/// Subject of the synthetic report emitted when a group escalates.
pub const ESCALATED_SUBJECT: &str = "escalated";

/// Default values for the service configuration.
pub mod defaults {
    pub const LISTEN_ADDRESS: &str = "127.0.0.1";
    pub const LISTEN_PORT: u16 = 8090;
    pub const SERVER_WRITE_TIMEOUT_SECS: u64 = 30;
    pub const TIME_ZONE: &str = "Europe/Prague";
    pub const DATA_DIR: &str = "data";
    pub const LOG_LEVEL: &str = "info";
    pub const SELF_REPORT_APP: &str = "alertline";
}

/// Environment variable names.
pub mod env_vars {
    /// Path of the config file when `--config` is not given.
    pub const CONFIG: &str = "ALERTLINE_CONFIG";
    /// Force JSON log output.
    pub const LOG_JSON: &str = "ALERTLINE_LOG_JSON";
}

/// HTTP header names.
pub mod headers {
    /// Carries the sha256 hex digest of a client's API token.
    pub const API_TOKEN: &str = "x-alertline-token";
}
