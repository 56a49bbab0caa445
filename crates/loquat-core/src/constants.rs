//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// User agent sent with every request
    pub const USER_AGENT: &str = "Loquat/0.1";

    /// Backend used when neither config nor environment name one
    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
}

/// Chat defaults
pub mod chat {
    /// Default maximum output tokens for a new message
    pub const MAX_OUTPUT_TOKENS: u32 = 4096;

    /// Page index of the most recent history page (carries chat metadata)
    pub const FIRST_PAGE: u32 = 0;
}

/// Environment variables
pub mod env {
    /// Overrides the configured backend URL
    pub const BASE_URL: &str = "LOQUAT_BASE_URL";

    /// Bearer token for the backend
    pub const TOKEN: &str = "LOQUAT_TOKEN";
}

/// Paths
pub mod paths {
    /// Config directory name, relative to the home directory
    pub const CONFIG_DIR_NAME: &str = ".loquat";

    /// Config file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Logs subdirectory name
    pub const LOGS_DIR_NAME: &str = "logs";
}
