/// Identity of the caller, passed with every API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub app_id: String,
    pub version_id: String,
    pub email: String,
    pub is_admin: bool,
    pub auth_domain: String,
    pub request_namespace: String,
}

impl Environment {
    /// Environment of a standalone tool acting as an administrator of
    /// `app_id`.
    pub fn for_tool(app_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            version_id: "1.0".to_string(),
            email: email.into(),
            is_admin: true,
            auth_domain: "gmail.com".to_string(),
            request_namespace: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Application log line handed to [`crate::Delegate::log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp_usec: i64,
    pub message: String,
}

impl LogRecord {
    pub fn new(level: LogLevel, timestamp_usec: i64, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp_usec,
            message: message.into(),
        }
    }
}
