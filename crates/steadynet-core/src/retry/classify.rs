//! Classify caller errors into retry classes.

/// Retry class of a failed attempt (before connectivity is considered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// HTTP-like status in 400..500 other than 429. Never retried.
    Client(u16),
    /// Token or session failure. Never retried.
    Auth,
    /// Anything else (5xx, 429, timeouts, resets). Retried.
    Transient,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureClass::Transient)
    }
}

/// Hooks a caller error type exposes so the executor can classify it.
pub trait Classify {
    /// HTTP-like status carried by the error, if any.
    fn status(&self) -> Option<u16> {
        None
    }

    /// Whether the error indicates an authentication or session failure.
    fn is_auth_failure(&self) -> bool;
}

/// Default auth detection on an error message.
pub fn message_indicates_auth(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["token", "jwt", "auth", "session"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Classify an error. Checked in order: client status, auth failure, transient.
pub fn classify<E: Classify + ?Sized>(e: &E) -> FailureClass {
    if let Some(status) = e.status() {
        if (400..500).contains(&status) && status != 429 {
            return FailureClass::Client(status);
        }
    }
    if e.is_auth_failure() {
        return FailureClass::Auth;
    }
    FailureClass::Transient
}

/// Ready-made caller error: optional HTTP-like status plus message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl Classify for ApiError {
    fn status(&self) -> Option<u16> {
        self.status
    }

    fn is_auth_failure(&self) -> bool {
        message_indicates_auth(&self.message)
    }
}

impl Classify for anyhow::Error {
    fn is_auth_failure(&self) -> bool {
        message_indicates_auth(&format!("{:#}", self))
    }
}

impl Classify for std::io::Error {
    fn is_auth_failure(&self) -> bool {
        self.kind() == std::io::ErrorKind::PermissionDenied
    }
}
