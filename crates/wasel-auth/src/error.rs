//! Authentication error types.

use thiserror::Error;

const GENERIC_MESSAGE: &str = "An unexpected error occurred. Please try again.";

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Input rejected before any request was made
    #[error("{0}")]
    Validation(String),

    /// Rejected by the auth service (bad credentials, unconfirmed email, duplicate account)
    #[error("{message}")]
    Auth {
        message: String,
        code: Option<String>,
    },

    /// No backend credentials configured
    #[error("Backend not configured. Please set up Supabase first.")]
    BackendUnavailable,

    /// Operation needs a signed-in user
    #[error("No user logged in")]
    NotAuthenticated,

    /// Network unavailable or the service answered with a 5xx
    #[error("Network unavailable: {0}")]
    Network(String),

    /// Rejected by the data API
    #[error("Data API error: {message}")]
    Backend {
        message: String,
        code: Option<String>,
    },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] wasel_storage::StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] wasel_core::CoreError),

    /// Invalid state transition in the session FSM
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),
}

impl AuthError {
    pub fn auth(message: impl Into<String>, code: Option<&str>) -> Self {
        AuthError::Auth {
            message: message.into(),
            code: code.map(str::to_string),
        }
    }

    /// Machine-readable code reported by the backend, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::Auth { code, .. } | AuthError::Backend { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Auth { message, .. }
            | AuthError::Backend { message, .. }
            | AuthError::Validation(message) => translate(message),
            AuthError::BackendUnavailable | AuthError::NotAuthenticated => self.to_string(),
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

fn translate(message: &str) -> String {
    if message.contains("Invalid login credentials") {
        return "Invalid email or password. Please try again.".to_string();
    }
    if message.contains("Email not confirmed") {
        return "Please verify your email address before logging in.".to_string();
    }
    if message.contains("User already registered") {
        return "An account with this email already exists.".to_string();
    }
    if message.trim().is_empty() {
        return GENERIC_MESSAGE.to_string();
    }
    message.to_string()
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_network() {
        assert!(AuthError::Network("HTTP 503".to_string()).is_transient());
    }

    #[test]
    fn test_is_not_transient_auth() {
        assert!(!AuthError::auth("Invalid login credentials", Some("invalid_credentials"))
            .is_transient());
        assert!(!AuthError::NotAuthenticated.is_transient());
        assert!(!AuthError::TokenRefresh("revoked".to_string()).is_transient());
    }

    #[test]
    fn test_user_message_translations() {
        let cases = [
            ("Invalid login credentials", "Invalid email or password. Please try again."),
            ("Email not confirmed", "Please verify your email address before logging in."),
            ("User already registered", "An account with this email already exists."),
            ("Password should be at least 6 characters", "Password should be at least 6 characters"),
        ];
        for (raw, expected) in cases {
            assert_eq!(AuthError::auth(raw, None).user_message(), expected);
        }
    }

    #[test]
    fn test_user_message_fallbacks() {
        assert_eq!(AuthError::auth("", None).user_message(), GENERIC_MESSAGE);
        assert_eq!(
            AuthError::TokenRefresh("x".to_string()).user_message(),
            GENERIC_MESSAGE
        );
        assert_eq!(
            AuthError::BackendUnavailable.user_message(),
            "Backend not configured. Please set up Supabase first."
        );
    }

    #[test]
    fn test_code() {
        let err = AuthError::auth("User already registered", Some("user_already_exists"));
        assert_eq!(err.code(), Some("user_already_exists"));
        assert_eq!(AuthError::NotAuthenticated.code(), None);
    }
}
