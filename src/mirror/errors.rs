//! Error types for the local identity mirror.

/// Errors raised by an [`IdentityMirror`](super::IdentityMirror) implementation.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// No identity with the given username exists.
    #[error("User '{username}' not found in local mirror")]
    UserNotFound { username: String },

    /// The backing store is temporarily unavailable.
    #[error("Local mirror unavailable: {message}")]
    Unavailable { message: String },

    /// Unexpected failure inside the store.
    #[error("Local mirror error: {message}")]
    Internal { message: String },
}

impl MirrorError {
    pub fn user_not_found(username: impl Into<String>) -> Self {
        Self::UserNotFound {
            username: username.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
