use thiserror::Error;

/// Reasons a navigation did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// Another navigation holds the in-flight flag
    #[error("Navigation already in progress")]
    InProgress,

    #[error("Route '{0}' not found")]
    RouteNotFound(String),

    /// A before hook returned false
    #[error("Navigation to '{0}' cancelled by a before hook")]
    Cancelled(String),

    /// A hook failed outright
    #[error("Navigation hook failed: {0}")]
    HookFailed(String),

    #[error("Route handler failed: {0}")]
    HandlerFailed(String),
}

impl NavigationError {
    /// Whether the failure came from caller state rather than a hook or handler
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            NavigationError::InProgress | NavigationError::RouteNotFound(_)
        )
    }
}
