//! Error taxonomy for the inventory engine
//!
//! Authentication, validation and lookup failures are typed so callers can
//! tell them apart. Region and collector failures never appear here: they
//! are recovered locally and reported as [`crate::provider::Warning`]s.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// Query issued before a successful authentication, or after a failed one
    #[error("provider '{provider}' is not authenticated")]
    Unauthenticated { provider: String },

    #[error("provider '{provider}' is already authenticating")]
    AuthenticationInProgress { provider: String },

    /// Credential resolution or identity check failed; the source is kept verbatim
    #[error("authentication failed for provider '{provider}': {source:#}")]
    Authentication {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed user input, raised before any fetch starts
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("provider '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl InventoryError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        InventoryError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InventoryError::ResourceNotFound(_)
                | InventoryError::ProviderNotFound(_)
                | InventoryError::UnsupportedKind(_)
        )
    }

    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            InventoryError::Authentication { .. }
                | InventoryError::Unauthenticated { .. }
                | InventoryError::AuthenticationInProgress { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            InventoryError::Validation { .. } | InventoryError::InvalidConfig(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, InventoryError::Cancelled)
    }
}
