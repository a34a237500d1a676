//! Error types for RBAC operations

use thiserror::Error;

use crate::models::UserId;

/// Result type for RBAC operations
pub type RbacResult<T> = Result<T, RbacError>;

/// RBAC-specific errors
#[derive(Error, Debug)]
pub enum RbacError {
    /// Policy store read or write failed
    #[error("Policy store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// User not found in the record store
    #[error("User not found: {user_id}")]
    UserNotFound { user_id: UserId },

    /// Role not found in the record store
    #[error("Role not found: {role}")]
    RoleNotFound { role: String },

    /// Reconciliation aborted after some operations were applied
    #[error("Partial sync for {subject}: failed at {failed} after {applied} writes, {} operations pending", .pending.len())]
    PartialSync {
        subject: String,
        failed: String,
        applied: usize,
        pending: Vec<String>,
        #[source]
        source: Box<RbacError>,
    },

    /// Role slug failed validation
    #[error("Invalid role: {message}")]
    InvalidRole { message: String },

    /// Permission string could not be decoded
    #[error("Invalid permission: {value}")]
    InvalidPermission { value: String },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Request carried no verifiable credential
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// YAML parsing error
    #[error("Failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error reading configuration
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<sea_orm::DbErr> for RbacError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::StoreUnavailable {
            message: err.to_string(),
        }
    }
}

impl RbacError {
    /// Create a new store unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a new invalid role error
    pub fn invalid_role(message: impl Into<String>) -> Self {
        Self::InvalidRole {
            message: message.into(),
        }
    }

    /// Create a new invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new unauthenticated error
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound { .. } | Self::RoleNotFound { .. })
    }

    /// Check if the policy store could not be reached, directly or mid-sync
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::StoreUnavailable { .. } => true,
            Self::PartialSync { source, .. } => source.is_store_unavailable(),
            _ => false,
        }
    }

    /// Check if the caller supplied bad input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidRole { .. } | Self::InvalidPermission { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_sync_message() {
        let err = RbacError::PartialSync {
            subject: "role:editor".to_string(),
            failed: "api:/docs,GET".to_string(),
            applied: 1,
            pending: vec!["-api:/docs,GET".to_string(), "+api:/docs,PUT".to_string()],
            source: Box::new(RbacError::store_unavailable("connection reset")),
        };

        let message = err.to_string();
        assert!(message.contains("role:editor"));
        assert!(message.contains("2 operations pending"));
        assert!(err.is_store_unavailable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_classification() {
        assert!(RbacError::UserNotFound { user_id: 7 }.is_not_found());
        assert!(RbacError::RoleNotFound { role: "x".into() }.is_not_found());
        assert!(RbacError::invalid_role("bad").is_invalid_input());
        assert!(!RbacError::internal("boom").is_store_unavailable());
    }
}
