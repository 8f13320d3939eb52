//! Editor error taxonomy

use serde::Serialize;
use serde_json::{json, Value};

/// A problem with one field of a component payload
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A problem with one block of a submitted content tree
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockError {
    pub block_index: usize,
    pub block_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Errors raised by the editor pipeline and the services built on it
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Malformed submission, reported before anything else is looked at
    #[error("{0}")]
    Structural(String),

    /// One or more blocks failed validation
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<BlockError>,
    },

    #[error("Unknown component type: {0}")]
    UnknownComponentType(String),

    /// A referenced row or tag does not exist
    #[error("{message}")]
    Reference {
        message: String,
        references: Vec<String>,
    },

    /// A component payload breaks one of its structural rules
    #[error("{message}")]
    Constraint {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EditorError {
    pub fn validation(errors: Vec<BlockError>) -> Self {
        Self::Validation {
            message: "Content validation failed".to_string(),
            errors,
        }
    }

    pub fn constraint(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Constraint {
            message: message.into(),
            errors,
        }
    }

    pub fn reference(message: impl Into<String>, references: Vec<String>) -> Self {
        Self::Reference {
            message: message.into(),
            references,
        }
    }

    /// Structured sub-errors for the `{success: 0, errors: {...}}` body
    pub fn details(&self) -> Value {
        match self {
            Self::Validation { errors, .. } => json!(errors),
            Self::Constraint { errors, .. } => json!(errors),
            Self::Reference { references, .. } => json!(references),
            Self::UnknownComponentType(tag) => json!([tag]),
            _ => json!([]),
        }
    }

    /// Field errors carried by this error, used when it is folded into a block error
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            Self::Constraint { errors, .. } => errors.clone(),
            Self::Reference { references, .. } => references
                .iter()
                .map(|r| FieldError::new("reference", format!("Unknown reference: {}", r)))
                .collect(),
            Self::Validation { errors, .. } => errors
                .iter()
                .flat_map(|e| e.errors.iter().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the caller can fix this error by changing the submitted payload
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
