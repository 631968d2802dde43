use crate::id::Id;
use crate::kv::StoreError;
use crate::labels::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),

    #[error("label with name `{name}` already exists in organization {org_id}")]
    LabelAlreadyExists { org_id: Id, name: String },

    #[error("label {label_id} already exists on resource {resource_id}")]
    LabelExistsOnResource { label_id: Id, resource_id: Id },

    #[error("label not found: {0}")]
    LabelNotFound(Id),

    #[error("unexpected error when assessing uniqueness in index `{index}`: {source}")]
    UnexpectedIndex {
        index: String,
        #[source]
        source: StoreError,
    },

    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("could not encode or decode {entity}: {source}")]
    Codec {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid identifier")]
    InvalidId,

    #[error("unable to generate a free identifier after {attempts} attempts")]
    IdGeneration { attempts: usize },
}

/// Coarse classification of a [`CoreError`] for callers that map errors
/// onto an outer protocol (status codes, retry decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Invalid,
    Conflict,
    NotFound,
    Canceled,
    Internal,
}

impl CoreError {
    pub(crate) fn store(op: &'static str) -> impl FnOnce(StoreError) -> CoreError {
        move |source| CoreError::Store { op, source }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Invalid(_) => ErrorCode::Invalid,
            Self::LabelAlreadyExists { .. } | Self::LabelExistsOnResource { .. } => {
                ErrorCode::Conflict
            }
            Self::LabelNotFound(_) => ErrorCode::NotFound,
            Self::Store {
                source: StoreError::Cancelled,
                ..
            }
            | Self::UnexpectedIndex {
                source: StoreError::Cancelled,
                ..
            } => ErrorCode::Canceled,
            Self::UnexpectedIndex { .. }
            | Self::Store { .. }
            | Self::Codec { .. }
            | Self::InvalidId
            | Self::IdGeneration { .. } => ErrorCode::Internal,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(source: StoreError) -> Self {
        CoreError::Store {
            op: "transaction",
            source,
        }
    }
}
