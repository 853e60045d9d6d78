use thiserror::Error;

use pagelens_core_types::CoreError;

#[derive(Clone, Debug, Error)]
pub enum SnapErrKind {
    #[error("io failure: {0}")]
    IoFailed(String),
    #[error("snapshot entry corrupt: {0}")]
    Corrupt(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug, Error)]
#[error(transparent)]
pub struct SnapError(pub SnapErrKind);

impl SnapError {
    pub fn new(kind: SnapErrKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &SnapErrKind {
        &self.0
    }
}

impl From<SnapError> for CoreError {
    fn from(value: SnapError) -> Self {
        CoreError::new(value.to_string())
    }
}

impl From<SnapErrKind> for SnapError {
    fn from(kind: SnapErrKind) -> Self {
        SnapError(kind)
    }
}

impl From<std::io::Error> for SnapError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => SnapError(SnapErrKind::Corrupt(err.to_string())),
            _ => SnapError(SnapErrKind::IoFailed(err.to_string())),
        }
    }
}
