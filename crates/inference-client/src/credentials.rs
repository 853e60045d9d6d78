use async_trait::async_trait;

use crate::errors::InferenceError;

pub const ACCESS_TOKEN_ENV: &str = "PAGELENS_ACCESS_TOKEN";
pub const PROJECT_ID_ENV: &str = "PAGELENS_PROJECT_ID";

#[derive(Clone)]
pub struct Credentials {
    pub access_token: String,
    pub project_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Source of a bearer token and project identity for each call. Acquisition
/// and refresh live with the implementor.
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    async fn credentials(&self) -> Result<Credentials, InferenceError>;
}

#[derive(Clone, Debug)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    pub fn new(access_token: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            credentials: Credentials {
                access_token: access_token.into(),
                project_id: project_id.into(),
            },
        }
    }

    /// Read `PAGELENS_ACCESS_TOKEN` and `PAGELENS_PROJECT_ID`, falling back to
    /// `project_fallback` when the project variable is unset.
    pub fn from_env(project_fallback: Option<&str>) -> Result<Self, InferenceError> {
        let token = std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| InferenceError::Credentials(format!("{ACCESS_TOKEN_ENV} is not set")))?;
        let project = std::env::var(PROJECT_ID_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| project_fallback.map(str::to_string))
            .unwrap_or_default();
        Ok(Self::new(token.trim(), project.trim()))
    }
}

#[async_trait]
impl CredentialSupplier for StaticCredentials {
    async fn credentials(&self) -> Result<Credentials, InferenceError> {
        if self.credentials.access_token.is_empty() {
            return Err(InferenceError::Credentials("empty access token".into()));
        }
        Ok(self.credentials.clone())
    }
}
