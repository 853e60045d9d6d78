//! Provider profiles: which endpoints to try, in order, and which static
//! headers to send with every attempt.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::InferenceError;

/// Path of the streaming generate call, appended to each endpoint base URL.
pub const STREAM_PATH: &str = "/v1internal:streamGenerateContent?alt=sse";

pub const THINKING_BETA_HEADER: (&str, &str) = ("anthropic-beta", "interleaved-thinking-2025-05-14");

const DAILY_SANDBOX: &str = "https://daily-cloudcode-pa.sandbox.googleapis.com";
const AUTOPUSH_SANDBOX: &str = "https://autopush-cloudcode-pa.sandbox.googleapis.com";
const PRODUCTION: &str = "https://cloudcode-pa.googleapis.com";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub endpoints: Vec<String>,
    pub user_agent: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ProviderProfile {
    pub fn antigravity() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "X-Goog-Api-Client".into(),
            "google-cloud-sdk vscode_cloudshelleditor/0.1".into(),
        );
        headers.insert(
            "Client-Metadata".into(),
            r#"{"ideType":"IDE_UNSPECIFIED","platform":"PLATFORM_UNSPECIFIED","pluginType":"GEMINI"}"#
                .into(),
        );
        Self {
            name: "antigravity".into(),
            endpoints: vec![
                DAILY_SANDBOX.into(),
                AUTOPUSH_SANDBOX.into(),
                PRODUCTION.into(),
            ],
            user_agent: "antigravity/1.11.5 linux/amd64".into(),
            headers,
        }
    }

    pub fn gemini_cli() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("X-Goog-Api-Client".into(), "gl-node/22.17.0".into());
        headers.insert(
            "Client-Metadata".into(),
            "ideType=IDE_UNSPECIFIED,platform=PLATFORM_UNSPECIFIED,pluginType=GEMINI".into(),
        );
        Self {
            name: "gemini-cli".into(),
            endpoints: vec![PRODUCTION.into()],
            user_agent: "google-api-nodejs-client/9.15.1".into(),
            headers,
        }
    }

    /// Built-in profile by name.
    pub fn builtin(name: &str) -> Result<Self, InferenceError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "antigravity" => Ok(Self::antigravity()),
            "gemini-cli" | "gemini" => Ok(Self::gemini_cli()),
            other => Err(InferenceError::invalid_request(format!(
                "unknown provider profile '{other}'"
            ))),
        }
    }

    /// Profile named `name` with its endpoint list replaced.
    pub fn custom(name: impl Into<String>, endpoints: Vec<String>) -> Self {
        Self {
            name: name.into(),
            endpoints,
            user_agent: format!("pagelens/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
        }
    }

    pub fn stream_url(endpoint: &str) -> String {
        format!("{}{}", endpoint.trim_end_matches('/'), STREAM_PATH)
    }
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self::antigravity()
    }
}

/// Models following the `*-thinking*` naming convention.
pub fn is_thinking_model(model: &str) -> bool {
    model.to_ascii_lowercase().contains("-thinking")
}
