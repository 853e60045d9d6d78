//! Streaming inference client for the pagelens chat core.
//!
//! A call posts one request to the first healthy endpoint of a provider
//! profile, retrying per status code, and exposes the server-sent-event
//! response as a lazy stream of [`StreamChunk`]s.

pub mod client;
pub mod codec;
pub mod credentials;
pub mod errors;
pub mod model;
pub mod policy;
pub mod provider;
pub mod retry;
pub mod sse;

pub use client::{InferenceBackend, InferenceClient};
pub use credentials::{CredentialSupplier, Credentials, StaticCredentials};
pub use errors::InferenceError;
pub use model::{
    part, Content, GenerationParams, InferenceRequest, Role, StreamChunk, ToolDeclaration, Usage,
};
pub use policy::RetryPolicy;
pub use provider::{is_thinking_model, ProviderProfile};
pub use tokio_util::sync::CancellationToken;
