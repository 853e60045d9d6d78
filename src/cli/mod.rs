pub mod app;
pub mod ask;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod env;
pub mod runtime;

pub use app::run;
pub use ask::{cmd_ask, AskArgs};
pub use chunk::{cmd_chunk, ChunkArgs};
pub use config::{cmd_config, ConfigArgs};
pub use diff::{cmd_diff, DiffArgs};
