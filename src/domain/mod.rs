//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/russh

pub mod deploy;
pub mod remote;

// Re-exports for convenience
pub use deploy::{DeployRequest, DeployStatus, DeployTask, LogEvent, LogKind, LogSink};
pub use remote::{CommandResult, DirProbe, ProcessProbe};
