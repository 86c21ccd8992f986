//! 基础设施模块
//!
//! 封装外部依赖（SSH 传输、shell 命令构造）

pub mod shell;
pub mod ssh;

pub use shell::CommandLine;
pub use ssh::{RemoteShell, SshSession};
