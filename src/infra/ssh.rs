//! SSH 会话管理
//!
//! 一次部署独占一条会话：connect → 若干 exec → close，不复用、不共享。
//! 执行层以 [`RemoteShell`] trait 作为接缝，管道按 trait 编程，
//! 测试用脚本化的假实现替换真实会话。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use tracing::debug;

use crate::domain::deploy::{LogKind, LogSink};
use crate::domain::remote::CommandResult;
use crate::error::DeployError;
use crate::infra::shell::{render_in_dir, CommandLine};

/// 远程命令执行接缝
///
/// `execute` / `execute_quiet` 是提供方法：日志事件的格式只存在这一份，
/// 实现方只需给出传输层的 [`RemoteShell::run`]
#[async_trait]
pub trait RemoteShell: Send {
    /// 传输层执行一条已渲染的命令行，不产生日志事件
    ///
    /// 只在传输失败时返回 Err；退出码非 0 属于正常结果
    async fn run(&mut self, line: &str) -> Result<CommandResult, DeployError>;

    /// 在指定工作目录执行命令并上报日志事件
    ///
    /// 依次产生：`command`（执行前，含时间戳、脱敏后的命令行）、
    /// `stdout`/`stderr`（输出非空时）、`info`（耗时与退出码）、
    /// 以及退出码非 0 时的一条 warning 级 `error` 事件
    async fn execute(
        &mut self,
        command: &CommandLine,
        cwd: &str,
        sink: &dyn LogSink,
    ) -> Result<CommandResult, DeployError> {
        sink.emit(
            &format!(
                "[{}] Executing: {} (CWD: {})",
                Utc::now().to_rfc3339(),
                command.display(),
                cwd
            ),
            LogKind::Command,
        );

        let result = self.run(&render_in_dir(command, cwd)).await?;

        if !result.stdout.is_empty() {
            sink.emit(&format!("STDOUT: {}", result.stdout), LogKind::Stdout);
        }
        if !result.stderr.is_empty() {
            sink.emit(&format!("STDERR: {}", result.stderr), LogKind::Stderr);
        }
        sink.emit(
            &format!(
                "Command finished in {}ms. Exit code: {}",
                result.duration.as_millis(),
                result.exit_code
            ),
            LogKind::Info,
        );
        if !result.success() {
            sink.emit(
                &format!("Warning: command exited with code {}", result.exit_code),
                LogKind::Error,
            );
        }

        Ok(result)
    }

    /// 静默执行：不产生任何日志事件
    ///
    /// 用于状态探测和内容不允许进日志的写入（env 块、nginx 配置）
    async fn execute_quiet(
        &mut self,
        command: &CommandLine,
        cwd: &str,
    ) -> Result<CommandResult, DeployError> {
        self.run(&render_in_dir(command, cwd)).await
    }
}

/// russh 客户端 Handler
///
/// 部署目标由用户显式提供，不做 known_hosts 校验
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// 一条已认证的 SSH 会话
///
/// `close(self)` 按值消费，类型层面保证恰好关闭一次
pub struct SshSession {
    handle: Handle<ClientHandler>,
}

impl SshSession {
    /// 建立会话
    ///
    /// 连接前产生一条 `info` 事件，成功后产生一条 `success` 事件；
    /// 失败只返回 [`DeployError::Connection`]，终态 error 事件由管道
    /// 边界统一产生（保证连接失败恰好一条致命事件）
    pub async fn connect(
        host: &str,
        username: &str,
        private_key: &str,
        timeout: Duration,
        sink: &dyn LogSink,
    ) -> Result<Self, DeployError> {
        sink.emit(
            &format!("Connecting to {} as {}...", host, username),
            LogKind::Info,
        );

        let handle = Self::try_connect(host, username, private_key, timeout).await?;
        sink.emit("Connected!", LogKind::Success);

        Ok(Self { handle })
    }

    async fn try_connect(
        host: &str,
        username: &str,
        private_key: &str,
        timeout: Duration,
    ) -> Result<Handle<ClientHandler>, DeployError> {
        let key = russh_keys::decode_secret_key(private_key, None)
            .map_err(|e| DeployError::Connection(format!("invalid private key: {}", e)))?;

        let config = Arc::new(client::Config::default());
        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(config, (host, 22), ClientHandler),
        )
        .await
        .map_err(|_| {
            DeployError::Connection(format!(
                "connection to {} timed out after {}s",
                host,
                timeout.as_secs()
            ))
        })?
        .map_err(|e| DeployError::Connection(e.to_string()))?;

        let authenticated = handle
            .authenticate_publickey(username, Arc::new(key))
            .await
            .map_err(|e| DeployError::Connection(e.to_string()))?;
        if !authenticated {
            return Err(DeployError::Connection(format!(
                "public key authentication as '{}' was rejected",
                username
            )));
        }

        debug!(host = %host, username = %username, "SSH session established");
        Ok(handle)
    }

    /// 关闭会话
    ///
    /// 每次部署无论成败都必须走到这里恰好一次
    pub async fn close(self) {
        let _ = self
            .handle
            .disconnect(Disconnect::ByApplication, "deployment finished", "en")
            .await;
        debug!("SSH session closed");
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn run(&mut self, line: &str) -> Result<CommandResult, DeployError> {
        let started = Instant::now();

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| DeployError::CommandExecution(e.to_string()))?;
        channel
            .exec(true, line)
            .await
            .map_err(|e| DeployError::CommandExecution(e.to_string()))?;

        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        let mut exit_code: Option<i32> = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // ext == 1 即 SSH_EXTENDED_DATA_STDERR
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status as i32),
                _ => {}
            }
        }

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim_end().to_string(),
            exit_code: exit_code.unwrap_or(-1),
            duration: started.elapsed(),
        })
    }
}
