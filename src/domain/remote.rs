//! 远程命令结果与状态探测
//!
//! 管道的分支判断（目录是否存在、进程是否在跑）全部走这里的类型化
//! 解析，不在调用点各自 grep 文本

use std::time::Duration;

/// 一次远程命令的结果
///
/// 退出码非 0 不在这里判定成败，由各步骤自行决定
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 远程目录探测结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirProbe {
    Exists,
    Absent,
}

impl DirProbe {
    /// 解析 `test -d <path> && echo exists` 的输出
    pub fn from_probe_output(stdout: &str) -> Self {
        if stdout.trim() == "exists" {
            DirProbe::Exists
        } else {
            DirProbe::Absent
        }
    }
}

/// 进程管理器中目标进程的状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessProbe {
    Running,
    NotRunning,
}

impl ProcessProbe {
    /// 在 `pm2 list` 输出里按进程名匹配
    pub fn from_list_output(stdout: &str, app_name: &str) -> Self {
        if stdout.contains(app_name) {
            ProcessProbe::Running
        } else {
            ProcessProbe::NotRunning
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_probe_parsing() {
        assert_eq!(DirProbe::from_probe_output("exists\n"), DirProbe::Exists);
        assert_eq!(DirProbe::from_probe_output("  exists  "), DirProbe::Exists);
        assert_eq!(DirProbe::from_probe_output(""), DirProbe::Absent);
        assert_eq!(DirProbe::from_probe_output("no such file"), DirProbe::Absent);
    }

    #[test]
    fn test_process_probe_matches_name() {
        let listing = "│ 0  │ my-app    │ fork │ online │";
        assert_eq!(
            ProcessProbe::from_list_output(listing, "my-app"),
            ProcessProbe::Running
        );
        assert_eq!(
            ProcessProbe::from_list_output(listing, "other-app"),
            ProcessProbe::NotRunning
        );
        assert_eq!(
            ProcessProbe::from_list_output("", "my-app"),
            ProcessProbe::NotRunning
        );
    }

    #[test]
    fn test_command_result_success() {
        let ok = CommandResult {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            duration: Duration::from_millis(10),
        };
        assert!(ok.success());

        let failed = CommandResult { exit_code: 127, ..ok };
        assert!(!failed.success());
    }
}
