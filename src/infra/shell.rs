//! Shell 命令构造
//!
//! 远程操作一律用 [`CommandLine`] 描述（程序 + 参数 + 管道/重定向），
//! 所有插值参数经过唯一的 [`quote`] 转义后才进入命令行。任何步骤都
//! 不允许自己拼命令字符串，仓库地址、域名、进程名、env 块这些
//! 用户可控字段只能从这里过。

use std::fmt;

/// POSIX 单引号转义
///
/// 安全字符集内的值原样返回（保持日志里的命令可读），其余整体包进
/// 单引号，内部的 `'` 逐个替换为 `'\''`
pub fn quote(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_safe_char) {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

/// 无须引号的字符集（对齐 shlex.quote 的白名单）
fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '%' | '+' | '=' | ':' | ',' | '.' | '/' | '-' | '_')
}

/// 命令行中的一个记号
///
/// `wire` 是实际发往远端的形式，`display` 是写进日志事件的形式。
/// 两者只在脱敏参数上不同。
#[derive(Clone, Debug)]
struct Token {
    wire: String,
    display: String,
}

/// 结构化命令描述
///
/// ```
/// use xjp_ssh_deploy::infra::shell::CommandLine;
///
/// let cmd = CommandLine::new("sudo").arg("apt-get").arg("install").arg("-y").arg("nginx");
/// assert_eq!(cmd.render(), "sudo apt-get install -y nginx");
/// ```
#[derive(Clone, Debug)]
pub struct CommandLine {
    tokens: Vec<Token>,
}

impl CommandLine {
    pub fn new(program: &str) -> Self {
        Self {
            tokens: vec![Token {
                wire: program.to_string(),
                display: program.to_string(),
            }],
        }
    }

    /// 追加一个参数，经过统一转义
    pub fn arg(mut self, value: &str) -> Self {
        let quoted = quote(value);
        self.tokens.push(Token {
            wire: quoted.clone(),
            display: quoted,
        });
        self
    }

    /// 追加一个含敏感内容的参数
    ///
    /// 远端收到真实值，日志里只出现 `masked` 形式
    pub fn arg_secret(mut self, value: &str, masked: &str) -> Self {
        self.tokens.push(Token {
            wire: quote(value),
            display: quote(masked),
        });
        self
    }

    /// `|` 接下一段命令
    pub fn pipe(mut self, next: CommandLine) -> Self {
        self.tokens.push(Token::operator("|"));
        self.tokens.extend(next.tokens);
        self
    }

    /// `&&` 接下一段命令
    pub fn and_then(mut self, next: CommandLine) -> Self {
        self.tokens.push(Token::operator("&&"));
        self.tokens.extend(next.tokens);
        self
    }

    /// `> <path>` 重定向输出
    pub fn redirect_to(mut self, path: &str) -> Self {
        self.tokens.push(Token::operator(">"));
        let quoted = quote(path);
        self.tokens.push(Token {
            wire: quoted.clone(),
            display: quoted,
        });
        self
    }

    /// 实际发往远端的命令行
    pub fn render(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.wire.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 日志展示用的命令行（敏感参数已脱敏）
    pub fn display(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.display.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 是否携带脱敏参数
    pub fn has_secrets(&self) -> bool {
        self.tokens.iter().any(|t| t.wire != t.display)
    }
}

impl Token {
    fn operator(op: &str) -> Self {
        Self {
            wire: op.to_string(),
            display: op.to_string(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// 渲染带工作目录的完整命令行：`cd <cwd> && <command>`
pub fn render_in_dir(command: &CommandLine, cwd: &str) -> String {
    format!("cd {} && {}", quote(cwd), command.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_passes_safe_values() {
        assert_eq!(quote("apt-get"), "apt-get");
        assert_eq!(quote("/root/my-app"), "/root/my-app");
        assert_eq!(quote("https://github.com/org/repo.git"), "https://github.com/org/repo.git");
    }

    #[test]
    fn test_quote_wraps_unsafe_values() {
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("$(reboot)"), "'$(reboot)'");
    }

    #[test]
    fn test_quote_escapes_single_quotes() {
        // 每个 ' 变成 '\''，shell 还原后内容逐字节一致
        assert_eq!(quote("A='x' B=y"), r#"'A='\''x'\'' B=y'"#);
    }

    #[test]
    fn test_pipe_and_chain_render() {
        let cmd = CommandLine::new("curl")
            .arg("-fsSL")
            .arg("https://deb.nodesource.com/setup_20.x")
            .pipe(CommandLine::new("sudo").arg("-E").arg("bash").arg("-"));
        assert_eq!(
            cmd.render(),
            "curl -fsSL https://deb.nodesource.com/setup_20.x | sudo -E bash -"
        );

        let probe = CommandLine::new("test")
            .arg("-d")
            .arg("/root/repo")
            .and_then(CommandLine::new("echo").arg("exists"));
        assert_eq!(probe.render(), "test -d /root/repo && echo exists");
    }

    #[test]
    fn test_redirect_quotes_payload() {
        let cmd = CommandLine::new("echo").arg("A='x' B=y").redirect_to(".env");
        assert_eq!(cmd.render(), r#"echo 'A='\''x'\'' B=y' > .env"#);
    }

    #[test]
    fn test_secret_arg_masked_in_display() {
        let cmd = CommandLine::new("git")
            .arg("clone")
            .arg_secret("https://token123@github.com/org/repo.git", "https://***@github.com/org/repo.git");
        assert!(cmd.render().contains("token123"));
        assert!(!cmd.display().contains("token123"));
        assert!(cmd.display().contains("***"));
        assert!(cmd.has_secrets());
    }

    #[test]
    fn test_render_in_dir() {
        let cmd = CommandLine::new("git").arg("pull");
        assert_eq!(render_in_dir(&cmd, "/root/my repo"), "cd '/root/my repo' && git pull");
        assert_eq!(render_in_dir(&cmd, "/root/repo"), "cd /root/repo && git pull");
    }
}
