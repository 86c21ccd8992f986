//! Source acquisition steps
//!
//! Clone-or-pull, dependency install, and the optional .env write.

use crate::domain::remote::DirProbe;
use crate::error::DeployError;
use crate::infra::shell::CommandLine;
use crate::infra::ssh::RemoteShell;

use super::context::DeployContext;

/// Step 3: 仓库同步
///
/// 探测仓库目录：已存在就地 pull，否则在 home 目录 clone。
/// clone 地址仅在 https + 有令牌时携带令牌，且日志中只出现 *** 形式。
pub async fn sync_repository(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    ctx.info(format!("Calculated repository path: {}", ctx.repo_path));
    ctx.info(format!(
        "Calculated app directory (for install/build): {}",
        ctx.app_dir
    ));

    let probe = CommandLine::new("test")
        .arg("-d")
        .arg(&ctx.repo_path)
        .and_then(CommandLine::new("echo").arg("exists"));
    let probed = session.execute_quiet(&probe, &ctx.home_dir).await?;

    match DirProbe::from_probe_output(&probed.stdout) {
        DirProbe::Exists => {
            ctx.info("Repository exists. Pulling latest changes...");
            session
                .execute(
                    &CommandLine::new("git").arg("pull"),
                    &ctx.repo_path,
                    ctx.sink,
                )
                .await?;
        }
        DirProbe::Absent => {
            ctx.info("Cloning repository...");
            let clone = CommandLine::new("git")
                .arg("clone")
                .arg_secret(&ctx.auth_repo_url(), &ctx.masked_repo_url());
            session.execute(&clone, &ctx.home_dir, ctx.sink).await?;
        }
    }

    Ok(())
}

/// Step 4: 安装项目依赖
pub async fn install_dependencies(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    ctx.info("Installing project dependencies...");
    session
        .execute(&CommandLine::new("npm").arg("install"), &ctx.app_dir, ctx.sink)
        .await?;
    Ok(())
}

/// Step 5: 写入 .env 文件（仅配置了非空 env 块时）
///
/// 内容可能含密钥，走静默执行；单引号由统一转义处理成 '\''，
/// 远端还原后与配置逐字节一致
pub async fn write_env_file(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    let Some(env_vars) = ctx.request.env_vars.as_deref() else {
        return Ok(());
    };
    if env_vars.trim().is_empty() {
        return Ok(());
    }

    ctx.info("Creating .env file...");
    let write = CommandLine::new("echo").arg(env_vars).redirect_to(".env");
    session.execute_quiet(&write, &ctx.app_dir).await?;

    Ok(())
}
