//! System provisioning steps
//!
//! Baseline packages plus the Node.js runtime and PM2. All commands are
//! reinstall-safe so a re-run deployment just walks through.

use crate::error::DeployError;
use crate::infra::shell::CommandLine;
use crate::infra::ssh::RemoteShell;

use super::context::DeployContext;

/// Step 1: 更新包索引并安装基础工具（curl / git / nginx）
pub async fn install_baseline(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    ctx.info("Updating system and installing dependencies...");

    session
        .execute(
            &CommandLine::new("sudo").arg("apt-get").arg("update"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    session
        .execute(
            &CommandLine::new("sudo")
                .arg("apt-get")
                .arg("install")
                .arg("-y")
                .arg("curl")
                .arg("git")
                .arg("nginx"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    Ok(())
}

/// Step 2: 安装请求的 Node.js 主版本和 PM2
pub async fn install_runtime(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    let node_version = &ctx.request.node_version;
    ctx.info(format!("Installing Node.js v{}...", node_version));

    let setup_url = format!("https://deb.nodesource.com/setup_{}.x", node_version);
    session
        .execute(
            &CommandLine::new("curl")
                .arg("-fsSL")
                .arg(&setup_url)
                .pipe(CommandLine::new("sudo").arg("-E").arg("bash").arg("-")),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    session
        .execute(
            &CommandLine::new("sudo")
                .arg("apt-get")
                .arg("install")
                .arg("-y")
                .arg("nodejs"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    ctx.info("Installing PM2...");
    session
        .execute(
            &CommandLine::new("sudo")
                .arg("npm")
                .arg("install")
                .arg("-g")
                .arg("pm2"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    Ok(())
}
