//! Process manager steps
//!
//! PM2 start/restart plus the post-deploy status report.

use tracing::warn;

use crate::config::env::constants::PM2_LOG_LINES;
use crate::domain::remote::ProcessProbe;
use crate::error::DeployError;
use crate::infra::shell::CommandLine;
use crate::infra::ssh::RemoteShell;

use super::context::DeployContext;

/// Step 6: 启动或重启应用进程
///
/// `pm2 list` 里已有同名进程就 restart，否则以
/// `pm2 start npm --name <app> -- start` 新建，最后 `pm2 save`
/// 固化进程表以便主机重启后恢复
pub async fn start_or_restart(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    ctx.info("Configuring PM2...");

    let app_name = &ctx.request.app_name;
    let listing = session
        .execute(&CommandLine::new("pm2").arg("list"), &ctx.home_dir, ctx.sink)
        .await?;

    match ProcessProbe::from_list_output(&listing.stdout, app_name) {
        ProcessProbe::Running => {
            session
                .execute(
                    &CommandLine::new("pm2").arg("restart").arg(app_name),
                    &ctx.app_dir,
                    ctx.sink,
                )
                .await?;
        }
        ProcessProbe::NotRunning => {
            session
                .execute(
                    &CommandLine::new("pm2")
                        .arg("start")
                        .arg("npm")
                        .arg("--name")
                        .arg(app_name)
                        .arg("--")
                        .arg("start"),
                    &ctx.app_dir,
                    ctx.sink,
                )
                .await?;
        }
    }

    session
        .execute(&CommandLine::new("pm2").arg("save"), &ctx.app_dir, ctx.sink)
        .await?;

    Ok(())
}

/// Step 9: 部署后验收
///
/// 打印进程状态和最近日志，纯粹给操作者看。这一步的传输错误
/// 只记录不上抛：走到这里部署已经成功了
pub async fn report_status(session: &mut dyn RemoteShell, ctx: &DeployContext<'_>) {
    let app_name = &ctx.request.app_name;

    ctx.info("Checking app status...");
    if let Err(e) = session
        .execute(
            &CommandLine::new("pm2").arg("show").arg(app_name),
            &ctx.home_dir,
            ctx.sink,
        )
        .await
    {
        warn!(error = %e, "post-deploy status check failed");
        ctx.info(format!("Status check skipped: {}", e));
        return;
    }

    ctx.info("Recent app logs:");
    if let Err(e) = session
        .execute(
            &CommandLine::new("pm2")
                .arg("logs")
                .arg(app_name)
                .arg("--lines")
                .arg(&PM2_LOG_LINES.to_string())
                .arg("--nostream"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await
    {
        warn!(error = %e, "post-deploy log fetch failed");
        ctx.info(format!("Log fetch skipped: {}", e));
    }
}
