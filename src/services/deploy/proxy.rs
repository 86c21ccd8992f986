//! Reverse proxy and certificate steps
//!
//! Only run when a public domain is configured. The rendered vhost is
//! validated with `nginx -t` before any reload touches the live server.

use crate::error::DeployError;
use crate::infra::shell::CommandLine;
use crate::infra::ssh::RemoteShell;

use super::context::DeployContext;

/// nginx 虚拟主机模板
///
/// proxy_pass 指向本机应用端口，携带标准转发头并放行 WebSocket 升级
pub fn render_vhost(domain: &str, port: u16) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name {domain};

    location / {{
        proxy_pass http://localhost:{port};
        proxy_http_version 1.1;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection 'upgrade';
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_cache_bypass $http_upgrade;
    }}
}}
"#
    )
}

/// Step 7: 配置 nginx 反向代理（仅配置了域名时）
///
/// 先写临时文件再 mv 进 sites-available，软链到 sites-enabled，
/// `nginx -t` 校验失败立即中止，绝不 reload 一份坏配置
pub async fn configure_nginx(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    let Some(domain) = ctx.request.domain.as_deref() else {
        return Ok(());
    };

    ctx.info(format!("Configuring Nginx for {}...", domain));

    let vhost = render_vhost(domain, ctx.request.port);
    let tmp_path = format!("{}/{}.nginx.conf", ctx.home_dir, ctx.request.app_name);

    // 配置内容不值得刷进日志流，静默写入
    let write = CommandLine::new("echo").arg(&vhost).redirect_to(&tmp_path);
    session.execute_quiet(&write, &ctx.home_dir).await?;

    let available = format!("/etc/nginx/sites-available/{}", domain);
    session
        .execute(
            &CommandLine::new("sudo").arg("mv").arg(&tmp_path).arg(&available),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;
    session
        .execute(
            &CommandLine::new("sudo")
                .arg("ln")
                .arg("-sf")
                .arg(&available)
                .arg("/etc/nginx/sites-enabled/"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    let check = session
        .execute(
            &CommandLine::new("sudo").arg("nginx").arg("-t"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;
    if !check.success() {
        return Err(DeployError::ProxyConfigRejected(check.exit_code));
    }

    session
        .execute(
            &CommandLine::new("sudo")
                .arg("systemctl")
                .arg("reload")
                .arg("nginx"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    Ok(())
}

/// Step 8: 签发 TLS 证书（仅配置了域名时）
pub async fn issue_certificate(
    session: &mut dyn RemoteShell,
    ctx: &DeployContext<'_>,
) -> Result<(), DeployError> {
    let Some(domain) = ctx.request.domain.as_deref() else {
        return Ok(());
    };

    ctx.info("Setting up SSL with Certbot...");
    session
        .execute(
            &CommandLine::new("sudo")
                .arg("apt-get")
                .arg("install")
                .arg("-y")
                .arg("python3-certbot-nginx"),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    session
        .execute(
            &CommandLine::new("sudo")
                .arg("certbot")
                .arg("--nginx")
                .arg("-d")
                .arg(domain)
                .arg("--non-interactive")
                .arg("--agree-tos")
                .arg("-m")
                .arg(&format!("admin@{}", domain)),
            &ctx.home_dir,
            ctx.sink,
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_vhost() {
        let conf = render_vhost("example.com", 3000);
        assert!(conf.contains("server_name example.com;"));
        assert!(conf.contains("proxy_pass http://localhost:3000;"));
        assert!(conf.contains("proxy_set_header Upgrade $http_upgrade;"));
        assert!(conf.contains("proxy_set_header Connection 'upgrade';"));
        assert!(conf.contains("proxy_set_header X-Forwarded-Proto $scheme;"));
    }
}
