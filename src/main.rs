//! XJP SSH Deploy - 远程 SSH 部署服务
//!
//! Usage:
//! - Normal mode: `xjp-ssh-deploy`
//! - With custom port: `xjp-ssh-deploy --port 3001`

use xjp_ssh_deploy::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("XJP SSH Deploy - 远程 SSH 部署服务");
    println!();
    println!("USAGE:");
    println!("    xjp-ssh-deploy [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    DEPLOY_AGENT_API_KEY    API key required by POST /deploy");
    println!("    PORT                    Listening port (default 3001)");
    println!("    RUST_LOG                tracing filter (default info)");
}

fn main() {
    let config = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    rt.block_on(async {
        xjp_ssh_deploy::init_and_run(config).await;
    });
}
