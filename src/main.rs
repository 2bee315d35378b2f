//! Docker Host Bootstrap - Docker 主机一键引导
//!
//! 在全新的 Ubuntu/Debian 主机上完成 Docker 工作负载初始化：
//! 基础软件包、引擎与 Compose 校验、服务账户、冒烟测试、
//! 栈定义仓库同步与部署。
//!
//! Usage:
//! - Normal mode: `docker-host-bootstrap`
//! - With env file: `docker-host-bootstrap --env-file /etc/bootstrap.env`
//! - Force deploy mode: `docker-host-bootstrap --mode compose`

use std::path::PathBuf;

use docker_host_bootstrap::domain::DeployMode;
use docker_host_bootstrap::RuntimeOptions;

/// 解析命令行参数
fn parse_args() -> RuntimeOptions {
    let args: Vec<String> = std::env::args().collect();
    let mut options = RuntimeOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--env-file" if i + 1 < args.len() => {
                options.env_file = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--mode" if i + 1 < args.len() => {
                match DeployMode::from_flag(&args[i + 1]) {
                    Some(mode) => options.mode_override = Some(mode),
                    None => {
                        eprintln!(
                            "Unknown mode: {} (expected compose or portainer)",
                            args[i + 1]
                        );
                        std::process::exit(1);
                    }
                }
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

    options
}

fn print_help() {
    println!("Docker Host Bootstrap - Docker 主机一键引导");
    println!();
    println!("USAGE:");
    println!("    docker-host-bootstrap [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --env-file <PATH>    Load configuration overrides from a .env style file");
    println!("    --mode <MODE>        Force deploy mode: compose or portainer");
    println!("    -h, --help           Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    COMPOSE_REPO_URL           Git repository with compose stack definitions (required)");
    println!("    COMPOSE_CLONE_DIR          Clone directory (default /opt/compose-stacks)");
    println!("    STACKS_SUBDIR              Subdirectory searched for compose files (default docker)");
    println!("    PORTAINER_VERSION          Portainer CE tag; none/1.x selects direct compose");
    println!("    PORTAINER_ADMIN_PASSWORD   Portainer admin password");
    println!("    SERVICE_USER               Dedicated service account (default deploy)");
    println!();
    println!("EXAMPLES:");
    println!("    docker-host-bootstrap                                  # Use process environment");
    println!("    docker-host-bootstrap --env-file /etc/bootstrap.env    # Load overrides from file");
    println!("    docker-host-bootstrap --mode portainer                 # Force Portainer deployment");
}

fn main() {
    let options = parse_args();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let code = rt.block_on(async { docker_host_bootstrap::init_and_run_bootstrap(options).await });

    std::process::exit(code);
}
