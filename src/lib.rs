//! Docker Host Bootstrap - Docker 主机一键引导
//!
//! 库入口：模块声明与顶层运行函数

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

pub use config::RuntimeOptions;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::EnvConfig;

/// 初始化日志并执行完整引导流程
///
/// # Returns
/// 进程退出码：全部阶段成功为 0，否则 1
pub async fn init_and_run_bootstrap(options: RuntimeOptions) -> i32 {
    init_tracing();

    if let Some(path) = &options.env_file {
        match config::env::apply_env_file(path) {
            Ok(applied) => {
                info!(file = %path.display(), applied, "Applied env file");
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to read env file");
                return 1;
            }
        }
    }

    let config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration error");
            return 1;
        }
    };

    let mode = options.mode_override.unwrap_or(config.mode);

    // Ctrl-C → 取消令牌，命令执行器据此 kill 在跑的子进程
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling bootstrap");
                cancel.cancel();
            }
        });
    }

    let report = services::bootstrap::run(config, mode, cancel).await;
    report.exit_code()
}

/// 初始化 tracing 订阅器（EnvFilter + fmt，默认 info）
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
