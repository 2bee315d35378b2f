//! Docker 引擎校验、Compose 检测与冒烟测试

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::env::constants::{COMMAND_TIMEOUT_SECS, SMOKE_IMAGE, SMOKE_TIMEOUT_SECS};
use crate::error::{BootstrapError, BootstrapResult};
use crate::infra::command::CommandRunner;

/// compose 命令形式
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ComposeCommand {
    /// `docker compose`（v2 插件）
    Plugin,
    /// `docker-compose`（legacy 独立二进制）
    Legacy,
}

impl ComposeCommand {
    /// 组装完整的调用参数
    ///
    /// 插件形式需要在子命令前插入 `compose`
    pub fn invocation<'a>(&self, tail: &[&'a str]) -> (&'static str, Vec<&'a str>) {
        match self {
            ComposeCommand::Plugin => {
                let mut args: Vec<&'a str> = vec!["compose"];
                args.extend_from_slice(tail);
                ("docker", args)
            }
            ComposeCommand::Legacy => ("docker-compose", tail.to_vec()),
        }
    }

    /// 显示用名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ComposeCommand::Plugin => "docker compose",
            ComposeCommand::Legacy => "docker-compose",
        }
    }
}

/// 校验 Docker 引擎并确保服务运行
///
/// 二进制缺失是致命错误；随后 `systemctl enable --now docker`
/// 保证引擎开机自启且当前已启动
pub async fn ensure_engine(cancel: &CancellationToken) -> BootstrapResult<()> {
    if !CommandRunner::binary_exists("docker").await {
        return Err(BootstrapError::DockerMissing);
    }
    info!("Docker binary found");

    let status = CommandRunner::run_streaming(
        "systemctl",
        &["enable", "--now", "docker"],
        None,
        &[],
        cancel,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await?;
    if !status.success() {
        return Err(BootstrapError::command_status(
            "systemctl enable --now docker",
            status.code(),
        ));
    }

    // 引擎版本探测，同时确认 daemon 可达
    let output = CommandRunner::run_simple(
        "docker",
        &["version", "--format", "{{.Server.Version}}"],
        None,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await?;
    if output.status.success() {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(version = %version, "Docker engine is running");
    } else {
        return Err(BootstrapError::command_status(
            "docker version",
            output.status.code(),
        ));
    }

    Ok(())
}

/// 检测 compose 命令形式
///
/// 插件优先，回退 legacy 二进制；两者都不可用则致命
pub async fn detect_compose_command() -> BootstrapResult<ComposeCommand> {
    let probe = CommandRunner::run_simple(
        "docker",
        &["compose", "version"],
        None,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await;

    if probe.map(|o| o.status.success()).unwrap_or(false) {
        info!("Using docker compose plugin");
        return Ok(ComposeCommand::Plugin);
    }

    if CommandRunner::binary_exists("docker-compose").await {
        warn!("Compose plugin not available, falling back to legacy docker-compose");
        return Ok(ComposeCommand::Legacy);
    }

    Err(BootstrapError::ComposeMissing)
}

/// 运行 hello-world 冒烟测试
///
/// 失败是致命错误，终止整个引导
pub async fn smoke_test(cancel: &CancellationToken) -> BootstrapResult<()> {
    info!(image = SMOKE_IMAGE, "Running docker smoke test");

    let status = CommandRunner::run_streaming(
        "docker",
        &["run", "--rm", SMOKE_IMAGE],
        None,
        &[],
        cancel,
        Duration::from_secs(SMOKE_TIMEOUT_SECS),
    )
    .await
    .map_err(|e| BootstrapError::SmokeTestFailed(e.to_string()))?;

    if !status.success() {
        return Err(BootstrapError::SmokeTestFailed(format!(
            "exit code {}",
            status.code().unwrap_or(-1)
        )));
    }

    info!("Smoke test passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_invocation_prepends_compose() {
        let (program, args) = ComposeCommand::Plugin.invocation(&["-f", "a.yml", "up", "-d"]);
        assert_eq!(program, "docker");
        assert_eq!(args, vec!["compose", "-f", "a.yml", "up", "-d"]);
    }

    #[test]
    fn test_legacy_invocation_passes_through() {
        let (program, args) = ComposeCommand::Legacy.invocation(&["-f", "a.yml", "pull"]);
        assert_eq!(program, "docker-compose");
        assert_eq!(args, vec!["-f", "a.yml", "pull"]);
    }

    #[test]
    fn test_as_str() {
        assert_eq!(ComposeCommand::Plugin.as_str(), "docker compose");
        assert_eq!(ComposeCommand::Legacy.as_str(), "docker-compose");
    }
}
