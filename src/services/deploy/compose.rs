//! 本机 docker compose 部署
//!
//! 逐栈执行 pull（容忍失败）+ up -d --force-recreate（致命）

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::env::constants::DEPLOY_TIMEOUT_SECS;
use crate::domain::StackFile;
use crate::error::{BootstrapError, BootstrapResult};
use crate::infra::command::CommandRunner;
use crate::services::docker::ComposeCommand;

/// 通过本机 compose 部署全部栈
pub async fn deploy_stacks(
    compose: ComposeCommand,
    stacks: &[StackFile],
    cancel: &CancellationToken,
) -> BootstrapResult<()> {
    for stack in stacks {
        deploy_stack(compose, stack, cancel).await?;
    }
    Ok(())
}

/// 部署单个栈
async fn deploy_stack(
    compose: ComposeCommand,
    stack: &StackFile,
    cancel: &CancellationToken,
) -> BootstrapResult<()> {
    let file = stack.path.to_string_lossy().to_string();

    info!(stack = %stack.name, file = %file, "Deploying stack via {}", compose.as_str());

    // 镜像预拉取，compose pull 的进度信息走 stderr，失败不阻断
    let (program, args) = compose.invocation(&["-f", &file, "-p", &stack.name, "pull"]);
    let pull = CommandRunner::run_streaming(
        program,
        &args,
        None,
        &[],
        cancel,
        Duration::from_secs(DEPLOY_TIMEOUT_SECS),
    )
    .await?;
    if !pull.success() {
        warn!(stack = %stack.name, "compose pull had issues, continuing");
    }

    // 强制重建，保证重复运行替换而非叠加容器
    let (program, args) =
        compose.invocation(&["-f", &file, "-p", &stack.name, "up", "-d", "--force-recreate"]);
    let up = CommandRunner::run_streaming(
        program,
        &args,
        None,
        &[],
        cancel,
        Duration::from_secs(DEPLOY_TIMEOUT_SECS),
    )
    .await?;
    if !up.success() {
        return Err(BootstrapError::command_status(
            format!("{} up -d ({})", compose.as_str(), stack.name),
            up.code(),
        ));
    }

    info!(stack = %stack.name, "Stack deployed");
    Ok(())
}
