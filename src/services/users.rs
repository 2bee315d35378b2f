//! 专用服务账户创建
//!
//! 先探测后变更，重复运行幂等

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::env::constants::COMMAND_TIMEOUT_SECS;
use crate::error::{BootstrapError, BootstrapResult};
use crate::infra::command::CommandRunner;

/// Docker 用户组名
const DOCKER_GROUP: &str = "docker";

/// 创建服务账户并保证其在 docker 组中
pub async fn ensure_service_user(name: &str, cancel: &CancellationToken) -> BootstrapResult<()> {
    if user_exists(name).await? {
        info!(user = %name, "Service user already exists");
    } else {
        info!(user = %name, "Creating service user");
        let status = CommandRunner::run_streaming(
            "useradd",
            &["--create-home", "--shell", "/bin/bash", name],
            None,
            &[],
            cancel,
            Duration::from_secs(COMMAND_TIMEOUT_SECS),
        )
        .await?;
        if !status.success() {
            return Err(BootstrapError::command_status(
                format!("useradd {}", name),
                status.code(),
            ));
        }
    }

    if in_docker_group(name).await? {
        info!(user = %name, "Service user already in docker group");
        return Ok(());
    }

    info!(user = %name, group = DOCKER_GROUP, "Adding service user to docker group");
    let status = CommandRunner::run_streaming(
        "usermod",
        &["-aG", DOCKER_GROUP, name],
        None,
        &[],
        cancel,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await?;
    if !status.success() {
        return Err(BootstrapError::command_status(
            format!("usermod -aG {} {}", DOCKER_GROUP, name),
            status.code(),
        ));
    }

    Ok(())
}

/// 用户是否存在（`id -u` 退出码）
async fn user_exists(name: &str) -> BootstrapResult<bool> {
    let output = CommandRunner::run_simple(
        "id",
        &["-u", name],
        None,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await?;
    Ok(output.status.success())
}

/// 用户是否已在 docker 组（`id -nG` 输出）
async fn in_docker_group(name: &str) -> BootstrapResult<bool> {
    let output = CommandRunner::run_simple(
        "id",
        &["-nG", name],
        None,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await?;
    if !output.status.success() {
        return Ok(false);
    }
    let groups = String::from_utf8_lossy(&output.stdout);
    Ok(groups_contain(&groups, DOCKER_GROUP))
}

/// 判断组列表输出是否包含指定组
fn groups_contain(id_output: &str, group: &str) -> bool {
    id_output.split_whitespace().any(|g| g == group)
}
