//! 基础软件包安装

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::env::constants::APT_TIMEOUT_SECS;
use crate::error::{BootstrapError, BootstrapResult};
use crate::infra::command::CommandRunner;

/// 基础软件包列表
///
/// 下游阶段依赖其中的 git / curl / jq；其余为常规运维工具
pub const BASE_PACKAGES: &[&str] = &[
    "apt-transport-https",
    "ca-certificates",
    "curl",
    "git",
    "gnupg",
    "htop",
    "jq",
    "lsb-release",
    "software-properties-common",
];

const NONINTERACTIVE: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

/// 安装基础软件包
///
/// `apt-get update` + `apt-get install -y`；已安装的包由 apt 自行跳过，
/// 重复运行幂等
pub async fn install_base_packages(cancel: &CancellationToken) -> BootstrapResult<()> {
    info!("Updating apt package index");
    let status = CommandRunner::run_streaming(
        "apt-get",
        &["update", "-y"],
        None,
        NONINTERACTIVE,
        cancel,
        Duration::from_secs(APT_TIMEOUT_SECS),
    )
    .await?;
    if !status.success() {
        return Err(BootstrapError::command_status("apt-get update", status.code()));
    }

    info!(count = BASE_PACKAGES.len(), "Installing base packages");
    let mut args = vec!["install", "-y", "--no-install-recommends"];
    args.extend_from_slice(BASE_PACKAGES);

    let status = CommandRunner::run_streaming(
        "apt-get",
        &args,
        None,
        NONINTERACTIVE,
        cancel,
        Duration::from_secs(APT_TIMEOUT_SECS),
    )
    .await?;
    if !status.success() {
        return Err(BootstrapError::command_status(
            "apt-get install",
            status.code(),
        ));
    }

    Ok(())
}
