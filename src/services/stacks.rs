//! 栈定义仓库同步与 compose 文件发现

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;
use walkdir::WalkDir;

use crate::config::env::constants::GIT_TIMEOUT_SECS;
use crate::config::RepoConfig;
use crate::domain::{is_compose_file, StackFile};
use crate::error::{BootstrapError, BootstrapResult};
use crate::infra::command::CommandRunner;

/// 仓库同步动作
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SyncAction {
    /// 目录不存在 → 克隆
    Clone,
    /// 目录已存在 → fast-forward 拉取
    Pull,
}

impl SyncAction {
    /// 根据克隆目录是否存在选择动作
    pub fn for_dir(dir: &Path) -> Self {
        if dir.exists() {
            SyncAction::Pull
        } else {
            SyncAction::Clone
        }
    }
}

/// 同步栈定义仓库
///
/// 克隆目录已存在时 `git pull --ff-only`，否则 `git clone`。
/// 仓库不可达或拉取失败直接终止（在任何部署发生之前）
pub async fn sync_repo(repo: &RepoConfig, cancel: &CancellationToken) -> BootstrapResult<SyncAction> {
    let action = SyncAction::for_dir(&repo.clone_dir);
    let dir = repo.clone_dir.to_string_lossy().to_string();

    let status = match action {
        SyncAction::Pull => {
            info!(dir = %dir, "Updating stack definitions");
            CommandRunner::run_streaming(
                "git",
                &["-C", &dir, "pull", "--ff-only"],
                None,
                &[],
                cancel,
                Duration::from_secs(GIT_TIMEOUT_SECS),
            )
            .await?
        }
        SyncAction::Clone => {
            info!(url = %repo.url, dir = %dir, "Cloning stack definitions");
            if let Some(parent) = repo.clone_dir.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            CommandRunner::run_streaming(
                "git",
                &["clone", &repo.url, &dir],
                None,
                &[],
                cancel,
                Duration::from_secs(GIT_TIMEOUT_SECS),
            )
            .await?
        }
    };

    if !status.success() {
        let command = match action {
            SyncAction::Pull => "git pull --ff-only",
            SyncAction::Clone => "git clone",
        };
        return Err(BootstrapError::command_status(command, status.code()));
    }

    Ok(action)
}

/// 发现待部署的 compose 栈
///
/// 递归遍历栈目录，收集 `*.yml` / `*.yaml`，按栈名排序保证部署顺序稳定
pub fn discover_stacks(stacks_root: &Path) -> BootstrapResult<Vec<StackFile>> {
    if !stacks_root.is_dir() {
        return Err(BootstrapError::InvalidConfig(format!(
            "stacks directory not found: {}",
            stacks_root.display()
        )));
    }

    let mut stacks: Vec<_> = WalkDir::new(stacks_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_compose_file(path))
        .map(|path| StackFile::from_path(stacks_root, path))
        .collect();

    stacks.sort_by(|a, b| a.name.cmp(&b.name));

    info!(count = stacks.len(), dir = %stacks_root.display(), "Discovered compose stacks");
    Ok(stacks)
}
