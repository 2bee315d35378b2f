//! 引导流水线
//!
//! 顺序执行各阶段，任一阶段失败立即终止（不回滚已完成的阶段），
//! 结束时打印阶段汇总

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::env::constants::VERSION;
use crate::config::EnvConfig;
use crate::domain::{DeployMode, ProvisionReport, ProvisionStage, RunStatus, StageStatus};
use crate::error::{BootstrapError, BootstrapResult};
use crate::services::{deploy, docker, packages, stacks, users};

/// 流水线阶段定义（标识，显示名）
const STAGE_DEFS: &[(&str, &str)] = &[
    ("packages", "Base Packages"),
    ("docker_engine", "Docker Engine"),
    ("compose_plugin", "Compose Plugin"),
    ("service_user", "Service User"),
    ("smoke_test", "Smoke Test"),
    ("sync_stacks", "Stack Definitions"),
    ("deploy_stacks", "Stack Deployment"),
];

/// 执行完整引导流程
///
/// 返回包含各阶段结果的运行报告；退出码由报告给出
pub async fn run(config: EnvConfig, mode: DeployMode, cancel: CancellationToken) -> ProvisionReport {
    let mut report = ProvisionReport::new(mode);
    report.stages = STAGE_DEFS
        .iter()
        .map(|(name, display)| ProvisionStage::new(name, display))
        .collect();

    info!(
        run_id = %report.run_id,
        host = %report.host,
        version = VERSION,
        mode = mode.as_str(),
        "Starting host bootstrap"
    );

    let result = run_stages(&config, mode, &cancel, &mut report.stages).await;

    match result {
        Ok(()) => {
            report.complete(RunStatus::Success);
            info!(run_id = %report.run_id, "Host bootstrap finished");
        }
        Err(e) => {
            report.complete(RunStatus::Failed);
            error!(run_id = %report.run_id, error = %e, "Host bootstrap failed");
        }
    }

    print_summary(&report);
    report
}

/// 顺序执行全部阶段
async fn run_stages(
    config: &EnvConfig,
    mode: DeployMode,
    cancel: &CancellationToken,
    stages: &mut [ProvisionStage],
) -> BootstrapResult<()> {
    // [1/7] 基础软件包
    info!("[1/7] Installing base packages");
    stages[0].start();
    match packages::install_base_packages(cancel).await {
        Ok(()) => stages[0].finish(true, None),
        Err(e) => return Err(fail(&mut stages[0], e)),
    }

    // [2/7] Docker 引擎
    info!("[2/7] Verifying Docker engine");
    stages[1].start();
    match docker::ensure_engine(cancel).await {
        Ok(()) => stages[1].finish(true, None),
        Err(e) => return Err(fail(&mut stages[1], e)),
    }

    // [3/7] Compose 插件
    info!("[3/7] Detecting compose command");
    stages[2].start();
    let compose_command = match docker::detect_compose_command().await {
        Ok(c) => {
            stages[2].finish(true, Some(c.as_str().to_string()));
            c
        }
        Err(e) => return Err(fail(&mut stages[2], e)),
    };

    // [4/7] 服务账户
    info!("[4/7] Provisioning service user");
    stages[3].start();
    match users::ensure_service_user(&config.service_user, cancel).await {
        Ok(()) => stages[3].finish(true, Some(config.service_user.clone())),
        Err(e) => return Err(fail(&mut stages[3], e)),
    }

    // [5/7] 冒烟测试
    info!("[5/7] Running smoke test");
    stages[4].start();
    match docker::smoke_test(cancel).await {
        Ok(()) => stages[4].finish(true, None),
        Err(e) => return Err(fail(&mut stages[4], e)),
    }

    // 取消检查
    if cancel.is_cancelled() {
        return Err(BootstrapError::Cancelled);
    }

    // [6/7] 栈定义同步
    info!("[6/7] Syncing stack definitions");
    stages[5].start();
    match stacks::sync_repo(&config.repo, cancel).await {
        Ok(action) => stages[5].finish(true, Some(format!("{:?}", action).to_lowercase())),
        Err(e) => return Err(fail(&mut stages[5], e)),
    }

    // 取消检查
    if cancel.is_cancelled() {
        return Err(BootstrapError::Cancelled);
    }

    // [7/7] 栈部署
    info!("[7/7] Deploying stacks");
    stages[6].start();
    let discovered = match stacks::discover_stacks(&config.repo.stacks_root()) {
        Ok(found) => found,
        Err(e) => return Err(fail(&mut stages[6], e)),
    };
    if discovered.is_empty() {
        stages[6].finish(true, Some("no compose files found".to_string()));
        return Ok(());
    }
    match deploy::execute(config, mode, compose_command, &discovered, cancel).await {
        Ok(outcome) => stages[6].finish(true, Some(outcome.message())),
        Err(e) => return Err(fail(&mut stages[6], e)),
    }

    Ok(())
}

/// 标记阶段失败并返回原错误
fn fail(stage: &mut ProvisionStage, err: BootstrapError) -> BootstrapError {
    stage.finish(false, Some(err.to_string()));
    err
}

/// 打印阶段汇总
fn print_summary(report: &ProvisionReport) {
    println!();
    println!("=== Bootstrap Summary ===");
    println!(
        "Run {} on {} ({} mode)",
        report.run_id,
        report.host,
        report.mode.as_str()
    );

    for stage in &report.stages {
        let duration = stage
            .duration_ms
            .map(|d| format!("{}ms", d))
            .unwrap_or_else(|| "-".to_string());
        match &stage.message {
            Some(msg) => println!(
                "{} {} ({}) - {}",
                status_icon(stage.status),
                stage.display_name,
                duration,
                msg
            ),
            None => println!(
                "{} {} ({})",
                status_icon(stage.status),
                stage.display_name,
                duration
            ),
        }
    }

    println!("Status: {}", report.status.as_str());
}

/// 阶段状态图标
fn status_icon(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Success => "✓",
        StageStatus::Failed => "✗",
        StageStatus::Skipped => "⊘",
        StageStatus::Running => "⟳",
        StageStatus::Pending => "○",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_defs_are_unique() {
        let mut names: Vec<&str> = STAGE_DEFS.iter().map(|(n, _)| *n).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), STAGE_DEFS.len());
    }

    #[test]
    fn test_stage_defs_cover_pipeline() {
        assert_eq!(STAGE_DEFS.len(), 7);
        assert_eq!(STAGE_DEFS[0].0, "packages");
        assert_eq!(STAGE_DEFS[6].0, "deploy_stacks");
    }

    #[test]
    fn test_status_icons() {
        assert_eq!(status_icon(StageStatus::Success), "✓");
        assert_eq!(status_icon(StageStatus::Failed), "✗");
        assert_eq!(status_icon(StageStatus::Skipped), "⊘");
        assert_eq!(status_icon(StageStatus::Pending), "○");
    }
}
