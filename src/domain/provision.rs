//! 引导运行领域模型

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// 引导运行状态
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

impl RunStatus {
    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

/// 阶段状态
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 引导阶段信息
#[derive(Clone, Debug, Serialize)]
pub struct ProvisionStage {
    /// 阶段标识 (e.g., "packages", "smoke_test")
    pub name: String,
    /// 显示名称 (e.g., "Base Packages", "Smoke Test")
    pub display_name: String,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    /// 阶段状态
    pub status: StageStatus,
    /// 附加信息
    pub message: Option<String>,
}

impl ProvisionStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

/// 栈部署方式
///
/// 由 PORTAINER_VERSION 推导：1.x 的 stacks API 与本工具使用的
/// multipart 表单不兼容，退回本机 docker compose 部署
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DeployMode {
    /// 直接 docker compose up
    DockerCompose,
    /// 通过 Portainer REST API 上传栈
    Portainer,
}

impl DeployMode {
    /// 从 PORTAINER_VERSION 推导部署方式
    ///
    /// 空串 / "none" / "1.*" → DockerCompose，其余（2.x 及以上）→ Portainer
    pub fn from_portainer_version(version: &str) -> Self {
        let v = version.trim();
        if v.is_empty() || v.eq_ignore_ascii_case("none") {
            return DeployMode::DockerCompose;
        }
        if v == "1" || v.starts_with("1.") {
            return DeployMode::DockerCompose;
        }
        DeployMode::Portainer
    }

    /// 解析命令行 --mode 取值
    pub fn from_flag(value: &str) -> Option<Self> {
        match value {
            "compose" | "docker-compose" => Some(DeployMode::DockerCompose),
            "portainer" => Some(DeployMode::Portainer),
            _ => None,
        }
    }

    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployMode::DockerCompose => "docker-compose",
            DeployMode::Portainer => "portainer",
        }
    }
}

/// 引导运行报告
#[derive(Clone, Debug, Serialize)]
pub struct ProvisionReport {
    pub run_id: Uuid,
    pub host: String,
    pub mode: DeployMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<ProvisionStage>,
}

impl ProvisionReport {
    /// 创建新的运行报告
    pub fn new(mode: DeployMode) -> Self {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            run_id: Uuid::new_v4(),
            host,
            mode,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
        }
    }

    /// 设置运行完成
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// 进程退出码：仅全部成功为 0
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Success => 0,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_as_str() {
        assert_eq!(RunStatus::Running.as_str(), "running");
        assert_eq!(RunStatus::Success.as_str(), "success");
        assert_eq!(RunStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_run_status_is_terminal() {
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Success.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_stage_lifecycle() {
        let mut stage = ProvisionStage::new("smoke_test", "Smoke Test");
        assert_eq!(stage.status, StageStatus::Pending);

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);
        assert!(stage.started_at.is_some());

        stage.finish(true, Some("Done".to_string()));
        assert_eq!(stage.status, StageStatus::Success);
        assert!(stage.finished_at.is_some());
        assert!(stage.duration_ms.is_some());
    }

    #[test]
    fn test_stage_skip() {
        let mut stage = ProvisionStage::new("packages", "Base Packages");
        stage.skip(Some("disabled".to_string()));
        assert_eq!(stage.status, StageStatus::Skipped);
        assert_eq!(stage.message.as_deref(), Some("disabled"));
    }

    #[test]
    fn test_deploy_mode_from_version() {
        assert_eq!(
            DeployMode::from_portainer_version(""),
            DeployMode::DockerCompose
        );
        assert_eq!(
            DeployMode::from_portainer_version("none"),
            DeployMode::DockerCompose
        );
        assert_eq!(
            DeployMode::from_portainer_version("1.24.1"),
            DeployMode::DockerCompose
        );
        assert_eq!(
            DeployMode::from_portainer_version("2.19.4"),
            DeployMode::Portainer
        );
        assert_eq!(
            DeployMode::from_portainer_version("latest"),
            DeployMode::Portainer
        );
    }

    #[test]
    fn test_deploy_mode_from_flag() {
        assert_eq!(DeployMode::from_flag("compose"), Some(DeployMode::DockerCompose));
        assert_eq!(DeployMode::from_flag("portainer"), Some(DeployMode::Portainer));
        assert_eq!(DeployMode::from_flag("bogus"), None);
    }

    #[test]
    fn test_report_exit_code() {
        let mut report = ProvisionReport::new(DeployMode::Portainer);
        assert_eq!(report.exit_code(), 1); // still running

        report.complete(RunStatus::Success);
        assert_eq!(report.exit_code(), 0);
        assert!(report.finished_at.is_some());
    }
}
