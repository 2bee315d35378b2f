//! 栈部署模块
//!
//! 根据部署方式分发到本机 compose 或 Portainer API

pub mod compose;
pub mod portainer;

use tokio_util::sync::CancellationToken;

use crate::config::EnvConfig;
use crate::domain::{DeployMode, StackFile};
use crate::error::BootstrapResult;
use crate::services::docker::ComposeCommand;

/// 部署结果统计
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeployOutcome {
    /// 新部署的栈数量
    pub deployed: usize,
    /// 已存在而跳过的栈数量
    pub skipped: usize,
}

impl DeployOutcome {
    /// 阶段汇总信息
    pub fn message(&self) -> String {
        if self.skipped == 0 {
            format!("{} deployed", self.deployed)
        } else {
            format!("{} deployed, {} skipped", self.deployed, self.skipped)
        }
    }
}

/// 执行栈部署
///
/// 这是部署的主入口点，根据部署方式选择对应的策略
pub async fn execute(
    config: &EnvConfig,
    mode: DeployMode,
    compose_command: ComposeCommand,
    stacks: &[StackFile],
    cancel: &CancellationToken,
) -> BootstrapResult<DeployOutcome> {
    match mode {
        DeployMode::DockerCompose => {
            compose::deploy_stacks(compose_command, stacks, cancel).await?;
            Ok(DeployOutcome {
                deployed: stacks.len(),
                skipped: 0,
            })
        }
        DeployMode::Portainer => {
            portainer::deploy_stacks(&config.portainer, stacks, cancel).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_message() {
        let outcome = DeployOutcome {
            deployed: 3,
            skipped: 0,
        };
        assert_eq!(outcome.message(), "3 deployed");

        let outcome = DeployOutcome {
            deployed: 2,
            skipped: 1,
        };
        assert_eq!(outcome.message(), "2 deployed, 1 skipped");
    }
}
