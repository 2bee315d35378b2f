//! Portainer 部署
//!
//! 确保 Portainer 容器运行，然后通过 REST API 上传全部栈

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::env::constants::{
    COMMAND_TIMEOUT_SECS, DEPLOY_TIMEOUT_SECS, PORTAINER_CONTAINER, PORTAINER_VOLUME,
};
use crate::config::PortainerConfig;
use crate::domain::StackFile;
use crate::error::{BootstrapError, BootstrapResult};
use crate::infra::command::CommandRunner;
use crate::infra::portainer::PortainerClient;

use super::DeployOutcome;

/// 通过 Portainer 部署全部栈
///
/// 流程：容器就位 → 就绪轮询 → 管理员初始化 → 认证 →
/// endpoint 发现 → 逐栈上传
pub async fn deploy_stacks(
    config: &PortainerConfig,
    stacks: &[StackFile],
    cancel: &CancellationToken,
) -> BootstrapResult<DeployOutcome> {
    ensure_portainer_container(config, cancel).await?;

    let client = PortainerClient::new(config.base_url());
    client.wait_until_ready().await?;
    client.ensure_admin(&config.admin_password).await?;
    let jwt = client.authenticate(&config.admin_password).await?;
    let endpoint_id = client.primary_endpoint_id(&jwt, config.endpoint_id).await;

    let mut outcome = DeployOutcome::default();
    for stack in stacks {
        let content = tokio::fs::read_to_string(&stack.path).await?;
        if client
            .create_stack(&jwt, endpoint_id, &stack.name, content)
            .await?
        {
            outcome.deployed += 1;
        } else {
            outcome.skipped += 1;
        }
    }

    info!(
        deployed = outcome.deployed,
        skipped = outcome.skipped,
        "Portainer stack deployment finished"
    );
    Ok(outcome)
}

/// 确保数据卷和 Portainer 容器存在且运行
///
/// `docker volume create` 本身幂等；容器已运行则不动，
/// 已停止则 start，不存在则 run
async fn ensure_portainer_container(
    config: &PortainerConfig,
    cancel: &CancellationToken,
) -> BootstrapResult<()> {
    let volume = CommandRunner::run_simple(
        "docker",
        &["volume", "create", PORTAINER_VOLUME],
        None,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await?;
    if !volume.status.success() {
        return Err(BootstrapError::command_status(
            "docker volume create",
            volume.status.code(),
        ));
    }

    match container_state().await {
        Some(state) if state == "running" => {
            info!(container = PORTAINER_CONTAINER, "Portainer container already running");
            Ok(())
        }
        Some(state) => {
            info!(container = PORTAINER_CONTAINER, state = %state, "Starting existing Portainer container");
            let status = CommandRunner::run_streaming(
                "docker",
                &["start", PORTAINER_CONTAINER],
                None,
                &[],
                cancel,
                Duration::from_secs(COMMAND_TIMEOUT_SECS),
            )
            .await?;
            if status.success() {
                Ok(())
            } else {
                Err(BootstrapError::command_status(
                    "docker start portainer",
                    status.code(),
                ))
            }
        }
        None => {
            let image = config.image();
            info!(image = %image, "Launching Portainer container");
            let args = run_args(config, &image);
            let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let status = CommandRunner::run_streaming(
                "docker",
                &arg_refs,
                None,
                &[],
                cancel,
                Duration::from_secs(DEPLOY_TIMEOUT_SECS),
            )
            .await?;
            if status.success() {
                Ok(())
            } else {
                Err(BootstrapError::command_status(
                    "docker run portainer",
                    status.code(),
                ))
            }
        }
    }
}

/// 查询 Portainer 容器状态
///
/// 容器不存在时 inspect 非零退出，返回 None
async fn container_state() -> Option<String> {
    CommandRunner::run_simple(
        "docker",
        &["inspect", "--format", "{{.State.Status}}", PORTAINER_CONTAINER],
        None,
        Duration::from_secs(COMMAND_TIMEOUT_SECS),
    )
    .await
    .ok()
    .filter(|o| o.status.success())
    .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

/// 组装 docker run 参数
fn run_args(config: &PortainerConfig, image: &str) -> Vec<String> {
    vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        PORTAINER_CONTAINER.to_string(),
        "--restart=always".to_string(),
        "-p".to_string(),
        format!("{}:9000", config.http_port),
        "-p".to_string(),
        format!("{}:9443", config.https_port),
        "-v".to_string(),
        "/var/run/docker.sock:/var/run/docker.sock".to_string(),
        "-v".to_string(),
        format!("{}:/data", PORTAINER_VOLUME),
        image.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PortainerConfig {
        PortainerConfig {
            version: "2.19.4".to_string(),
            admin_password: "secret".to_string(),
            http_port: 9000,
            https_port: 9443,
            endpoint_id: 1,
        }
    }

    #[test]
    fn test_run_args_mounts_and_ports() {
        let config = test_config();
        let args = run_args(&config, "portainer/portainer-ce:2.19.4");

        assert_eq!(args[0], "run");
        assert!(args.contains(&"9000:9000".to_string()));
        assert!(args.contains(&"9443:9443".to_string()));
        assert!(args.contains(&"/var/run/docker.sock:/var/run/docker.sock".to_string()));
        assert!(args.contains(&"portainer_data:/data".to_string()));
        assert_eq!(args.last().unwrap(), "portainer/portainer-ce:2.19.4");
    }

    #[test]
    fn test_run_args_respects_custom_ports() {
        let mut config = test_config();
        config.http_port = 19000;
        config.https_port = 19443;
        let args = run_args(&config, "portainer/portainer-ce:2.19.4");

        assert!(args.contains(&"19000:9000".to_string()));
        assert!(args.contains(&"19443:9443".to_string()));
    }
}
