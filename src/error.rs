//! 统一错误处理
//!
//! 引导流程唯一的错误类型，所有阶段通过 `?` 向上传播；
//! 两个显式的致命前置条件（Docker 缺失、冒烟测试失败）有独立变体

use thiserror::Error;

use crate::infra::command::CommandError;

/// 引导流程错误
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Docker 二进制不存在（致命，提前终止）
    #[error("docker binary not found in PATH; install Docker before running bootstrap")]
    DockerMissing,

    /// hello-world 冒烟测试失败（致命，提前终止）
    #[error("docker smoke test failed: {0}")]
    SmokeTestFailed(String),

    /// Compose 插件与 legacy 二进制均不可用
    #[error("neither the docker compose plugin nor docker-compose is available")]
    ComposeMissing,

    /// 外部命令返回非零退出码
    #[error("`{command}` exited with code {code}")]
    CommandStatus { command: String, code: i32 },

    /// 命令执行层错误（启动失败、超时、取消）
    #[error(transparent)]
    Command(#[from] CommandError),

    /// 配置无效
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP 传输错误
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Portainer 就绪轮询耗尽
    #[error("portainer did not become ready after {attempts} attempts")]
    PortainerNotReady { attempts: u32 },

    /// Portainer API 返回错误响应
    #[error("portainer API returned {status}: {body}")]
    PortainerApi { status: u16, body: String },

    /// 引导被取消（Ctrl-C）
    #[error("bootstrap cancelled")]
    Cancelled,
}

impl BootstrapError {
    /// 命令退出码错误的便捷构造
    pub fn command_status(command: impl Into<String>, code: Option<i32>) -> Self {
        Self::CommandStatus {
            command: command.into(),
            code: code.unwrap_or(-1),
        }
    }
}

/// 便捷类型别名
pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_status_defaults_to_minus_one() {
        let err = BootstrapError::command_status("apt-get install", None);
        match err {
            BootstrapError::CommandStatus { command, code } => {
                assert_eq!(command, "apt-get install");
                assert_eq!(code, -1);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_display_messages() {
        assert!(BootstrapError::DockerMissing.to_string().contains("docker binary"));
        let err = BootstrapError::PortainerNotReady { attempts: 60 };
        assert!(err.to_string().contains("60 attempts"));
    }
}
