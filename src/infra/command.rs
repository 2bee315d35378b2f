//! 命令执行器
//!
//! 提供统一的外部命令执行接口，支持：
//! - 实时日志转发（stdout → info，stderr → warn）
//! - 超时控制
//! - 取消支持（Ctrl-C）

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 命令执行器
pub struct CommandRunner;

/// 命令执行错误
#[derive(Debug)]
pub enum CommandError {
    /// 命令启动失败
    SpawnFailed(String, std::io::Error),
    /// 命令超时
    Timeout(String),
    /// 命令被取消
    Cancelled,
    /// 等待命令完成失败
    WaitFailed(std::io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(cmd, e) => write!(f, "failed to spawn `{}`: {}", cmd, e),
            CommandError::Timeout(cmd) => write!(f, "`{}` timed out", cmd),
            CommandError::Cancelled => write!(f, "command was cancelled"),
            CommandError::WaitFailed(e) => write!(f, "failed to wait for command: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(_, e) | CommandError::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl CommandRunner {
    /// 执行命令并实时转发输出
    ///
    /// stdout 每行以 info 级别转发，stderr 以 warn 级别转发。
    /// 取消令牌触发或超时后 kill 子进程并返回错误。
    ///
    /// # Returns
    /// 子进程退出状态（调用方负责判断非零退出）
    pub async fn run_streaming(
        program: &str,
        args: &[&str],
        work_dir: Option<&Path>,
        envs: &[(&str, &str)],
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> Result<std::process::ExitStatus, CommandError> {
        let rendered = render(program, args);
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = work_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in envs {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| CommandError::SpawnFailed(rendered.clone(), e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // stdout 读取任务
        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!("{}", line);
                }
            }
        });

        // stderr 读取任务
        let stderr_task = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("{}", line);
                }
            }
        });

        // 等待命令完成，支持超时和取消
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(command = %rendered, "Command cancelled, killing process");
                let _ = child.kill().await;
                Err(CommandError::Cancelled)
            }
            _ = tokio::time::sleep(timeout) => {
                error!(command = %rendered, "Command timed out after {:?}", timeout);
                let _ = child.kill().await;
                Err(CommandError::Timeout(rendered.clone()))
            }
            status = child.wait() => {
                status.map_err(CommandError::WaitFailed)
            }
        };

        // 等待日志读取完成
        let _ = stdout_task.await;
        let _ = stderr_task.await;

        result
    }

    /// 执行简单命令（捕获输出，无流式转发）
    ///
    /// 用于只关心结果的探测类命令（如 `which`、`id -u`）
    pub async fn run_simple(
        program: &str,
        args: &[&str],
        work_dir: Option<&Path>,
        timeout: Duration,
    ) -> Result<Output, CommandError> {
        let rendered = render(program, args);
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = work_dir {
            cmd.current_dir(dir);
        }

        tokio::select! {
            result = cmd.output() => {
                result.map_err(|e| CommandError::SpawnFailed(rendered, e))
            }
            _ = tokio::time::sleep(timeout) => {
                Err(CommandError::Timeout(rendered))
            }
        }
    }

    /// 检查二进制是否在 PATH 中
    pub async fn binary_exists(name: &str) -> bool {
        Self::run_simple("which", &[name], None, Duration::from_secs(5))
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// 渲染命令行用于日志和错误信息
fn render(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_simple_success() {
        let result =
            CommandRunner::run_simple("echo", &["hello"], None, Duration::from_secs(5)).await;

        assert!(result.is_ok());
        let output = result.unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[tokio::test]
    async fn test_run_simple_not_found() {
        let result = CommandRunner::run_simple(
            "nonexistent_command_12345",
            &[],
            None,
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(CommandError::SpawnFailed(_, _))));
    }

    #[tokio::test]
    async fn test_run_streaming_exit_status() {
        let cancel = CancellationToken::new();
        let status = CommandRunner::run_streaming(
            "sh",
            &["-c", "exit 3"],
            None,
            &[],
            &cancel,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_run_streaming_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = CommandRunner::run_streaming(
            "sleep",
            &["30"],
            None,
            &[],
            &cancel,
            Duration::from_secs(60),
        )
        .await;

        assert!(matches!(result, Err(CommandError::Cancelled)));
    }

    #[tokio::test]
    async fn test_binary_exists() {
        assert!(CommandRunner::binary_exists("sh").await);
        assert!(!CommandRunner::binary_exists("nonexistent_binary_12345").await);
    }

    #[test]
    fn test_render() {
        assert_eq!(render("docker", &[]), "docker");
        assert_eq!(
            render("docker", &["compose", "version"]),
            "docker compose version"
        );
    }
}
