//! 环境变量配置加载

use std::env;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::domain::provision::DeployMode;
use crate::error::{BootstrapError, BootstrapResult};

/// 命令行运行时选项
#[derive(Clone, Debug, Default)]
pub struct RuntimeOptions {
    /// .env 风格配置文件路径
    pub env_file: Option<PathBuf>,
    /// 覆盖部署方式（--mode compose|portainer）
    pub mode_override: Option<DeployMode>,
}

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 栈定义仓库
    pub repo: RepoConfig,
    /// Portainer 配置
    pub portainer: PortainerConfig,
    /// 专用服务账户名
    pub service_user: String,
    /// 栈部署方式（由 PORTAINER_VERSION 推导）
    pub mode: DeployMode,
}

/// 栈定义仓库配置
#[derive(Clone, Debug)]
pub struct RepoConfig {
    /// Git 远端地址
    pub url: String,
    /// 克隆目录
    pub clone_dir: PathBuf,
    /// compose 文件搜索子目录
    pub stacks_subdir: String,
}

impl RepoConfig {
    /// compose 文件搜索根目录
    pub fn stacks_root(&self) -> PathBuf {
        self.clone_dir.join(&self.stacks_subdir)
    }
}

/// Portainer 配置
#[derive(Clone, Debug)]
pub struct PortainerConfig {
    /// Portainer CE 镜像 tag
    pub version: String,
    /// 管理员密码
    pub admin_password: String,
    /// HTTP 发布端口
    pub http_port: u16,
    /// HTTPS 发布端口
    pub https_port: u16,
    /// endpoint 发现失败时的回退 id
    pub endpoint_id: u32,
}

impl PortainerConfig {
    /// API 基地址（本机 HTTP 端口）
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.http_port)
    }

    /// 完整镜像引用
    pub fn image(&self) -> String {
        format!("portainer/portainer-ce:{}", self.version)
    }
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> BootstrapResult<Self> {
        // 仓库地址 - 支持旧名称兼容
        let url = load_with_fallback("COMPOSE_REPO_URL", "REPO_URL").ok_or_else(|| {
            BootstrapError::InvalidConfig("COMPOSE_REPO_URL is required".to_string())
        })?;
        if env::var("REPO_URL").is_ok() {
            warn!("Deprecated environment variable REPO_URL detected. Please use COMPOSE_REPO_URL");
        }
        validate_repo_url(&url)?;

        let clone_dir = env::var("COMPOSE_CLONE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/opt/compose-stacks"));

        let stacks_subdir = env::var("STACKS_SUBDIR").unwrap_or_else(|_| "docker".to_string());

        let version = env::var("PORTAINER_VERSION").unwrap_or_else(|_| "2.19.4".to_string());
        let mode = DeployMode::from_portainer_version(&version);

        let admin_password = env::var("PORTAINER_ADMIN_PASSWORD")
            .unwrap_or_else(|_| "change-me-in-production".to_string());
        if admin_password == "change-me-in-production" {
            warn!("PORTAINER_ADMIN_PASSWORD left at default value, change it in production");
        }

        let http_port = env::var("PORTAINER_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9000);

        let https_port = env::var("PORTAINER_HTTPS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9443);

        let endpoint_id = env::var("PORTAINER_ENDPOINT_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let service_user = env::var("SERVICE_USER").unwrap_or_else(|_| "deploy".to_string());

        Ok(Self {
            repo: RepoConfig {
                url,
                clone_dir,
                stacks_subdir,
            },
            portainer: PortainerConfig {
                version,
                admin_password,
                http_port,
                https_port,
                endpoint_id,
            },
            service_user,
            mode,
        })
    }
}

/// 校验仓库地址看起来像一个 git 远端
fn validate_repo_url(url: &str) -> BootstrapResult<()> {
    let ok = url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("git@")
        || url.starts_with("ssh://");
    if ok {
        Ok(())
    } else {
        Err(BootstrapError::InvalidConfig(format!(
            "COMPOSE_REPO_URL does not look like a git remote: {}",
            url
        )))
    }
}

/// 应用 .env 风格文件
///
/// 已存在的进程环境变量优先，文件只补充缺失项。
/// 返回实际写入的变量数量
pub fn apply_env_file(path: &Path) -> BootstrapResult<usize> {
    let raw = std::fs::read_to_string(path)?;
    let mut applied = 0;

    for line in raw.lines() {
        let Some((key, value)) = parse_env_line(line) else {
            continue;
        };
        if env::var_os(&key).is_none() {
            env::set_var(&key, value);
            applied += 1;
        }
    }

    Ok(applied)
}

/// 解析单行 KEY=VALUE
///
/// 跳过空行和注释，剥离可选的 `export ` 前缀和成对引号
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line).trim_start();

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let mut value = value.trim();
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }

    Some((key.to_string(), value.to_string()))
}

/// 加载环境变量，支持 fallback
fn load_with_fallback(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary).ok().or_else(|| env::var(fallback).ok())
}

/// 常量
pub mod constants {
    /// 冒烟测试镜像
    pub const SMOKE_IMAGE: &str = "hello-world";

    /// Portainer 容器名
    pub const PORTAINER_CONTAINER: &str = "portainer";

    /// Portainer 数据卷名
    pub const PORTAINER_VOLUME: &str = "portainer_data";

    /// apt 操作超时（秒）
    pub const APT_TIMEOUT_SECS: u64 = 900;

    /// git 操作超时（秒）
    pub const GIT_TIMEOUT_SECS: u64 = 300;

    /// 单个栈部署超时（秒）
    pub const DEPLOY_TIMEOUT_SECS: u64 = 600;

    /// 冒烟测试超时（秒）
    pub const SMOKE_TIMEOUT_SECS: u64 = 120;

    /// 一般系统命令超时（秒）
    pub const COMMAND_TIMEOUT_SECS: u64 = 60;

    /// 就绪轮询间隔（秒）- 固定间隔，无退避
    pub const READY_POLL_INTERVAL_SECS: u64 = 2;

    /// 就绪轮询最大次数
    pub const READY_POLL_MAX_ATTEMPTS: u32 = 60;

    /// HTTP client 默认超时（秒）
    pub const HTTP_TIMEOUT_SECS: u64 = 30;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_env_line() {
        assert_eq!(
            parse_env_line("FOO=bar"),
            Some(("FOO".to_string(), "bar".to_string()))
        );
        assert_eq!(
            parse_env_line("  export FOO=bar  "),
            Some(("FOO".to_string(), "bar".to_string()))
        );
        assert_eq!(
            parse_env_line("FOO=\"quoted value\""),
            Some(("FOO".to_string(), "quoted value".to_string()))
        );
        assert_eq!(
            parse_env_line("FOO='single'"),
            Some(("FOO".to_string(), "single".to_string()))
        );
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line(""), None);
        assert_eq!(parse_env_line("not a pair"), None);
        assert_eq!(parse_env_line("BAD KEY=x"), None);
    }

    #[test]
    fn test_apply_env_file_does_not_override_process_env() {
        env::set_var("BOOTSTRAP_TEST_EXISTING", "from-process");

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "BOOTSTRAP_TEST_EXISTING=from-file").unwrap();
        writeln!(file, "BOOTSTRAP_TEST_FRESH=from-file").unwrap();
        writeln!(file, "# comment line").unwrap();

        let applied = apply_env_file(file.path()).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(
            env::var("BOOTSTRAP_TEST_EXISTING").unwrap(),
            "from-process"
        );
        assert_eq!(env::var("BOOTSTRAP_TEST_FRESH").unwrap(), "from-file");

        env::remove_var("BOOTSTRAP_TEST_EXISTING");
        env::remove_var("BOOTSTRAP_TEST_FRESH");
    }

    #[test]
    fn test_apply_env_file_missing_path() {
        let result = apply_env_file(Path::new("/nonexistent/bootstrap.env"));
        assert!(matches!(result, Err(BootstrapError::Io(_))));
    }

    #[test]
    fn test_validate_repo_url() {
        assert!(validate_repo_url("https://github.com/acme/stacks.git").is_ok());
        assert!(validate_repo_url("git@github.com:acme/stacks.git").is_ok());
        assert!(validate_repo_url("ssh://git@host/stacks.git").is_ok());
        assert!(validate_repo_url("stacks.git").is_err());
        assert!(validate_repo_url("").is_err());
    }

    #[test]
    fn test_load_with_fallback() {
        // 设置测试环境变量
        env::set_var("BOOTSTRAP_TEST_PRIMARY", "primary_value");
        env::set_var("BOOTSTRAP_TEST_FALLBACK", "fallback_value");

        assert_eq!(
            load_with_fallback("BOOTSTRAP_TEST_PRIMARY", "BOOTSTRAP_TEST_FALLBACK"),
            Some("primary_value".to_string())
        );

        env::remove_var("BOOTSTRAP_TEST_PRIMARY");
        assert_eq!(
            load_with_fallback("BOOTSTRAP_TEST_PRIMARY", "BOOTSTRAP_TEST_FALLBACK"),
            Some("fallback_value".to_string())
        );

        env::remove_var("BOOTSTRAP_TEST_FALLBACK");
        assert_eq!(
            load_with_fallback("BOOTSTRAP_TEST_PRIMARY", "BOOTSTRAP_TEST_FALLBACK"),
            None
        );
    }

    #[test]
    fn test_from_env_requires_and_validates_repo_url() {
        // 同一测试内顺序覆盖缺失、非法、合法三种情况，
        // 避免并行测试相互干扰进程环境
        env::remove_var("COMPOSE_REPO_URL");
        env::remove_var("REPO_URL");
        assert!(matches!(
            EnvConfig::from_env(),
            Err(BootstrapError::InvalidConfig(_))
        ));

        env::set_var("COMPOSE_REPO_URL", "not-a-remote");
        assert!(matches!(
            EnvConfig::from_env(),
            Err(BootstrapError::InvalidConfig(_))
        ));

        env::set_var("COMPOSE_REPO_URL", "https://github.com/acme/stacks.git");
        let config = EnvConfig::from_env().unwrap();
        assert_eq!(config.repo.url, "https://github.com/acme/stacks.git");
        assert_eq!(config.repo.clone_dir, PathBuf::from("/opt/compose-stacks"));
        assert_eq!(config.repo.stacks_subdir, "docker");
        assert_eq!(config.service_user, "deploy");
        assert_eq!(config.portainer.http_port, 9000);

        env::remove_var("COMPOSE_REPO_URL");
    }

    #[test]
    fn test_portainer_config_urls() {
        let config = PortainerConfig {
            version: "2.19.4".to_string(),
            admin_password: "secret".to_string(),
            http_port: 19000,
            https_port: 19443,
            endpoint_id: 1,
        };
        assert_eq!(config.base_url(), "http://localhost:19000");
        assert_eq!(config.image(), "portainer/portainer-ce:2.19.4");
    }

    #[test]
    fn test_stacks_root_joins_subdir() {
        let repo = RepoConfig {
            url: "https://example.com/stacks.git".to_string(),
            clone_dir: PathBuf::from("/opt/compose-stacks"),
            stacks_subdir: "docker".to_string(),
        };
        assert_eq!(
            repo.stacks_root(),
            PathBuf::from("/opt/compose-stacks/docker")
        );
    }
}
