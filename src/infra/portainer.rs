//! Portainer HTTP Client
//!
//! 封装与 Portainer REST API 的所有交互，复用连接池：
//! - 就绪探测 (wait_until_ready)
//! - 管理员初始化 (ensure_admin)
//! - 认证获取 JWT (authenticate)
//! - endpoint 发现 (primary_endpoint_id)
//! - 栈上传 (create_stack)

use std::time::Duration;

use reqwest::{multipart, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::env::constants::{
    HTTP_TIMEOUT_SECS, READY_POLL_INTERVAL_SECS, READY_POLL_MAX_ATTEMPTS,
};
use crate::error::{BootstrapError, BootstrapResult};

/// Portainer 客户端
#[derive(Clone)]
pub struct PortainerClient {
    client: Client,
    base_url: String,
}

impl PortainerClient {
    /// 创建新的 Portainer 客户端
    ///
    /// # Arguments
    /// * `base_url` - API 基地址，如 `http://localhost:9000`
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create HTTP client");

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self { client, base_url }
    }

    /// API 基地址
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 固定间隔轮询 /api/status 直到就绪
    ///
    /// 间隔固定无退避；超过最大次数返回 `PortainerNotReady`
    pub async fn wait_until_ready(&self) -> BootstrapResult<()> {
        let url = format!("{}/api/status", self.base_url);

        for attempt in 1..=READY_POLL_MAX_ATTEMPTS {
            match self
                .client
                .get(&url)
                .timeout(Duration::from_secs(5))
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => {
                    info!(attempt, "Portainer is ready");
                    return Ok(());
                }
                Ok(resp) => {
                    debug!(attempt, status = %resp.status(), "Portainer not ready yet");
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Portainer not reachable yet");
                }
            }

            tokio::time::sleep(Duration::from_secs(READY_POLL_INTERVAL_SECS)).await;
        }

        Err(BootstrapError::PortainerNotReady {
            attempts: READY_POLL_MAX_ATTEMPTS,
        })
    }

    /// 初始化管理员账户
    ///
    /// 首次启动的 Portainer 没有任何账户，必须先建管理员才能认证。
    /// 409 表示已初始化过，不视为错误
    pub async fn ensure_admin(&self, password: &str) -> BootstrapResult<()> {
        let url = format!("{}/api/users/admin/init", self.base_url);
        let body = Credentials {
            username: "admin",
            password,
        };

        let resp = self.client.post(&url).json(&body).send().await?;
        match resp.status() {
            s if s.is_success() => {
                info!("Portainer admin account initialised");
                Ok(())
            }
            StatusCode::CONFLICT => {
                info!("Portainer admin account already initialised");
                Ok(())
            }
            s => Err(api_error(s, resp).await),
        }
    }

    /// 认证并获取 JWT
    ///
    /// POST /api/auth，JSON body `{Username, Password}`
    pub async fn authenticate(&self, password: &str) -> BootstrapResult<String> {
        let url = format!("{}/api/auth", self.base_url);
        let body = Credentials {
            username: "admin",
            password,
        };

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(api_error(status, resp).await);
        }

        let auth: AuthResponse = resp.json().await?;
        info!("Authenticated against Portainer API");
        Ok(auth.jwt)
    }

    /// 发现本地 endpoint id
    ///
    /// 取 GET /api/endpoints 返回的第一项；发现失败时退回配置的 id
    pub async fn primary_endpoint_id(&self, jwt: &str, fallback: u32) -> u32 {
        let url = format!("{}/api/endpoints", self.base_url);

        match self.client.get(&url).bearer_auth(jwt).send().await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<Vec<Endpoint>>().await {
                    Ok(endpoints) => match endpoints.first() {
                        Some(ep) => {
                            info!(endpoint_id = ep.id, endpoint = %ep.name, "Using Portainer endpoint");
                            ep.id
                        }
                        None => {
                            warn!(fallback, "No Portainer endpoints found, using fallback id");
                            fallback
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, fallback, "Failed to parse endpoint list, using fallback id");
                        fallback
                    }
                }
            }
            Ok(resp) => {
                warn!(status = %resp.status(), fallback, "Endpoint discovery rejected, using fallback id");
                fallback
            }
            Err(e) => {
                warn!(error = %e, fallback, "Endpoint discovery failed, using fallback id");
                fallback
            }
        }
    }

    /// 上传一个 compose 栈
    ///
    /// POST /api/stacks?type=2&method=string&endpointId=<id>，
    /// multipart 表单字段 Name / StackFileContent / EndpointID。
    /// 409（同名栈已存在）记录并跳过，保证重复运行幂等
    ///
    /// # Returns
    /// `true` = 新建成功，`false` = 已存在跳过
    pub async fn create_stack(
        &self,
        jwt: &str,
        endpoint_id: u32,
        name: &str,
        stack_file_content: String,
    ) -> BootstrapResult<bool> {
        let url = format!(
            "{}/api/stacks?type=2&method=string&endpointId={}",
            self.base_url, endpoint_id
        );

        let form = multipart::Form::new()
            .text("Name", name.to_string())
            .text("StackFileContent", stack_file_content)
            .text("EndpointID", endpoint_id.to_string());

        let resp = self
            .client
            .post(&url)
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => {
                info!(stack = %name, "Stack deployed via Portainer");
                Ok(true)
            }
            StatusCode::CONFLICT => {
                warn!(stack = %name, "Stack already exists, skipping");
                Ok(false)
            }
            s => Err(api_error(s, resp).await),
        }
    }
}

/// 把非成功响应转换为 API 错误（带响应体）
async fn api_error(status: StatusCode, resp: Response) -> BootstrapError {
    let body = resp.text().await.unwrap_or_default();
    BootstrapError::PortainerApi {
        status: status.as_u16(),
        body,
    }
}

/// 认证请求体
#[derive(Serialize)]
struct Credentials<'a> {
    #[serde(rename = "Username")]
    username: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
}

/// 认证响应
#[derive(Deserialize)]
struct AuthResponse {
    jwt: String,
}

/// endpoint 列表项
#[derive(Deserialize)]
struct Endpoint {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Name")]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = PortainerClient::new("http://localhost:9000/");
        assert_eq!(client.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_credentials_serialised_with_portainer_casing() {
        let body = Credentials {
            username: "admin",
            password: "secret",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["Username"], "admin");
        assert_eq!(json["Password"], "secret");
    }

    #[test]
    fn test_auth_response_parsing() {
        let auth: AuthResponse = serde_json::from_str(r#"{"jwt":"abc.def.ghi"}"#).unwrap();
        assert_eq!(auth.jwt, "abc.def.ghi");
    }

    #[test]
    fn test_endpoint_parsing() {
        let endpoints: Vec<Endpoint> =
            serde_json::from_str(r#"[{"Id":3,"Name":"local","Type":1}]"#).unwrap();
        assert_eq!(endpoints[0].id, 3);
        assert_eq!(endpoints[0].name, "local");
    }
}
