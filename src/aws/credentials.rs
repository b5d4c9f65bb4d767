//! AWS 凭证提供者
//!
//! 支持环境变量中的静态密钥、ECS 容器凭证端点和 EC2 实例元数据 (IMDSv2)

use crate::error::{ConfigError, FetchError};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// ECS 容器凭证端点地址
pub const ECS_CREDENTIALS_HOST: &str = "http://169.254.170.2";

/// EC2 实例元数据默认地址
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254";

const IMDS_TOKEN_PATH: &str = "/latest/api/token";
const IMDS_CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";

/// 元数据服务不在本机时应尽快失败
const IMDS_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// 到期前提前刷新的时间
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// 访问凭证
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// 访问密钥ID
    pub access_key_id: String,
    /// 私有访问密钥
    pub secret_access_key: String,
    /// 会话令牌
    pub session_token: Option<String>,
    /// 过期时间
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl Credentials {
    /// 是否需要刷新
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expiration
            .is_some_and(|expiration| now + Duration::minutes(REFRESH_MARGIN_MINUTES) >= expiration)
    }
}

/// 容器凭证端点和实例元数据共用的响应格式
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsResponse {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<DateTime<Utc>>,
}

/// 凭证提供者
pub enum CredentialsProvider {
    /// 固定凭证
    Static(Credentials),
    /// ECS 容器凭证端点
    Container {
        /// 端点完整地址
        uri: String,
        /// 授权令牌
        auth_token: Option<String>,
        /// 缓存的凭证
        cache: Mutex<Option<Credentials>>,
    },
    /// EC2 实例元数据服务
    InstanceMetadata {
        /// 服务地址
        endpoint: String,
        /// 缓存的凭证
        cache: Mutex<Option<Credentials>>,
    },
}

impl fmt::Debug for CredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialsProvider::Static(credentials) => {
                f.debug_tuple("Static").field(credentials).finish()
            }
            CredentialsProvider::Container { uri, .. } => {
                f.debug_struct("Container").field("uri", uri).finish()
            }
            CredentialsProvider::InstanceMetadata { endpoint, .. } => f
                .debug_struct("InstanceMetadata")
                .field("endpoint", endpoint)
                .finish(),
        }
    }
}

impl CredentialsProvider {
    /// 创建容器凭证提供者
    pub fn container(uri: impl Into<String>, auth_token: Option<String>) -> Self {
        CredentialsProvider::Container {
            uri: uri.into(),
            auth_token,
            cache: Mutex::new(None),
        }
    }

    /// 创建实例元数据凭证提供者
    pub fn instance_metadata(endpoint: impl Into<String>) -> Self {
        CredentialsProvider::InstanceMetadata {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(None),
        }
    }

    /// 从进程环境选择凭证来源
    ///
    /// 优先使用 `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`，
    /// 其次使用 ECS 注入的容器凭证端点，最后是 EC2 实例元数据。
    /// `AWS_EC2_METADATA_DISABLED=true` 时不使用实例元数据。
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let (Some(access_key_id), Some(secret_access_key)) =
            (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY"))
        {
            info!("使用环境变量中的AWS凭证");
            return Ok(CredentialsProvider::Static(Credentials {
                access_key_id,
                secret_access_key,
                session_token: var("AWS_SESSION_TOKEN"),
                expiration: None,
            }));
        }

        if let Some(relative) = var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
            info!("使用ECS容器凭证端点");
            return Ok(Self::container(
                format!("{ECS_CREDENTIALS_HOST}{relative}"),
                None,
            ));
        }

        if let Some(full) = var("AWS_CONTAINER_CREDENTIALS_FULL_URI") {
            info!("使用容器凭证端点: {}", full);
            return Ok(Self::container(full, var("AWS_CONTAINER_AUTHORIZATION_TOKEN")));
        }

        let imds_disabled = var("AWS_EC2_METADATA_DISABLED")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if !imds_disabled {
            let endpoint = var("AWS_EC2_METADATA_SERVICE_ENDPOINT")
                .unwrap_or_else(|| IMDS_ENDPOINT.to_string());
            info!("使用EC2实例元数据凭证: {}", endpoint);
            return Ok(Self::instance_metadata(endpoint));
        }

        Err(ConfigError::MissingVar {
            var: "AWS_ACCESS_KEY_ID",
        })
    }

    /// 获取可用凭证
    ///
    /// 远端获取的凭证会缓存到过期前五分钟。
    pub async fn credentials(&self, http: &reqwest::Client) -> Result<Credentials, FetchError> {
        match self {
            CredentialsProvider::Static(credentials) => Ok(credentials.clone()),
            CredentialsProvider::Container {
                uri,
                auth_token,
                cache,
            } => {
                cached_or_fetch(cache, || {
                    Self::fetch_container_credentials(http, uri, auth_token.as_deref())
                })
                .await
            }
            CredentialsProvider::InstanceMetadata { endpoint, cache } => {
                cached_or_fetch(cache, || Self::fetch_instance_metadata_credentials(http, endpoint))
                    .await
            }
        }
    }

    async fn fetch_container_credentials(
        http: &reqwest::Client,
        uri: &str,
        auth_token: Option<&str>,
    ) -> Result<Credentials, FetchError> {
        debug!("请求容器凭证: {}", uri);

        let mut request = http.get(uri);
        if let Some(token) = auth_token {
            request = request.header("Authorization", token);
        }

        let response = checked(request.send().await?, "容器凭证端点").await?;
        parse_credentials(response, "容器凭证").await
    }

    async fn fetch_instance_metadata_credentials(
        http: &reqwest::Client,
        endpoint: &str,
    ) -> Result<Credentials, FetchError> {
        debug!("请求实例元数据会话令牌: {}", endpoint);

        let response = http
            .put(format!("{endpoint}{IMDS_TOKEN_PATH}"))
            .header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL_SECONDS)
            .timeout(IMDS_TIMEOUT)
            .send()
            .await?;
        let token = checked(response, "实例元数据令牌接口").await?.text().await?;

        let roles_url = format!("{endpoint}{IMDS_CREDENTIALS_PATH}");
        let response = http
            .get(&roles_url)
            .header(IMDS_TOKEN_HEADER, &token)
            .timeout(IMDS_TIMEOUT)
            .send()
            .await?;
        let roles = checked(response, "实例元数据角色接口").await?.text().await?;
        let Some(role) = roles.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Err(FetchError::Credentials("实例没有关联IAM角色".to_string()));
        };
        debug!("实例角色: {}", role);

        let response = http
            .get(format!("{roles_url}{role}"))
            .header(IMDS_TOKEN_HEADER, &token)
            .timeout(IMDS_TIMEOUT)
            .send()
            .await?;
        let response = checked(response, "实例元数据凭证接口").await?;
        parse_credentials(response, "实例元数据凭证").await
    }
}

/// 命中未过期的缓存时直接返回，否则获取并写回缓存
async fn cached_or_fetch<F, Fut>(
    cache: &Mutex<Option<Credentials>>,
    fetch: F,
) -> Result<Credentials, FetchError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Credentials, FetchError>>,
{
    let mut cached = cache.lock().await;
    if let Some(credentials) = cached.as_ref() {
        if !credentials.needs_refresh(Utc::now()) {
            return Ok(credentials.clone());
        }
    }

    let fresh = fetch().await?;
    *cached = Some(fresh.clone());
    Ok(fresh)
}

async fn checked(response: reqwest::Response, what: &str) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(FetchError::Credentials(format!("{what}返回 {status}: {text}")))
}

async fn parse_credentials(response: reqwest::Response, what: &str) -> Result<Credentials, FetchError> {
    let body: CredentialsResponse = response
        .json()
        .await
        .map_err(|e| FetchError::Credentials(format!("解析{what}失败: {e}")))?;

    Ok(Credentials {
        access_key_id: body.access_key_id,
        secret_access_key: body.secret_access_key,
        session_token: body.token,
        expiration: body.expiration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const CREDENTIAL_VARS: [&str; 8] = [
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI",
        "AWS_CONTAINER_CREDENTIALS_FULL_URI",
        "AWS_CONTAINER_AUTHORIZATION_TOKEN",
        "AWS_EC2_METADATA_SERVICE_ENDPOINT",
        "AWS_EC2_METADATA_DISABLED",
    ];

    fn clear_env() {
        for var in CREDENTIAL_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_static_keys() {
        clear_env();
        env::set_var("AWS_ACCESS_KEY_ID", "AKID");
        env::set_var("AWS_SECRET_ACCESS_KEY", "secret");
        env::set_var("AWS_SESSION_TOKEN", "token");

        match CredentialsProvider::from_env().unwrap() {
            CredentialsProvider::Static(credentials) => {
                assert_eq!(credentials.access_key_id, "AKID");
                assert_eq!(credentials.session_token.as_deref(), Some("token"));
            }
            other => panic!("unexpected provider: {other:?}"),
        }

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_container_relative_uri() {
        clear_env();
        env::set_var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI", "/v2/credentials/abc");

        match CredentialsProvider::from_env().unwrap() {
            CredentialsProvider::Container { uri, auth_token, .. } => {
                assert_eq!(uri, "http://169.254.170.2/v2/credentials/abc");
                assert!(auth_token.is_none());
            }
            other => panic!("unexpected provider: {other:?}"),
        }

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_falls_back_to_instance_metadata() {
        clear_env();

        match CredentialsProvider::from_env().unwrap() {
            CredentialsProvider::InstanceMetadata { endpoint, .. } => {
                assert_eq!(endpoint, IMDS_ENDPOINT);
            }
            other => panic!("unexpected provider: {other:?}"),
        }

        env::set_var("AWS_EC2_METADATA_SERVICE_ENDPOINT", "http://127.0.0.1:1338/");
        match CredentialsProvider::from_env().unwrap() {
            CredentialsProvider::InstanceMetadata { endpoint, .. } => {
                assert_eq!(endpoint, "http://127.0.0.1:1338");
            }
            other => panic!("unexpected provider: {other:?}"),
        }

        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_without_credentials() {
        clear_env();
        env::set_var("AWS_EC2_METADATA_DISABLED", "true");

        assert!(matches!(
            CredentialsProvider::from_env(),
            Err(ConfigError::MissingVar {
                var: "AWS_ACCESS_KEY_ID"
            })
        ));

        clear_env();
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "super-secret".to_string(),
            session_token: Some("token".to_string()),
            expiration: None,
        };
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token\""));
    }

    #[tokio::test]
    async fn test_container_credentials_are_cached() {
        let mut server = mockito::Server::new_async().await;
        let expiration = (Utc::now() + Duration::hours(1)).to_rfc3339();
        let mock = server
            .mock("GET", "/creds")
            .match_header("authorization", "secret-token")
            .with_status(200)
            .with_body(format!(
                r#"{{"AccessKeyId":"ASIA","SecretAccessKey":"sk","Token":"tok","Expiration":"{expiration}"}}"#
            ))
            .expect(1)
            .create_async()
            .await;

        let provider = CredentialsProvider::container(
            format!("{}/creds", server.url()),
            Some("secret-token".to_string()),
        );
        let http = reqwest::Client::new();

        let first = provider.credentials(&http).await.unwrap();
        let second = provider.credentials(&http).await.unwrap();

        assert_eq!(first.access_key_id, "ASIA");
        assert_eq!(first.session_token.as_deref(), Some("tok"));
        assert_eq!(first, second);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_container_credentials_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/creds")
            .with_status(403)
            .create_async()
            .await;

        let provider = CredentialsProvider::container(format!("{}/creds", server.url()), None);
        let result = provider.credentials(&reqwest::Client::new()).await;
        assert!(matches!(result, Err(FetchError::Credentials(_))));
    }

    #[tokio::test]
    async fn test_instance_metadata_credentials() {
        let mut server = mockito::Server::new_async().await;
        let expiration = (Utc::now() + Duration::hours(6)).to_rfc3339();
        let token = server
            .mock("PUT", "/latest/api/token")
            .match_header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL_SECONDS)
            .with_status(200)
            .with_body("imds-token")
            .expect(1)
            .create_async()
            .await;
        let roles = server
            .mock("GET", "/latest/meta-data/iam/security-credentials/")
            .match_header(IMDS_TOKEN_HEADER, "imds-token")
            .with_status(200)
            .with_body("prometheus-task-role\n")
            .expect(1)
            .create_async()
            .await;
        let credentials = server
            .mock("GET", "/latest/meta-data/iam/security-credentials/prometheus-task-role")
            .match_header(IMDS_TOKEN_HEADER, "imds-token")
            .with_status(200)
            .with_body(format!(
                r#"{{"Code":"Success","Type":"AWS-HMAC","AccessKeyId":"ASIAIMDS","SecretAccessKey":"sk","Token":"tok","Expiration":"{expiration}"}}"#
            ))
            .expect(1)
            .create_async()
            .await;

        let provider = CredentialsProvider::instance_metadata(server.url());
        let http = reqwest::Client::new();

        let first = provider.credentials(&http).await.unwrap();
        let second = provider.credentials(&http).await.unwrap();

        assert_eq!(first.access_key_id, "ASIAIMDS");
        assert_eq!(first.session_token.as_deref(), Some("tok"));
        assert_eq!(first, second);
        token.assert_async().await;
        roles.assert_async().await;
        credentials.assert_async().await;
    }

    #[tokio::test]
    async fn test_instance_metadata_without_role() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("PUT", "/latest/api/token")
            .with_status(200)
            .with_body("imds-token")
            .create_async()
            .await;
        let _roles = server
            .mock("GET", "/latest/meta-data/iam/security-credentials/")
            .with_status(404)
            .create_async()
            .await;

        let provider = CredentialsProvider::instance_metadata(server.url());
        let result = provider.credentials(&reqwest::Client::new()).await;
        assert!(matches!(result, Err(FetchError::Credentials(_))));
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc::now();
        let mut credentials = Credentials {
            access_key_id: "a".to_string(),
            secret_access_key: "b".to_string(),
            session_token: None,
            expiration: None,
        };
        assert!(!credentials.needs_refresh(now));

        credentials.expiration = Some(now + Duration::minutes(2));
        assert!(credentials.needs_refresh(now));

        credentials.expiration = Some(now + Duration::hours(1));
        assert!(!credentials.needs_refresh(now));
    }
}
