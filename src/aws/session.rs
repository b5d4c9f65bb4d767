//! AWS 会话
//!
//! 持有区域、端点覆盖、HTTP客户端和凭证提供者，由各服务客户端共享

use crate::aws::credentials::CredentialsProvider;
use crate::aws::sigv4::{self, SigningRequest};
use crate::error::{ConfigError, FetchError};
use chrono::Utc;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// AWS JSON 1.1 协议的内容类型
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// 单次请求超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// AWS JSON 协议的错误响应
#[derive(Debug, Default, Deserialize)]
struct JsonErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// AWS 会话
#[derive(Debug)]
pub struct AwsSession {
    /// 区域
    region: String,
    /// 端点覆盖
    endpoint_override: Option<Url>,
    /// HTTP客户端
    http: Client,
    /// 凭证提供者
    credentials: CredentialsProvider,
}

impl AwsSession {
    /// 创建新的会话
    ///
    /// # 参数
    /// * `region` - 区域
    /// * `endpoint_override` - 所有服务共用的端点覆盖
    /// * `credentials` - 凭证提供者
    pub fn new(
        region: impl Into<String>,
        endpoint_override: Option<&str>,
        credentials: CredentialsProvider,
    ) -> Result<Self, ConfigError> {
        let endpoint_override = endpoint_override
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::InvalidLocation {
                    location: raw.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| ConfigError::Unsupported(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            region: region.into(),
            endpoint_override,
            http,
            credentials,
        })
    }

    /// 从启动参数和进程环境初始化会话
    ///
    /// 区域依次取参数、`AWS_DEFAULT_REGION`。
    pub fn from_env(region: Option<&str>, endpoint_override: Option<&str>) -> Result<Self, ConfigError> {
        let region = region
            .map(str::to_string)
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::MissingVar { var: "AWS_REGION" })?;

        let credentials = CredentialsProvider::from_env()?;
        Self::new(region, endpoint_override, credentials)
    }

    /// 区域
    pub fn region(&self) -> &str {
        &self.region
    }

    /// 端点覆盖
    pub fn endpoint_override(&self) -> Option<&Url> {
        self.endpoint_override.as_ref()
    }

    /// 服务端点
    pub fn endpoint(&self, service: &str) -> Result<Url, FetchError> {
        match &self.endpoint_override {
            Some(url) => Ok(url.clone()),
            None => {
                let raw = format!("https://{service}.{}.amazonaws.com/", self.region);
                Url::parse(&raw).map_err(|e| FetchError::Decode {
                    service: "endpoint",
                    message: e.to_string(),
                })
            }
        }
    }

    /// 发送签名请求
    pub(crate) async fn send_signed(
        &self,
        service: &str,
        method: Method,
        url: Url,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Result<Response, FetchError> {
        let credentials = self.credentials.credentials(&self.http).await?;
        let signed = sigv4::sign(
            &SigningRequest {
                method: method.as_str(),
                url: &url,
                headers: &headers,
                payload: &body,
                include_content_sha256: service == "s3",
            },
            &credentials,
            &self.region,
            service,
            Utc::now(),
        )?;

        debug!("{} {} {}", service, method, url);

        let mut request = self.http.request(method, url);
        for (name, value) in headers.iter().chain(signed.iter()) {
            request = request.header(name.as_str(), value.as_str());
        }
        Ok(request.body(body).send().await?)
    }

    /// 调用 AWS JSON 1.1 协议接口
    ///
    /// # 参数
    /// * `service` - 服务名，同时作为端点前缀和签名名称
    /// * `target` - `X-Amz-Target`
    /// * `payload` - 请求体
    pub(crate) async fn call_json<T: DeserializeOwned>(
        &self,
        service: &'static str,
        target: &str,
        payload: &serde_json::Value,
    ) -> Result<T, FetchError> {
        let url = self.endpoint(service)?;
        let body = serde_json::to_vec(payload).map_err(|e| FetchError::Decode {
            service,
            message: e.to_string(),
        })?;
        let headers = vec![
            ("content-type".to_string(), AMZ_JSON_CONTENT_TYPE.to_string()),
            ("x-amz-target".to_string(), target.to_string()),
        ];

        let response = self
            .send_signed(service, Method::POST, url, headers, body)
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error: JsonErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let error_type = error
                .error_type
                .as_deref()
                .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
                .unwrap_or_default();

            if error_type.ends_with("NotFound") {
                return Err(FetchError::NotFound {
                    item: format!("{target}: {}", error.message.unwrap_or(error_type)),
                });
            }
            return Err(FetchError::Service {
                service,
                status: status.as_u16(),
                message: format!("{} {}", error_type, error.message.unwrap_or(text))
                    .trim()
                    .to_string(),
            });
        }

        serde_json::from_str(&text).map_err(|e| FetchError::Decode {
            service,
            message: e.to_string(),
        })
    }
}
