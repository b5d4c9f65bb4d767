//! S3 对象存储客户端

use crate::aws::session::AwsSession;
use crate::aws::sigv4::{encode_path, uri_encode};
use crate::error::FetchError;
use crate::source::ObjectStoreClient;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use url::Url;

/// S3 客户端
pub struct S3Client {
    /// 共享会话
    session: Arc<AwsSession>,
}

impl S3Client {
    /// 创建新的 S3 客户端
    pub fn new(session: Arc<AwsSession>) -> Self {
        Self { session }
    }

    /// 对象URL
    ///
    /// 默认使用虚拟主机风格；设置了端点覆盖时使用路径风格。
    fn object_url(&self, bucket: &str, key: &str) -> Result<Url, FetchError> {
        let encoded_key = encode_path(key.trim_start_matches('/'));

        let raw = match self.session.endpoint_override() {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.as_str().trim_end_matches('/'),
                uri_encode(bucket),
                encoded_key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket,
                self.session.region(),
                encoded_key
            ),
        };

        Url::parse(&raw).map_err(|e| FetchError::Decode {
            service: "s3",
            message: format!("无效的对象地址 {raw}: {e}"),
        })
    }
}

#[async_trait]
impl ObjectStoreClient for S3Client {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<String, FetchError> {
        let url = self.object_url(bucket, key)?;
        let response = self
            .session
            .send_signed("s3", Method::GET, url, Vec::new(), Vec::new())
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                item: format!("s3://{}/{}", bucket, key.trim_start_matches('/')),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Service {
                service: "s3",
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }
}
