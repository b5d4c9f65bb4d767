//! 配置来源实现
//!
//! `ConfigSource` 只有一个能力：拉取一段文本。按前缀批量拉取是更窄的能力，
//! 只有参数存储提供。

use crate::error::FetchError;
use crate::source::client::{ObjectStoreClient, Parameter, ParameterStoreClient};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// 配置来源trait
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// 拉取完整文本内容
    ///
    /// # 返回
    /// * `Result<String, FetchError>` - 内容或错误
    async fn fetch(&self) -> Result<String, FetchError>;

    /// 用于日志的来源描述
    fn describe(&self) -> String;
}

/// 按前缀批量拉取的能力
#[async_trait]
pub trait PrefixFetch: Send + Sync {
    /// 拉取路径前缀下的全部条目
    ///
    /// 自动跟随续传令牌直到没有下一页，任意一页失败则整体失败。
    async fn fetch_by_prefix(&self) -> Result<Vec<Parameter>, FetchError>;
}

/// 参数读取失败时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    /// 返回错误
    #[default]
    Strict,
    /// 记录日志并返回空字符串
    BestEffort,
}

/// 对象存储来源
pub struct ObjectStoreSource {
    /// 对象存储客户端
    client: Arc<dyn ObjectStoreClient>,
    /// 存储桶
    container: String,
    /// 对象键
    item_key: String,
}

impl ObjectStoreSource {
    /// 创建新的对象存储来源
    pub fn new(client: Arc<dyn ObjectStoreClient>, container: String, item_key: String) -> Self {
        Self {
            client,
            container,
            item_key,
        }
    }
}

#[async_trait]
impl ConfigSource for ObjectStoreSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        debug!("从对象存储拉取: {}", self.describe());
        self.client.get_object(&self.container, &self.item_key).await
    }

    fn describe(&self) -> String {
        format!(
            "s3://{}/{}",
            self.container,
            self.item_key.trim_start_matches('/')
        )
    }
}

/// 参数存储来源
pub struct ParameterStoreSource {
    /// 参数存储客户端
    client: Arc<dyn ParameterStoreClient>,
    /// 参数路径
    path: String,
    /// 读取失败策略
    policy: MissingValuePolicy,
}

impl ParameterStoreSource {
    /// 创建新的参数存储来源，默认读取失败即报错
    pub fn new(client: Arc<dyn ParameterStoreClient>, path: String) -> Self {
        Self {
            client,
            path,
            policy: MissingValuePolicy::Strict,
        }
    }

    /// 设置读取失败策略
    pub fn with_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl ConfigSource for ParameterStoreSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        debug!("从参数存储拉取: {}", self.path);
        match self.client.get_parameter(&self.path).await {
            Ok(value) => Ok(value),
            Err(e) if self.policy == MissingValuePolicy::BestEffort => {
                error!("读取参数 {} 失败，使用空值: {}", self.path, e);
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        format!("ssm:{}", self.path)
    }
}

#[async_trait]
impl PrefixFetch for ParameterStoreSource {
    async fn fetch_by_prefix(&self) -> Result<Vec<Parameter>, FetchError> {
        let mut parameters = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .client
                .get_parameters_by_path(&self.path, next_token.as_deref())
                .await?;
            pages += 1;
            parameters.extend(page.parameters);

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!(
            "路径 {} 下共获取 {} 个参数（{} 页）",
            self.path,
            parameters.len(),
            pages
        );
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::client::ParameterPage;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeObjectStore {
        objects: HashMap<(String, String), String>,
    }

    #[async_trait]
    impl ObjectStoreClient for FakeObjectStore {
        async fn get_object(&self, bucket: &str, key: &str) -> Result<String, FetchError> {
            self.objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| FetchError::NotFound {
                    item: format!("{bucket}/{key}"),
                })
        }
    }

    /// 按续传令牌分页返回参数的替身
    struct PagedParameterStore {
        pages: Vec<ParameterPage>,
        fail_on_page: Option<usize>,
        requested_tokens: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ParameterStoreClient for PagedParameterStore {
        async fn get_parameter(&self, name: &str) -> Result<String, FetchError> {
            if name == "/namespaces" {
                Ok("a,b".to_string())
            } else {
                Err(FetchError::NotFound {
                    item: name.to_string(),
                })
            }
        }

        async fn get_parameters_by_path(
            &self,
            _path: &str,
            next_token: Option<&str>,
        ) -> Result<ParameterPage, FetchError> {
            let mut requested = self.requested_tokens.lock().unwrap();
            requested.push(next_token.map(str::to_string));
            let index = requested.len() - 1;
            if self.fail_on_page == Some(index) {
                return Err(FetchError::Service {
                    service: "ssm",
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            Ok(self.pages[index].clone())
        }
    }

    fn param(name: &str, value: &str) -> Parameter {
        Parameter {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn three_pages() -> Vec<ParameterPage> {
        vec![
            ParameterPage {
                parameters: vec![param("/p/a", "1")],
                next_token: Some("t1".to_string()),
            },
            ParameterPage {
                parameters: vec![param("/p/b", "2"), param("/p/c", "3")],
                next_token: Some("t2".to_string()),
            },
            ParameterPage {
                parameters: vec![param("/p/d", "4")],
                next_token: Some(String::new()),
            },
        ]
    }

    #[tokio::test]
    async fn test_object_store_fetch() {
        let mut objects = HashMap::new();
        objects.insert(
            ("cfg".to_string(), "/prometheus.yml".to_string()),
            "global: {}".to_string(),
        );
        let source = ObjectStoreSource::new(
            Arc::new(FakeObjectStore { objects }),
            "cfg".to_string(),
            "/prometheus.yml".to_string(),
        );

        assert_eq!(source.fetch().await.unwrap(), "global: {}");
        assert_eq!(source.describe(), "s3://cfg/prometheus.yml");
    }

    #[tokio::test]
    async fn test_object_store_fetch_missing_is_error() {
        let source = ObjectStoreSource::new(
            Arc::new(FakeObjectStore {
                objects: HashMap::new(),
            }),
            "cfg".to_string(),
            "/missing.yml".to_string(),
        );

        assert!(matches!(
            source.fetch().await,
            Err(FetchError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_parameter_fetch_strict_and_best_effort() {
        let client = Arc::new(PagedParameterStore {
            pages: Vec::new(),
            fail_on_page: None,
            requested_tokens: Mutex::new(Vec::new()),
        });

        let strict = ParameterStoreSource::new(client.clone(), "/missing".to_string());
        assert!(strict.fetch().await.is_err());

        let lenient = ParameterStoreSource::new(client.clone(), "/missing".to_string())
            .with_policy(MissingValuePolicy::BestEffort);
        assert_eq!(lenient.fetch().await.unwrap(), "");

        let found = ParameterStoreSource::new(client, "/namespaces".to_string())
            .with_policy(MissingValuePolicy::BestEffort);
        assert_eq!(found.fetch().await.unwrap(), "a,b");
    }

    #[tokio::test]
    async fn test_fetch_by_prefix_follows_tokens() {
        let client = Arc::new(PagedParameterStore {
            pages: three_pages(),
            fail_on_page: None,
            requested_tokens: Mutex::new(Vec::new()),
        });
        let source = ParameterStoreSource::new(client.clone(), "/p".to_string());

        let parameters = source.fetch_by_prefix().await.unwrap();
        let names: Vec<&str> = parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["/p/a", "/p/b", "/p/c", "/p/d"]);

        let tokens = client.requested_tokens.lock().unwrap().clone();
        assert_eq!(
            tokens,
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_by_prefix_fails_on_any_page_error() {
        let client = Arc::new(PagedParameterStore {
            pages: three_pages(),
            fail_on_page: Some(1),
            requested_tokens: Mutex::new(Vec::new()),
        });
        let source = ParameterStoreSource::new(client, "/p".to_string())
            .with_policy(MissingValuePolicy::BestEffort);

        assert!(source.fetch_by_prefix().await.is_err());
    }
}
