//! 远端存储客户端接口
//!
//! 配置来源只依赖这里定义的trait，具体实现（AWS 或测试替身）在构造时注入

use crate::error::FetchError;
use async_trait::async_trait;

/// 单个参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// 参数完整名称
    pub name: String,
    /// 参数值
    pub value: String,
}

/// 按路径查询的一页结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPage {
    /// 本页参数
    pub parameters: Vec<Parameter>,
    /// 下一页的续传令牌
    pub next_token: Option<String>,
}

/// 对象存储客户端trait
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// 读取完整对象内容
    ///
    /// # 参数
    /// * `bucket` - 存储桶
    /// * `key` - 对象键
    ///
    /// # 返回
    /// * `Result<String, FetchError>` - 对象内容或错误
    async fn get_object(&self, bucket: &str, key: &str) -> Result<String, FetchError>;
}

/// 参数存储客户端trait
#[async_trait]
pub trait ParameterStoreClient: Send + Sync {
    /// 读取单个参数的值
    async fn get_parameter(&self, name: &str) -> Result<String, FetchError>;

    /// 读取路径下的一页参数
    ///
    /// # 参数
    /// * `path` - 参数路径前缀
    /// * `next_token` - 上一页返回的续传令牌
    async fn get_parameters_by_path(
        &self,
        path: &str,
        next_token: Option<&str>,
    ) -> Result<ParameterPage, FetchError>;
}
