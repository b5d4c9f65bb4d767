//! 服务发现模块
//!
//! 把命名空间列表转换为 Prometheus 文件服务发现（file_sd）文档

use crate::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 抓取配置生成器trait
#[async_trait]
pub trait ScrapeConfigBuilder: Send + Sync {
    /// 根据命名空间列表生成抓取目标文档
    ///
    /// # 参数
    /// * `namespaces` - 命名空间名称，按原样传入（可能包含空字符串）
    ///
    /// # 返回
    /// * `Result<String, FetchError>` - 序列化后的文档
    async fn build_scrape_config(&self, namespaces: &[String]) -> Result<String, FetchError>;
}

/// file_sd 中的一个目标组
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// `host:port` 形式的抓取目标
    pub targets: Vec<String>,
    /// 附加到所有目标上的标签
    pub labels: BTreeMap<String, String>,
}

/// 序列化目标组列表
pub fn render_target_groups(groups: &[TargetGroup]) -> Result<String, FetchError> {
    serde_json::to_string_pretty(groups).map_err(|e| FetchError::Decode {
        service: "file_sd",
        message: e.to_string(),
    })
}

/// 把逗号分隔的命名空间文本拆分为列表
///
/// 不去除空白，也不过滤空项。
pub fn split_namespaces(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_namespaces() {
        assert_eq!(split_namespaces("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_namespaces("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_namespaces(" a ,b"), vec![" a ", "b"]);
        assert_eq!(split_namespaces(""), vec![""]);
    }

    #[test]
    fn test_render_target_groups() {
        let mut labels = BTreeMap::new();
        labels.insert("job".to_string(), "api".to_string());
        let groups = vec![TargetGroup {
            targets: vec!["10.0.0.1:9100".to_string()],
            labels,
        }];

        let rendered = render_target_groups(&groups).unwrap();
        let parsed: Vec<TargetGroup> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, groups);

        assert_eq!(render_target_groups(&[]).unwrap(), "[]");
    }
}
