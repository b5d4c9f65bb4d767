//! AWS Cloud Map 服务发现
//!
//! 按命名空间列出服务及其实例，生成 Prometheus file_sd 文档

use crate::aws::session::AwsSession;
use crate::discovery::{render_target_groups, ScrapeConfigBuilder, TargetGroup};
use crate::error::FetchError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SERVICE: &str = "servicediscovery";
const TARGET_PREFIX: &str = "Route53AutoNaming_v20170314";

const ATTR_IPV4: &str = "AWS_INSTANCE_IPV4";
const ATTR_PORT: &str = "AWS_INSTANCE_PORT";

/// 实例属性到标签名的映射
const ATTRIBUTE_LABELS: [(&str, &str); 4] = [
    ("ECS_CLUSTER_NAME", "ecs_cluster"),
    ("ECS_SERVICE_NAME", "ecs_service"),
    ("ECS_TASK_DEFINITION_FAMILY", "ecs_task_definition_family"),
    ("AVAILABILITY_ZONE", "availability_zone"),
];

/// 分页响应
trait Page: DeserializeOwned {
    type Item;

    fn split(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NamespaceSummary {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListNamespacesResponse {
    #[serde(default)]
    namespaces: Vec<NamespaceSummary>,
    next_token: Option<String>,
}

impl Page for ListNamespacesResponse {
    type Item = NamespaceSummary;

    fn split(self) -> (Vec<Self::Item>, Option<String>) {
        (self.namespaces, self.next_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceSummary {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListServicesResponse {
    #[serde(default)]
    services: Vec<ServiceSummary>,
    next_token: Option<String>,
}

impl Page for ListServicesResponse {
    type Item = ServiceSummary;

    fn split(self) -> (Vec<Self::Item>, Option<String>) {
        (self.services, self.next_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstanceSummary {
    id: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListInstancesResponse {
    #[serde(default)]
    instances: Vec<InstanceSummary>,
    next_token: Option<String>,
}

impl Page for ListInstancesResponse {
    type Item = InstanceSummary;

    fn split(self) -> (Vec<Self::Item>, Option<String>) {
        (self.instances, self.next_token)
    }
}

/// Cloud Map 服务发现
pub struct CloudMapDiscovery {
    /// 共享会话
    session: Arc<AwsSession>,
}

impl CloudMapDiscovery {
    /// 创建新的服务发现
    pub fn new(session: Arc<AwsSession>) -> Self {
        Self { session }
    }

    /// 拉取所有分页
    async fn list_all<P>(&self, operation: &str, mut payload: Value) -> Result<Vec<P::Item>, FetchError>
    where
        P: Page + Send,
        P::Item: Send,
    {
        let target = format!("{TARGET_PREFIX}.{operation}");
        let mut items = Vec::new();

        loop {
            let page: P = self.session.call_json(SERVICE, &target, &payload).await?;
            let (mut batch, next_token) = page.split();
            items.append(&mut batch);

            match next_token {
                Some(token) if !token.is_empty() => payload["NextToken"] = json!(token),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn namespace_ids(&self) -> Result<HashMap<String, String>, FetchError> {
        let namespaces: Vec<NamespaceSummary> = self
            .list_all::<ListNamespacesResponse>("ListNamespaces", json!({}))
            .await?;
        Ok(namespaces.into_iter().map(|ns| (ns.name, ns.id)).collect())
    }

    async fn services(&self, namespace_id: &str) -> Result<Vec<ServiceSummary>, FetchError> {
        self.list_all::<ListServicesResponse>(
            "ListServices",
            json!({
                "Filters": [{
                    "Name": "NAMESPACE_ID",
                    "Values": [namespace_id],
                    "Condition": "EQ"
                }]
            }),
        )
        .await
    }

    async fn instances(&self, service_id: &str) -> Result<Vec<InstanceSummary>, FetchError> {
        self.list_all::<ListInstancesResponse>("ListInstances", json!({ "ServiceId": service_id }))
            .await
    }
}

/// 把单个实例转换为目标组，缺少地址或端口时返回 `None`
fn instance_target_group(
    namespace: &str,
    service: &str,
    instance: &InstanceSummary,
) -> Option<TargetGroup> {
    let ip = instance.attributes.get(ATTR_IPV4)?;
    let port = instance.attributes.get(ATTR_PORT)?;

    let mut labels = BTreeMap::new();
    labels.insert("job".to_string(), service.to_string());
    labels.insert("cloudmap_namespace".to_string(), namespace.to_string());
    labels.insert("cloudmap_service".to_string(), service.to_string());
    labels.insert("cloudmap_instance_id".to_string(), instance.id.clone());
    for (attribute, label) in ATTRIBUTE_LABELS {
        if let Some(value) = instance.attributes.get(attribute) {
            labels.insert(label.to_string(), value.clone());
        }
    }

    Some(TargetGroup {
        targets: vec![format!("{ip}:{port}")],
        labels,
    })
}

#[async_trait]
impl ScrapeConfigBuilder for CloudMapDiscovery {
    async fn build_scrape_config(&self, namespaces: &[String]) -> Result<String, FetchError> {
        let namespace_ids = self.namespace_ids().await?;
        let mut groups = Vec::new();

        for namespace in namespaces {
            let Some(namespace_id) = namespace_ids.get(namespace) else {
                warn!("CloudMap 中不存在命名空间 {:?}，跳过", namespace);
                continue;
            };

            for service in self.services(namespace_id).await? {
                let instances = self.instances(&service.id).await?;
                let before = groups.len();

                for instance in &instances {
                    match instance_target_group(namespace, &service.name, instance) {
                        Some(group) => groups.push(group),
                        None => debug!(
                            "实例 {} 缺少 {} 或 {}，跳过",
                            instance.id, ATTR_IPV4, ATTR_PORT
                        ),
                    }
                }

                debug!(
                    "服务 {}/{}: {} 个目标",
                    namespace,
                    service.name,
                    groups.len() - before
                );
            }
        }

        info!("CloudMap 发现 {} 个抓取目标", groups.len());
        render_target_groups(&groups)
    }
}
