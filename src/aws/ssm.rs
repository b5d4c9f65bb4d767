//! SSM Parameter Store 客户端

use crate::aws::session::AwsSession;
use crate::error::FetchError;
use crate::source::{Parameter, ParameterPage, ParameterStoreClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const SERVICE: &str = "ssm";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SsmParameter {
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParameterResponse {
    parameter: SsmParameter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetParametersByPathResponse {
    #[serde(default)]
    parameters: Vec<SsmParameter>,
    next_token: Option<String>,
}

/// SSM 客户端
pub struct SsmClient {
    /// 共享会话
    session: Arc<AwsSession>,
}

impl SsmClient {
    /// 创建新的 SSM 客户端
    pub fn new(session: Arc<AwsSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ParameterStoreClient for SsmClient {
    async fn get_parameter(&self, name: &str) -> Result<String, FetchError> {
        let response: GetParameterResponse = self
            .session
            .call_json(
                SERVICE,
                "AmazonSSM.GetParameter",
                &json!({ "Name": name, "WithDecryption": true }),
            )
            .await?;
        Ok(response.parameter.value)
    }

    async fn get_parameters_by_path(
        &self,
        path: &str,
        next_token: Option<&str>,
    ) -> Result<ParameterPage, FetchError> {
        let mut payload = json!({
            "Path": path,
            "WithDecryption": true,
            "Recursive": false,
        });
        if let Some(token) = next_token {
            payload["NextToken"] = json!(token);
        }

        let response: GetParametersByPathResponse = self
            .session
            .call_json(SERVICE, "AmazonSSM.GetParametersByPath", &payload)
            .await?;

        Ok(ParameterPage {
            parameters: response
                .parameters
                .into_iter()
                .map(|p| Parameter {
                    name: p.name,
                    value: p.value,
                })
                .collect(),
            next_token: response.next_token,
        })
    }
}
