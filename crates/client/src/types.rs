use serde::{Deserialize, Serialize};
use templater_core::{Artifact, EntityId, SideChannelIds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialGenerateRequest {
    pub input_document: String,
    pub instructions: String,
    pub domain_hint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialGenerateResponse {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub total_units: u64,
    #[serde(default)]
    pub last_processed_unit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_channel_ids: Option<SideChannelIds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueGenerateRequest {
    pub input_document: String,
    pub instructions: String,
    pub last_processed_unit: u64,
    pub previous_artifact_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_ref: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_ref: Option<EntityId>,
    pub domain_hint: String,
    pub side_channel_ids: SideChannelIds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueGenerateResponse {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub last_processed_unit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_units: Option<u64>,
}

/// Error body returned by the generation service.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}
