use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolveModeName {
    Naive,
    Fast,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct PreviewNode {
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct PreviewEdge {
    pub source: PreviewNode,
    pub target: PreviewNode,
    pub relation: String,
}

/// Read-only snapshot of the resolved link graph handed to preview renderers.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct GraphPreview {
    pub nodes: Vec<PreviewNode>,
    pub edges: Vec<PreviewEdge>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct WarningEntry {
    pub kind: String,
    pub record: String,
    pub relation: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct RunReport {
    pub schema_version: u32,
    pub mode: ResolveModeName,
    pub dry_run: bool,
    pub sections: usize,
    pub records: usize,
    pub links: usize,
    #[serde(default)]
    pub warnings: Vec<WarningEntry>,
    pub output: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}
