use serde::Deserialize;

use crate::aggregate::{GroupedJobCard, StatusCounts};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The aggregate built by the most recent load. Replaced wholesale on the
/// next load, never patched.
pub struct LoadedView {
    pub analyst_name: Option<String>,
    pub groups: Vec<GroupedJobCard>,
    pub counts: StatusCounts,
    pub unmatched_reports: Vec<String>,
}

pub struct AppState {
    pub view: Option<LoadedView>,
}
