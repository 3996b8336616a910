//! Request and response payloads.
//!
//! Bodies are passed through to upstream unchanged. Typed fields cover what the
//! client itself reads or validates; everything else rides along in `extra`, so no
//! field the upstream schema defines is dropped on the way through.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sort options for an organization lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupSort {
    pub field: String,
    pub direction: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgLookupRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<LookupSort>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrgLookupRequest {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            ..Self::default()
        }
    }

    pub fn has_lookup_criteria(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        self.names.iter().any(|name| !name.trim().is_empty())
            || self.urls.iter().any(|url| !url.trim().is_empty())
            || present(&self.profile_url)
            || present(&self.next_page_token)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmographicsRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub org_ids: Vec<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FirmographicsRequest {
    /// Firmographics for exactly one organization.
    pub fn single(organization_id: i64) -> Self {
        Self {
            org_ids: vec![organization_id],
            limit: Some(1),
            ..Self::default()
        }
    }
}

/// Paging options for funding and investment lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsListRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementAndBoardRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub title_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "chatID", default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub message: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn in_conversation(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }
}

/// Forward-looking assessments for an organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commercial_maturity: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_probability: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mosaic_score: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmographicsResponse {
    #[serde(default)]
    pub orgs: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type OrgLookupResponse = Value;
pub type FundingsResponse = Value;
pub type InvestmentsResponse = Value;
pub type PortfolioExitsResponse = Value;
pub type BusinessRelationshipsResponse = Value;
pub type ManagementAndBoardResponse = Value;
pub type ScoutingReportResponse = Value;
pub type ChatResponse = Value;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_request_keeps_unknown_fields() {
        let raw = json!({
            "names": ["Acme"],
            "limit": 5,
            "sort": {"field": "name", "direction": "asc"},
            "includeStealth": true
        });

        let request: OrgLookupRequest = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(request.names, vec!["Acme"]);
        assert_eq!(serde_json::to_value(&request).expect("encode"), raw);
    }

    #[test]
    fn lookup_criteria_ignore_blank_values() {
        let blank = OrgLookupRequest {
            names: vec![String::from("  ")],
            profile_url: Some(String::new()),
            ..OrgLookupRequest::default()
        };
        assert!(!blank.has_lookup_criteria());

        let paged = OrgLookupRequest {
            next_page_token: Some(String::from("cursor")),
            ..OrgLookupRequest::default()
        };
        assert!(paged.has_lookup_criteria());
    }

    #[test]
    fn chat_request_uses_upstream_conversation_key() {
        let request = ChatRequest::new("summarize Acme").in_conversation("c-1");

        assert_eq!(
            serde_json::to_value(&request).expect("encode"),
            json!({"chatID": "c-1", "message": "summarize Acme"})
        );
    }

    #[test]
    fn single_firmographics_request_limits_to_one() {
        assert_eq!(
            serde_json::to_value(FirmographicsRequest::single(42)).expect("encode"),
            json!({"orgIds": [42], "limit": 1})
        );
    }

    #[test]
    fn outlook_response_projects_known_fields_and_keeps_the_rest() {
        let raw = json!({
            "commercialMaturity": {"level": "Scaling"},
            "mosaicScore": {"overall": 812},
            "asOf": "2024-01-01"
        });

        let outlook: OutlookResponse = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(outlook.mosaic_score, Some(json!({"overall": 812})));
        assert!(outlook.exit_probability.is_none());
        assert_eq!(serde_json::to_value(&outlook).expect("encode"), raw);
    }
}
