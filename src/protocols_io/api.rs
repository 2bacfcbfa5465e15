//! Typed protocols.io operations.
//!
//! Each operation builds a path and body, hands them to the
//! [`ResourceBridge`], and returns whatever the bridge returns: the decoded
//! response or an error record.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::bridge::{ErrorRecord, ResourceBridge, ResourcePath, ResourceRequest};
use super::ids::generate_id;
use super::step::ProtocolStep;
use crate::config::ApiConfig;
use crate::error::BridgeError;

/// Protocol type sent when creating a protocol (a standard protocol).
const STANDARD_PROTOCOL_TYPE: u32 = 1;

/// A protocol reference: numeric id or string id/URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolId {
    /// Numeric protocol id.
    Number(u64),
    /// String id, GUID or URI slug.
    Text(String),
}

impl ProtocolId {
    /// Checks that the id can be used as a single path segment.
    ///
    /// # Errors
    ///
    /// Returns a reason if the id is empty, is `.` or `..`, or contains
    /// `/`, `?`, `#`, `%` or whitespace.
    pub fn check(&self) -> Result<(), &'static str> {
        let Self::Text(text) = self else {
            return Ok(());
        };
        if text.is_empty() {
            return Err("must not be empty");
        }
        if text == "." || text == ".." {
            return Err("must not be a dot segment");
        }
        if text
            .chars()
            .any(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace())
        {
            return Err("must not contain '/', '?', '#', '%' or whitespace");
        }
        Ok(())
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for ProtocolId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for ProtocolId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// Which protocols a keyword search covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFilter {
    /// All public protocols.
    #[default]
    Public,
    /// The user's public protocols.
    UserPublic,
    /// The user's private protocols.
    UserPrivate,
    /// Protocols shared with the user.
    SharedWithUser,
}

impl ProtocolFilter {
    /// Returns the query-string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::UserPublic => "user_public",
            Self::UserPrivate => "user_private",
            Self::SharedWithUser => "shared_with_user",
        }
    }
}

/// Keyword search parameters. Pages are passed through, never traversed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeywordSearch {
    /// Search scope.
    #[serde(default)]
    pub filter: ProtocolFilter,
    /// Search text.
    pub keyword: String,
    /// Results per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// 1-based page number.
    #[serde(default = "default_page_id")]
    pub page_id: u32,
}

impl KeywordSearch {
    /// Creates a search for the first page of public protocols.
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            filter: ProtocolFilter::default(),
            keyword: keyword.into(),
            page_size: default_page_size(),
            page_id: default_page_id(),
        }
    }
}

const fn default_page_size() -> u32 {
    10
}

const fn default_page_id() -> u32 {
    1
}

/// Protocol metadata changes. Unset fields are left untouched remotely.
///
/// Blank strings deserialise as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolUpdate {
    /// Protocol title.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Abstract.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// "Before start" notes.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub before_start: Option<String>,
    /// Guidelines.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub guidelines: Option<String>,
    /// Safety warnings.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Materials, as plain text.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub materials_text: Option<String>,
    /// Numbered reference list backing the citations in the protocol.
    #[serde(default, deserialize_with = "non_blank", skip_serializing_if = "Option::is_none")]
    pub protocol_references: Option<String>,
}

impl ProtocolUpdate {
    /// Returns the request body: only the fields that are set.
    #[must_use]
    pub fn to_body(&self) -> Value {
        json!(self)
    }
}

fn non_blank<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// The protocols.io operations exposed as tools.
pub struct ProtocolsIo {
    bridge: ResourceBridge,
}

impl ProtocolsIo {
    /// Creates the client from API settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, BridgeError> {
        Ok(Self::from_bridge(ResourceBridge::new(config)?))
    }

    /// Wraps an existing bridge.
    #[must_use]
    pub const fn from_bridge(bridge: ResourceBridge) -> Self {
        Self { bridge }
    }

    /// Fetches the authenticated user's profile.
    pub async fn get_profile(&self) -> Value {
        self.bridge
            .access(ResourceRequest::get("/v3/session/profile"))
            .await
    }

    /// Creates an empty protocol under a freshly generated id.
    pub async fn create_protocol(&self) -> Value {
        let path = ResourcePath::new("/v3/protocols").segment(generate_id());
        self.bridge
            .access(ResourceRequest::post(
                path,
                json!({ "type_id": STANDARD_PROTOCOL_TYPE }),
            ))
            .await
    }

    /// Lists every protocol owned by the authenticated user.
    ///
    /// The username comes from the profile. If the profile has no
    /// `user.username` (including when it is an error record) it is returned
    /// unchanged and no second request is made.
    pub async fn get_user_protocol_list(&self) -> Value {
        let profile = self.get_profile().await;

        let Some(username) = profile
            .pointer("/user/username")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
        else {
            if !ErrorRecord::is_error_record(&profile) {
                tracing::warn!("Profile response has no user.username");
            }
            return profile;
        };

        let path = ResourcePath::new("/v3/researchers")
            .segment(username)
            .join("protocols");
        let request = ResourceRequest::get(path).with_query("filter", "user_all");
        self.bridge.access(request).await
    }

    /// Searches protocols by keyword.
    pub async fn search_protocols(&self, search: &KeywordSearch) -> Value {
        let request = ResourceRequest::get("/v3/protocols")
            .with_query("filter", search.filter.as_str())
            .with_query("key", &search.keyword)
            .with_query("page_size", search.page_size)
            .with_query("page_id", search.page_id);
        self.bridge.access(request).await
    }

    /// Updates protocol metadata with the fields set in `update`.
    pub async fn update_protocol(&self, protocol_id: &ProtocolId, update: &ProtocolUpdate) -> Value {
        self.bridge
            .access(ResourceRequest::put(
                protocol_path(protocol_id),
                update.to_body(),
            ))
            .await
    }

    /// Fetches the steps of a protocol.
    pub async fn get_protocol_steps(&self, protocol_id: &ProtocolId) -> Value {
        self.bridge
            .access(ResourceRequest::get(steps_path(protocol_id)))
            .await
    }

    /// Creates or updates steps. Existing guids are updated, new ones created.
    pub async fn save_protocol_steps(&self, protocol_id: &ProtocolId, steps: &[ProtocolStep]) -> Value {
        let steps: Vec<Value> = steps.iter().map(ProtocolStep::to_transport).collect();
        self.bridge
            .access(ResourceRequest::post(
                steps_path(protocol_id),
                json!({ "steps": steps }),
            ))
            .await
    }

    /// Deletes steps by guid.
    pub async fn delete_protocol_steps(&self, protocol_id: &ProtocolId, step_ids: &[String]) -> Value {
        self.bridge
            .access(ResourceRequest::delete(
                steps_path(protocol_id),
                json!({ "steps": step_ids }),
            ))
            .await
    }
}

fn protocol_path(protocol_id: &ProtocolId) -> ResourcePath {
    ResourcePath::new("/v4/protocols").segment(protocol_id)
}

fn steps_path(protocol_id: &ProtocolId) -> ResourcePath {
    protocol_path(protocol_id).join("steps")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_id_accepts_number_or_string() {
        let id: ProtocolId = serde_json::from_value(json!(1234)).unwrap();
        assert_eq!(id, ProtocolId::Number(1234));
        assert_eq!(id.to_string(), "1234");

        let id: ProtocolId = serde_json::from_value(json!("pcr-setup-abc12")).unwrap();
        assert_eq!(id, ProtocolId::from("pcr-setup-abc12"));
        assert!(id.check().is_ok());
    }

    #[test]
    fn protocol_id_rejects_path_characters() {
        assert!(ProtocolId::from("").check().is_err());
        assert!(ProtocolId::from("1/steps").check().is_err());
        assert!(ProtocolId::from("1?x=y").check().is_err());
        assert!(ProtocolId::from("a b").check().is_err());
        assert!(ProtocolId::from("%2e%2e").check().is_err());
        assert!(ProtocolId::from("abc%2Fsteps").check().is_err());
        assert!(ProtocolId::from("v1.2-setup").check().is_ok());
    }

    #[test]
    fn protocol_id_rejects_dot_segments() {
        assert!(ProtocolId::from(".").check().is_err());
        assert!(ProtocolId::from("..").check().is_err());
    }

    #[test]
    fn protocol_id_is_one_path_segment() {
        assert_eq!(
            steps_path(&ProtocolId::Number(12)).segments(),
            ["v4", "protocols", "12", "steps"]
        );
        assert_eq!(
            protocol_path(&ProtocolId::from("pcr-setup-abc12")).to_string(),
            "/v4/protocols/pcr-setup-abc12"
        );
        assert!(ProtocolId::from(7).check().is_ok());
    }

    #[test]
    fn filter_values() {
        let filter: ProtocolFilter = serde_json::from_value(json!("shared_with_user")).unwrap();
        assert_eq!(filter, ProtocolFilter::SharedWithUser);
        assert_eq!(ProtocolFilter::UserPrivate.as_str(), "user_private");
        assert!(serde_json::from_value::<ProtocolFilter>(json!("everyone")).is_err());
    }

    #[test]
    fn keyword_search_defaults() {
        let search: KeywordSearch = serde_json::from_value(json!({"keyword": "PCR"})).unwrap();
        assert_eq!(search, KeywordSearch::new("PCR"));
        assert_eq!(search.page_size, 10);
        assert_eq!(search.page_id, 1);
        assert_eq!(search.filter, ProtocolFilter::Public);
    }

    #[test]
    fn update_with_only_title() {
        let update = ProtocolUpdate {
            title: Some("Plasmid miniprep".to_string()),
            ..ProtocolUpdate::default()
        };
        assert_eq!(update.to_body(), json!({"title": "Plasmid miniprep"}));
    }

    #[test]
    fn blank_update_fields_are_unset() {
        let update: ProtocolUpdate = serde_json::from_value(json!({
            "title": "Plasmid miniprep",
            "description": "",
            "guidelines": "   ",
            "warning": null
        }))
        .unwrap();
        assert_eq!(update.to_body(), json!({"title": "Plasmid miniprep"}));
    }

    #[test]
    fn empty_update_is_empty_object() {
        assert_eq!(ProtocolUpdate::default().to_body(), json!({}));
    }
}
