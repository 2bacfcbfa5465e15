//! Protocol step model.
//!
//! A protocol is an ordered list of steps. Order is expressed as a singly
//! linked list: every step names the step before it through
//! `previous_guid`, and the head of the list leaves it unset.
//!
//! ```text
//!   guid=a           guid=b               guid=c
//!   previous=∅  ◀──  previous=a    ◀──    previous=b, is_substep
//! ```
//!
//! Steps are carriers only. Head uniqueness, cycles and dangling links are
//! left to the remote service, which owns the persisted list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a protocol, in the shape the v4 steps endpoint expects.
///
/// Field names follow the wire format; the `id`/`text`/`previous_id`
/// spellings are accepted as aliases when deserialising tool arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolStep {
    /// Step identifier. Use `generate_guids` for new steps.
    #[serde(rename = "guid", alias = "id")]
    pub id: String,

    /// Instruction text.
    #[serde(rename = "step", alias = "text")]
    pub text: String,

    /// Identifier of the preceding step; unset only for the first step.
    #[serde(
        rename = "previous_guid",
        alias = "previous_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub previous_id: Option<String>,

    /// Section title shown above the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Section colour, e.g. `#94EBFF`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_color: Option<String>,

    /// Nests the step under its predecessor.
    #[serde(default)]
    pub is_substep: bool,
}

impl ProtocolStep {
    /// Creates a top-level step with no predecessor.
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            previous_id: None,
            section: None,
            section_color: None,
            is_substep: false,
        }
    }

    /// Links this step after `previous_id`.
    #[must_use]
    pub fn after(mut self, previous_id: impl Into<String>) -> Self {
        self.previous_id = Some(previous_id.into());
        self
    }

    /// Places this step in a section.
    #[must_use]
    pub fn in_section(mut self, section: impl Into<String>, color: Option<String>) -> Self {
        self.section = Some(section.into());
        self.section_color = color;
        self
    }

    /// Marks this step as a substep of its predecessor.
    #[must_use]
    pub const fn as_substep(mut self) -> Self {
        self.is_substep = true;
        self
    }

    /// Returns the step as the JSON object sent to the API.
    ///
    /// Unset optional fields are left out entirely: the API reads a missing
    /// field as "keep the default" and an explicit `null` as a value.
    #[must_use]
    pub fn to_transport(&self) -> Value {
        serde_json::json!(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn minimal_step_omits_unset_fields() {
        let step = ProtocolStep::new("a", "Mix");
        assert_eq!(
            step.to_transport(),
            json!({"guid": "a", "step": "Mix", "is_substep": false})
        );
    }

    #[test]
    fn linked_step_carries_previous_guid() {
        let step = ProtocolStep::new("b", "Heat").after("a");
        assert_eq!(
            step.to_transport(),
            json!({"guid": "b", "step": "Heat", "previous_guid": "a", "is_substep": false})
        );
    }

    #[test]
    fn section_and_substep_are_serialised() {
        let step = ProtocolStep::new("c", "Vortex")
            .after("b")
            .in_section("Preparation", Some("#94EBFF".to_string()))
            .as_substep();
        let value = step.to_transport();
        assert_eq!(value["section"], "Preparation");
        assert_eq!(value["section_color"], "#94EBFF");
        assert_eq!(value["is_substep"], true);
    }

    #[test]
    fn section_without_colour_omits_colour_key() {
        let value = ProtocolStep::new("d", "Spin")
            .in_section("Cleanup", None)
            .to_transport();
        let object = value.as_object().unwrap();
        assert!(object.contains_key("section"));
        assert!(!object.contains_key("section_color"));
    }

    #[test]
    fn deserialises_wire_names() {
        let step: ProtocolStep = serde_json::from_value(json!({
            "guid": "b",
            "step": "Heat",
            "previous_guid": "a"
        }))
        .unwrap();
        assert_eq!(step, ProtocolStep::new("b", "Heat").after("a"));
    }

    #[test]
    fn deserialises_alias_names() {
        let step: ProtocolStep = serde_json::from_value(json!({
            "id": "b",
            "text": "Heat",
            "previous_id": "a",
            "is_substep": true
        }))
        .unwrap();
        assert_eq!(step, ProtocolStep::new("b", "Heat").after("a").as_substep());
    }

    #[test]
    fn null_previous_guid_reads_as_head() {
        let step: ProtocolStep =
            serde_json::from_value(json!({"guid": "a", "step": "Mix", "previous_guid": null}))
                .unwrap();
        assert!(step.previous_id.is_none());
        assert!(!step.to_transport().as_object().unwrap().contains_key("previous_guid"));
    }

    #[test]
    fn text_is_required() {
        let result: Result<ProtocolStep, _> = serde_json::from_value(json!({"guid": "a"}));
        assert!(result.is_err());
    }
}
