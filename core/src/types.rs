//! Wire schema for the account API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch drift between the two crates. Identifiers stay
//! plain strings because the server, not the client, validates them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resource type discriminator for every account record.
pub const ACCOUNT_TYPE: &str = "accounts";

/// `{"data": ...}` wrapper around every request and success body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub data: T,
}

/// An account resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountData {
    pub id: String,
    pub organisation_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Assigned by the server; absent on records that were never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub attributes: AccountAttributes,
}

impl AccountData {
    /// A record ready for creation: type set, no version.
    pub fn new(
        id: impl Into<String>,
        organisation_id: impl Into<String>,
        attributes: AccountAttributes,
    ) -> Self {
        Self {
            id: id.into(),
            organisation_id: organisation_id.into(),
            kind: ACCOUNT_TYPE.to_string(),
            version: None,
            attributes,
        }
    }
}

/// Descriptive fields of an account. Attributes without a dedicated field
/// are carried through untouched in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_classification: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a 400 response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_type_and_no_version() {
        let account = AccountData::new("a", "b", AccountAttributes::default());
        let json = serde_json::to_value(Envelope { data: &account }).unwrap();
        assert_eq!(json["data"]["type"], "accounts");
        assert!(json["data"].get("version").is_none());
    }

    #[test]
    fn unknown_attributes_pass_through() {
        let raw = r#"{"name":["Jane"],"country":"GB","joint_account":true,"status":"confirmed"}"#;
        let attrs: AccountAttributes = serde_json::from_str(raw).unwrap();
        assert_eq!(attrs.name, vec!["Jane"]);
        assert_eq!(attrs.country.as_deref(), Some("GB"));
        assert_eq!(attrs.extra["joint_account"], true);

        let back = serde_json::to_value(&attrs).unwrap();
        assert_eq!(back, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[test]
    fn error_payload_fields_are_optional() {
        let payload: ErrorPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload, ErrorPayload::default());

        let payload: ErrorPayload =
            serde_json::from_str(r#"{"error_message":"id is not a valid uuid"}"#).unwrap();
        assert!(payload.error_code.is_empty());
        assert_eq!(payload.error_message, "id is not a valid uuid");
    }

    #[test]
    fn response_version_is_read() {
        let raw = r#"{"data":{"id":"x","organisation_id":"y","type":"accounts","version":3,"attributes":{"name":["A"]}}}"#;
        let envelope: Envelope<AccountData> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.data.version, Some(3));
    }
}
