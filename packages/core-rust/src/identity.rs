//! Tenant identity carried by every inbound tool call and webhook delivery.
//!
//! The chat-platform gateway attaches a flat metadata object to each request.
//! [`TenantIdentity::from_metadata`] translates the gateway's field names into
//! a typed identity. Only `robot_code` is used for routing; every other field
//! is passed through to handlers untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Metadata;

// ---------------------------------------------------------------------------
// Translation table
// ---------------------------------------------------------------------------

/// Identity attribute a metadata key maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    WeChatClientPort,
    RobotId,
    RobotCode,
    RobotRedisDb,
    RobotWxId,
    FromWxId,
    SenderWxId,
    MessageId,
    RefMessageId,
}

/// Metadata keys recognised on inbound requests, as sent by the gateway.
///
/// Keys not listed here are ignored.
pub const METADATA_FIELDS: [(&str, IdentityField); 9] = [
    ("WeChatClientPort", IdentityField::WeChatClientPort),
    ("RobotID", IdentityField::RobotId),
    ("RobotCode", IdentityField::RobotCode),
    ("RobotRedisDB", IdentityField::RobotRedisDb),
    ("RobotWxID", IdentityField::RobotWxId),
    ("FromWxID", IdentityField::FromWxId),
    ("SenderWxID", IdentityField::SenderWxId),
    ("MessageID", IdentityField::MessageId),
    ("RefMessageID", IdentityField::RefMessageId),
];

// ---------------------------------------------------------------------------
// TenantIdentity
// ---------------------------------------------------------------------------

/// Resolved identity of the robot (tenant) a request belongs to.
///
/// Built fresh for every request and discarded when the request ends.
/// Absent metadata fields stay at their empty/zero default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantIdentity {
    /// Port of the robot's chat client, used to reach its HTTP API.
    pub we_chat_client_port: String,
    pub robot_id: i64,
    /// Routing key: the tenant's database name.
    pub robot_code: String,
    pub robot_redis_db: i64,
    /// The robot's own chat-platform id.
    pub robot_wx_id: String,
    /// Conversation the triggering message came from.
    pub from_wx_id: String,
    pub sender_wx_id: String,
    pub message_id: i64,
    /// Id of a referenced (quoted) message, 0 when none.
    pub ref_message_id: i64,
}

/// Result of translating request metadata into a [`TenantIdentity`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIdentity {
    pub identity: TenantIdentity,
    /// Metadata keys that were present but carried a value of the wrong shape.
    /// Their attributes were left at the default.
    pub malformed_fields: Vec<&'static str>,
}

impl ParsedIdentity {
    /// True when at least one recognised field had to be defaulted.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.malformed_fields.is_empty()
    }
}

impl TenantIdentity {
    /// Translates gateway metadata into an identity.
    ///
    /// Never fails. A recognised key whose value has the wrong shape leaves the
    /// attribute at its default and is reported in
    /// [`ParsedIdentity::malformed_fields`]. String attributes accept JSON
    /// strings and numbers; integer attributes accept JSON integers and
    /// strings holding an integer. `null` counts as absent.
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> ParsedIdentity {
        let mut parsed = ParsedIdentity::default();

        for (key, field) in METADATA_FIELDS {
            let Some(value) = meta.get(key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if !parsed.identity.assign(field, value) {
                parsed.malformed_fields.push(key);
            }
        }

        parsed
    }

    /// Returns true when the identity carries a routing key.
    #[must_use]
    pub fn has_robot_code(&self) -> bool {
        !self.robot_code.is_empty()
    }

    fn assign(&mut self, field: IdentityField, value: &Value) -> bool {
        match field {
            IdentityField::WeChatClientPort => set_string(&mut self.we_chat_client_port, value),
            IdentityField::RobotId => set_int(&mut self.robot_id, value),
            IdentityField::RobotCode => set_string(&mut self.robot_code, value),
            IdentityField::RobotRedisDb => set_int(&mut self.robot_redis_db, value),
            IdentityField::RobotWxId => set_string(&mut self.robot_wx_id, value),
            IdentityField::FromWxId => set_string(&mut self.from_wx_id, value),
            IdentityField::SenderWxId => set_string(&mut self.sender_wx_id, value),
            IdentityField::MessageId => set_int(&mut self.message_id, value),
            IdentityField::RefMessageId => set_int(&mut self.ref_message_id, value),
        }
    }
}

fn set_string(slot: &mut String, value: &Value) -> bool {
    match value {
        Value::String(s) => {
            slot.clone_from(s);
            true
        }
        Value::Number(n) => {
            *slot = n.to_string();
            true
        }
        _ => false,
    }
}

fn set_int(slot: &mut i64, value: &Value) -> bool {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(value: serde_json::Value) -> Metadata {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("test metadata must be an object"),
        }
    }

    #[test]
    fn full_metadata_maps_every_field() {
        let parsed = TenantIdentity::from_metadata(&meta(json!({
            "WeChatClientPort": "9002",
            "RobotID": 7,
            "RobotCode": "shop001",
            "RobotRedisDB": 3,
            "RobotWxID": "wxid_robot",
            "FromWxID": "room1@chatroom",
            "SenderWxID": "user1",
            "MessageID": 42,
            "RefMessageID": 41,
        })));

        assert!(!parsed.is_degraded());
        let id = parsed.identity;
        assert_eq!(id.we_chat_client_port, "9002");
        assert_eq!(id.robot_id, 7);
        assert_eq!(id.robot_code, "shop001");
        assert_eq!(id.robot_redis_db, 3);
        assert_eq!(id.robot_wx_id, "wxid_robot");
        assert_eq!(id.from_wx_id, "room1@chatroom");
        assert_eq!(id.sender_wx_id, "user1");
        assert_eq!(id.message_id, 42);
        assert_eq!(id.ref_message_id, 41);
    }

    #[test]
    fn absent_fields_stay_default() {
        let parsed = TenantIdentity::from_metadata(&meta(json!({ "FromWxID": "room1" })));
        assert_eq!(parsed.identity.from_wx_id, "room1");
        assert_eq!(parsed.identity.robot_code, "");
        assert_eq!(parsed.identity.message_id, 0);
        assert!(!parsed.identity.has_robot_code());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let parsed = TenantIdentity::from_metadata(&meta(json!({
            "RobotCode": "a",
            "progressToken": 5,
            "robot_code": "should-not-win",
        })));
        assert_eq!(parsed.identity.robot_code, "a");
        assert!(!parsed.is_degraded());
    }

    #[test]
    fn wrong_shaped_values_default_and_are_reported() {
        let parsed = TenantIdentity::from_metadata(&meta(json!({
            "RobotCode": "shop001",
            "MessageID": "not-a-number",
            "RobotID": {"nested": true},
            "FromWxID": ["room"],
        })));

        assert_eq!(parsed.identity.robot_code, "shop001");
        assert_eq!(parsed.identity.message_id, 0);
        assert_eq!(parsed.identity.robot_id, 0);
        assert_eq!(parsed.identity.from_wx_id, "");
        assert!(parsed.is_degraded());
        assert_eq!(
            parsed.malformed_fields,
            vec!["RobotID", "FromWxID", "MessageID"]
        );
    }

    #[test]
    fn numeric_strings_and_numbers_are_coerced() {
        let parsed = TenantIdentity::from_metadata(&meta(json!({
            "WeChatClientPort": 9002,
            "MessageID": "42",
            "RefMessageID": null,
        })));
        assert_eq!(parsed.identity.we_chat_client_port, "9002");
        assert_eq!(parsed.identity.message_id, 42);
        assert_eq!(parsed.identity.ref_message_id, 0);
        assert!(!parsed.is_degraded());
    }

    #[test]
    fn fractional_integers_are_malformed() {
        let parsed = TenantIdentity::from_metadata(&meta(json!({ "RobotRedisDB": 1.5 })));
        assert_eq!(parsed.identity.robot_redis_db, 0);
        assert_eq!(parsed.malformed_fields, vec!["RobotRedisDB"]);
    }

    #[test]
    fn translation_table_maps_each_field_once() {
        for (i, (_, field)) in METADATA_FIELDS.iter().enumerate() {
            let later = METADATA_FIELDS[i + 1..].iter().filter(|(_, f)| f == field).count();
            assert_eq!(later, 0, "{field:?} appears more than once");
        }
    }
}
