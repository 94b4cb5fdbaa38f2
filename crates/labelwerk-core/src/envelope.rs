// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result envelope delivered back to command callers.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tag carried in the envelope `type` field for successful outcomes.
const KIND_SUCCESS: &str = "success";

/// Structured success payload returned to a caller.
///
/// The field names are the wire contract and are identical for every
/// command, so callers deserialize one shape regardless of what they
/// invoked. Unset fields are omitted, not serialized as null.
///
/// Error outcomes do not use this envelope; they travel through the result
/// sink's error path as a (code, message, details) triplet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ResultEnvelope {
    /// Successful completion carrying a payload: a confirmation string, a
    /// serialized descriptor, or a serialized registry snapshot.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            kind: Some(KIND_SUCCESS.to_string()),
            success: Some(true),
            message: None,
            content: Some(content.into()),
        }
    }

    /// Attach a human-readable message to a success envelope.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Connectivity-check reply: the check itself succeeded, the flag says
    /// whether the printer answered. Unreachability is payload here, never
    /// a delivery error.
    pub fn status(reachable: bool, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            success: Some(reachable),
            message: Some(message.into()),
            content: None,
        }
    }

    /// Serialize for delivery across the sink boundary.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataMap, PrinterDescriptor, data_keys};
    use serde_json::json;

    #[test]
    fn success_envelope_wire_shape() {
        let envelope = ResultEnvelope::success("Print successful");
        let value: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "success", "success": true, "content": "Print successful"})
        );
    }

    #[test]
    fn status_envelope_omits_unset_fields() {
        let envelope = ResultEnvelope::status(false, "Unconnected");
        let value: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({"success": false, "message": "Unconnected"}));
    }

    #[test]
    fn snapshot_envelope_carries_message_and_content() {
        let envelope = ResultEnvelope::success("[]").with_message("Successfully!");
        let value: serde_json::Value =
            serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "success", "success": true, "message": "Successfully!", "content": "[]"})
        );
    }

    #[test]
    fn descriptor_round_trips_through_content() {
        let mut map = DataMap::new();
        map.insert(data_keys::ADDRESS.into(), "10.0.0.9".into());
        map.insert(data_keys::PRODUCT_NAME.into(), "ZQ630".into());
        map.insert(data_keys::DARKNESS.into(), "20".into());
        map.insert(data_keys::LINK_OS_MAJOR_VER.into(), "4".into());
        let descriptor = PrinterDescriptor::from_data_map(&map);

        let envelope = ResultEnvelope::success(serde_json::to_string(&descriptor).unwrap());
        let restored: PrinterDescriptor =
            serde_json::from_str(envelope.content.as_deref().unwrap()).unwrap();
        assert_eq!(restored, descriptor);
    }
}
