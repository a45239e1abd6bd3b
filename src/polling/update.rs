//! Inbound updates as delivered by the remote source.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::request::UpdateKind;

/// One inbound update.
///
/// The polling core only reads `id`; the payload is handed to the pipeline as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonically increasing identifier assigned by the remote source.
    #[serde(rename = "update_id")]
    pub id: i64,

    /// Remaining fields of the update object.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Update {
    /// Creates an update carrying `body` under the field of `kind`.
    pub fn new(id: i64, kind: UpdateKind, body: Value) -> Self {
        let mut payload = Map::new();
        payload.insert(kind.as_str().to_string(), body);
        Self { id, payload }
    }

    /// Creates an update with an empty payload.
    pub fn bare(id: i64) -> Self {
        Self {
            id,
            payload: Map::new(),
        }
    }

    /// Detects the kind from the payload fields, if any is recognised.
    pub fn kind(&self) -> Option<UpdateKind> {
        self.payload.keys().find_map(|field| UpdateKind::from_field(field))
    }

    /// Body of the update for its detected kind.
    pub fn body(&self) -> Option<&Value> {
        self.kind().and_then(|kind| self.payload.get(kind.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_bot_api_update() {
        let raw = json!({
            "update_id": 123456,
            "message": {
                "message_id": 1,
                "chat": { "id": 42, "type": "private" },
                "text": "/start"
            }
        });

        let update: Update = serde_json::from_value(raw).unwrap();
        assert_eq!(update.id, 123456);
        assert_eq!(update.kind(), Some(UpdateKind::Message));
        assert_eq!(update.body().unwrap()["text"], "/start");
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let raw = json!({ "update_id": 9, "business_message": { "text": "hi" } });

        let update: Update = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(update.kind(), None);
        assert_eq!(update.body(), None);
        assert_eq!(serde_json::to_value(&update).unwrap(), raw);
    }

    #[test]
    fn test_new_places_body_under_kind() {
        let update = Update::new(5, UpdateKind::CallbackQuery, json!({ "data": "yes" }));
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "update_id": 5, "callback_query": { "data": "yes" } })
        );
        assert!(Update::bare(6).payload.is_empty());
    }
}
