//! Broadcast frames exchanged over the `/api/ws` channel.

use serde::{Deserialize, Serialize};

use crate::model::configuration::Configuration;
use crate::model::merge::Update;

/// One WebSocket text frame from the Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StoreMessage {
    Snapshot { config: Configuration },
    Partial { update: Configuration },
}

impl From<StoreMessage> for Update {
    fn from(msg: StoreMessage) -> Self {
        match msg {
            StoreMessage::Snapshot { config } => Update::Snapshot(config),
            StoreMessage::Partial { update } => Update::Partial(update),
        }
    }
}

impl From<Update> for StoreMessage {
    fn from(update: Update) -> Self {
        match update {
            Update::Snapshot(config) => StoreMessage::Snapshot { config },
            Update::Partial(update) => StoreMessage::Partial { update },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_format() {
        let frame = json!({ "type": "partial", "update": { "server": { "timeout_seconds": 45 } } });
        let msg: StoreMessage = serde_json::from_value(frame).unwrap();
        let update = Update::from(msg);
        assert!(!update.is_snapshot());
        assert_eq!(update.payload().len(), 1);
    }

    #[test]
    fn test_unknown_frame_type_rejected() {
        let frame = json!({ "type": "delete", "key": "server.timeout_seconds" });
        assert!(serde_json::from_value::<StoreMessage>(frame).is_err());
    }
}
