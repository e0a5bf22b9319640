//! Abstract event envelope
//!
//! Events arrive from an external object-store notification source. The
//! provider-specific framing is out of scope; this is the minimal shape
//! the engine needs, and also the payload format re-dispatched by the
//! retry coordinator.

use serde::{Deserialize, Serialize};

/// An object-store event routed to the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectEvent {
    /// An object finished uploading (content or metadata payload)
    ObjectCreated { bucket: String, key: String },
    /// A cold-storage restore finished for an object
    RestoreCompleted {
        bucket: String,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expiry: Option<String>,
    },
}

impl ObjectEvent {
    /// Parse an event from its JSON payload
    pub fn from_json(payload: &str) -> Result<Self, docio_common::Error> {
        serde_json::from_str(payload)
            .map_err(|e| docio_common::Error::Serialization(format!("malformed event: {e}")))
    }

    /// Serialize to the JSON payload form used on queues
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("event serialization is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_roundtrip() {
        let event = ObjectEvent::ObjectCreated {
            bucket: "docs".into(),
            key: "docs/abc.pdf".into(),
        };
        assert_eq!(ObjectEvent::from_json(&event.to_json()).unwrap(), event);
    }

    #[test]
    fn test_restore_event_expiry_optional() {
        let event = ObjectEvent::from_json(
            r#"{"kind":"restore_completed","bucket":"docs","key":"docs/abc.pdf"}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            ObjectEvent::RestoreCompleted { expiry: None, .. }
        ));
    }

    #[test]
    fn test_malformed_event() {
        assert!(ObjectEvent::from_json("{}").is_err());
        assert!(ObjectEvent::from_json("not json").is_err());
    }
}
