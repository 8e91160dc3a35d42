use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Enrollment, Event, Relationship, TrackedEntity};
use crate::error::PayloadError;

const COLLECTIONS: [&str; 4] = ["trackedEntities", "enrollments", "events", "relationships"];

/// The import payload: four top-level collections, possibly nested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerPayload {
    pub tracked_entities: Vec<TrackedEntity>,
    pub enrollments: Vec<Enrollment>,
    pub events: Vec<Event>,
    pub relationships: Vec<Relationship>,
}

impl TrackerPayload {
    /// Reads a payload document.
    ///
    /// A top-level collection that is present but not an array is rejected
    /// before the document is mapped, so the error names the property.
    pub fn from_json(document: &str) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_str(document)?;
        Self::from_value(value)
    }

    /// Same as [`TrackerPayload::from_json`] for an already parsed document.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let Value::Object(map) = &value else {
            return Err(PayloadError::Malformed {
                message: "payload must be a JSON object".to_string(),
            });
        };
        for property in COLLECTIONS {
            match map.get(property) {
                None | Some(Value::Null) | Some(Value::Array(_)) => {}
                Some(_) => {
                    return Err(PayloadError::NotAnArray {
                        property: property.to_string(),
                    });
                }
            }
        }
        let mut map = map.clone();
        map.retain(|_, v| !v.is_null());
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Returns `true` when all four collections are empty.
    pub fn is_empty(&self) -> bool {
        self.tracked_entities.is_empty()
            && self.enrollments.is_empty()
            && self.events.is_empty()
            && self.relationships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_an_array() {
        let err = TrackerPayload::from_json(r#"{"events":{"event":"ZwwuwNp6gVd"}}"#).unwrap_err();
        assert!(matches!(err, PayloadError::NotAnArray { property } if property == "events"));
    }

    #[test]
    fn test_missing_and_null_collections() {
        let payload = TrackerPayload::from_json(r#"{"events":null}"#).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_nested_payload() {
        let payload = TrackerPayload::from_json(
            r#"{"trackedEntities":[{"trackedEntity":"TEIuid00001","enrollments":[{"events":[{}]}]}]}"#,
        )
        .unwrap();
        assert_eq!(payload.tracked_entities.len(), 1);
        assert_eq!(payload.tracked_entities[0].enrollments[0].events.len(), 1);
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            TrackerPayload::from_json("[]"),
            Err(PayloadError::Malformed { .. })
        ));
    }
}
