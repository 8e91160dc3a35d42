use serde::{Deserialize, Serialize};

/// An attribute value on a tracked entity or enrollment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attribute {
    /// Reference to the tracked entity attribute.
    pub attribute: Option<String>,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
}

impl Attribute {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: Some(attribute.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// A data value on an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataValue {
    /// Reference to the data element.
    pub data_element: Option<String>,
    pub value: Option<String>,
    pub provided_elsewhere: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl DataValue {
    pub fn new(data_element: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            data_element: Some(data_element.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// A free-text note on an enrollment or event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Note {
    /// Note UID.
    pub note: Option<String>,
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<String>,
}
