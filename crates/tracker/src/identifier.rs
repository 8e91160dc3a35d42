//! Identifier schemes and the identifier resolver.
//!
//! Payload references to metadata can be expressed by UID, code, name or the
//! value of a metadata attribute. [`TrackerIdentifierParams`] carries the
//! scheme chosen for each metadata type, and [`Identifiable::identify`]
//! returns the value an object is known by under a given scheme. The preheat
//! cache indexes every loaded object by that value.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::MetadataKind;

/// Method used to match an external reference to an internal object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrackerIdScheme {
    /// Match on the 11 character UID.
    #[default]
    Uid,
    /// Match on the object code.
    Code,
    /// Match on the object name.
    Name,
    /// Match on the value the object holds for the given attribute UID.
    Attribute(String),
}

impl TrackerIdScheme {
    /// Returns the attribute UID for attribute schemes.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            TrackerIdScheme::Attribute(uid) => Some(uid),
            _ => None,
        }
    }
}

impl fmt::Display for TrackerIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerIdScheme::Uid => write!(f, "UID"),
            TrackerIdScheme::Code => write!(f, "CODE"),
            TrackerIdScheme::Name => write!(f, "NAME"),
            TrackerIdScheme::Attribute(uid) => write!(f, "ATTRIBUTE:{}", uid),
        }
    }
}

impl FromStr for TrackerIdScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "UID" | "AUTO" | "ID" => Ok(TrackerIdScheme::Uid),
            "CODE" => Ok(TrackerIdScheme::Code),
            "NAME" => Ok(TrackerIdScheme::Name),
            _ => match s.trim().split_once(':') {
                Some((prefix, uid))
                    if prefix.eq_ignore_ascii_case("ATTRIBUTE") && CodeGenerator::is_valid_uid(uid) =>
                {
                    Ok(TrackerIdScheme::Attribute(uid.to_string()))
                }
                _ => Err(format!("unknown identifier scheme: {}", s)),
            },
        }
    }
}

impl TryFrom<String> for TrackerIdScheme {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrackerIdScheme> for String {
    fn from(scheme: TrackerIdScheme) -> Self {
        scheme.to_string()
    }
}

/// Identifier schemes for an import: a general scheme plus per-type overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerIdentifierParams {
    /// Scheme used for every type without an override.
    pub id_scheme: TrackerIdScheme,
    /// Override for organisation unit references.
    pub org_unit_id_scheme: Option<TrackerIdScheme>,
    /// Override for program references.
    pub program_id_scheme: Option<TrackerIdScheme>,
    /// Override for program stage references.
    pub program_stage_id_scheme: Option<TrackerIdScheme>,
    /// Override for data element references.
    pub data_element_id_scheme: Option<TrackerIdScheme>,
    /// Override for category option combo references.
    pub category_option_combo_id_scheme: Option<TrackerIdScheme>,
    /// Override for category option references.
    pub category_option_id_scheme: Option<TrackerIdScheme>,
}

impl TrackerIdentifierParams {
    /// Returns the scheme references of the given kind are expressed in.
    pub fn scheme_for(&self, kind: MetadataKind) -> &TrackerIdScheme {
        let specific = match kind {
            MetadataKind::OrganisationUnit => self.org_unit_id_scheme.as_ref(),
            MetadataKind::Program => self.program_id_scheme.as_ref(),
            MetadataKind::ProgramStage => self.program_stage_id_scheme.as_ref(),
            MetadataKind::DataElement => self.data_element_id_scheme.as_ref(),
            MetadataKind::CategoryOptionCombo => self.category_option_combo_id_scheme.as_ref(),
            MetadataKind::CategoryOption => self.category_option_id_scheme.as_ref(),
            _ => None,
        };
        specific.unwrap_or(&self.id_scheme)
    }
}

/// An object that can be referenced by any identifier scheme.
pub trait Identifiable {
    /// The object UID.
    fn uid(&self) -> &str;

    /// The object code, if any.
    fn code(&self) -> Option<&str>;

    /// The object name, if any.
    fn name(&self) -> Option<&str>;

    /// The value this object holds for a metadata attribute.
    fn attribute_value(&self, attribute: &str) -> Option<&str>;

    /// Returns the value this object is referenced by under `scheme`.
    fn identify(&self, scheme: &TrackerIdScheme) -> Option<String> {
        match scheme {
            TrackerIdScheme::Uid => Some(self.uid().to_string()),
            TrackerIdScheme::Code => self.code().map(str::to_string),
            TrackerIdScheme::Name => self.name().map(str::to_string),
            TrackerIdScheme::Attribute(attribute) => {
                self.attribute_value(attribute).map(str::to_string)
            }
        }
    }
}

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a UID.
pub const UID_LENGTH: usize = 11;

/// Generator and checker for 11 character UIDs.
pub struct CodeGenerator;

impl CodeGenerator {
    /// Generates a new random UID: one letter followed by ten alphanumerics.
    pub fn generate_uid() -> String {
        let bytes = Uuid::new_v4().into_bytes();
        let mut uid = String::with_capacity(UID_LENGTH);
        uid.push(LETTERS[bytes[0] as usize % LETTERS.len()] as char);
        for byte in &bytes[1..UID_LENGTH] {
            uid.push(ALPHANUMERIC[*byte as usize % ALPHANUMERIC.len()] as char);
        }
        uid
    }

    /// Returns `true` if `uid` has the UID format.
    pub fn is_valid_uid(uid: &str) -> bool {
        let bytes = uid.as_bytes();
        bytes.len() == UID_LENGTH
            && bytes[0].is_ascii_alphabetic()
            && bytes.iter().all(u8::is_ascii_alphanumeric)
    }
}
