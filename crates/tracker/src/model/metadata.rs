//! Metadata referenced by tracker objects.
//!
//! Metadata is loaded by the preheat stage and shared between the converters,
//! the validation hooks and the converted objects through `Arc`s. Each type
//! carries a [`MetadataIdentity`] so it can be referenced under any
//! [`TrackerIdScheme`](crate::identifier::TrackerIdScheme).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::identifier::Identifiable;
use crate::model::ValueType;
use crate::user::User;

/// Identity shared by all metadata objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataIdentity {
    /// The object UID.
    pub uid: String,
    /// Optional unique code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Metadata attribute values keyed by attribute UID.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attribute_values: BTreeMap<String, String>,
}

impl MetadataIdentity {
    /// Creates an identity with a UID and a name.
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            code: None,
            name: Some(name.into()),
            attribute_values: BTreeMap::new(),
        }
    }

    /// Sets the code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Adds a metadata attribute value.
    pub fn with_attribute_value(
        mut self,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attribute_values.insert(attribute.into(), value.into());
        self
    }
}

/// The metadata types the preheat cache can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetadataKind {
    OrganisationUnit,
    Program,
    ProgramStage,
    TrackedEntityType,
    TrackedEntityAttribute,
    DataElement,
    CategoryOptionCombo,
    CategoryOption,
    RelationshipType,
    User,
}

impl MetadataKind {
    /// Every metadata kind.
    pub const ALL: [MetadataKind; 10] = [
        MetadataKind::OrganisationUnit,
        MetadataKind::Program,
        MetadataKind::ProgramStage,
        MetadataKind::TrackedEntityType,
        MetadataKind::TrackedEntityAttribute,
        MetadataKind::DataElement,
        MetadataKind::CategoryOptionCombo,
        MetadataKind::CategoryOption,
        MetadataKind::RelationshipType,
        MetadataKind::User,
    ];

    /// Stable name used in storage and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKind::OrganisationUnit => "OrganisationUnit",
            MetadataKind::Program => "Program",
            MetadataKind::ProgramStage => "ProgramStage",
            MetadataKind::TrackedEntityType => "TrackedEntityType",
            MetadataKind::TrackedEntityAttribute => "TrackedEntityAttribute",
            MetadataKind::DataElement => "DataElement",
            MetadataKind::CategoryOptionCombo => "CategoryOptionCombo",
            MetadataKind::CategoryOption => "CategoryOption",
            MetadataKind::RelationshipType => "RelationshipType",
            MetadataKind::User => "User",
        }
    }

    /// Parses a name produced by [`MetadataKind::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An organisation unit. `path` lists the UIDs from the root, `/`-separated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganisationUnit {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl OrganisationUnit {
    /// Returns `true` if this unit is `ancestor` or lies below it.
    pub fn is_descendant_of(&self, ancestor: &str) -> bool {
        self.identity.uid == ancestor || self.path.split('/').any(|uid| uid == ancestor)
    }
}

/// Whether a program tracks registered entities or captures anonymous events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramType {
    #[default]
    WithRegistration,
    WithoutRegistration,
}

/// An attribute declared on a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramTrackedEntityAttribute {
    pub attribute: String,
    #[serde(default)]
    pub mandatory: bool,
}

/// A program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub program_type: ProgramType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_entity_type: Option<String>,
    #[serde(default)]
    pub program_attributes: Vec<ProgramTrackedEntityAttribute>,
}

impl Program {
    /// Returns `true` for programs with registration.
    pub fn is_registration(&self) -> bool {
        self.program_type == ProgramType::WithRegistration
    }

    /// Returns the program attribute declaration for `attribute`.
    pub fn program_attribute(&self, attribute: &str) -> Option<&ProgramTrackedEntityAttribute> {
        self.program_attributes
            .iter()
            .find(|pa| pa.attribute == attribute)
    }
}

/// A data element declared on a program stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStageDataElement {
    pub data_element: String,
    #[serde(default)]
    pub compulsory: bool,
}

/// A program stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStage {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    /// UID of the owning program.
    pub program: String,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub enable_user_assignment: bool,
    #[serde(default)]
    pub data_elements: Vec<ProgramStageDataElement>,
}

/// An attribute declared on a tracked entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityTypeAttribute {
    pub attribute: String,
    #[serde(default)]
    pub mandatory: bool,
}

/// A tracked entity type (person, commodity, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityType {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub attributes: Vec<TrackedEntityTypeAttribute>,
}

/// A tracked entity attribute definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityAttribute {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub value_type: ValueType,
    /// Values must be unique.
    #[serde(default)]
    pub unique: bool,
    /// Uniqueness is scoped to the organisation unit instead of the system.
    #[serde(default)]
    pub org_unit_scope: bool,
    /// Values are generated from `pattern`.
    #[serde(default)]
    pub generated: bool,
    /// Regular expression generated values must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default)]
    pub confidential: bool,
}

/// A data element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataElement {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub value_type: ValueType,
}

/// A category option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOption {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
}

/// A category option combination, used as attribute option combo on events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOptionCombo {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub category_options: Vec<CategoryOption>,
}

/// The tracker object kind a relationship side points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipEntity {
    #[default]
    TrackedEntityInstance,
    ProgramInstance,
    ProgramStageInstance,
}

/// A relationship type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipType {
    #[serde(flatten)]
    pub identity: MetadataIdentity,
    #[serde(default)]
    pub from_constraint: RelationshipEntity,
    #[serde(default)]
    pub to_constraint: RelationshipEntity,
    #[serde(default)]
    pub bidirectional: bool,
}

macro_rules! metadata_types {
    ($($ty:ident),+ $(,)?) => {
        /// A metadata object of any kind.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind", content = "object")]
        pub enum MetadataObject {
            $(
                #[allow(missing_docs)]
                $ty(Arc<$ty>),
            )+
        }

        impl MetadataObject {
            /// The kind of the wrapped object.
            pub fn kind(&self) -> MetadataKind {
                match self {
                    $(MetadataObject::$ty(_) => MetadataKind::$ty,)+
                }
            }

            fn as_identifiable(&self) -> &dyn Identifiable {
                match self {
                    $(MetadataObject::$ty(object) => object.as_ref(),)+
                }
            }
        }

        $(
            impl MetadataType for $ty {
                const KIND: MetadataKind = MetadataKind::$ty;

                fn wrap(object: Arc<Self>) -> MetadataObject {
                    MetadataObject::$ty(object)
                }

                fn unwrap(object: &MetadataObject) -> Option<&Arc<Self>> {
                    match object {
                        MetadataObject::$ty(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )+
    };
}

/// A concrete metadata type stored in the preheat cache.
pub trait MetadataType: Identifiable + Sized {
    /// The kind tag of this type.
    const KIND: MetadataKind;

    /// Wraps a shared object into a [`MetadataObject`].
    fn wrap(object: Arc<Self>) -> MetadataObject;

    /// Extracts the shared object if `object` is of this type.
    fn unwrap(object: &MetadataObject) -> Option<&Arc<Self>>;
}

metadata_types!(
    OrganisationUnit,
    Program,
    ProgramStage,
    TrackedEntityType,
    TrackedEntityAttribute,
    DataElement,
    CategoryOptionCombo,
    CategoryOption,
    RelationshipType,
    User,
);

impl Identifiable for MetadataObject {
    fn uid(&self) -> &str {
        self.as_identifiable().uid()
    }

    fn code(&self) -> Option<&str> {
        self.as_identifiable().code()
    }

    fn name(&self) -> Option<&str> {
        self.as_identifiable().name()
    }

    fn attribute_value(&self, attribute: &str) -> Option<&str> {
        self.as_identifiable().attribute_value(attribute)
    }
}

macro_rules! identifiable_by_identity {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl Identifiable for $ty {
                fn uid(&self) -> &str {
                    &self.identity.uid
                }

                fn code(&self) -> Option<&str> {
                    self.identity.code.as_deref()
                }

                fn name(&self) -> Option<&str> {
                    self.identity.name.as_deref()
                }

                fn attribute_value(&self, attribute: &str) -> Option<&str> {
                    self.identity.attribute_values.get(attribute).map(String::as_str)
                }
            }
        )+
    };
}

identifiable_by_identity!(
    OrganisationUnit,
    Program,
    ProgramStage,
    TrackedEntityType,
    TrackedEntityAttribute,
    DataElement,
    CategoryOptionCombo,
    CategoryOption,
    RelationshipType,
);
