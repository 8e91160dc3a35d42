use async_trait::async_trait;

use super::{distinct, load_metadata};
use crate::domain::TrackerPayload;
use crate::error::StorageResult;
use crate::identifier::TrackerIdScheme;
use crate::model::{
    DataElement, MetadataKind, Program, ProgramStage, TrackedEntityAttribute, TrackedEntityType,
};
use crate::preheat::{PreheatSupplier, TrackerPreheat};
use crate::store::TrackerReader;

/// Loads every tracked entity type. There are few of them and attribute
/// checks need the full set.
pub struct TrackedEntityTypeSupplier;

#[async_trait]
impl PreheatSupplier for TrackedEntityTypeSupplier {
    fn name(&self) -> &'static str {
        "TrackedEntityTypeSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        _payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let objects = reader.all_metadata(MetadataKind::TrackedEntityType).await?;
        let scheme = preheat
            .identifiers()
            .scheme_for(MetadataKind::TrackedEntityType)
            .clone();
        preheat.put_metadata(&scheme, objects);
        Ok(())
    }
}

/// Declares a supplier loading one metadata kind from payload references.
macro_rules! payload_metadata_supplier {
    ($(#[$meta:meta])* $name:ident, $kind:expr, |$payload:ident| $refs:expr) => {
        $(#[$meta])*
        pub struct $name;

        #[async_trait]
        impl PreheatSupplier for $name {
            fn name(&self) -> &'static str {
                stringify!($name)
            }

            async fn add(
                &self,
                reader: &dyn TrackerReader,
                $payload: &TrackerPayload,
                preheat: &mut TrackerPreheat,
            ) -> StorageResult<()> {
                let scheme = preheat.identifiers().scheme_for($kind).clone();
                load_metadata(reader, preheat, $kind, &scheme, $refs).await
            }
        }
    };
}

payload_metadata_supplier!(
    /// Organisation units of tracked entities, enrollments and events.
    OrganisationUnitSupplier,
    MetadataKind::OrganisationUnit,
    |payload| distinct(
        payload
            .tracked_entities
            .iter()
            .map(|te| te.org_unit.as_ref())
            .chain(payload.enrollments.iter().map(|en| en.org_unit.as_ref()))
            .chain(payload.events.iter().map(|ev| ev.org_unit.as_ref()))
    )
);

payload_metadata_supplier!(
    /// Programs of enrollments and events.
    ProgramSupplier,
    MetadataKind::Program,
    |payload| distinct(
        payload
            .enrollments
            .iter()
            .map(|en| en.program.as_ref())
            .chain(payload.events.iter().map(|ev| ev.program.as_ref()))
    )
);

/// Program stages of events, plus the programs those stages belong to.
/// Events may name only their stage, so the program comes from the stage.
pub struct ProgramStageSupplier;

#[async_trait]
impl PreheatSupplier for ProgramStageSupplier {
    fn name(&self) -> &'static str {
        "ProgramStageSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let kind = MetadataKind::ProgramStage;
        let scheme = preheat.identifiers().scheme_for(kind).clone();
        let referenced = distinct(payload.events.iter().map(|ev| ev.program_stage.as_ref()));
        load_metadata(reader, preheat, kind, &scheme, referenced).await?;

        let declared: Vec<String> = preheat
            .all::<ProgramStage>()
            .iter()
            .map(|stage| stage.program.clone())
            .filter(|uid| preheat.get_by_uid::<Program>(uid).is_none())
            .collect();
        load_metadata(
            reader,
            preheat,
            MetadataKind::Program,
            &TrackerIdScheme::Uid,
            distinct(declared.iter().map(Some)),
        )
        .await
    }
}

payload_metadata_supplier!(
    /// Attribute option combos of events.
    CategoryOptionComboSupplier,
    MetadataKind::CategoryOptionCombo,
    |payload| distinct(
        payload
            .events
            .iter()
            .map(|ev| ev.attribute_option_combo.as_ref())
    )
);

payload_metadata_supplier!(
    /// Relationship types of relationships.
    RelationshipTypeSupplier,
    MetadataKind::RelationshipType,
    |payload| distinct(
        payload
            .relationships
            .iter()
            .map(|rel| rel.relationship_type.as_ref())
    )
);

/// Category options listed in `attributeCategoryOptions`.
pub struct CategoryOptionSupplier;

#[async_trait]
impl PreheatSupplier for CategoryOptionSupplier {
    fn name(&self) -> &'static str {
        "CategoryOptionSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let options: Vec<String> = payload
            .events
            .iter()
            .filter_map(|ev| ev.attribute_category_options.as_deref())
            .flat_map(|options| options.split(';'))
            .map(|option| option.trim().to_string())
            .collect();
        let scheme = preheat
            .identifiers()
            .scheme_for(MetadataKind::CategoryOption)
            .clone();
        load_metadata(
            reader,
            preheat,
            MetadataKind::CategoryOption,
            &scheme,
            distinct(options.iter().map(Some)),
        )
        .await
    }
}

/// Attributes referenced by the payload plus those declared on the loaded
/// programs and tracked entity types.
pub struct TrackedEntityAttributeSupplier;

#[async_trait]
impl PreheatSupplier for TrackedEntityAttributeSupplier {
    fn name(&self) -> &'static str {
        "TrackedEntityAttributeSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let kind = MetadataKind::TrackedEntityAttribute;
        let scheme = preheat.identifiers().scheme_for(kind).clone();
        let referenced = distinct(
            payload
                .tracked_entities
                .iter()
                .flat_map(|te| te.attributes.iter())
                .chain(payload.enrollments.iter().flat_map(|en| en.attributes.iter()))
                .map(|attribute| attribute.attribute.as_ref()),
        );
        load_metadata(reader, preheat, kind, &scheme, referenced).await?;

        let declared: Vec<String> = preheat
            .all::<Program>()
            .iter()
            .flat_map(|program| program.program_attributes.iter().map(|pa| pa.attribute.clone()))
            .chain(
                preheat
                    .all::<TrackedEntityType>()
                    .iter()
                    .flat_map(|tet| tet.attributes.iter().map(|a| a.attribute.clone())),
            )
            .filter(|uid| preheat.get_by_uid::<TrackedEntityAttribute>(uid).is_none())
            .collect();
        load_metadata(
            reader,
            preheat,
            kind,
            &TrackerIdScheme::Uid,
            distinct(declared.iter().map(Some)),
        )
        .await
    }
}

/// Data elements referenced by event data values plus those declared on
/// the loaded program stages.
pub struct DataElementSupplier;

#[async_trait]
impl PreheatSupplier for DataElementSupplier {
    fn name(&self) -> &'static str {
        "DataElementSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let kind = MetadataKind::DataElement;
        let scheme = preheat.identifiers().scheme_for(kind).clone();
        let referenced = distinct(
            payload
                .events
                .iter()
                .flat_map(|ev| ev.data_values.iter())
                .map(|dv| dv.data_element.as_ref()),
        );
        load_metadata(reader, preheat, kind, &scheme, referenced).await?;

        let declared: Vec<String> = preheat
            .all::<ProgramStage>()
            .iter()
            .flat_map(|stage| stage.data_elements.iter().map(|de| de.data_element.clone()))
            .filter(|uid| preheat.get_by_uid::<DataElement>(uid).is_none())
            .collect();
        load_metadata(
            reader,
            preheat,
            kind,
            &TrackerIdScheme::Uid,
            distinct(declared.iter().map(Some)),
        )
        .await
    }
}

/// Users assigned to events, referenced by UID.
pub struct UserSupplier;

#[async_trait]
impl PreheatSupplier for UserSupplier {
    fn name(&self) -> &'static str {
        "UserSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let users = distinct(payload.events.iter().map(|ev| ev.assigned_user.as_ref()));
        load_metadata(reader, preheat, MetadataKind::User, &TrackerIdScheme::Uid, users).await
    }
}
