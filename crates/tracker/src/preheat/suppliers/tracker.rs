use async_trait::async_trait;

use super::distinct;
use crate::domain::{RelationshipItem, TrackerPayload};
use crate::error::StorageResult;
use crate::model::{Program, TrackedEntityAttribute};
use crate::preheat::{PreheatSupplier, TrackerPreheat};
use crate::store::TrackerReader;

fn relationship_items(payload: &TrackerPayload) -> impl Iterator<Item = &RelationshipItem> {
    payload
        .relationships
        .iter()
        .flat_map(|rel| rel.from.iter().chain(rel.to.iter()))
}

/// Stored tracked entities referenced by tracked entities, enrollments and
/// relationships.
pub struct TrackedEntitySupplier;

#[async_trait]
impl PreheatSupplier for TrackedEntitySupplier {
    fn name(&self) -> &'static str {
        "TrackedEntitySupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let uids = distinct(
            payload
                .tracked_entities
                .iter()
                .map(|te| te.tracked_entity.as_ref())
                .chain(payload.enrollments.iter().map(|en| en.tracked_entity.as_ref()))
                .chain(relationship_items(payload).map(|item| item.tracked_entity.as_ref())),
        );
        if uids.is_empty() {
            return Ok(());
        }
        let found = reader.find_tracked_entities(&uids).await?;
        preheat.put_tracked_entities(found);
        Ok(())
    }
}

/// Stored enrollments referenced by enrollments, events and relationships.
pub struct EnrollmentSupplier;

#[async_trait]
impl PreheatSupplier for EnrollmentSupplier {
    fn name(&self) -> &'static str {
        "EnrollmentSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let uids = distinct(
            payload
                .enrollments
                .iter()
                .map(|en| en.enrollment.as_ref())
                .chain(payload.events.iter().map(|ev| ev.enrollment.as_ref()))
                .chain(relationship_items(payload).map(|item| item.enrollment.as_ref())),
        );
        if uids.is_empty() {
            return Ok(());
        }
        let found = reader.find_enrollments(&uids).await?;
        preheat.put_enrollments(found);
        Ok(())
    }
}

/// Stored events referenced by events and relationships.
pub struct EventSupplier;

#[async_trait]
impl PreheatSupplier for EventSupplier {
    fn name(&self) -> &'static str {
        "EventSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let uids = distinct(
            payload
                .events
                .iter()
                .map(|ev| ev.event.as_ref())
                .chain(relationship_items(payload).map(|item| item.event.as_ref())),
        );
        if uids.is_empty() {
            return Ok(());
        }
        let found = reader.find_events(&uids).await?;
        preheat.put_events(found);
        Ok(())
    }
}

/// Stored relationships with the payload's relationship UIDs.
pub struct RelationshipSupplier;

#[async_trait]
impl PreheatSupplier for RelationshipSupplier {
    fn name(&self) -> &'static str {
        "RelationshipSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let uids = distinct(payload.relationships.iter().map(|rel| rel.relationship.as_ref()));
        if uids.is_empty() {
            return Ok(());
        }
        let found = reader.find_relationships(&uids).await?;
        preheat.put_relationships(found);
        Ok(())
    }
}

/// The default enrollment of every loaded program without registration.
pub struct ProgramInstancesWithoutRegistrationSupplier;

#[async_trait]
impl PreheatSupplier for ProgramInstancesWithoutRegistrationSupplier {
    fn name(&self) -> &'static str {
        "ProgramInstancesWithoutRegistrationSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        _payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let programs: Vec<String> = preheat
            .all::<Program>()
            .iter()
            .filter(|program| !program.is_registration())
            .map(|program| program.identity.uid.clone())
            .collect();
        if programs.is_empty() {
            return Ok(());
        }
        let found = reader
            .find_program_instances_without_registration(&programs)
            .await?;
        preheat.put_program_instances_without_registration(found);
        Ok(())
    }
}

/// Stored values of unique attributes that the payload also carries.
pub struct UniqueAttributeValuesSupplier;

#[async_trait]
impl PreheatSupplier for UniqueAttributeValuesSupplier {
    fn name(&self) -> &'static str {
        "UniqueAttributeValuesSupplier"
    }

    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()> {
        let mut attributes = Vec::new();
        let mut values = Vec::new();
        let payload_attributes = payload
            .tracked_entities
            .iter()
            .flat_map(|te| te.attributes.iter())
            .chain(payload.enrollments.iter().flat_map(|en| en.attributes.iter()));
        for attribute in payload_attributes {
            let Some(tea) = preheat.resolve::<TrackedEntityAttribute>(attribute.attribute.as_deref())
            else {
                continue;
            };
            if let (true, Some(value)) = (tea.unique, attribute.value.as_ref()) {
                attributes.push(tea.identity.uid.clone());
                values.push(value.clone());
            }
        }

        let attributes = distinct(attributes.iter().map(Some));
        let values = distinct(values.iter().map(Some));
        if attributes.is_empty() {
            return Ok(());
        }
        let found = reader.find_attribute_values(&attributes, &values).await?;
        preheat.put_unique_attribute_values(found);
        Ok(())
    }
}
