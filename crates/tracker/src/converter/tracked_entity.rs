use chrono::Utc;

use super::{TrackerConverter, format_opt, instant, username};
use crate::domain::{Attribute, TrackedEntity, TrackerDto};
use crate::identifier::Identifiable;
use crate::model::{
    OrganisationUnit, TrackedEntityAttribute, TrackedEntityAttributeValue, TrackedEntityInstance,
    TrackedEntityType,
};
use crate::preheat::TrackerPreheat;

/// Converts tracked entities.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackedEntityConverter;

impl TrackedEntityConverter {
    /// Merges wire attributes into stored attribute values.
    ///
    /// Values are keyed by attribute UID. An attribute sent without a value
    /// removes the stored one. Unresolvable attributes are skipped.
    pub fn merge_attributes(
        &self,
        preheat: &TrackerPreheat,
        values: &mut Vec<TrackedEntityAttributeValue>,
        attributes: &[Attribute],
    ) {
        let now = Utc::now();
        for attribute in attributes {
            let Some(tea) =
                preheat.resolve::<TrackedEntityAttribute>(attribute.attribute.as_deref())
            else {
                continue;
            };
            let uid = tea.uid();
            let position = values.iter().position(|v| v.attribute == uid);
            match (position, attribute.value.as_ref()) {
                (Some(index), None) => {
                    values.remove(index);
                }
                (Some(index), Some(value)) => {
                    let existing = &mut values[index];
                    existing.value = Some(value.clone());
                    existing.last_updated = now;
                    if attribute.stored_by.is_some() {
                        existing.stored_by = attribute.stored_by.clone();
                    }
                }
                (None, None) => {}
                (None, Some(value)) => values.push(TrackedEntityAttributeValue {
                    attribute: uid.to_string(),
                    value: Some(value.clone()),
                    stored_by: attribute.stored_by.clone().or_else(|| username(preheat)),
                    created: instant(attribute.created_at.as_ref()).unwrap_or(now),
                    last_updated: now,
                }),
            }
        }
    }
}

impl TrackerConverter for TrackedEntityConverter {
    type Dto = TrackedEntity;
    type Domain = TrackedEntityInstance;

    fn to(&self, tei: &TrackedEntityInstance) -> TrackedEntity {
        TrackedEntity {
            tracked_entity: Some(tei.uid.clone()),
            tracked_entity_type: tei
                .tracked_entity_type
                .as_ref()
                .map(|tet| tet.identity.uid.clone()),
            org_unit: tei.organisation_unit.as_ref().map(|ou| ou.identity.uid.clone()),
            created_at: format_opt(Some(&tei.created)),
            updated_at: format_opt(Some(&tei.last_updated)),
            inactive: tei.inactive,
            deleted: tei.deleted,
            geometry: tei.geometry.clone(),
            attributes: tei
                .attribute_values
                .iter()
                .map(|av| Attribute {
                    attribute: Some(av.attribute.clone()),
                    value: av.value.clone(),
                    display_name: None,
                    created_at: format_opt(Some(&av.created)),
                    updated_at: format_opt(Some(&av.last_updated)),
                    stored_by: av.stored_by.clone(),
                })
                .collect(),
            enrollments: Vec::new(),
            relationships: Vec::new(),
        }
    }

    fn from(&self, preheat: &TrackerPreheat, te: &TrackedEntity) -> TrackedEntityInstance {
        let now = Utc::now();
        let mut tei = preheat
            .get_tracked_entity(te.uid())
            .cloned()
            .unwrap_or_else(|| TrackedEntityInstance {
                uid: te.uid().to_string(),
                tracked_entity_type: None,
                organisation_unit: None,
                created: now,
                last_updated: now,
                created_at_client: instant(te.created_at.as_ref()),
                last_updated_at_client: None,
                inactive: false,
                deleted: false,
                geometry: None,
                stored_by: username(preheat),
                attribute_values: Vec::new(),
            });

        tei.last_updated = now;
        if te.updated_at.is_some() {
            tei.last_updated_at_client = instant(te.updated_at.as_ref());
        }
        if te.tracked_entity_type.is_some() {
            tei.tracked_entity_type =
                preheat.resolve::<TrackedEntityType>(te.tracked_entity_type.as_deref());
        }
        if te.org_unit.is_some() {
            tei.organisation_unit = preheat.resolve::<OrganisationUnit>(te.org_unit.as_deref());
        }
        if te.geometry.is_some() {
            tei.geometry = te.geometry.clone();
        }
        tei.inactive = te.inactive;

        self.merge_attributes(preheat, &mut tei.attribute_values, &te.attributes);
        tei
    }
}
