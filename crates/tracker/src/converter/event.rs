use std::sync::Arc;

use chrono::Utc;

use super::{NotesConverter, TrackerConverter, format_opt, instant, username};
use crate::domain::{DataValue, Event, TrackerDto};
use crate::identifier::Identifiable;
use crate::model::{
    CategoryOptionCombo, DataElement, EventDataValue, EventStatus, OrganisationUnit, Program,
    ProgramStage, ProgramStageInstance,
};
use crate::preheat::TrackerPreheat;
use crate::user::User;

/// Converts events.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventConverter;

impl EventConverter {
    fn new_instance(&self, preheat: &TrackerPreheat, event: &Event) -> ProgramStageInstance {
        let now = Utc::now();
        ProgramStageInstance {
            uid: event.uid().to_string(),
            program_stage: None,
            program_instance: None,
            tracked_entity_instance: None,
            enrollment_status: None,
            follow_up: false,
            organisation_unit: None,
            attribute_option_combo: None,
            status: EventStatus::default(),
            execution_date: None,
            due_date: None,
            completed_date: None,
            completed_by: None,
            stored_by: event.stored_by.clone().or_else(|| username(preheat)),
            created: now,
            last_updated: now,
            created_at_client: instant(event.created_at.as_ref()),
            last_updated_at_client: None,
            deleted: false,
            geometry: None,
            assigned_user: None,
            event_data_values: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Resolves the program of an event, from the event or through its stage.
    fn program(
        &self,
        preheat: &TrackerPreheat,
        event: &Event,
        stage: Option<&Arc<ProgramStage>>,
    ) -> Option<Arc<Program>> {
        preheat
            .resolve::<Program>(event.program.as_deref())
            .or_else(|| stage.and_then(|stage| preheat.get_by_uid::<Program>(&stage.program)))
    }

    fn merge_data_values(
        &self,
        preheat: &TrackerPreheat,
        values: &mut Vec<EventDataValue>,
        data_values: &[DataValue],
    ) {
        let now = Utc::now();
        for dv in data_values {
            let Some(data_element) = preheat.resolve::<DataElement>(dv.data_element.as_deref())
            else {
                continue;
            };
            let uid = data_element.uid();
            let position = values.iter().position(|v| v.data_element == uid);
            match (position, dv.value.as_ref()) {
                (Some(index), None) => {
                    values.remove(index);
                }
                (Some(index), Some(value)) => {
                    let existing = &mut values[index];
                    existing.value = Some(value.clone());
                    existing.provided_elsewhere = dv.provided_elsewhere;
                    existing.last_updated = now;
                    if dv.stored_by.is_some() {
                        existing.stored_by = dv.stored_by.clone();
                    }
                }
                (None, None) => {}
                (None, Some(value)) => values.push(EventDataValue {
                    data_element: uid.to_string(),
                    value: Some(value.clone()),
                    provided_elsewhere: dv.provided_elsewhere,
                    stored_by: dv.stored_by.clone().or_else(|| username(preheat)),
                    created: instant(dv.created_at.as_ref()).unwrap_or(now),
                    last_updated: now,
                }),
            }
        }
    }
}

impl TrackerConverter for EventConverter {
    type Dto = Event;
    type Domain = ProgramStageInstance;

    fn to(&self, psi: &ProgramStageInstance) -> Event {
        let program = psi.program_stage.as_ref().map(|stage| stage.program.clone());
        let combo = psi.attribute_option_combo.as_ref();
        Event {
            event: Some(psi.uid.clone()),
            tracked_entity: psi.tracked_entity_instance.clone(),
            enrollment: psi.program_instance.clone(),
            program,
            program_stage: psi.program_stage.as_ref().map(|s| s.identity.uid.clone()),
            org_unit: psi.organisation_unit.as_ref().map(|ou| ou.identity.uid.clone()),
            status: psi.status,
            occurred_at: format_opt(psi.execution_date.as_ref()),
            scheduled_at: format_opt(psi.due_date.as_ref()),
            completed_at: format_opt(psi.completed_date.as_ref()),
            completed_by: psi.completed_by.clone(),
            stored_by: psi.stored_by.clone(),
            created_at: format_opt(Some(&psi.created)),
            updated_at: format_opt(Some(&psi.last_updated)),
            follow_up: psi.follow_up,
            enrollment_status: psi.enrollment_status,
            attribute_option_combo: combo.map(|coc| coc.identity.uid.clone()),
            attribute_category_options: combo
                .filter(|coc| !coc.category_options.is_empty())
                .map(|coc| {
                    coc.category_options
                        .iter()
                        .map(|option| option.identity.uid.as_str())
                        .collect::<Vec<_>>()
                        .join(";")
                }),
            assigned_user: psi.assigned_user.as_ref().map(|user| user.uid.clone()),
            deleted: psi.deleted,
            geometry: psi.geometry.clone(),
            data_values: psi
                .event_data_values
                .iter()
                .map(|dv| DataValue {
                    data_element: Some(dv.data_element.clone()),
                    value: dv.value.clone(),
                    provided_elsewhere: dv.provided_elsewhere,
                    stored_by: dv.stored_by.clone(),
                    created_at: format_opt(Some(&dv.created)),
                    updated_at: format_opt(Some(&dv.last_updated)),
                })
                .collect(),
            notes: NotesConverter.to_all(&psi.comments),
            relationships: Vec::new(),
        }
    }

    fn from(&self, preheat: &TrackerPreheat, event: &Event) -> ProgramStageInstance {
        let now = Utc::now();
        let mut psi = preheat
            .get_event(event.uid())
            .cloned()
            .unwrap_or_else(|| self.new_instance(preheat, event));

        psi.last_updated = now;
        if event.updated_at.is_some() {
            psi.last_updated_at_client = instant(event.updated_at.as_ref());
        }

        if event.program_stage.is_some() {
            psi.program_stage = preheat.resolve::<ProgramStage>(event.program_stage.as_deref());
        }
        if event.org_unit.is_some() {
            psi.organisation_unit = preheat.resolve::<OrganisationUnit>(event.org_unit.as_deref());
        }

        let program = self.program(preheat, event, psi.program_stage.as_ref());
        match program.as_ref() {
            Some(program) if !program.is_registration() => {
                if let Some(pi) = preheat.program_instance_without_registration(program.uid()) {
                    psi.program_instance = Some(pi.uid.clone());
                }
            }
            _ => {
                if event.enrollment.is_some() {
                    psi.program_instance = event.enrollment.clone();
                }
            }
        }

        let enrollment = psi
            .program_instance
            .as_deref()
            .and_then(|uid| preheat.get_enrollment(uid));
        if let Some(enrollment) = enrollment {
            psi.tracked_entity_instance = enrollment.entity_instance.clone();
            psi.enrollment_status = Some(enrollment.status);
            psi.follow_up = enrollment.follow_up;
        } else if event.tracked_entity.is_some() {
            psi.tracked_entity_instance = event.tracked_entity.clone();
        }

        psi.status = event.status;
        if event.occurred_at.is_some() {
            psi.execution_date = instant(event.occurred_at.as_ref());
        }
        if event.scheduled_at.is_some() {
            psi.due_date = instant(event.scheduled_at.as_ref());
        }
        if event.stored_by.is_some() {
            psi.stored_by = event.stored_by.clone();
        }
        if event.geometry.is_some() {
            psi.geometry = event.geometry.clone();
        }

        if event.attribute_option_combo.is_some() {
            psi.attribute_option_combo =
                preheat.resolve::<CategoryOptionCombo>(event.attribute_option_combo.as_deref());
        } else if psi.attribute_option_combo.is_none() {
            psi.attribute_option_combo = preheat.get_default::<CategoryOptionCombo>();
        }

        if psi.is_completed() {
            if psi.completed_date.is_none() || event.completed_at.is_some() {
                psi.completed_date = instant(event.completed_at.as_ref()).or(Some(now));
            }
            psi.completed_by = event.completed_by.clone().or_else(|| username(preheat));
        }

        let user_assignment = psi
            .program_stage
            .as_ref()
            .is_some_and(|stage| stage.enable_user_assignment);
        psi.assigned_user = if user_assignment {
            event
                .assigned_user
                .as_deref()
                .and_then(|uid| preheat.get_by_uid::<User>(uid))
        } else {
            None
        };

        self.merge_data_values(preheat, &mut psi.event_data_values, &event.data_values);
        NotesConverter.append(preheat, &mut psi.comments, &event.notes);

        psi
    }
}
