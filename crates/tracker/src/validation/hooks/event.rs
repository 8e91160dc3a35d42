use crate::bundle::TrackerBundle;
use crate::domain::{Event, TrackerDto, TrackerType};
use crate::model::{DataElement, EventStatus, parse_instant};
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Validates event data values.
///
/// Values must reference known data elements and fit their value type. A
/// completed event must carry every compulsory data element of its stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDataValuesValidationHook;

impl ValidationHook for EventDataValuesValidationHook {
    fn name(&self) -> &'static str {
        "EventDataValuesValidationHook"
    }

    fn order(&self) -> i32 {
        110
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for event in bundle.events() {
            let uid = event.uid();
            for dv in &event.data_values {
                let reference = dv.data_element.as_deref().unwrap_or_default();
                let Some(data_element) = bundle.preheat.resolve::<DataElement>(Some(reference))
                else {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1304, [reference]);
                    continue;
                };
                let Some(value) = dv.value.as_deref() else {
                    continue;
                };
                if let Err(violation) = data_element.value_type.validate(value) {
                    reporter.add_error(
                        TrackerType::Event,
                        uid,
                        TrackerErrorCode::E1302,
                        [data_element.identity.uid.as_str(), value, violation],
                    );
                }
            }

            let Some(psi) = bundle.program_stage_instance(uid) else {
                continue;
            };
            let Some(stage) = psi.program_stage.as_ref().filter(|_| psi.is_completed()) else {
                continue;
            };
            for compulsory in stage.data_elements.iter().filter(|de| de.compulsory) {
                let present = psi
                    .event_data_values
                    .iter()
                    .any(|dv| dv.data_element == compulsory.data_element && dv.value.is_some());
                if !present {
                    reporter.add_error(
                        TrackerType::Event,
                        uid,
                        TrackerErrorCode::E1303,
                        [compulsory.data_element.as_str()],
                    );
                }
            }
        }
    }
}

/// Validates event dates.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventDateValidationHook;

impl EventDateValidationHook {
    fn validate_event(
        &self,
        bundle: &TrackerBundle,
        reporter: &mut ValidationErrorReporter,
        event: &Event,
    ) {
        let uid = event.uid();
        let mut invalid = false;
        for date in [event.occurred_at.as_deref(), event.scheduled_at.as_deref()]
            .into_iter()
            .flatten()
        {
            if parse_instant(date).is_none() {
                reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1051, [date]);
                invalid = true;
            }
        }
        if invalid {
            return;
        }

        let Some(psi) = bundle.program_stage_instance(uid) else {
            return;
        };
        match event.status {
            EventStatus::Schedule | EventStatus::Skipped => {
                if psi.due_date.is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1050, [uid]);
                }
            }
            _ => {
                if psi.execution_date.is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1031, [uid]);
                }
            }
        }
    }
}

impl ValidationHook for EventDateValidationHook {
    fn name(&self) -> &'static str {
        "EventDateValidationHook"
    }

    fn order(&self) -> i32 {
        111
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for event in bundle.events() {
            self.validate_event(bundle, reporter, event);
        }
    }
}
