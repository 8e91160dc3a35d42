use chrono::Utc;

use super::{NotesConverter, TrackerConverter, format_opt, instant, username};
use crate::domain::{Enrollment, TrackerDto};
use crate::model::{EnrollmentStatus, OrganisationUnit, Program, ProgramInstance};
use crate::preheat::TrackerPreheat;

/// Converts enrollments.
///
/// Enrollment attributes are not stored on the program instance. They are
/// validated against the program and merged into the tracked entity before
/// commit, see [`TrackerBundle::merge_enrollment_attributes`].
///
/// [`TrackerBundle::merge_enrollment_attributes`]: crate::bundle::TrackerBundle::merge_enrollment_attributes
#[derive(Debug, Default, Clone, Copy)]
pub struct EnrollmentConverter;

impl TrackerConverter for EnrollmentConverter {
    type Dto = Enrollment;
    type Domain = ProgramInstance;

    fn to(&self, pi: &ProgramInstance) -> Enrollment {
        Enrollment {
            enrollment: Some(pi.uid.clone()),
            tracked_entity: pi.entity_instance.clone(),
            program: pi.program.as_ref().map(|p| p.identity.uid.clone()),
            org_unit: pi.organisation_unit.as_ref().map(|ou| ou.identity.uid.clone()),
            status: pi.status,
            enrolled_at: format_opt(pi.enrollment_date.as_ref()),
            occurred_at: format_opt(pi.incident_date.as_ref()),
            completed_at: format_opt(pi.end_date.as_ref()),
            completed_by: pi.completed_by.clone(),
            created_at: format_opt(Some(&pi.created)),
            updated_at: format_opt(Some(&pi.last_updated)),
            stored_by: pi.stored_by.clone(),
            follow_up: pi.follow_up,
            deleted: pi.deleted,
            geometry: pi.geometry.clone(),
            attributes: Vec::new(),
            events: Vec::new(),
            relationships: Vec::new(),
            notes: NotesConverter.to_all(&pi.comments),
        }
    }

    fn from(&self, preheat: &TrackerPreheat, enrollment: &Enrollment) -> ProgramInstance {
        let now = Utc::now();
        let mut pi = preheat
            .get_enrollment(enrollment.uid())
            .cloned()
            .unwrap_or_else(|| ProgramInstance {
                uid: enrollment.uid().to_string(),
                program: None,
                entity_instance: None,
                organisation_unit: None,
                status: EnrollmentStatus::default(),
                enrollment_date: None,
                incident_date: None,
                end_date: None,
                completed_by: None,
                follow_up: false,
                created: now,
                last_updated: now,
                created_at_client: instant(enrollment.created_at.as_ref()),
                last_updated_at_client: None,
                stored_by: enrollment.stored_by.clone().or_else(|| username(preheat)),
                deleted: false,
                geometry: None,
                comments: Vec::new(),
            });

        pi.last_updated = now;
        if enrollment.updated_at.is_some() {
            pi.last_updated_at_client = instant(enrollment.updated_at.as_ref());
        }
        if enrollment.program.is_some() {
            pi.program = preheat.resolve::<Program>(enrollment.program.as_deref());
        }
        if enrollment.org_unit.is_some() {
            pi.organisation_unit =
                preheat.resolve::<OrganisationUnit>(enrollment.org_unit.as_deref());
        }
        if enrollment.tracked_entity.is_some() {
            pi.entity_instance = enrollment.tracked_entity.clone();
        }
        if enrollment.enrolled_at.is_some() {
            pi.enrollment_date = instant(enrollment.enrolled_at.as_ref());
        }
        if enrollment.occurred_at.is_some() {
            pi.incident_date = instant(enrollment.occurred_at.as_ref());
        }
        if enrollment.stored_by.is_some() {
            pi.stored_by = enrollment.stored_by.clone();
        }
        if enrollment.geometry.is_some() {
            pi.geometry = enrollment.geometry.clone();
        }
        pi.follow_up = enrollment.follow_up;

        let previous = pi.status;
        pi.status = enrollment.status;
        match pi.status {
            EnrollmentStatus::Active => {
                pi.end_date = None;
                pi.completed_by = None;
            }
            EnrollmentStatus::Completed | EnrollmentStatus::Cancelled => {
                pi.end_date = instant(enrollment.completed_at.as_ref())
                    .or(if previous == pi.status { pi.end_date } else { None })
                    .or(Some(now));
                if pi.status == EnrollmentStatus::Completed {
                    pi.completed_by = enrollment.completed_by.clone().or_else(|| username(preheat));
                }
            }
        }

        NotesConverter.append(preheat, &mut pi.comments, &enrollment.notes);
        pi
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::identifier::{TrackerIdScheme, TrackerIdentifierParams};
    use crate::model::{MetadataIdentity, MetadataObject};
    use crate::user::User;

    fn preheat() -> TrackerPreheat {
        let mut preheat = TrackerPreheat::new(TrackerIdentifierParams::default());
        preheat.set_user(User::new("M5zQapPyTZI", "admin"));
        preheat.put_metadata(
            &TrackerIdScheme::Uid,
            vec![
                MetadataObject::Program(Arc::new(Program {
                    identity: MetadataIdentity::new("IpHINAT79UW", "Child Programme"),
                    ..Default::default()
                })),
                MetadataObject::OrganisationUnit(Arc::new(OrganisationUnit {
                    identity: MetadataIdentity::new("DiszpKrYNg8", "Ngelehun CHC"),
                    path: "/ImspTQPwCqd/O6uvpzGd5pu/YuQRtpLP10I/DiszpKrYNg8".to_string(),
                    ..Default::default()
                })),
            ],
        );
        preheat
    }

    fn enrollment(status: EnrollmentStatus) -> Enrollment {
        Enrollment {
            enrollment: Some("MNWZ6hnuhSw".to_string()),
            tracked_entity: Some("IOR1AXXl24H".to_string()),
            program: Some("IpHINAT79UW".to_string()),
            org_unit: Some("DiszpKrYNg8".to_string()),
            status,
            enrolled_at: Some("2021-02-01".to_string()),
            occurred_at: Some("2021-01-28".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_new_enrollment() {
        let pi = EnrollmentConverter.from(&preheat(), &enrollment(EnrollmentStatus::Active));
        assert_eq!(pi.uid, "MNWZ6hnuhSw");
        assert_eq!(pi.entity_instance.as_deref(), Some("IOR1AXXl24H"));
        assert_eq!(pi.program.as_ref().unwrap().identity.uid, "IpHINAT79UW");
        assert!(pi.enrollment_date.is_some());
        assert!(pi.end_date.is_none());
        assert_eq!(pi.stored_by.as_deref(), Some("admin"));
    }

    #[test]
    fn test_completion_sets_end_date() {
        let pi = EnrollmentConverter.from(&preheat(), &enrollment(EnrollmentStatus::Completed));
        assert!(pi.end_date.is_some());
        assert_eq!(pi.completed_by.as_deref(), Some("admin"));

        let mut dto = enrollment(EnrollmentStatus::Cancelled);
        dto.completed_at = Some("2021-03-01T00:00:00.000".to_string());
        let pi = EnrollmentConverter.from(&preheat(), &dto);
        assert_eq!(
            format_opt(pi.end_date.as_ref()).as_deref(),
            Some("2021-03-01T00:00:00.000")
        );
        assert!(pi.completed_by.is_none());
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let mut preheat = preheat();
        let stored = EnrollmentConverter.from(&preheat, &enrollment(EnrollmentStatus::Active));
        let created = stored.created;
        preheat.put_enrollments(vec![stored]);

        let update = Enrollment {
            enrollment: Some("MNWZ6hnuhSw".to_string()),
            follow_up: true,
            ..Default::default()
        };
        let pi = EnrollmentConverter.from(&preheat, &update);
        assert_eq!(pi.created, created);
        assert!(pi.follow_up);
        assert_eq!(pi.organisation_unit.as_ref().unwrap().identity.uid, "DiszpKrYNg8");

        let dto = EnrollmentConverter.to(&pi);
        assert_eq!(dto.tracked_entity.as_deref(), Some("IOR1AXXl24H"));
        assert_eq!(dto.enrolled_at.as_deref(), Some("2021-02-01T00:00:00.000"));
    }
}
