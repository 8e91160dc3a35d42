//! Checks shared by the tracked entity and enrollment attribute hooks.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::debug;

use crate::bundle::TrackerBundle;
use crate::domain::TrackerType;
use crate::model::TrackedEntityAttribute;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter};

/// Compiled attribute patterns keyed by expression. Invalid expressions map
/// to `None` so they are only reported once.
static PATTERNS: Lazy<Mutex<HashMap<String, Option<Regex>>>> = Lazy::new(Default::default);

/// Returns the compiled `pattern`, compiling it on first use.
fn compiled_pattern(attribute: &str, pattern: &str) -> Option<Regex> {
    let mut patterns = PATTERNS.lock();
    if let Some(regex) = patterns.get(pattern) {
        return regex.clone();
    }
    let regex = match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            debug!(
                attribute,
                error = %err,
                "Attribute pattern is not a valid expression, skipping pattern check"
            );
            None
        }
    };
    patterns.insert(pattern.to_string(), regex.clone());
    regex
}

/// The object an attribute value is validated for.
#[derive(Debug, Clone, Copy)]
pub(super) struct Subject<'a> {
    pub tracker_type: TrackerType,
    pub uid: &'a str,
    /// Tracked entity that holds the value.
    pub owner: Option<&'a str>,
    /// Organisation unit of that tracked entity.
    pub org_unit: Option<&'a str>,
}

/// Checks `value` against the attribute's value type and pattern.
pub(super) fn check_value(
    bundle: &TrackerBundle,
    reporter: &mut ValidationErrorReporter,
    subject: Subject<'_>,
    attribute: &TrackedEntityAttribute,
    value: &str,
) {
    if let Err(violation) = attribute.value_type.validate(value) {
        reporter.add_error(
            subject.tracker_type,
            subject.uid,
            TrackerErrorCode::E1007,
            [attribute.identity.uid.as_str(), violation],
        );
    }

    if bundle.config.options.skip_text_pattern_validation || !attribute.generated {
        return;
    }
    let Some(pattern) = attribute.pattern.as_deref() else {
        return;
    };
    let Some(regex) = compiled_pattern(&attribute.identity.uid, pattern) else {
        return;
    };
    if !regex.is_match(value) {
        reporter.add_error(
            subject.tracker_type,
            subject.uid,
            TrackerErrorCode::E1008,
            [value, pattern],
        );
    }
}

/// Checks the uniqueness of a value of a unique attribute.
///
/// The value clashes with stored values held by other tracked entities and
/// with values other tracked entities of the bundle carry. Org unit scoped
/// attributes only clash inside the same organisation unit.
pub(super) fn check_unique(
    bundle: &TrackerBundle,
    reporter: &mut ValidationErrorReporter,
    subject: Subject<'_>,
    attribute: &TrackedEntityAttribute,
    value: &str,
) {
    if !attribute.unique {
        return;
    }
    let attribute_uid = attribute.identity.uid.as_str();
    let same_scope = |other: Option<&str>| !attribute.org_unit_scope || other == subject.org_unit;

    let stored = bundle.preheat.unique_attribute_values().iter().any(|stored| {
        stored.attribute == attribute_uid
            && stored.value == value
            && Some(stored.tracked_entity.as_str()) != subject.owner
            && same_scope(stored.org_unit.as_deref())
    });
    let in_bundle = bundle
        .objects
        .converted
        .tracked_entities
        .values()
        .filter(|tei| Some(tei.uid.as_str()) != subject.owner)
        .filter(|tei| {
            same_scope(tei.organisation_unit.as_ref().map(|ou| ou.identity.uid.as_str()))
        })
        .flat_map(|tei| tei.attribute_values.iter())
        .any(|av| av.attribute == attribute_uid && av.value.as_deref() == Some(value));

    if stored || in_bundle {
        reporter.add_error(
            subject.tracker_type,
            subject.uid,
            TrackerErrorCode::E1064,
            [value, attribute_uid],
        );
    }
}
