//! The built-in preheat suppliers.

mod metadata;
mod tracker;

use std::collections::BTreeSet;

use super::{PreheatSupplier, TrackerPreheat};
use crate::error::StorageResult;
use crate::identifier::TrackerIdScheme;
use crate::model::MetadataKind;
use crate::store::TrackerReader;

pub use metadata::{
    CategoryOptionComboSupplier, CategoryOptionSupplier, DataElementSupplier,
    OrganisationUnitSupplier, ProgramStageSupplier, ProgramSupplier, RelationshipTypeSupplier,
    TrackedEntityAttributeSupplier, TrackedEntityTypeSupplier, UserSupplier,
};
pub use tracker::{
    EnrollmentSupplier, EventSupplier, ProgramInstancesWithoutRegistrationSupplier,
    RelationshipSupplier, TrackedEntitySupplier, UniqueAttributeValuesSupplier,
};

/// The built-in suppliers in the order they must run.
///
/// Metadata comes first. Program stages, attributes and data elements follow
/// programs because they also load what the loaded programs and stages
/// declare. Enrollments without registration need the programs.
pub fn default_suppliers() -> Vec<Box<dyn PreheatSupplier>> {
    vec![
        Box::new(TrackedEntityTypeSupplier),
        Box::new(OrganisationUnitSupplier),
        Box::new(ProgramSupplier),
        Box::new(ProgramStageSupplier),
        Box::new(TrackedEntityAttributeSupplier),
        Box::new(DataElementSupplier),
        Box::new(CategoryOptionComboSupplier),
        Box::new(CategoryOptionSupplier),
        Box::new(RelationshipTypeSupplier),
        Box::new(UserSupplier),
        Box::new(TrackedEntitySupplier),
        Box::new(EnrollmentSupplier),
        Box::new(EventSupplier),
        Box::new(RelationshipSupplier),
        Box::new(ProgramInstancesWithoutRegistrationSupplier),
        Box::new(UniqueAttributeValuesSupplier),
    ]
}

/// Distinct, non-empty references in a stable order.
pub(crate) fn distinct<'a>(references: impl IntoIterator<Item = Option<&'a String>>) -> Vec<String> {
    references
        .into_iter()
        .flatten()
        .filter(|reference| !reference.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Loads metadata of `kind` by `values` under `scheme` in one bulk read.
pub(crate) async fn load_metadata(
    reader: &dyn TrackerReader,
    preheat: &mut TrackerPreheat,
    kind: MetadataKind,
    scheme: &TrackerIdScheme,
    values: Vec<String>,
) -> StorageResult<()> {
    if values.is_empty() {
        return Ok(());
    }
    let objects = reader.find_metadata(kind, scheme, &values).await?;
    preheat.put_metadata(scheme, objects);
    Ok(())
}
