use async_trait::async_trait;

use super::TrackerPreheat;
use crate::domain::TrackerPayload;
use crate::error::StorageResult;
use crate::store::TrackerReader;

/// One loader unit of the preheat chain.
///
/// A supplier looks at the part of the payload it cares about, loads the
/// referenced objects with a bounded number of bulk reads and adds them to
/// the cache. Suppliers run in registration order, so a supplier may rely on
/// what earlier ones loaded.
#[async_trait]
pub trait PreheatSupplier: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Loads this supplier's slice of the cache.
    async fn add(
        &self,
        reader: &dyn TrackerReader,
        payload: &TrackerPayload,
        preheat: &mut TrackerPreheat,
    ) -> StorageResult<()>;
}
