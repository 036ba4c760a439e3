//! Response normalization.
//!
//! Folds a JSON:API document into the identity map: `included` side-loads
//! first, then primary data, returning the primary keys in document order.

use tracing::debug;

use tether_wire::{Document, ResourceKey};

use crate::error::StoreResult;
use crate::identity::IdentityMap;

/// Merge every resource in `document` into `map`. Returns the primary
/// resource keys in document order.
pub(crate) fn normalize(map: &IdentityMap, document: &Document) -> StoreResult<Vec<ResourceKey>> {
    for raw in &document.included {
        map.upsert(raw)?;
    }

    let mut primary = Vec::new();
    for raw in document.primary() {
        let record = map.upsert(raw)?;
        primary.push(record.key().expect("upserted record carries an id"));
    }

    debug!(
        primary = primary.len(),
        included = document.included.len(),
        "document normalized"
    );
    Ok(primary)
}
