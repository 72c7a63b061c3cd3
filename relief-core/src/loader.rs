use crate::error::ApiError;
use crate::model::{DetailKind, DetailSnapshot};
use async_trait::async_trait;
use disaster_registry::Disaster;
use std::collections::HashSet;
use tracing::warn;

/// One-shot bulk reads against the request/response API.
///
/// Each call is a single idempotent read. Failures come back as
/// [`ApiError`]; the loader never retries and never touches client state.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_disasters(&self) -> Result<Vec<Disaster>, ApiError>;

    async fn fetch_detail(
        &self,
        disaster_id: &str,
        kind: DetailKind,
    ) -> Result<DetailSnapshot, ApiError>;
}

/// Drops blank and repeated identifiers, keeping the first occurrence and
/// the server's ordering.
pub fn normalize_disasters(list: Vec<Disaster>) -> Vec<Disaster> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(list.len());
    for disaster in list {
        if disaster.id.trim().is_empty() {
            warn!("discarding disaster without identifier from list response");
            continue;
        }
        if !seen.insert(disaster.id.clone()) {
            warn!(disaster_id = %disaster.id, "discarding duplicate disaster from list response");
            continue;
        }
        out.push(disaster);
    }
    out
}
