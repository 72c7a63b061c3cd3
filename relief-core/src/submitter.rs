use crate::error::{ApiError, SubmitError};
use async_trait::async_trait;
use disaster_registry::{CreateDisasterRequest, Disaster, DisasterDraft};
use tracing::{info, warn};

#[async_trait]
pub trait DisasterWriter: Send + Sync {
    async fn post_disaster(&self, request: &CreateDisasterRequest) -> Result<Disaster, ApiError>;
}

/// Validates the draft and sends the create command.
///
/// The returned disaster is not inserted into client state. It arrives
/// through the live `disaster_created` event or the next list refresh, and
/// the engine's upsert absorbs whichever comes first.
pub async fn create_disaster<W>(writer: &W, draft: &DisasterDraft) -> Result<Disaster, SubmitError>
where
    W: DisasterWriter + ?Sized,
{
    let request = draft.validate().map_err(|err| {
        warn!(field = err.field, "rejected disaster draft");
        err
    })?;
    let created = writer.post_disaster(&request).await?;
    info!(disaster_id = %created.id, title = %created.title, "disaster created");
    Ok(created)
}
