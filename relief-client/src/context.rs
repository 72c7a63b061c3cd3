use crate::ClientError;
use relief_core::api::HttpApi;
use relief_core::events::EventName;
use relief_core::loader::SnapshotSource;
use relief_core::submitter::DisasterWriter;
use relief_core::transport::{Inbox, PushChannel, TransportAdapter};
use relief_core::{Inbound, ReliefConfig};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the runtime needs, built once at startup.
pub struct ReliefContext {
    pub source: Arc<dyn SnapshotSource>,
    pub writer: Arc<dyn DisasterWriter>,
    pub channel: Arc<dyn PushChannel>,
    pub inbox_tx: Inbox,
    pub inbox: mpsc::UnboundedReceiver<Inbound>,
}

impl ReliefContext {
    /// Builds the HTTP client and opens the push channel, listening to every
    /// live event. Must be called inside a tokio runtime.
    pub fn build(config: &ReliefConfig) -> Result<Self, ClientError> {
        let api = Arc::new(HttpApi::new(config)?);
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let adapter =
            TransportAdapter::connect(&config.socket_url, config.reconnect.clone(), inbox_tx.clone())?;
        for name in EventName::ALL {
            adapter.on(name)?;
        }
        Ok(Self {
            source: api.clone(),
            writer: api,
            channel: Arc::new(adapter),
            inbox_tx,
            inbox,
        })
    }

    pub fn from_parts(
        source: Arc<dyn SnapshotSource>,
        writer: Arc<dyn DisasterWriter>,
        channel: Arc<dyn PushChannel>,
    ) -> Self {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        Self {
            source,
            writer,
            channel,
            inbox_tx,
            inbox,
        }
    }

    /// A sender into the engine's inbox, for anything that produces events
    /// outside the transport.
    pub fn inbox_sender(&self) -> Inbox {
        self.inbox_tx.clone()
    }
}
