use relief_core::{ReliefState, ViewChange};
use tokio::sync::watch;
use tracing::info;

/// Receives every view change together with the state it produced.
pub trait ViewSink: Send + 'static {
    fn emit(&self, change: ViewChange, state: &ReliefState);
}

/// Logs a one-line summary per change.
pub struct TracingSink;

impl ViewSink for TracingSink {
    fn emit(&self, change: ViewChange, state: &ReliefState) {
        match change {
            ViewChange::Disasters => info!(count = state.disasters.len(), "disasters"),
            ViewChange::Selection => {
                info!(selected = state.selected.as_deref().unwrap_or("-"), "selection")
            }
            ViewChange::Detail(kind) => info!(%kind, count = state.detail_len(kind), "detail"),
            ViewChange::Link => info!(live = state.live, "push channel"),
            ViewChange::Loading => info!(loading = state.loading, "loading"),
            ViewChange::Error => info!(error = state.last_error.as_deref().unwrap_or("-"), "error"),
        }
    }
}

/// Publishes the latest state on a watch channel.
pub struct WatchSink {
    tx: watch::Sender<ReliefState>,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<ReliefState>) {
        let (tx, rx) = watch::channel(ReliefState::default());
        (Self { tx }, rx)
    }
}

impl ViewSink for WatchSink {
    fn emit(&self, _change: ViewChange, state: &ReliefState) {
        self.tx.send_replace(state.clone());
    }
}
