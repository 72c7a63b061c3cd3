//! The single task that owns client state.
//!
//! Fetch results, live events and link status all arrive through one inbox
//! and are applied in arrival order. Commands from the rendering layer are
//! taken only once the inbox is drained.

use crate::context::ReliefContext;
use crate::sink::ViewSink;
use crate::ClientError;
use disaster_registry::{Disaster, DisasterDraft};
use relief_core::loader::SnapshotSource;
use relief_core::submitter::{create_disaster, DisasterWriter};
use relief_core::subscription::{SelectOutcome, SubscriptionManager};
use relief_core::transport::{Inbox, PushChannel};
use relief_core::{DetailKind, Engine, Inbound, ReliefState, SubmitError, ViewChange};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

enum Command {
    Select(Option<String>),
    Refresh,
    Create(DisasterDraft, oneshot::Sender<Result<Disaster, SubmitError>>),
    Snapshot(oneshot::Sender<ReliefState>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front door to a running [`ReliefRuntime`].
#[derive(Clone)]
pub struct ReliefHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ReliefHandle {
    pub fn select(&self, disaster_id: Option<&str>) -> Result<(), ClientError> {
        self.send(Command::Select(disaster_id.map(ToString::to_string)))
    }

    pub fn refresh(&self) -> Result<(), ClientError> {
        self.send(Command::Refresh)
    }

    /// Submits a new disaster. The list picks it up through the live event
    /// or the refresh that follows a successful create.
    pub async fn create_disaster(&self, draft: DisasterDraft) -> Result<Disaster, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Create(draft, tx))?;
        let created = rx.await.map_err(|_| ClientError::Stopped)??;
        Ok(created)
    }

    pub async fn snapshot(&self) -> Result<ReliefState, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| ClientError::Stopped)
    }

    /// Closes the push channel and abandons in-flight fetches. Returns once
    /// the runtime task is done.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Stopped)
    }
}

pub struct ReliefRuntime<S> {
    engine: Engine,
    subscriptions: SubscriptionManager,
    source: Arc<dyn SnapshotSource>,
    writer: Arc<dyn DisasterWriter>,
    channel: Arc<dyn PushChannel>,
    inbox_tx: Inbox,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    pending: Vec<JoinHandle<()>>,
    sink: S,
}

impl<S: ViewSink> ReliefRuntime<S> {
    /// Starts the runtime loop and issues the initial disaster-list fetch.
    pub fn spawn(context: ReliefContext, sink: S) -> ReliefHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let followups = commands.downgrade();
        let runtime = Self {
            engine: Engine::new(),
            subscriptions: SubscriptionManager::new(),
            source: context.source,
            writer: context.writer,
            channel: context.channel,
            inbox_tx: context.inbox_tx,
            inbox: context.inbox,
            pending: Vec::new(),
            sink,
        };
        tokio::spawn(runtime.run(rx, followups));
        ReliefHandle { commands }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        followups: mpsc::WeakUnboundedSender<Command>,
    ) {
        self.refresh();
        loop {
            tokio::select! {
                biased;
                inbound = self.inbox.recv() => match inbound {
                    Some(inbound) => {
                        let changes = self.engine.apply(inbound);
                        self.emit(changes);
                    }
                    None => break,
                },
                command = commands.recv() => match command {
                    Some(Command::Shutdown(done)) => {
                        commands.close();
                        self.shutdown().await;
                        let _ = done.send(());
                        return;
                    }
                    Some(command) => self.handle(command, &followups),
                    None => break,
                },
            }
        }
        self.shutdown().await;
    }

    fn handle(&mut self, command: Command, followups: &mpsc::WeakUnboundedSender<Command>) {
        match command {
            Command::Select(target) => self.select(target.as_deref()),
            Command::Refresh => self.refresh(),
            Command::Create(draft, reply) => {
                let writer = Arc::clone(&self.writer);
                let followups = followups.clone();
                self.track(tokio::spawn(async move {
                    let result = create_disaster(writer.as_ref(), &draft).await;
                    if result.is_ok() {
                        if let Some(commands) = followups.upgrade() {
                            let _ = commands.send(Command::Refresh);
                        }
                    }
                    let _ = reply.send(result);
                }));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.engine.state().clone());
            }
            Command::Shutdown(_) => {}
        }
    }

    fn select(&mut self, target: Option<&str>) {
        let outcome = self.subscriptions.select(target, self.channel.as_ref());
        let changes = self.engine.select(&outcome);
        self.emit(changes);

        let SelectOutcome::Switched(ticket) = outcome else {
            return;
        };
        info!(disaster_id = %ticket.disaster_id, "selected disaster");
        for kind in DetailKind::ALL {
            let source = Arc::clone(&self.source);
            let inbox = self.inbox_tx.clone();
            let ticket = ticket.clone();
            self.track(tokio::spawn(async move {
                let result = source.fetch_detail(&ticket.disaster_id, kind).await;
                let _ = inbox.send(Inbound::DetailLoaded {
                    ticket,
                    kind,
                    result,
                });
            }));
        }
    }

    fn refresh(&mut self) {
        let ticket = self.engine.begin_list_fetch();
        self.emit(vec![ViewChange::Loading]);
        let source = Arc::clone(&self.source);
        let inbox = self.inbox_tx.clone();
        self.track(tokio::spawn(async move {
            let result = source.fetch_disasters().await;
            let _ = inbox.send(Inbound::DisastersLoaded { ticket, result });
        }));
    }

    fn track(&mut self, task: JoinHandle<()>) {
        self.pending.retain(|task| !task.is_finished());
        self.pending.push(task);
    }

    fn emit(&self, changes: Vec<ViewChange>) {
        let state = self.engine.state();
        for change in changes {
            self.sink.emit(change, state);
        }
    }

    async fn shutdown(&mut self) {
        self.channel.disconnect().await;
        for task in self.pending.drain(..) {
            task.abort();
        }
        debug!("runtime stopped");
    }
}
