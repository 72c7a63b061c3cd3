//! Reconciliation of bulk fetches and live events into one client state.
//!
//! Inputs arrive through a single ordered queue ([`Inbound`]) and are applied
//! strictly in arrival order. Disaster entries are keyed by identifier and
//! never duplicated. Detail collections are complete snapshots and are only
//! ever replaced wholesale, and only while their scope matches the current
//! selection.

use crate::error::{ApiError, ConnectionError, MalformedEventError};
use crate::events::LiveEvent;
use crate::model::{DetailKind, DetailSnapshot};
use crate::subscription::{SelectOutcome, SelectionTicket};
use disaster_registry::{Disaster, OfficialUpdate, Resource, SocialMediaPost};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down(ConnectionError),
}

/// Sequence number of a disaster-list fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListTicket(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Link(LinkStatus),
    Live(Result<LiveEvent, MalformedEventError>),
    DisastersLoaded {
        ticket: ListTicket,
        result: Result<Vec<Disaster>, ApiError>,
    },
    DetailLoaded {
        ticket: SelectionTicket,
        kind: DetailKind,
        result: Result<DetailSnapshot, ApiError>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewChange {
    Disasters,
    Selection,
    Detail(DetailKind),
    Link,
    Loading,
    Error,
}

/// Read-only view handed to the rendering layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReliefState {
    pub disasters: Vec<Disaster>,
    pub selected: Option<String>,
    pub social_media: Vec<SocialMediaPost>,
    pub resources: Vec<Resource>,
    pub official_updates: Vec<OfficialUpdate>,
    pub loading: bool,
    pub live: bool,
    pub last_error: Option<String>,
    pub dropped_events: u64,
}

impl ReliefState {
    pub fn disaster(&self, id: &str) -> Option<&Disaster> {
        self.disasters.iter().find(|d| d.id == id)
    }

    pub fn detail_len(&self, kind: DetailKind) -> usize {
        match kind {
            DetailKind::SocialMedia => self.social_media.len(),
            DetailKind::Resources => self.resources.len(),
            DetailKind::OfficialUpdates => self.official_updates.len(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Engine {
    state: ReliefState,
    scope: Option<SelectionTicket>,
    issued_lists: u64,
    applied_list: Option<ListTicket>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ReliefState {
        &self.state
    }

    /// Marks a list fetch as in flight and returns its ticket.
    pub fn begin_list_fetch(&mut self) -> ListTicket {
        self.issued_lists += 1;
        self.state.loading = true;
        ListTicket(self.issued_lists)
    }

    /// Re-scopes detail collections after the subscription manager moved.
    pub fn select(&mut self, outcome: &SelectOutcome) -> Vec<ViewChange> {
        let ticket = match outcome {
            SelectOutcome::Unchanged => return Vec::new(),
            SelectOutcome::Cleared => None,
            SelectOutcome::Switched(ticket) => Some(ticket.clone()),
        };
        self.state.selected = ticket.as_ref().map(|t| t.disaster_id.clone());
        self.scope = ticket;
        self.state.social_media.clear();
        self.state.resources.clear();
        self.state.official_updates.clear();

        let mut changes = vec![ViewChange::Selection];
        changes.extend(DetailKind::ALL.map(ViewChange::Detail));
        changes
    }

    pub fn apply(&mut self, input: Inbound) -> Vec<ViewChange> {
        match input {
            Inbound::Link(status) => self.apply_link(status),
            Inbound::Live(Ok(event)) => self.apply_live(event),
            Inbound::Live(Err(err)) => {
                warn!(event = %err.event, reason = %err.reason, "dropping malformed event");
                self.state.dropped_events += 1;
                Vec::new()
            }
            Inbound::DisastersLoaded { ticket, result } => self.apply_list(ticket, result),
            Inbound::DetailLoaded {
                ticket,
                kind,
                result,
            } => self.apply_detail_fetch(ticket, kind, result),
        }
    }

    fn apply_link(&mut self, status: LinkStatus) -> Vec<ViewChange> {
        let live = matches!(status, LinkStatus::Up);
        if self.state.live == live {
            return Vec::new();
        }
        self.state.live = live;
        vec![ViewChange::Link]
    }

    fn apply_live(&mut self, event: LiveEvent) -> Vec<ViewChange> {
        match event {
            LiveEvent::DisasterCreated(disaster) => self.upsert_disaster(disaster),
            LiveEvent::DisasterUpdated(disaster) => self.update_disaster(disaster),
            LiveEvent::DetailReplaced { scope, snapshot } => {
                let current = self.scope.as_ref().map(|t| t.disaster_id.as_str());
                if scope.is_none() || scope.as_deref() != current {
                    debug!(
                        kind = %snapshot.kind(),
                        scope = scope.as_deref().unwrap_or("-"),
                        "discarding live detail outside current selection"
                    );
                    return Vec::new();
                }
                vec![self.replace_detail(snapshot)]
            }
        }
    }

    fn upsert_disaster(&mut self, disaster: Disaster) -> Vec<ViewChange> {
        match self.state.disasters.iter_mut().find(|d| d.id == disaster.id) {
            Some(existing) => *existing = disaster,
            None => {
                info!(disaster_id = %disaster.id, "new disaster");
                self.state.disasters.insert(0, disaster);
            }
        }
        vec![ViewChange::Disasters]
    }

    fn update_disaster(&mut self, disaster: Disaster) -> Vec<ViewChange> {
        let Some(existing) = self.state.disasters.iter_mut().find(|d| d.id == disaster.id) else {
            debug!(disaster_id = %disaster.id, "ignoring update for unknown disaster");
            return Vec::new();
        };
        *existing = disaster;
        vec![ViewChange::Disasters]
    }

    fn apply_list(
        &mut self,
        ticket: ListTicket,
        result: Result<Vec<Disaster>, ApiError>,
    ) -> Vec<ViewChange> {
        let mut changes = Vec::new();
        if ticket.0 == self.issued_lists && self.state.loading {
            self.state.loading = false;
            changes.push(ViewChange::Loading);
        }
        if self.applied_list.is_some_and(|applied| ticket < applied) {
            debug!(ticket = ticket.0, "discarding list fetch older than applied one");
            return changes;
        }

        match result {
            Ok(list) => {
                self.applied_list = Some(ticket);
                self.state.disasters = list;
                changes.push(ViewChange::Disasters);
            }
            Err(err) => {
                warn!(error = %err, "disaster list refresh failed; keeping current list");
                self.state.last_error = Some(err.to_string());
                changes.push(ViewChange::Error);
            }
        }
        changes
    }

    fn apply_detail_fetch(
        &mut self,
        ticket: SelectionTicket,
        kind: DetailKind,
        result: Result<DetailSnapshot, ApiError>,
    ) -> Vec<ViewChange> {
        if self.scope.as_ref() != Some(&ticket) {
            debug!(
                disaster_id = %ticket.disaster_id,
                generation = ticket.generation,
                %kind,
                "discarding stale detail fetch"
            );
            return Vec::new();
        }
        match result {
            Ok(snapshot) if snapshot.kind() == kind => vec![self.replace_detail(snapshot)],
            Ok(snapshot) => {
                warn!(expected = %kind, got = %snapshot.kind(), "detail fetch returned wrong collection");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "detail refresh failed; keeping current data");
                self.state.last_error = Some(err.to_string());
                vec![ViewChange::Error]
            }
        }
    }

    fn replace_detail(&mut self, snapshot: DetailSnapshot) -> ViewChange {
        let kind = snapshot.kind();
        match snapshot {
            DetailSnapshot::SocialMedia(posts) => self.state.social_media = posts,
            DetailSnapshot::Resources(resources) => self.state.resources = resources,
            DetailSnapshot::OfficialUpdates(updates) => self.state.official_updates = updates,
        }
        ViewChange::Detail(kind)
    }
}
