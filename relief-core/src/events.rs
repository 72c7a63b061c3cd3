//! Typed decoding of push-channel events.
//!
//! Every inbound payload is converted into one [`LiveEvent`] variant at the
//! transport boundary. Anything that does not fit is rejected as a
//! [`MalformedEventError`] and never reaches the engine as untyped JSON.

use crate::error::MalformedEventError;
use crate::model::{DetailKind, DetailSnapshot};
use disaster_registry::{
    validate_disaster, Disaster, PostsEnvelope, ResourcesEnvelope, UpdatesEnvelope,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const JOIN_DISASTER: &str = "join_disaster";
pub const LEAVE_DISASTER: &str = "leave_disaster";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    DisasterCreated,
    DisasterUpdated,
    SocialMediaUpdated,
    ResourcesUpdated,
    OfficialUpdatesUpdated,
}

impl EventName {
    pub const ALL: [EventName; 5] = [
        EventName::DisasterCreated,
        EventName::DisasterUpdated,
        EventName::SocialMediaUpdated,
        EventName::ResourcesUpdated,
        EventName::OfficialUpdatesUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DisasterCreated => "disaster_created",
            Self::DisasterUpdated => "disaster_updated",
            Self::SocialMediaUpdated => "social_media_updated",
            Self::ResourcesUpdated => "resources_updated",
            Self::OfficialUpdatesUpdated => "official_updates_updated",
        }
    }

    /// The replace-event that carries the given detail collection.
    pub fn for_detail(kind: DetailKind) -> Self {
        match kind {
            DetailKind::SocialMedia => Self::SocialMediaUpdated,
            DetailKind::Resources => Self::ResourcesUpdated,
            DetailKind::OfficialUpdates => Self::OfficialUpdatesUpdated,
        }
    }
}

impl FromStr for EventName {
    type Err = MalformedEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| MalformedEventError {
                event: s.to_string(),
                reason: "unknown event name".into(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiveEvent {
    DisasterCreated(Disaster),
    DisasterUpdated(Disaster),
    /// Full replacement of one detail collection. `scope` is the disaster the
    /// collection belongs to: the payload's own `disaster_id` when present,
    /// otherwise the room the connection had joined when the event arrived.
    DetailReplaced {
        scope: Option<String>,
        snapshot: DetailSnapshot,
    },
}

pub fn decode_event(
    name: EventName,
    payload: serde_json::Value,
    room: Option<&str>,
) -> Result<LiveEvent, MalformedEventError> {
    let room = room.map(ToString::to_string);
    match name {
        EventName::DisasterCreated => decode_disaster(name, payload).map(LiveEvent::DisasterCreated),
        EventName::DisasterUpdated => decode_disaster(name, payload).map(LiveEvent::DisasterUpdated),
        EventName::SocialMediaUpdated => {
            let env: PostsEnvelope = decode_payload(name, payload)?;
            Ok(LiveEvent::DetailReplaced {
                scope: env.disaster_id.or(room),
                snapshot: DetailSnapshot::SocialMedia(env.posts),
            })
        }
        EventName::ResourcesUpdated => {
            let env: ResourcesEnvelope = decode_payload(name, payload)?;
            Ok(LiveEvent::DetailReplaced {
                scope: env.disaster_id.or(room),
                snapshot: DetailSnapshot::Resources(env.resources),
            })
        }
        EventName::OfficialUpdatesUpdated => {
            let env: UpdatesEnvelope = decode_payload(name, payload)?;
            Ok(LiveEvent::DetailReplaced {
                scope: env.disaster_id.or(room),
                snapshot: DetailSnapshot::OfficialUpdates(env.updates),
            })
        }
    }
}

fn decode_disaster(name: EventName, payload: serde_json::Value) -> Result<Disaster, MalformedEventError> {
    let disaster: Disaster = decode_payload(name, payload)?;
    validate_disaster(&disaster).map_err(|e| MalformedEventError {
        event: name.as_str().into(),
        reason: e.to_string(),
    })?;
    Ok(disaster)
}

fn decode_payload<T: DeserializeOwned>(
    name: EventName,
    payload: serde_json::Value,
) -> Result<T, MalformedEventError> {
    serde_json::from_value(payload).map_err(|e| MalformedEventError {
        event: name.as_str().into(),
        reason: e.to_string(),
    })
}
