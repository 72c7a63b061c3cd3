pub mod context;
pub mod logging;
pub mod runtime;
pub mod sink;

use crate::context::ReliefContext;
use crate::runtime::ReliefRuntime;
use crate::sink::TracingSink;
use relief_core::{ConfigError, ConnectionError, ReliefConfig, SubmitError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("relief runtime has stopped")]
    Stopped,
}

/// Runs against a live backend until Ctrl-C.
pub async fn run(config: ReliefConfig, select: Option<String>) -> Result<(), ClientError> {
    let context = ReliefContext::build(&config)?;
    let handle = ReliefRuntime::spawn(context, TracingSink);
    if let Some(id) = select.as_deref() {
        handle.select(Some(id))?;
    }
    tracing::info!(api = %config.api_url, socket = %config.socket_url, "relief client running");
    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;
    Ok(())
}

#[cfg(feature = "demo")]
pub use demo::run_demo;

#[cfg(feature = "demo")]
mod demo {
    use super::*;
    use crate::sink::WatchSink;
    use chrono::Utc;
    use disaster_registry::{CreateDisasterRequest, DisasterDraft, SocialMediaPost, Urgency};
    use relief_core::config::DEFAULT_USER_ID;
    use relief_core::{DetailSnapshot, ReliefState};
    use relief_fixture_server::seed::FLOOD_ID;
    use relief_fixture_server::FixtureState;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::sync::watch;

    const STEP_TIMEOUT: Duration = Duration::from_secs(10);

    async fn wait_until(
        view: &mut watch::Receiver<ReliefState>,
        what: &'static str,
        done: impl FnMut(&ReliefState) -> bool,
    ) -> Result<(), ClientError> {
        match tokio::time::timeout(STEP_TIMEOUT, view.wait_for(done)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ClientError::Stopped),
            Err(_) => Err(ClientError::Timeout(what)),
        }
    }

    async fn wait_for_room(fixture: &FixtureState, room: &str) -> Result<(), ClientError> {
        let poll = async {
            while fixture.room_members(room) == 0 {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        };
        tokio::time::timeout(STEP_TIMEOUT, poll)
            .await
            .map_err(|_| ClientError::Timeout("room join"))
    }

    /// Scripted session against an in-process fixture server: load, select,
    /// receive live changes, create. Returns the final state.
    pub async fn run_demo() -> Result<ReliefState, ClientError> {
        let fixture = FixtureState::seeded();
        let (addr, server) =
            relief_fixture_server::spawn(SocketAddr::from(([127, 0, 0, 1], 0)), fixture.clone())
                .await?;
        let config = ReliefConfig::new(&format!("http://{addr}"), DEFAULT_USER_ID)?;

        let (sink, mut view) = WatchSink::new();
        let handle = ReliefRuntime::spawn(ReliefContext::build(&config)?, sink);
        wait_until(&mut view, "initial load", |s| s.live && !s.disasters.is_empty()).await?;

        handle.select(Some(FLOOD_ID))?;
        wait_until(&mut view, "detail load", |s| !s.social_media.is_empty()).await?;
        wait_for_room(&fixture, FLOOD_ID).await?;

        fixture.update_disaster(
            FLOOD_ID,
            CreateDisasterRequest {
                title: "NYC Flood - Severe".into(),
                location_name: "Lower East Side, Manhattan".into(),
                description: "Water levels still rising; evacuations under way.".into(),
                tags: vec!["flood".into(), "severe".into()],
            },
        );
        fixture.replace_detail(
            FLOOD_ID,
            DetailSnapshot::SocialMedia(vec![SocialMediaPost {
                id: "post-live".into(),
                platform: "twitter".into(),
                user: "citizen7".into(),
                content: "Boats needed on Pitt St".into(),
                timestamp: Utc::now().to_rfc3339(),
                location: "Pitt St".into(),
                urgency: Urgency::Critical,
                verified: false,
            }]),
        );
        wait_until(&mut view, "live update", |s| {
            s.social_media.len() == 1
                && s.disaster(FLOOD_ID).is_some_and(|d| d.title == "NYC Flood - Severe")
        })
        .await?;

        let created = handle
            .create_disaster(DisasterDraft {
                title: "Power outage".into(),
                location_name: "Astoria, Queens".into(),
                description: "Substation failure after the storm.".into(),
                tags: "power, outage".into(),
            })
            .await?;
        wait_until(&mut view, "created disaster", |s| s.disaster(&created.id).is_some()).await?;

        let state = handle.snapshot().await?;
        handle.shutdown().await;
        server.abort();
        Ok(state)
    }
}
