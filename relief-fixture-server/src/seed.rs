use crate::FixtureState;
use chrono::{Duration, Utc};
use disaster_registry::{
    Disaster, OfficialUpdate, Priority, ReportCount, Resource, SocialMediaPost, Urgency,
};
use relief_core::DetailSnapshot;

pub const FLOOD_ID: &str = "demo-flood-nyc";
pub const FIRE_ID: &str = "demo-fire-brooklyn";

pub fn seed_demo_data(state: &FixtureState) {
    let now = Utc::now();

    state.insert_disaster(Disaster {
        id: FIRE_ID.into(),
        title: "Warehouse fire".into(),
        location_name: "Red Hook, Brooklyn".into(),
        description: "Large structure fire, smoke advisory for the waterfront.".into(),
        tags: vec!["fire".into(), "smoke".into()],
        owner_id: "reliefAdmin".into(),
        created_at: now - Duration::hours(5),
        reports: Some(vec![ReportCount { count: 2 }]),
    });
    state.insert_disaster(Disaster {
        id: FLOOD_ID.into(),
        title: "NYC Flood".into(),
        location_name: "Lower East Side, Manhattan".into(),
        description: "Heavy flooding after overnight rain; several streets closed.".into(),
        tags: vec!["flood".into(), "urgent".into()],
        owner_id: "netrunnerX".into(),
        created_at: now - Duration::hours(2),
        reports: Some(vec![ReportCount { count: 5 }]),
    });

    state.set_detail(
        FLOOD_ID,
        DetailSnapshot::SocialMedia(vec![
            SocialMediaPost {
                id: "post-1".into(),
                platform: "twitter".into(),
                user: "citizen1".into(),
                content: "#floodrelief need water and food on Delancey St".into(),
                timestamp: (now - Duration::minutes(40)).to_rfc3339(),
                location: "Delancey St".into(),
                urgency: Urgency::High,
                verified: false,
            },
            SocialMediaPost {
                id: "post-2".into(),
                platform: "bluesky".into(),
                user: "reliefvolunteer".into(),
                content: "Shelter open at the community center on Grand St".into(),
                timestamp: (now - Duration::minutes(25)).to_rfc3339(),
                location: "Grand St".into(),
                urgency: Urgency::Medium,
                verified: true,
            },
        ]),
    );
    state.set_detail(
        FLOOD_ID,
        DetailSnapshot::Resources(vec![Resource {
            id: "res-1".into(),
            name: "Red Cross Shelter".into(),
            location_name: "Grand St Community Center".into(),
            kind: "shelter".into(),
            description: Some("Capacity 120".into()),
        }]),
    );
    state.set_detail(
        FLOOD_ID,
        DetailSnapshot::OfficialUpdates(vec![OfficialUpdate {
            id: "upd-1".into(),
            source: "NYC Emergency Management".into(),
            title: "Avoid FDR Drive".into(),
            content: "FDR Drive closed between Houston and Grand due to flooding.".into(),
            published_at: (now - Duration::minutes(55)).to_rfc3339(),
            priority: Priority::High,
        }]),
    );
}
