use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCount {
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disaster {
    pub id: String,
    pub title: String,
    pub location_name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    /// Aggregate embedded by the list endpoint; absent on live events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reports: Option<Vec<ReportCount>>,
}

impl Disaster {
    pub fn report_count(&self) -> u64 {
        self.reports
            .as_deref()
            .map(|r| r.iter().map(|c| c.count).sum())
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMediaPost {
    pub id: String,
    pub platform: String,
    pub user: String,
    pub content: String,
    pub timestamp: String,
    pub location: String,
    pub urgency: Urgency,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub location_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialUpdate {
    pub id: String,
    pub source: String,
    pub title: String,
    pub content: String,
    pub published_at: String,
    pub priority: Priority,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostsEnvelope {
    pub posts: Vec<SocialMediaPost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disaster_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesEnvelope {
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disaster_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatesEnvelope {
    pub updates: Vec<OfficialUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disaster_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDisasterRequest {
    pub title: String,
    pub location_name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Raw form input for a new disaster. `tags` is the comma-separated text
/// exactly as typed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisasterDraft {
    pub title: String,
    pub location_name: String,
    pub description: String,
    pub tags: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("{field} is required")]
pub struct ValidationError {
    pub field: &'static str,
}

impl DisasterDraft {
    pub fn validate(&self) -> Result<CreateDisasterRequest, ValidationError> {
        let title = required("title", &self.title)?;
        let location_name = required("location_name", &self.location_name)?;
        let description = required("description", &self.description)?;
        Ok(CreateDisasterRequest {
            title,
            location_name,
            description,
            tags: parse_tags(&self.tags),
        })
    }
}

impl CreateDisasterRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("title", &self.title)?;
        required("location_name", &self.location_name)?;
        required("description", &self.description)?;
        Ok(())
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError { field });
    }
    Ok(trimmed.to_string())
}

pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|seen| seen == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

pub fn validate_disaster(disaster: &Disaster) -> Result<(), ValidationError> {
    if disaster.id.trim().is_empty() {
        return Err(ValidationError { field: "id" });
    }
    Ok(())
}
