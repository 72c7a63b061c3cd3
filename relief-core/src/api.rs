use crate::config::ReliefConfig;
use crate::error::{ApiError, ApiFailure, ApiOperation, ConfigError};
use crate::loader::{normalize_disasters, SnapshotSource};
use crate::model::{DetailKind, DetailSnapshot};
use crate::submitter::DisasterWriter;
use async_trait::async_trait;
use disaster_registry::{
    CreateDisasterRequest, Disaster, PostsEnvelope, ResourcesEnvelope, UpdatesEnvelope,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";
const DISASTERS_PATH: [&str; 2] = ["api", "disasters"];

/// HTTP client for the coordination API. Every request carries the fixed
/// identity header.
#[derive(Clone)]
pub struct HttpApi {
    config: ReliefConfig,
    client: Client,
}

impl HttpApi {
    pub fn new(config: &ReliefConfig) -> Result<Self, ConfigError> {
        let identity = HeaderValue::from_str(&config.user_id).map_err(|e| ConfigError::Invalid {
            var: "RELIEF_USER_ID",
            reason: e.to_string(),
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(USER_ID_HEADER), identity);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::Invalid {
                var: "RELIEF_API_URL",
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: ApiOperation,
        endpoint: String,
        disaster_id: Option<&str>,
    ) -> Result<T, ApiError> {
        let fail = |failure| ApiError {
            operation,
            endpoint: endpoint.clone(),
            disaster_id: disaster_id.map(ToString::to_string),
            failure,
        };

        let response = request.send().await.map_err(|e| fail(transport_failure(&e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fail(ApiFailure::Status(status.as_u16())));
        }
        let body = response.bytes().await.map_err(|e| fail(transport_failure(&e)))?;
        serde_json::from_slice(&body).map_err(|e| fail(ApiFailure::Decode(e.to_string())))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: ApiOperation,
        path: &[&str],
        disaster_id: Option<&str>,
    ) -> Result<T, ApiError> {
        let endpoint = self.config.endpoint(path);
        debug!(%endpoint, "GET");
        let request = self.client.get(&endpoint);
        self.request_json(request, operation, endpoint, disaster_id).await
    }
}

fn transport_failure(err: &reqwest::Error) -> ApiFailure {
    if err.is_timeout() {
        ApiFailure::Timeout
    } else {
        ApiFailure::Transport(err.to_string())
    }
}

#[async_trait]
impl SnapshotSource for HttpApi {
    async fn fetch_disasters(&self) -> Result<Vec<Disaster>, ApiError> {
        let list: Vec<Disaster> = self
            .get_json(ApiOperation::ListDisasters, &DISASTERS_PATH, None)
            .await?;
        Ok(normalize_disasters(list))
    }

    async fn fetch_detail(
        &self,
        disaster_id: &str,
        kind: DetailKind,
    ) -> Result<DetailSnapshot, ApiError> {
        let operation = ApiOperation::FetchDetail(kind);
        let path = kind.segments(disaster_id);
        // Dot segments are dropped when the URL is built, which would address
        // a different route.
        if matches!(disaster_id, "" | "." | "..") {
            return Err(ApiError {
                operation,
                endpoint: self.config.endpoint(&path),
                disaster_id: Some(disaster_id.to_string()),
                failure: ApiFailure::UnaddressableId,
            });
        }
        let id = Some(disaster_id);
        let snapshot = match kind {
            DetailKind::SocialMedia => {
                let env: PostsEnvelope = self.get_json(operation, &path, id).await?;
                DetailSnapshot::SocialMedia(env.posts)
            }
            DetailKind::Resources => {
                let env: ResourcesEnvelope = self.get_json(operation, &path, id).await?;
                DetailSnapshot::Resources(env.resources)
            }
            DetailKind::OfficialUpdates => {
                let env: UpdatesEnvelope = self.get_json(operation, &path, id).await?;
                DetailSnapshot::OfficialUpdates(env.updates)
            }
        };
        Ok(snapshot)
    }
}

#[async_trait]
impl DisasterWriter for HttpApi {
    async fn post_disaster(&self, request: &CreateDisasterRequest) -> Result<Disaster, ApiError> {
        let endpoint = self.config.endpoint(&DISASTERS_PATH);
        debug!(%endpoint, "POST");
        let builder = self.client.post(&endpoint).json(request);
        self.request_json(builder, ApiOperation::CreateDisaster, endpoint, None)
            .await
    }
}
