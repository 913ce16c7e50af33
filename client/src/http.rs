//! Request/response side of the server contract

use crate::config::ClientConfig;
use crate::error::Result;
use log::{debug, warn};
use shared::{GameSnapshot, GAME_STATE_PATH, START_PATH, STOP_PATH};
use std::fmt;

/// The three snapshot-returning endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRequest {
    Sync,
    Start,
    Stop,
}

impl SnapshotRequest {
    pub fn path(&self) -> &'static str {
        match self {
            SnapshotRequest::Sync => GAME_STATE_PATH,
            SnapshotRequest::Start => START_PATH,
            SnapshotRequest::Stop => STOP_PATH,
        }
    }
}

impl fmt::Display for SnapshotRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotRequest::Sync => f.write_str("sync"),
            SnapshotRequest::Start => f.write_str("start"),
            SnapshotRequest::Stop => f.write_str("stop"),
        }
    }
}

/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GameServerApi {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GameServerApi {
    pub fn new(config: &ClientConfig) -> Self {
        // Game servers are addressed directly, never through a system proxy
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            config: config.clone(),
        }
    }

    pub fn url(&self, request: SnapshotRequest) -> String {
        self.config.endpoint(request.path())
    }

    pub async fn fetch(&self, request: SnapshotRequest) -> Result<GameSnapshot> {
        let url = self.url(request);
        debug!("GET {}", url);

        let snapshot = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<GameSnapshot>()
            .await?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_urls() {
        let config = ClientConfig {
            http_url: "http://arena.local:3000/".to_string(),
            ..ClientConfig::default()
        };
        let api = GameServerApi::new(&config);

        assert_eq!(
            api.url(SnapshotRequest::Sync),
            "http://arena.local:3000/game-state"
        );
        assert_eq!(api.url(SnapshotRequest::Start), "http://arena.local:3000/start");
        assert_eq!(api.url(SnapshotRequest::Stop), "http://arena.local:3000/stop");
    }

    #[test]
    fn test_fetch_unreachable_server_is_transport_error() {
        let config = ClientConfig::for_server("127.0.0.1:1", crate::config::Role::Observer);
        let api = GameServerApi::new(&config);

        let result = tokio_test::block_on(api.fetch(SnapshotRequest::Sync));
        assert!(result.unwrap_err().is_transport());
    }
}
