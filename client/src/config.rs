//! Client configuration

use shared::{OBSERVER_PATH, PLAYER_PATH};

pub const DEFAULT_HTTP_URL: &str = "http://localhost:3000";
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000";

/// Which server feed a connection subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Role {
    /// Read-only mirror of the global game state
    #[default]
    Observer,
    /// Joins the game and exchanges turns and moves
    Player,
}

impl Role {
    pub fn path(&self) -> &'static str {
        match self {
            Role::Observer => OBSERVER_PATH,
            Role::Player => PLAYER_PATH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub http_url: String,
    pub ws_url: String,
    pub role: Role,
    /// Drop delta batches older than the mirror's round instead of applying them.
    pub reject_stale_rounds: bool,
}

impl ClientConfig {
    /// Builds both endpoints from a bare `host:port`.
    pub fn for_server(server: &str, role: Role) -> Self {
        let server = server.trim_end_matches('/');
        Self {
            http_url: format!("http://{}", server),
            ws_url: format!("ws://{}", server),
            role,
            reject_stale_rounds: false,
        }
    }

    pub fn socket_url(&self) -> String {
        format!("{}{}", self.ws_url.trim_end_matches('/'), self.role.path())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.http_url.trim_end_matches('/'), path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_url: DEFAULT_HTTP_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            role: Role::Observer,
            reject_stale_rounds: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.socket_url(), "ws://localhost:3000/ws/observer");
        assert_eq!(
            config.endpoint(shared::GAME_STATE_PATH),
            "http://localhost:3000/game-state"
        );
        assert!(!config.reject_stale_rounds);
    }

    #[test]
    fn test_for_server_player() {
        let config = ClientConfig::for_server("127.0.0.1:9000/", Role::Player);
        assert_eq!(config.socket_url(), "ws://127.0.0.1:9000/ws/player");
        assert_eq!(config.endpoint("/start"), "http://127.0.0.1:9000/start");
    }
}
