use serde::{Deserialize, Serialize};
use std::fmt;

pub const OBSERVER_PATH: &str = "/ws/observer";
pub const PLAYER_PATH: &str = "/ws/player";
pub const GAME_STATE_PATH: &str = "/game-state";
pub const START_PATH: &str = "/start";
pub const STOP_PATH: &str = "/stop";

/// Reserved color of an unpainted cell.
pub const BLANK_COLOR: &str = "#ffffff";

/// Opaque color token. Only equality carries meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub String);

impl Color {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn blank() -> Self {
        Self(BLANK_COLOR.to_string())
    }

    pub fn is_blank(&self) -> bool {
        self.0 == BLANK_COLOR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::blank()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub x: u32,
    pub y: u32,
}

impl Target {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Single-cell overwrite.
///
/// Coordinates are signed so a negative cell decodes and can be dropped
/// alone instead of failing its whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: i64,
    pub y: i64,
    pub color: Color,
}

impl Pixel {
    pub fn new(x: i64, y: i64, color: impl Into<Color>) -> Self {
        Self {
            x,
            y,
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub color: Color,
    #[serde(default)]
    pub score: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Player {
    pub fn new(id: impl Into<String>, color: impl Into<Color>, score: u64) -> Self {
        Self {
            id: id.into(),
            color: color.into(),
            score,
            name: None,
        }
    }
}

/// Row-major pixel grid as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapState {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl MapState {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::blank(); width as usize * height as usize],
        }
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_consistent(&self) -> bool {
        self.pixels.len() == self.cell_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    #[default]
    Waiting,
    Playing,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GamePhase::Waiting => f.write_str("waiting"),
            GamePhase::Playing => f.write_str("playing"),
        }
    }
}

/// Full authoritative state returned by the HTTP endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub state: GamePhase,
    pub round_number: u64,
    pub map: MapState,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCommand {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub available_targets: Vec<Target>,
}

impl AvailableCommand {
    pub fn new(command_type: impl Into<String>, targets: Vec<Target>) -> Self {
        Self {
            command_type: command_type.into(),
            available_targets: targets,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    /// The observer feed calls this `round`, the player feed `roundNumber`.
    #[serde(alias = "roundNumber")]
    pub round: u64,
    #[serde(default)]
    pub turn_number: Option<u64>,
    pub map_changes: Vec<Pixel>,
    /// Informational only; the grid is replaced by snapshots, never by this.
    #[serde(default)]
    pub map: Option<MapState>,
    #[serde(default)]
    pub players: Option<Vec<Player>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTurn {
    pub available_commands: Vec<AvailableCommand>,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub turn_number: Option<u64>,
    /// Context carried with the turn. Not applied to the mirror; rounds
    /// advance through `gameUpdate` and the grid through snapshots.
    #[serde(default)]
    pub round_number: Option<u64>,
    #[serde(default)]
    pub map: Option<MapState>,
    #[serde(default)]
    pub players: Option<Vec<Player>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Joined {
    pub player_id: String,
    #[serde(alias = "playerColor")]
    pub color: Color,
}

/// Inbound WebSocket messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    GameUpdate(GameUpdate),
    PlayerTurn(PlayerTurn),
    Joined(Joined),
    /// A well-formed frame with a tag this client does not handle.
    Unrecognized(String),
}

impl ServerMessage {
    pub fn tag(&self) -> &str {
        match self {
            ServerMessage::GameUpdate(_) => "gameUpdate",
            ServerMessage::PlayerTurn(_) => "playerTurn",
            ServerMessage::Joined(_) => "joined",
            ServerMessage::Unrecognized(tag) => tag,
        }
    }
}

/// Outbound WebSocket messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join,
    PlayerMove {
        command: String,
        targets: Vec<Target>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no string `type` tag")]
    MissingTag,

    #[error("invalid `{tag}` payload: {source}")]
    InvalidPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decodes one inbound text frame.
///
/// The tag is read first so that unknown tags surface as
/// [`ServerMessage::Unrecognized`] and a bad payload can name its tag.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let tag = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingTag)?
        .to_string();

    let invalid = |source| ProtocolError::InvalidPayload {
        tag: tag.clone(),
        source,
    };

    match tag.as_str() {
        "gameUpdate" => serde_json::from_value(value)
            .map(ServerMessage::GameUpdate)
            .map_err(invalid),
        "playerTurn" => serde_json::from_value(value)
            .map(ServerMessage::PlayerTurn)
            .map_err(invalid),
        "joined" => serde_json::from_value(value)
            .map(ServerMessage::Joined)
            .map_err(invalid),
        _ => Ok(ServerMessage::Unrecognized(tag)),
    }
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_snapshot(text: &str) -> Result<GameSnapshot, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_observer_game_update() {
        let frame = r##"{"type":"gameUpdate","round":7,"mapChanges":[{"x":1,"y":2,"color":"#000"}]}"##;

        match decode_server_message(frame).unwrap() {
            ServerMessage::GameUpdate(update) => {
                assert_eq!(update.round, 7);
                assert_eq!(update.map_changes, vec![Pixel::new(1, 2, "#000")]);
                assert!(update.map.is_none());
                assert!(update.players.is_none());
            }
            other => panic!("Wrong message after decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_player_game_update_uses_round_number() {
        let frame = r##"{
            "type":"gameUpdate",
            "playerId":"p1",
            "roundNumber":3,
            "turnNumber":12,
            "mapChanges":[],
            "map":{"width":1,"height":1,"pixels":["#fff"]},
            "players":[{"id":"p1","name":"bot","color":"#f00"}]
        }"##;

        match decode_server_message(frame).unwrap() {
            ServerMessage::GameUpdate(update) => {
                assert_eq!(update.round, 3);
                assert_eq!(update.turn_number, Some(12));
                let players = update.players.unwrap();
                assert_eq!(players[0].score, 0);
                assert_eq!(players[0].name.as_deref(), Some("bot"));
            }
            other => panic!("Wrong message after decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_negative_cell_keeps_batch() {
        let frame = r##"{"type":"gameUpdate","round":2,"mapChanges":[{"x":-1,"y":0,"color":"#111"},{"x":1,"y":1,"color":"#000"}]}"##;

        match decode_server_message(frame).unwrap() {
            ServerMessage::GameUpdate(update) => {
                assert_eq!(
                    update.map_changes,
                    vec![Pixel::new(-1, 0, "#111"), Pixel::new(1, 1, "#000")]
                );
            }
            other => panic!("Wrong message after decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_player_turn() {
        let frame = r#"{"type":"playerTurn","availableCommands":[{"type":"paint","availableTargets":[{"x":1,"y":1},{"x":2,"y":2}]}]}"#;

        match decode_server_message(frame).unwrap() {
            ServerMessage::PlayerTurn(turn) => {
                assert_eq!(turn.available_commands.len(), 1);
                assert_eq!(turn.available_commands[0].command_type, "paint");
                assert_eq!(
                    turn.available_commands[0].available_targets,
                    vec![Target::new(1, 1), Target::new(2, 2)]
                );
            }
            other => panic!("Wrong message after decode: {:?}", other),
        }
    }

    #[test]
    fn test_decode_joined_accepts_both_color_keys() {
        let a = decode_server_message(r##"{"type":"joined","playerId":"p1","color":"#ff0000"}"##)
            .unwrap();
        let b = decode_server_message(
            r##"{"type":"joined","playerId":"p1","playerColor":"#ff0000"}"##,
        )
        .unwrap();

        assert_eq!(a, b);
        match a {
            ServerMessage::Joined(joined) => {
                assert_eq!(joined.player_id, "p1");
                assert_eq!(joined.color, Color::new("#ff0000"));
            }
            other => panic!("Wrong message after decode: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_is_unrecognized() {
        let message = decode_server_message(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(message, ServerMessage::Unrecognized("chat".to_string()));
        assert_eq!(message.tag(), "chat");
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            decode_server_message("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_server_message(r#"{"round":1}"#),
            Err(ProtocolError::MissingTag)
        ));
        assert!(matches!(
            decode_server_message(r#"{"type":5}"#),
            Err(ProtocolError::MissingTag)
        ));

        match decode_server_message(r#"{"type":"gameUpdate","round":1}"#) {
            Err(ProtocolError::InvalidPayload { tag, .. }) => assert_eq!(tag, "gameUpdate"),
            other => panic!("Expected invalid payload, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_client_messages() {
        assert_eq!(
            encode_client_message(&ClientMessage::Join).unwrap(),
            r#"{"type":"join"}"#
        );

        let message = ClientMessage::PlayerMove {
            command: "paint".to_string(),
            targets: vec![Target::new(3, 4)],
        };
        assert_eq!(
            encode_client_message(&message).unwrap(),
            r#"{"type":"playerMove","command":"paint","targets":[{"x":3,"y":4}]}"#
        );
    }

    #[test]
    fn test_decode_snapshot() {
        let body = r##"{
            "state":"playing",
            "roundNumber":4,
            "map":{"width":2,"height":1,"pixels":["#fff","#000"]},
            "players":[{"id":"a","score":3,"color":"#f00"}]
        }"##;

        let snapshot = decode_snapshot(body).unwrap();
        assert_eq!(snapshot.state, GamePhase::Playing);
        assert_eq!(snapshot.round_number, 4);
        assert!(snapshot.map.is_consistent());
        assert_eq!(snapshot.players, vec![Player::new("a", "#f00", 3)]);
    }

    #[test]
    fn test_map_consistency() {
        let map = MapState::blank(3, 2);
        assert_eq!(map.cell_count(), 6);
        assert!(map.is_consistent());
        assert!(map.pixels.iter().all(Color::is_blank));

        let broken = MapState {
            width: 2,
            height: 2,
            pixels: vec![Color::blank()],
        };
        assert!(!broken.is_consistent());
    }
}
