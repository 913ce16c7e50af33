use crate::error::{ClientError, Result};
use log::{debug, warn};
use shared::{Color, GamePhase, GameSnapshot, MapState, Pixel, Player};
use std::fmt;

/// What a delta batch did to the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeltaOutcome {
    /// Cells written, in batch order
    pub applied: Vec<Pixel>,
    /// Cells outside the current map bounds
    pub dropped: Vec<Pixel>,
    /// Batch round was behind the mirror's round
    pub stale: bool,
    /// The stale batch was refused as a whole
    pub rejected: bool,
}

/// Local best-known copy of the server's map, players and round.
#[derive(Debug, Clone, Default)]
pub struct GameMirror {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
    players: Vec<Player>,
    round_number: u64,
    turn_number: Option<u64>,
    phase: GamePhase,
    reject_stale_rounds: bool,
}

impl GameMirror {
    pub fn new(reject_stale_rounds: bool) -> Self {
        Self {
            reject_stale_rounds,
            ..Self::default()
        }
    }

    /// Replaces everything with the snapshot. A map whose pixel count does
    /// not match its dimensions is refused and the mirror is left as it was.
    pub fn apply_snapshot(&mut self, snapshot: &GameSnapshot) -> Result<()> {
        if !snapshot.map.is_consistent() {
            return Err(ClientError::InvalidMap {
                width: snapshot.map.width,
                height: snapshot.map.height,
                actual: snapshot.map.pixels.len(),
            });
        }

        self.width = snapshot.map.width;
        self.height = snapshot.map.height;
        self.pixels = snapshot.map.pixels.clone();
        self.players = snapshot.players.clone();
        self.round_number = snapshot.round_number;
        self.phase = snapshot.state;

        debug!("Snapshot applied: {}", self);
        Ok(())
    }

    /// Overwrites cells in batch order and sets the round to `round`.
    pub fn apply_delta(&mut self, round: u64, changes: &[Pixel]) -> DeltaOutcome {
        let mut outcome = DeltaOutcome {
            stale: round < self.round_number,
            ..DeltaOutcome::default()
        };

        if outcome.stale {
            if self.reject_stale_rounds {
                warn!(
                    "Rejecting stale batch for round {} (mirror at round {})",
                    round, self.round_number
                );
                outcome.rejected = true;
                return outcome;
            }
            warn!(
                "Applying stale batch for round {} (mirror at round {})",
                round, self.round_number
            );
        }

        for change in changes {
            match self.index_of(change.x, change.y) {
                Some(index) => {
                    self.pixels[index] = change.color.clone();
                    outcome.applied.push(change.clone());
                }
                None => outcome.dropped.push(change.clone()),
            }
        }

        if !outcome.dropped.is_empty() {
            warn!(
                "Dropped {} out-of-bounds cells for a {}x{} map",
                outcome.dropped.len(),
                self.width,
                self.height
            );
        }

        self.round_number = round;
        outcome
    }

    pub fn replace_players(&mut self, players: Vec<Player>) {
        self.players = players;
    }

    pub fn set_turn_number(&mut self, turn_number: u64) {
        self.turn_number = Some(turn_number);
    }

    fn index_of(&self, x: i64, y: i64) -> Option<usize> {
        let x = u32::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u32::try_from(y).ok().filter(|&y| y < self.height)?;
        Some(x as usize + y as usize * self.width as usize)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&Color> {
        self.index_of(i64::from(x), i64::from(y))
            .map(|index| &self.pixels[index])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    pub fn turn_number(&self) -> Option<u64> {
        self.turn_number
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn rejects_stale_rounds(&self) -> bool {
        self.reject_stale_rounds
    }

    pub fn painted_count(&self) -> usize {
        self.pixels.iter().filter(|c| !c.is_blank()).count()
    }

    pub fn to_snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            state: self.phase,
            round_number: self.round_number,
            map: MapState {
                width: self.width,
                height: self.height,
                pixels: self.pixels.clone(),
            },
            players: self.players.clone(),
        }
    }
}

impl fmt::Display for GameMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {}, players: {}, map: {}x{}",
            self.round_number,
            self.players.len(),
            self.width,
            self.height
        )
    }
}
