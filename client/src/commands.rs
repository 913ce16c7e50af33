//! Turn command negotiation: which commands the local player may issue and where

use crate::error::{ClientError, Result};
use log::debug;
use shared::{AvailableCommand, Target};

/// Move ready to be sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerMove {
    pub command: String,
    pub targets: Vec<Target>,
}

/// Tracks the available command set and the player's current selection.
///
/// The selection is keyed by command type so it survives a turn refresh
/// that replaces every command object.
#[derive(Debug, Default)]
pub struct TurnNegotiator {
    available: Vec<AvailableCommand>,
    selected: Option<String>,
    active_targets: Vec<Target>,
}

impl TurnNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the command set and re-derives the targets of the selected
    /// command type, if any. A selected type missing from the new set keeps
    /// its selection with no targets.
    pub fn replace_commands(&mut self, commands: Vec<AvailableCommand>) {
        self.available = commands;

        if let Some(selected) = &self.selected {
            self.active_targets = self.targets_for(selected).unwrap_or_default();
            debug!(
                "Refreshed `{}` selection: {} targets",
                selected,
                self.active_targets.len()
            );
        }
    }

    /// Selects a command type and returns its targets.
    pub fn select(&mut self, command_type: &str) -> Result<&[Target]> {
        let targets = self
            .targets_for(command_type)
            .ok_or_else(|| ClientError::UnknownCommand(command_type.to_string()))?;

        self.selected = Some(command_type.to_string());
        self.active_targets = targets;
        Ok(&self.active_targets)
    }

    /// Turns a click on `(x, y)` into a move for the selected command and
    /// clears the selection.
    pub fn choose_target(&mut self, x: u32, y: u32) -> Result<PlayerMove> {
        let command = self.selected.clone().ok_or(ClientError::NoCommandSelected)?;

        if !self.is_target(x, y) {
            return Err(ClientError::InvalidTarget { command, x, y });
        }

        self.clear_selection();
        Ok(PlayerMove {
            command,
            targets: vec![Target::new(x, y)],
        })
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.active_targets.clear();
    }

    /// Forgets the command set as well as the selection.
    pub fn reset(&mut self) {
        self.available.clear();
        self.clear_selection();
    }

    pub fn available(&self) -> &[AvailableCommand] {
        &self.available
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn active_targets(&self) -> &[Target] {
        &self.active_targets
    }

    pub fn is_target(&self, x: u32, y: u32) -> bool {
        self.active_targets.contains(&Target::new(x, y))
    }

    fn targets_for(&self, command_type: &str) -> Option<Vec<Target>> {
        self.available
            .iter()
            .find(|c| c.command_type == command_type)
            .map(|c| c.available_targets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(targets: &[(u32, u32)]) -> AvailableCommand {
        AvailableCommand::new(
            "paint",
            targets.iter().map(|&(x, y)| Target::new(x, y)).collect(),
        )
    }

    #[test]
    fn test_select_known_command() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1), (2, 2)])]);

        let targets = negotiator.select("paint").unwrap().to_vec();

        assert_eq!(targets, vec![Target::new(1, 1), Target::new(2, 2)]);
        assert_eq!(negotiator.selected(), Some("paint"));
    }

    #[test]
    fn test_select_unknown_command() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1)])]);

        assert!(matches!(
            negotiator.select("erase"),
            Err(ClientError::UnknownCommand(c)) if c == "erase"
        ));
        assert_eq!(negotiator.selected(), None);
    }

    #[test]
    fn test_selection_survives_turn_refresh() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1), (2, 2)])]);
        negotiator.select("paint").unwrap();

        negotiator.replace_commands(vec![
            AvailableCommand::new("erase", vec![Target::new(0, 0)]),
            paint(&[(1, 1), (3, 3)]),
        ]);

        assert_eq!(negotiator.selected(), Some("paint"));
        assert_eq!(
            negotiator.active_targets(),
            &[Target::new(1, 1), Target::new(3, 3)]
        );
    }

    #[test]
    fn test_selection_kept_empty_when_type_disappears() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1)])]);
        negotiator.select("paint").unwrap();

        negotiator.replace_commands(vec![]);
        assert_eq!(negotiator.selected(), Some("paint"));
        assert!(negotiator.active_targets().is_empty());

        negotiator.replace_commands(vec![paint(&[(4, 4)])]);
        assert_eq!(negotiator.active_targets(), &[Target::new(4, 4)]);
    }

    #[test]
    fn test_choose_target_builds_move_and_clears() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1), (2, 2)])]);
        negotiator.select("paint").unwrap();

        let player_move = negotiator.choose_target(2, 2).unwrap();

        assert_eq!(
            player_move,
            PlayerMove {
                command: "paint".to_string(),
                targets: vec![Target::new(2, 2)],
            }
        );
        assert_eq!(negotiator.selected(), None);
        assert!(negotiator.active_targets().is_empty());
        // Command set itself is untouched
        assert_eq!(negotiator.available().len(), 1);
    }

    #[test]
    fn test_choose_target_errors() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1)])]);

        assert!(matches!(
            negotiator.choose_target(1, 1),
            Err(ClientError::NoCommandSelected)
        ));

        negotiator.select("paint").unwrap();
        assert!(matches!(
            negotiator.choose_target(5, 5),
            Err(ClientError::InvalidTarget { x: 5, y: 5, .. })
        ));
        // A bad click does not drop the selection
        assert_eq!(negotiator.selected(), Some("paint"));
    }

    #[test]
    fn test_reset() {
        let mut negotiator = TurnNegotiator::new();
        negotiator.replace_commands(vec![paint(&[(1, 1)])]);
        negotiator.select("paint").unwrap();

        negotiator.reset();

        assert!(negotiator.available().is_empty());
        assert_eq!(negotiator.selected(), None);
    }
}
