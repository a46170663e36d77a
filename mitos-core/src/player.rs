//! The player domain model.

use mitos_protocol::PlayerView;
use mitos_utils::ids;

/// A player inside one world.
///
/// Created on join, destroyed on disconnect or elimination. The color is a
/// pure function of the id so every observer renders the player identically.
#[derive(Debug, Clone)]
pub struct Player {
    /// Stable opaque id, also used as the id of the player's first cell.
    pub id: String,
    /// Display name chosen at join time.
    pub name: String,
    /// The session token this player joined with.
    pub token: String,
    /// RGB color derived from the id.
    pub color: [u8; 3],
    /// Cumulative score from food and absorptions.
    pub score: f64,
    /// Food pellets consumed this session.
    pub food_eaten: u64,
    /// Opposing cells absorbed this session.
    pub cells_eaten: u64,
}

impl Player {
    /// Creates a fresh player with a new id and the derived color.
    #[must_use]
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        let id = ids::new_id();
        let color = ids::color_for_id(&id);
        Self {
            id,
            name: name.into(),
            token: token.into(),
            color,
            score: 0.0,
            food_eaten: 0,
            cells_eaten: 0,
        }
    }

    /// The player's public record as embedded in snapshots and `joined`
    /// frames. Token and progress counters stay server-side.
    #[must_use]
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.color,
            score: self.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_is_a_function_of_the_id() {
        let player = Player::new("alice", "tok");
        assert_eq!(player.color, mitos_utils::ids::color_for_id(&player.id));
    }

    #[test]
    fn view_hides_counters() {
        let mut player = Player::new("alice", "tok");
        player.score = 12.5;
        player.food_eaten = 3;
        let view = player.view();
        assert_eq!(view.score, 12.5);
        assert_eq!(view.name, "alice");
        // The view type has no counter fields; this is a compile-time fact,
        // the assertion just pins the score pass-through.
    }
}
