//! Domain events emitted by the tick.

/// An event produced by one world during one tick.
///
/// Events are drained by the world runner in the order the tick produced them
/// and handed to every registered listener together with the world id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    /// A player lost their last cell to an opponent.
    PlayerEliminated {
        /// Id of the absorbing player.
        winner_id: String,
        /// Display name of the absorbing player.
        winner_name: String,
        /// Id of the eliminated player.
        loser_id: String,
        /// Display name of the eliminated player.
        loser_name: String,
        /// The eliminated player's final food counter, so the session layer
        /// can flush a last progress delta for a player that is already gone
        /// from the world.
        loser_food_eaten: u64,
        /// The eliminated player's final cells counter.
        loser_cells_eaten: u64,
    },
}
