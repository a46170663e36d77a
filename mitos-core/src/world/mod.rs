//! World simulation: the cell/food/player data model and the tick.
//!
//! A [`WorldState`] owns everything inside one world and is mutated from a
//! single place, the world runner. One tick runs in a fixed order: steering
//! targets are refreshed, the physics engine advances, food is resolved,
//! inter-owner absorptions are resolved, and finally same-owner merges.
//!
//! Time inside a world is the simulation clock: seconds accumulated from the
//! (clamped) per-tick `dt`. Merge readiness and split cooldowns live on that
//! clock, which keeps every rule deterministic under test.

pub mod events;
pub mod manager;
pub mod physics;
pub mod runner;

use glam::DVec2;
use mitos_protocol::{CellView, FoodView, GameplayConfig, WorldConfigView, WorldSnapshot};
use rand::Rng;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::player::Player;
use events::WorldEvent;
use physics::{
    BOOST_SPEED_MULTIPLIER, CollisionEvent, MAX_DELTA_TIME, SteeringEngine, speed_for_mass,
};

/// A cell must be at least this large to split.
pub const SPLIT_MIN_RADIUS: f64 = 30.0;
/// Seconds between split attempts per player.
pub const SPLIT_COOLDOWN: f64 = 2.0;
/// Seconds a cell stays unmergeable after a split, merge or absorption.
pub const MERGE_DELAY: f64 = 3.0;
/// The second cell's radius is scaled by this factor in the merge overlap
/// test, so cells have to genuinely sink into each other before merging.
pub const MERGE_DISTANCE_FACTOR: f64 = 0.9;
/// A cell absorbs an opponent only when at least this much larger by radius.
pub const ABSORB_RATIO: f64 = 1.02;
/// Fraction of the loser's area the winner gains.
pub const ABSORB_AREA_YIELD: f64 = 0.8;
/// Hard cap on cells per player.
pub const MAX_CELLS_PER_PLAYER: usize = 8;
/// Score value of one food pellet.
pub const FOOD_VALUE: f64 = 5.0;
/// Effective pickup radius of a pellet.
pub const FOOD_PICKUP_RADIUS: f64 = 3.0;
/// Radius gained per unit of food value.
pub const FOOD_GROWTH_FACTOR: f64 = 0.1;
/// Radius of a freshly spawned player cell.
pub const SPAWN_RADIUS: f64 = 25.0;

/// A physical disc controlled by a player.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Cell id. A player's first cell reuses the player id so a solo cell is
    /// addressable by its owner.
    pub id: String,
    /// Owning player.
    pub player_id: String,
    /// Centre position in world coordinates.
    pub position: DVec2,
    /// Disc radius.
    pub radius: f64,
    /// Velocity as of the last physics step.
    pub velocity: DVec2,
    /// Simulation time at which this cell may merge with a sibling again.
    pub merge_ready_at: f64,
}

impl Cell {
    /// Disc area, `π·r²`.
    #[must_use]
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }

    /// Steering mass, `max(r², 1)`.
    #[must_use]
    pub fn mass(&self) -> f64 {
        (self.radius * self.radius).max(1.0)
    }

    /// Client-facing view.
    #[must_use]
    pub fn view(&self) -> CellView {
        CellView {
            id: self.id.clone(),
            player_id: self.player_id.clone(),
            position: self.position,
            radius: self.radius,
        }
    }
}

/// A consumable pellet.
#[derive(Debug, Clone, PartialEq)]
pub struct Food {
    /// Pellet id.
    pub id: String,
    /// Centre position.
    pub position: DVec2,
    /// Score awarded on consumption; radius grows by `value · 0.1`.
    pub value: f64,
}

impl Food {
    /// Client-facing view.
    #[must_use]
    pub fn view(&self) -> FoodView {
        FoodView {
            id: self.id.clone(),
            position: self.position,
            value: self.value,
        }
    }
}

/// Per-world configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Human-readable name, fixed at creation.
    pub name: String,
    /// World width in world units.
    pub width: f64,
    /// World height in world units.
    pub height: f64,
    /// Simulation ticks per second.
    pub tick_rate: f64,
    /// Food pellets kept alive.
    pub food_count: u32,
    /// Seconds between snapshot writes.
    pub snapshot_interval: f64,
}

impl WorldConfig {
    /// Builds a world config from the shared gameplay defaults.
    #[must_use]
    pub fn from_defaults(name: impl Into<String>, defaults: &GameplayConfig) -> Self {
        Self {
            name: name.into(),
            width: defaults.width,
            height: defaults.height,
            tick_rate: defaults.tick_rate,
            food_count: defaults.food_count,
            snapshot_interval: defaults.snapshot_interval,
        }
    }

    /// The snapshot-embedded view.
    #[must_use]
    pub fn view(&self) -> WorldConfigView {
        WorldConfigView {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            tick_rate: self.tick_rate,
            food_count: self.food_count,
            snapshot_interval: self.snapshot_interval,
        }
    }
}

type CellList = SmallVec<[String; MAX_CELLS_PER_PLAYER]>;

/// Mutable state of a single world.
pub struct WorldState {
    /// Configuration currently in effect.
    pub config: WorldConfig,
    engine: SteeringEngine,
    players: FxHashMap<String, Player>,
    cells: FxHashMap<String, Cell>,
    player_cells: FxHashMap<String, CellList>,
    foods: FxHashMap<String, Food>,
    targets: FxHashMap<String, DVec2>,
    split_cooldowns: FxHashMap<String, f64>,
    events: Vec<WorldEvent>,
    sim_time: f64,
    split_seq: u64,
}

impl WorldState {
    /// Creates an empty world. Call [`populate_food`](Self::populate_food)
    /// before the first tick.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        let engine = SteeringEngine::new(config.width, config.height);
        Self {
            config,
            engine,
            players: FxHashMap::default(),
            cells: FxHashMap::default(),
            player_cells: FxHashMap::default(),
            foods: FxHashMap::default(),
            targets: FxHashMap::default(),
            split_cooldowns: FxHashMap::default(),
            events: Vec::new(),
            sim_time: 0.0,
            split_seq: 0,
        }
    }

    /// The world's simulation clock in seconds.
    #[must_use]
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Number of live players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Spawns `player` with one cell at a random position and returns that
    /// cell. The cell reuses the player id.
    pub fn add_player(&mut self, player: Player) -> Cell {
        let spawn = self.random_position();
        let cell = Cell {
            id: player.id.clone(),
            player_id: player.id.clone(),
            position: spawn,
            radius: SPAWN_RADIUS,
            velocity: DVec2::ZERO,
            merge_ready_at: 0.0,
        };
        self.engine.add_cell(&cell);
        self.cells.insert(cell.id.clone(), cell.clone());
        self.player_cells
            .insert(player.id.clone(), CellList::from_iter([cell.id.clone()]));
        self.targets.insert(player.id.clone(), spawn);
        self.split_cooldowns.insert(player.id.clone(), 0.0);
        self.players.insert(player.id.clone(), player);
        cell
    }

    /// Removes a player and all of their cells. Returns the removed player so
    /// callers can flush its final counters.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        if let Some(cell_ids) = self.player_cells.get(player_id).cloned() {
            for cell_id in &cell_ids {
                self.remove_cell(cell_id);
            }
        }
        self.player_cells.remove(player_id);
        self.targets.remove(player_id);
        self.split_cooldowns.remove(player_id);
        self.players.remove(player_id)
    }

    /// Updates a player's steering target, clamped to the world rectangle.
    /// Unknown players are ignored.
    pub fn set_target(&mut self, player_id: &str, target: DVec2) {
        if !self.players.contains_key(player_id) {
            return;
        }
        let clamped = self.clamp(target);
        self.targets.insert(player_id.to_owned(), clamped);
    }

    /// Drains the domain events produced by the last tick.
    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances the world by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        let dt = dt.clamp(1e-4, MAX_DELTA_TIME);
        self.sim_time += dt;

        // 1. Refresh per-cell steering targets from the owners' targets.
        for cell in self.cells.values() {
            let target = self
                .targets
                .get(&cell.player_id)
                .copied()
                .unwrap_or(cell.position);
            self.engine.set_target(&cell.id, target);
        }

        // 2. Physics.
        let collisions = self.engine.step(dt, &mut self.cells);

        // 3. Food.
        self.consume_food();

        // 4. Inter-owner absorption.
        self.resolve_absorptions(collisions);

        // 5. Same-owner merges.
        self.resolve_merges();
    }

    /// Splits the player's largest cell toward their current target.
    ///
    /// Rejected while the cooldown is active, at the cell cap, without cells,
    /// or when the resulting halves would be too small.
    pub fn split_player(&mut self, player_id: &str) {
        let now = self.sim_time;
        if now < self.split_cooldowns.get(player_id).copied().unwrap_or(0.0) {
            return;
        }
        let Some(cell_ids) = self.player_cells.get(player_id) else {
            return;
        };
        if cell_ids.is_empty() || cell_ids.len() >= MAX_CELLS_PER_PLAYER {
            return;
        }

        let mut largest_id: Option<&str> = None;
        let mut largest_radius = f64::NEG_INFINITY;
        for cell_id in cell_ids {
            if let Some(cell) = self.cells.get(cell_id.as_str())
                && cell.radius > largest_radius
            {
                largest_radius = cell.radius;
                largest_id = Some(cell_id.as_str());
            }
        }
        let Some(largest_id) = largest_id.map(str::to_owned) else {
            return;
        };
        let Some(cell) = self.cells.get(&largest_id) else {
            return;
        };
        if cell.radius < SPLIT_MIN_RADIUS {
            return;
        }

        let new_area = cell.area() / 2.0;
        let new_radius = (new_area / std::f64::consts::PI).sqrt();
        if new_radius < SPLIT_MIN_RADIUS / 2.0 {
            return;
        }

        let origin = cell.position;
        let target = self.targets.get(player_id).copied().unwrap_or(origin);
        let delta = target - origin;
        let direction = if delta.length() <= 1e-6 {
            self.next_split_direction()
        } else {
            delta / delta.length()
        };

        let boost = speed_for_mass((new_radius * new_radius).max(1.0)) * BOOST_SPEED_MULTIPLIER;

        // The original cell shrinks, is nudged back, and boosts backward.
        let back_position = self.clamp(origin - direction * (new_radius * 0.8));
        if let Some(mut cell) = self.cells.remove(&largest_id) {
            cell.radius = new_radius;
            cell.position = back_position;
            cell.merge_ready_at = now + MERGE_DELAY;
            self.engine.apply_impulse(&mut cell, -direction * boost);
            self.cells.insert(largest_id.clone(), cell);
        }

        // The new half flies forward.
        let new_cell = Cell {
            id: mitos_utils::ids::new_id(),
            player_id: player_id.to_owned(),
            position: self.clamp(origin + direction * (new_radius * 2.4)),
            radius: new_radius,
            velocity: direction * boost,
            merge_ready_at: now + MERGE_DELAY,
        };
        self.engine.add_cell(&new_cell);
        if let Some(list) = self.player_cells.get_mut(player_id) {
            list.push(new_cell.id.clone());
        }
        self.cells.insert(new_cell.id.clone(), new_cell);

        self.split_cooldowns
            .insert(player_id.to_owned(), now + SPLIT_COOLDOWN);
    }

    /// Tops the food table up (or trims it down) to `config.food_count`.
    pub fn populate_food(&mut self) {
        let target = self.config.food_count as usize;

        if self.foods.len() > target {
            let mut ids: Vec<String> = self.foods.keys().cloned().collect();
            ids.sort_unstable();
            for id in ids.drain(target..) {
                self.foods.remove(&id);
            }
        }

        let mut rng = rand::thread_rng();
        while self.foods.len() < target {
            let id = mitos_utils::ids::new_id();
            let position = DVec2::new(
                rng.gen_range(0.0..self.config.width.max(1.0)),
                rng.gen_range(0.0..self.config.height.max(1.0)),
            );
            self.foods.insert(
                id.clone(),
                Food {
                    id,
                    position,
                    value: FOOD_VALUE,
                },
            );
        }
    }

    /// Drops a single pellet at an exact position and returns its id.
    ///
    /// Normal replenishment places pellets uniformly at random; this entry
    /// point exists for deterministic setups.
    pub fn spawn_food(&mut self, position: DVec2, value: f64) -> String {
        let id = mitos_utils::ids::new_id();
        let position = self.clamp(position);
        self.foods.insert(
            id.clone(),
            Food {
                id: id.clone(),
                position,
                value,
            },
        );
        id
    }

    /// Applies a configuration change and re-syncs the food table.
    pub fn apply_config(&mut self, update: &mitos_protocol::GameplayConfigUpdate) {
        if let Some(width) = update.width {
            self.config.width = width;
        }
        if let Some(height) = update.height {
            self.config.height = height;
        }
        if let Some(tick_rate) = update.tick_rate {
            self.config.tick_rate = tick_rate;
        }
        if let Some(food_count) = update.food_count {
            self.config.food_count = food_count;
        }
        if let Some(snapshot_interval) = update.snapshot_interval {
            self.config.snapshot_interval = snapshot_interval;
        }
        self.engine.resize(self.config.width, self.config.height);
        self.populate_food();
    }

    /// Builds the full observable state at the end of the current tick.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut players: Vec<_> = self.players.values().map(Player::view).collect();
        players.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        let mut cells: Vec<_> = self.cells.values().map(Cell::view).collect();
        cells.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        let mut foods: Vec<_> = self.foods.values().map(Food::view).collect();
        foods.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        WorldSnapshot {
            config: self.config.view(),
            players,
            cells,
            foods,
            tick_time: self.sim_time,
        }
    }

    // -- Internal helpers ---------------------------------------------------

    fn consume_food(&mut self) {
        let mut food_ids: Vec<String> = self.foods.keys().cloned().collect();
        food_ids.sort_unstable();
        let mut cell_ids: Vec<String> = self.cells.keys().cloned().collect();
        cell_ids.sort_unstable();

        for food_id in food_ids {
            let Some(food) = self.foods.get(&food_id) else {
                continue;
            };
            let (position, value) = (food.position, food.value);

            let eater = cell_ids.iter().find(|cell_id| {
                self.cells.get(cell_id.as_str()).is_some_and(|cell| {
                    collides(cell.position, cell.radius, position, FOOD_PICKUP_RADIUS)
                })
            });
            let Some(eater) = eater.cloned() else {
                continue;
            };

            self.foods.remove(&food_id);
            let owner = if let Some(cell) = self.cells.get_mut(&eater) {
                cell.radius += value * FOOD_GROWTH_FACTOR;
                cell.player_id.clone()
            } else {
                continue;
            };
            if let Some(player) = self.players.get_mut(&owner) {
                player.score += value;
                player.food_eaten += 1;
            }
        }

        self.populate_food();
    }

    fn resolve_absorptions(&mut self, mut collisions: Vec<CollisionEvent>) {
        // Largest contact first, so a dominant cell consumes its neighbours
        // directly instead of through an intermediate (which would leak area
        // through the absorption yield twice).
        collisions.sort_by(|a, b| {
            let strength = |event: &CollisionEvent| {
                let first = self
                    .cells
                    .get(&event.first_id)
                    .map_or(0.0, |cell| cell.radius);
                let second = self
                    .cells
                    .get(&event.second_id)
                    .map_or(0.0, |cell| cell.radius);
                first.max(second)
            };
            strength(b)
                .partial_cmp(&strength(a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| (&a.first_id, &a.second_id).cmp(&(&b.first_id, &b.second_id)))
        });

        for event in collisions {
            let (Some(first), Some(second)) = (
                self.cells.get(&event.first_id),
                self.cells.get(&event.second_id),
            ) else {
                continue;
            };
            if first.player_id == second.player_id {
                continue;
            }
            if first.radius >= second.radius * ABSORB_RATIO {
                self.absorb(&event.first_id, &event.second_id);
            } else if second.radius >= first.radius * ABSORB_RATIO {
                self.absorb(&event.second_id, &event.first_id);
            }
        }

        // Fallback sweep for slow contacts the engine did not flag. Restart
        // after every absorption because the winner's radius changed.
        while let Some((winner, loser)) = self.find_absorbable_pair() {
            self.absorb(&winner, &loser);
        }
    }

    /// Finds the absorbable overlapping pair with the largest winner, ties
    /// broken by id so the sweep is deterministic.
    fn find_absorbable_pair(&self) -> Option<(String, String)> {
        let mut ids: Vec<&String> = self.cells.keys().collect();
        ids.sort_unstable();
        let mut best: Option<(String, String, f64)> = None;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (Some(a), Some(b)) = (self.cells.get(ids[i]), self.cells.get(ids[j])) else {
                    continue;
                };
                if a.player_id == b.player_id {
                    continue;
                }
                if !collides(a.position, a.radius, b.position, b.radius) {
                    continue;
                }
                let candidate = if a.radius >= b.radius * ABSORB_RATIO {
                    Some((ids[i].clone(), ids[j].clone(), a.radius))
                } else if b.radius >= a.radius * ABSORB_RATIO {
                    Some((ids[j].clone(), ids[i].clone(), b.radius))
                } else {
                    None
                };
                if let Some(candidate) = candidate
                    && best
                        .as_ref()
                        .is_none_or(|(_, _, radius)| candidate.2 > *radius)
                {
                    best = Some(candidate);
                }
            }
        }
        best.map(|(winner, loser, _)| (winner, loser))
    }

    fn absorb(&mut self, winner_id: &str, loser_id: &str) {
        let (Some(winner), Some(loser)) = (self.cells.get(winner_id), self.cells.get(loser_id))
        else {
            return;
        };

        let winner_area = winner.area();
        let loser_area = loser.area() * ABSORB_AREA_YIELD;
        let total_area = winner_area + loser_area;
        let new_position = if total_area > 0.0 {
            (winner.position * winner_area + loser.position * loser_area) / total_area
        } else {
            winner.position
        };
        let new_position = self.clamp(new_position);
        let winner_owner = winner.player_id.clone();
        let loser_owner = loser.player_id.clone();

        if let Some(winner) = self.cells.get_mut(winner_id) {
            winner.position = new_position;
            winner.radius = (total_area / std::f64::consts::PI).sqrt();
            winner.merge_ready_at = self.sim_time + MERGE_DELAY;
        }
        if let Some(player) = self.players.get_mut(&winner_owner) {
            player.cells_eaten += 1;
        }

        self.remove_cell(loser_id);

        if !self.player_cells.contains_key(&loser_owner)
            && let Some(loser_player) = self.players.remove(&loser_owner)
        {
            self.targets.remove(&loser_owner);
            self.split_cooldowns.remove(&loser_owner);
            let winner_name = self
                .players
                .get(&winner_owner)
                .map_or_else(String::new, |p| p.name.clone());
            self.events.push(WorldEvent::PlayerEliminated {
                winner_id: winner_owner,
                winner_name,
                loser_id: loser_owner,
                loser_name: loser_player.name.clone(),
                loser_food_eaten: loser_player.food_eaten,
                loser_cells_eaten: loser_player.cells_eaten,
            });
        }
    }

    fn resolve_merges(&mut self) {
        let mut owners: Vec<String> = self
            .player_cells
            .iter()
            .filter(|(_, cells)| cells.len() >= 2)
            .map(|(owner, _)| owner.clone())
            .collect();
        owners.sort_unstable();

        for owner in owners {
            let Some(list) = self.player_cells.get(&owner) else {
                continue;
            };
            let mut ids: Vec<String> = list.iter().cloned().collect();
            let mut i = 0;
            while i < ids.len() {
                let mut j = i + 1;
                while j < ids.len() {
                    let (Some(a), Some(b)) = (self.cells.get(&ids[i]), self.cells.get(&ids[j]))
                    else {
                        j += 1;
                        continue;
                    };
                    if self.sim_time < a.merge_ready_at || self.sim_time < b.merge_ready_at {
                        j += 1;
                        continue;
                    }
                    if collides(
                        a.position,
                        a.radius,
                        b.position,
                        b.radius * MERGE_DISTANCE_FACTOR,
                    ) {
                        self.merge_cells(&ids[i].clone(), &ids[j].clone());
                        ids.remove(j);
                        continue;
                    }
                    j += 1;
                }
                i += 1;
            }
        }
    }

    fn merge_cells(&mut self, primary_id: &str, secondary_id: &str) {
        let (Some(primary), Some(secondary)) =
            (self.cells.get(primary_id), self.cells.get(secondary_id))
        else {
            return;
        };
        let area_primary = primary.area();
        let area_secondary = secondary.area();
        let total_area = area_primary + area_secondary;
        let new_position = if total_area > 0.0 {
            (primary.position * area_primary + secondary.position * area_secondary) / total_area
        } else {
            primary.position
        };
        let new_position = self.clamp(new_position);

        if let Some(primary) = self.cells.get_mut(primary_id) {
            primary.position = new_position;
            primary.radius = (total_area / std::f64::consts::PI).sqrt();
            primary.merge_ready_at = self.sim_time + MERGE_DELAY;
        }
        self.remove_cell(secondary_id);
    }

    fn remove_cell(&mut self, cell_id: &str) {
        let Some(cell) = self.cells.remove(cell_id) else {
            return;
        };
        self.engine.remove_cell(cell_id);
        if let Some(list) = self.player_cells.get_mut(&cell.player_id) {
            list.retain(|id| id != cell_id);
            if list.is_empty() {
                self.player_cells.remove(&cell.player_id);
            }
        }
    }

    fn next_split_direction(&mut self) -> DVec2 {
        // Golden-angle steps over the circle; purely a function of the
        // per-world counter so replays and tests agree.
        let angle = ((self.split_seq * 137) % 360) as f64 * std::f64::consts::PI / 180.0;
        self.split_seq += 1;
        DVec2::new(angle.cos(), angle.sin())
    }

    fn random_position(&self) -> DVec2 {
        let mut rng = rand::thread_rng();
        DVec2::new(
            rng.gen_range(0.0..self.config.width.max(1.0)),
            rng.gen_range(0.0..self.config.height.max(1.0)),
        )
    }

    fn clamp(&self, position: DVec2) -> DVec2 {
        DVec2::new(
            position.x.clamp(0.0, self.config.width),
            position.y.clamp(0.0, self.config.height),
        )
    }

    // -- Test-only accessors ------------------------------------------------

    /// Read access to a cell.
    #[must_use]
    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.get(cell_id)
    }

    /// Read access to a player.
    #[must_use]
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// Ids of the cells a player owns, in acquisition order.
    #[must_use]
    pub fn cells_of(&self, player_id: &str) -> Vec<String> {
        self.player_cells
            .get(player_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live food pellets.
    #[must_use]
    pub fn food_count(&self) -> usize {
        self.foods.len()
    }

    /// Iterates all live cells.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    /// Iterates all live players.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Places a cell at an exact position with an exact radius. Test support
    /// for scenarios that need hand-built worlds.
    pub fn place_cell(&mut self, cell_id: &str, position: DVec2, radius: f64) {
        let clamped = self.clamp(position);
        if let Some(cell) = self.cells.get_mut(cell_id) {
            cell.position = clamped;
            cell.radius = radius;
        }
    }
}

/// Disc overlap test, inclusive of exact touching.
fn collides(pos_a: DVec2, radius_a: f64, pos_b: DVec2, radius_b: f64) -> bool {
    (pos_a - pos_b).length() <= radius_a + radius_b
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 30.0;

    fn state_with(food_count: u32) -> WorldState {
        let defaults = GameplayConfig {
            width: 500.0,
            height: 500.0,
            food_count,
            ..GameplayConfig::default()
        };
        WorldState::new(WorldConfig::from_defaults("arena", &defaults))
    }

    fn join(state: &mut WorldState, name: &str) -> String {
        let player = Player::new(name, "tok");
        state.add_player(player).player_id
    }

    /// Park a player's steering at their cell so ticks do not move it.
    fn pin(state: &mut WorldState, player_id: &str) {
        let position = state.cell(player_id).expect("cell exists").position;
        state.set_target(player_id, position);
    }

    #[test]
    fn first_cell_reuses_the_player_id() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");
        let cell = state.cell(&id).expect("cell exists");
        assert_eq!(cell.id, id);
        assert_eq!(cell.player_id, id);
        assert_eq!(cell.radius, SPAWN_RADIUS);
        assert_eq!(state.cells_of(&id), vec![id.clone()]);
    }

    #[test]
    fn remove_player_clears_every_table() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");
        let removed = state.remove_player(&id).expect("present");
        assert_eq!(removed.id, id);
        assert!(state.cell(&id).is_none());
        assert!(state.cells_of(&id).is_empty());
        assert!(state.remove_player(&id).is_none());
    }

    #[test]
    fn targets_are_clamped_to_the_world() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");
        state.set_target(&id, DVec2::new(-100.0, 9999.0));
        assert_eq!(state.targets[&id], DVec2::new(0.0, 500.0));
    }

    #[test]
    fn populate_food_fills_and_trims() {
        let mut state = state_with(20);
        state.populate_food();
        assert_eq!(state.food_count(), 20);

        state.config.food_count = 5;
        state.populate_food();
        assert_eq!(state.food_count(), 5);

        state.config.food_count = 50;
        state.populate_food();
        assert_eq!(state.food_count(), 50);
        for food in state.foods.values() {
            let p = food.position;
            assert!(p.x >= 0.0 && p.x <= 500.0 && p.y >= 0.0 && p.y <= 500.0);
        }
    }

    #[test]
    fn eating_food_grows_cell_and_score() {
        let mut state = state_with(3);
        let id = join(&mut state, "alice");
        state.place_cell(&id, DVec2::new(100.0, 100.0), 25.0);
        pin(&mut state, &id);

        // Drop one pellet onto the cell.
        let food_id = mitos_utils::ids::new_id();
        state.foods.insert(
            food_id.clone(),
            Food {
                id: food_id,
                position: DVec2::new(100.0, 100.0),
                value: FOOD_VALUE,
            },
        );

        state.tick(DT);

        let cell = state.cell(&id).expect("cell exists");
        assert!((cell.radius - 25.5).abs() < 1e-9, "radius {}", cell.radius);
        let player = state.player(&id).expect("player exists");
        assert_eq!(player.score, 5.0);
        assert_eq!(player.food_eaten, 1);
        // Replenished back to the configured count after the sweep.
        assert_eq!(state.food_count(), 3);
    }

    #[test]
    fn split_halves_area_and_sets_cooldown() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");
        state.place_cell(&id, DVec2::new(250.0, 250.0), 40.0);
        state.set_target(&id, DVec2::new(400.0, 250.0));

        let area_before = state.cell(&id).expect("cell").area();
        state.split_player(&id);

        let owned = state.cells_of(&id);
        assert_eq!(owned.len(), 2);
        let total: f64 = owned
            .iter()
            .map(|cid| state.cell(cid).expect("cell").area())
            .sum();
        assert!((total - area_before).abs() / area_before < 1e-9);

        for cid in &owned {
            let cell = state.cell(cid).expect("cell");
            assert!((cell.radius - 40.0 / std::f64::consts::SQRT_2).abs() < 1e-9);
            assert!(cell.merge_ready_at > state.sim_time());
        }

        // Cooldown: an immediate second split is rejected.
        state.split_player(&id);
        assert_eq!(state.cells_of(&id).len(), 2);
    }

    #[test]
    fn split_cooldown_expires_with_simulation_time() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");
        state.place_cell(&id, DVec2::new(250.0, 250.0), 60.0);
        pin(&mut state, &id);

        state.split_player(&id);
        assert_eq!(state.cells_of(&id).len(), 2);

        // 1.5 simulated seconds: still cooling down.
        for _ in 0..45 {
            state.tick(DT);
        }
        state.split_player(&id);
        assert_eq!(state.cells_of(&id).len(), 2);

        // Another second: cooldown expired.
        for _ in 0..30 {
            state.tick(DT);
        }
        state.split_player(&id);
        assert_eq!(state.cells_of(&id).len(), 3);
    }

    #[test]
    fn split_rejections() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");

        // Too small to split.
        state.place_cell(&id, DVec2::new(250.0, 250.0), SPLIT_MIN_RADIUS - 1.0);
        state.split_player(&id);
        assert_eq!(state.cells_of(&id).len(), 1);

        // No cells at all.
        state.split_player("nobody");

        // Cell cap: grow a big cell and split up to the limit.
        state.place_cell(&id, DVec2::new(250.0, 250.0), 200.0);
        for _ in 0..20 {
            state.split_player(&id);
            // Expire the cooldown without letting merges run.
            state.split_cooldowns.insert(id.clone(), 0.0);
            state.sim_time += SPLIT_COOLDOWN;
        }
        assert_eq!(state.cells_of(&id).len(), MAX_CELLS_PER_PLAYER);
    }

    #[test]
    fn split_direction_fallback_is_deterministic() {
        let run = || {
            let mut state = state_with(0);
            let player = Player::new("alice", "tok");
            let pid = player.id.clone();
            state.add_player(player);
            state.place_cell(&pid, DVec2::new(250.0, 250.0), 40.0);
            pin(&mut state, &pid);
            state.split_player(&pid);
            let mut radii: Vec<(DVec2, f64)> = state
                .cells()
                .map(|c| (c.position, c.radius))
                .collect();
            radii.sort_by(|a, b| a.0.x.partial_cmp(&b.0.x).unwrap());
            radii
        };
        // Positions relative to the split origin must match between runs.
        let a = run();
        let b = run();
        for ((pa, ra), (pb, rb)) in a.iter().zip(b.iter()) {
            assert!((*pa - *pb).length() < 1e-9);
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn merge_rejoins_after_the_delay() {
        let mut state = state_with(0);
        let id = join(&mut state, "alice");
        state.place_cell(&id, DVec2::new(250.0, 250.0), 40.0);
        pin(&mut state, &id);
        state.split_player(&id);
        let owned = state.cells_of(&id);
        assert_eq!(owned.len(), 2);

        // Reshape the pair: the primary clearly larger, the halves adjacent.
        state.place_cell(&owned[0], DVec2::new(250.0, 250.0), 40.0);
        state.place_cell(&owned[1], DVec2::new(255.0, 250.0), 20.0);
        let expected = std::f64::consts::PI * (40.0 * 40.0 + 20.0 * 20.0);

        // The merge delay from the split is still pending.
        state.tick(DT);
        assert_eq!(state.cells_of(&id).len(), 2);

        // Expire the delay; the next tick coalesces the pair.
        for cid in &owned {
            state.cells.get_mut(cid).expect("cell exists").merge_ready_at = 0.0;
        }
        state.tick(DT);

        assert_eq!(state.cells_of(&id).len(), 1);
        let survivor = state.cell(&owned[0]).expect("primary survives");
        assert!((survivor.area() - expected).abs() / expected < 1e-9);
        assert!(survivor.merge_ready_at > state.sim_time());
    }

    #[test]
    fn absorb_takes_eighty_percent_of_the_loser() {
        let mut state = state_with(0);
        let winner = join(&mut state, "goliath");
        let loser = join(&mut state, "david");
        state.place_cell(&winner, DVec2::new(200.0, 200.0), 60.0);
        state.place_cell(&loser, DVec2::new(200.0, 200.0), 20.0);
        pin(&mut state, &winner);
        pin(&mut state, &loser);

        let expected =
            std::f64::consts::PI * 60.0 * 60.0 + 0.8 * std::f64::consts::PI * 20.0 * 20.0;
        state.tick(DT);

        assert!(state.cell(&loser).is_none());
        let cell = state.cell(&winner).expect("winner lives");
        assert!((cell.area() - expected).abs() / expected < 1e-6);
        assert!(cell.merge_ready_at > state.sim_time());
        assert_eq!(state.player(&winner).expect("winner").cells_eaten, 1);
    }

    #[test]
    fn near_equal_sizes_do_not_absorb() {
        let mut state = state_with(0);
        let a = join(&mut state, "a");
        let b = join(&mut state, "b");
        // 50 * 1.02 = 51 > 50.5: under the threshold both survive.
        state.place_cell(&a, DVec2::new(200.0, 200.0), 50.5);
        state.place_cell(&b, DVec2::new(210.0, 200.0), 50.0);
        pin(&mut state, &a);
        pin(&mut state, &b);

        state.tick(DT);

        assert!(state.cell(&a).is_some());
        assert!(state.cell(&b).is_some());
    }

    #[test]
    fn elimination_emits_an_event_and_removes_the_player() {
        let mut state = state_with(0);
        let winner = join(&mut state, "goliath");
        let loser = join(&mut state, "david");
        state.place_cell(&winner, DVec2::new(200.0, 200.0), 60.0);
        state.place_cell(&loser, DVec2::new(200.0, 200.0), 20.0);
        pin(&mut state, &winner);
        pin(&mut state, &loser);

        // Give the loser some history so the event carries it.
        state.players.get_mut(&loser).expect("present").food_eaten = 7;

        state.tick(DT);

        assert!(state.player(&loser).is_none());
        assert!(state.cells_of(&loser).is_empty());
        assert!(state.targets.get(&loser).is_none());

        let events = state.take_events();
        assert_eq!(events.len(), 1);
        let WorldEvent::PlayerEliminated {
            winner_id,
            winner_name,
            loser_id,
            loser_name,
            loser_food_eaten,
            ..
        } = &events[0];
        assert_eq!(winner_id, &winner);
        assert_eq!(winner_name, "goliath");
        assert_eq!(loser_id, &loser);
        assert_eq!(loser_name, "david");
        assert_eq!(*loser_food_eaten, 7);

        // Events are drained exactly once.
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn tick_upholds_core_invariants() {
        let mut state = state_with(30);
        state.populate_food();
        let ids: Vec<String> = (0..4)
            .map(|i| join(&mut state, &format!("p{i}")))
            .collect();
        for (i, id) in ids.iter().enumerate() {
            state.place_cell(id, DVec2::new(100.0 + 80.0 * i as f64, 250.0), 30.0);
            state.set_target(id, DVec2::new(250.0, 250.0));
        }

        for _ in 0..120 {
            state.tick(DT);

            for cell in state.cells() {
                assert!(cell.position.x >= 0.0 && cell.position.x <= state.config.width);
                assert!(cell.position.y >= 0.0 && cell.position.y <= state.config.height);
                assert!(
                    state.player(&cell.player_id).is_some(),
                    "cell owner must exist"
                );
                assert!(state.cells_of(&cell.player_id).contains(&cell.id));
            }
            assert_eq!(state.food_count(), 30);

            // No unresolved absorbable overlap between different owners.
            let cells: Vec<Cell> = state.cells().cloned().collect();
            for (i, a) in cells.iter().enumerate() {
                for b in &cells[i + 1..] {
                    if a.player_id == b.player_id {
                        continue;
                    }
                    let overlapping = collides(a.position, a.radius, b.position, b.radius);
                    let absorbable = a.radius >= b.radius * ABSORB_RATIO
                        || b.radius >= a.radius * ABSORB_RATIO;
                    assert!(
                        !(overlapping && absorbable),
                        "unresolved absorbable overlap after tick"
                    );
                }
            }
        }
    }
}
