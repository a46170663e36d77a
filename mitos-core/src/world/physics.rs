//! Steering physics for one world.
//!
//! Each cell continuously steers toward its owner's target with
//! mass-dependent speed. Splits apply temporary impulses that decay
//! exponentially, cells owned by the same player keep a soft spacing ring,
//! and overlapping opponents are fully separated before collision events are
//! reported back to the world layer. The engine never deletes cells and never
//! touches ownership; it only moves discs.
//!
//! Everything here is deterministic: pairs are processed in sorted-id order
//! and the degenerate coincident-centre cases fall back to directions derived
//! from the cell ids, never from a randomized hash.

use glam::DVec2;
use rustc_hash::FxHashMap;

use super::Cell;

/// Largest integration step, regardless of event-loop jitter.
pub const MAX_DELTA_TIME: f64 = 1.0 / 30.0;

/// Steering speed for a cell of mass 1.
pub const BASE_TARGET_SPEED: f64 = 520.0;
/// Speed floor so heavy cells still crawl.
pub const MIN_TARGET_SPEED: f64 = 48.0;
/// Exponent of the mass-to-speed falloff.
pub const MASS_SPEED_EXPONENT: f64 = 0.42;
/// Cap on total speed relative to steering speed; split impulses may exceed
/// steering speed by up to this factor.
pub const BOOST_SPEED_MULTIPLIER: f64 = 2.3;
/// Exponential decay rate of split impulses, per second.
pub const IMPULSE_DECAY_RATE: f64 = 6.0;

/// Same-owner cells are pushed apart below this fraction of their summed
/// radii, which lets them touch visually without stacking.
pub const OWNER_SPACING_FACTOR: f64 = 0.95;
/// Relaxation passes per step. A handful keeps large stacks stable.
pub const RELAXATION_PASSES: usize = 4;

/// Steering speed for a cell of the given mass (`mass = max(r², 1)`).
#[must_use]
pub fn speed_for_mass(mass: f64) -> f64 {
    let adjusted = mass.max(1.0);
    (BASE_TARGET_SPEED / adjusted.powf(MASS_SPEED_EXPONENT)).max(MIN_TARGET_SPEED)
}

/// An inter-owner overlap the engine resolved during a step.
///
/// Deduplicated by unordered pair, keeping the deepest penetration seen
/// across the relaxation passes.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// Id of the first cell (sorted-id order within the pair).
    pub first_id: String,
    /// Id of the second cell.
    pub second_id: String,
    /// Overlap depth at detection time.
    pub penetration: f64,
    /// Unit separation normal, pointing from first to second.
    pub normal: DVec2,
}

/// The per-world steering engine.
///
/// The world owns the cell table; the engine owns what the table does not
/// record: per-cell split impulses and steering targets. Both maps are kept
/// in lockstep with the table through [`add_cell`](Self::add_cell) and
/// [`remove_cell`](Self::remove_cell).
pub struct SteeringEngine {
    width: f64,
    height: f64,
    impulses: FxHashMap<String, DVec2>,
    targets: FxHashMap<String, DVec2>,
}

impl SteeringEngine {
    /// Creates an engine for a `width` × `height` world.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            impulses: FxHashMap::default(),
            targets: FxHashMap::default(),
        }
    }

    /// Updates the world rectangle. Positions are re-clamped on the next step.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Registers a cell. Its current velocity becomes its initial impulse so
    /// a freshly split cell keeps its boost.
    pub fn add_cell(&mut self, cell: &Cell) {
        self.impulses.insert(cell.id.clone(), cell.velocity);
        self.targets
            .insert(cell.id.clone(), self.clamp(cell.position));
    }

    /// Forgets a cell. Unknown ids are ignored.
    pub fn remove_cell(&mut self, cell_id: &str) {
        self.impulses.remove(cell_id);
        self.targets.remove(cell_id);
    }

    /// Points a cell at `target` (clamped to the world rectangle).
    pub fn set_target(&mut self, cell_id: &str, target: DVec2) {
        if let Some(slot) = self.targets.get_mut(cell_id) {
            *slot = DVec2::new(
                target.x.clamp(0.0, self.width),
                target.y.clamp(0.0, self.height),
            );
        }
    }

    /// Adds `impulse` to the cell's decaying impulse and its velocity.
    pub fn apply_impulse(&mut self, cell: &mut Cell, impulse: DVec2) {
        if let Some(slot) = self.impulses.get_mut(&cell.id) {
            *slot += impulse;
            cell.velocity += impulse;
        }
    }

    /// Advances every cell by `dt` seconds and returns the inter-owner
    /// collisions that were resolved along the way.
    ///
    /// `dt` is clamped to `(0, MAX_DELTA_TIME]` to keep the integration
    /// stable when the tick loop stalls.
    pub fn step(&mut self, dt: f64, cells: &mut FxHashMap<String, Cell>) -> Vec<CollisionEvent> {
        let dt = dt.clamp(1e-4, MAX_DELTA_TIME);
        if cells.is_empty() {
            return Vec::new();
        }

        let mut order: Vec<String> = cells.keys().cloned().collect();
        order.sort_unstable();

        for id in &order {
            self.integrate(id, dt, cells);
        }

        let mut collisions: FxHashMap<(String, String), CollisionEvent> = FxHashMap::default();
        for _ in 0..RELAXATION_PASSES {
            self.apply_owner_spacing(&order, cells);
            self.resolve_overlaps(&order, cells, &mut collisions);
            for id in &order {
                if let Some(cell) = cells.get_mut(id) {
                    cell.position = self.clamp(cell.position);
                }
            }
        }

        let mut events: Vec<CollisionEvent> = collisions.into_values().collect();
        events.sort_unstable_by(|a, b| (&a.first_id, &a.second_id).cmp(&(&b.first_id, &b.second_id)));
        events
    }

    fn integrate(&mut self, id: &str, dt: f64, cells: &mut FxHashMap<String, Cell>) {
        let Some(cell) = cells.get_mut(id) else {
            return;
        };
        let mass = cell.mass();
        let target = self.targets.get(id).copied().unwrap_or(cell.position);
        let control = control_velocity(cell.position, target, mass);
        let impulse = self.impulses.get(id).copied().unwrap_or(DVec2::ZERO);

        let mut velocity = control + impulse;
        let max_speed = speed_for_mass(mass) * BOOST_SPEED_MULTIPLIER;
        let speed = velocity.length();
        if speed > max_speed {
            velocity *= max_speed / speed.max(1e-6);
        }

        cell.velocity = velocity;
        cell.position = self.clamp(cell.position + velocity * dt);

        let decay = (-IMPULSE_DECAY_RATE * dt).exp();
        if let Some(slot) = self.impulses.get_mut(id) {
            *slot *= decay;
        }
    }

    /// Pushes same-owner pairs apart to the spacing ring and damps the
    /// closing component of their relative velocity by half.
    fn apply_owner_spacing(&self, order: &[String], cells: &mut FxHashMap<String, Cell>) {
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                let (Some(a), Some(b)) = (cells.get(&order[i]), cells.get(&order[j])) else {
                    continue;
                };
                if a.player_id != b.player_id {
                    continue;
                }

                let min_distance = (a.radius + b.radius) * OWNER_SPACING_FACTOR;
                let delta = b.position - a.position;
                let distance_sq = delta.length_squared();
                if distance_sq >= (min_distance * min_distance).max(1e-9) {
                    continue;
                }

                let (normal, distance) = if distance_sq <= 1e-9 {
                    (fallback_normal(&order[i], &order[j]), 0.0)
                } else {
                    let distance = distance_sq.sqrt();
                    (delta / distance, distance)
                };

                let penetration = min_distance - distance;
                if penetration <= 0.0 {
                    continue;
                }

                let (mass_a, mass_b) = (cells[&order[i]].mass(), cells[&order[j]].mass());
                let total_mass = (mass_a + mass_b).max(1.0);
                let share_a = mass_b / total_mass;
                let share_b = mass_a / total_mass;

                let (vel_a, vel_b) = (cells[&order[i]].velocity, cells[&order[j]].velocity);
                let closing = (vel_b - vel_a).dot(normal);
                let damp = if closing < 0.0 { closing * 0.5 } else { 0.0 };

                if let Some(a) = cells.get_mut(&order[i]) {
                    a.position -= normal * penetration * share_a;
                    a.velocity += normal * damp;
                }
                if let Some(b) = cells.get_mut(&order[j]) {
                    b.position += normal * penetration * share_b;
                    b.velocity -= normal * damp;
                }
            }
        }
    }

    /// Fully separates overlapping opposing pairs and records the contact,
    /// keeping the deepest penetration per unordered pair.
    fn resolve_overlaps(
        &self,
        order: &[String],
        cells: &mut FxHashMap<String, Cell>,
        collisions: &mut FxHashMap<(String, String), CollisionEvent>,
    ) {
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                let (Some(a), Some(b)) = (cells.get(&order[i]), cells.get(&order[j])) else {
                    continue;
                };
                if a.player_id == b.player_id {
                    continue;
                }

                let min_distance = a.radius + b.radius;
                let delta = b.position - a.position;
                let distance_sq = delta.length_squared();
                if distance_sq >= min_distance * min_distance {
                    continue;
                }

                let (normal, distance) = if distance_sq <= 1e-9 {
                    (DVec2::X, 0.0)
                } else {
                    let distance = distance_sq.sqrt();
                    (delta / distance, distance)
                };
                let penetration = min_distance - distance;

                let (mass_a, mass_b) = (a.mass(), b.mass());
                let total_mass = (mass_a + mass_b).max(1.0);
                let share_a = mass_b / total_mass;
                let share_b = mass_a / total_mass;

                if let Some(a) = cells.get_mut(&order[i]) {
                    a.position -= normal * penetration * share_a;
                }
                if let Some(b) = cells.get_mut(&order[j]) {
                    b.position += normal * penetration * share_b;
                }

                let key = (order[i].clone(), order[j].clone());
                let event = CollisionEvent {
                    first_id: order[i].clone(),
                    second_id: order[j].clone(),
                    penetration,
                    normal,
                };
                match collisions.get_mut(&key) {
                    Some(existing) if existing.penetration >= penetration => {}
                    Some(existing) => *existing = event,
                    None => {
                        collisions.insert(key, event);
                    }
                }
            }
        }
    }

    fn clamp(&self, position: DVec2) -> DVec2 {
        DVec2::new(
            position.x.clamp(0.0, self.width),
            position.y.clamp(0.0, self.height),
        )
    }
}

/// Velocity that steers a cell from `position` toward `target`.
fn control_velocity(position: DVec2, target: DVec2, mass: f64) -> DVec2 {
    let delta = target - position;
    let distance = delta.length();
    if distance <= 1e-6 {
        return DVec2::ZERO;
    }
    (delta / distance) * speed_for_mass(mass)
}

/// Deterministic separation direction for two coincident same-owner cells,
/// derived from the byte sum of the concatenated ids.
fn fallback_normal(first_id: &str, second_id: &str) -> DVec2 {
    let seed: u64 = first_id
        .bytes()
        .chain(second_id.bytes())
        .map(u64::from)
        .sum();
    let angle = (seed % 360) as f64 * std::f64::consts::PI / 180.0;
    DVec2::new(angle.cos(), angle.sin())
}
