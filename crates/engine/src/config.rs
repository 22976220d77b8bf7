//! Tunable constants for one match.
//!
//! Mirrors the Server Edge's `ServerConfig`/`ValidationConfig` convention: a
//! plain, `Copy`-able struct with a hand-written `Default`, no external
//! config-file loader. Graph generation and game-mode selection own picking
//! *which* numbers apply; this struct only carries the numbers themselves.

/// Every tunable the engine consults while running one match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Duration of one simulation tick, in seconds.
    pub tick_interval_seconds: f64,
    /// Wall-clock bound on the `playing` phase, in seconds.
    pub game_duration_seconds: f64,
    /// Duration of the `peace` phase after all players have picked, in seconds.
    pub peace_phase_duration_seconds: f64,

    pub juice_min: f64,
    pub juice_max: f64,

    /// Juice accrued per tick by an owned node; capital nodes accrue double.
    pub production_rate_per_node: f64,
    /// Fraction of a source node's juice transferred per tick, before the intake bonus.
    pub base_transfer_fraction: f64,
    /// `cur_intake` is divided by this to produce the intake bonus added to
    /// `base_transfer_fraction`.
    pub intake_bonus_divisor: f64,

    /// Gold credited to the capturing player when a neutral (unowned) node is drained.
    pub neutral_capture_gold: f64,
    pub starting_gold: f64,
    pub passive_income_enabled: bool,
    pub passive_gold_per_tick: f64,

    /// Gold cost of a bridge or edge reversal, per unit of Euclidean distance.
    pub bridge_cost_per_unit_distance: f64,
    /// Flat gold cost of `destroy_node` (the reference implementation's
    /// `handle_destroy_node` default; unlike bridge/reverse it is not
    /// distance-scaled).
    pub destroy_node_cost: f64,

    /// Minimum angle, in degrees, that two edges meeting at a node must keep
    /// after a new bridge is built (see `geometry::resolve_sharp_angles`).
    pub min_join_angle_degrees: f64,
    /// Largest straight-line displacement a node may be moved to relax a sharp angle.
    pub max_sharp_angle_displacement: f64,
    /// Minimum standoff kept from other nodes/edges while relaxing a sharp angle.
    pub collision_clearance: f64,

    /// Capitals held simultaneously to win by capital-count victory.
    pub capital_win_count: u32,
}

impl Default for EngineConfig {
    /// Defaults match §6's base configuration surface (the `sparse` mode's
    /// figures in the wider reference implementation run higher for several
    /// of these; this crate exposes the knobs, a caller picks the mode).
    fn default() -> Self {
        Self {
            tick_interval_seconds: 0.1,
            game_duration_seconds: 300.0,
            peace_phase_duration_seconds: 10.0,

            juice_min: 0.0,
            juice_max: 120.0,

            production_rate_per_node: 0.15,
            base_transfer_fraction: 0.01,
            intake_bonus_divisor: 100.0,

            neutral_capture_gold: 3.0,
            starting_gold: 0.0,
            passive_income_enabled: true,
            passive_gold_per_tick: 0.09,

            bridge_cost_per_unit_distance: 1.0,
            destroy_node_cost: 3.0,

            min_join_angle_degrees: 22.5,
            max_sharp_angle_displacement: 50.0,
            collision_clearance: 5.0,

            capital_win_count: 5,
        }
    }
}

impl EngineConfig {
    /// `base_transfer_fraction + cur_intake / intake_bonus_divisor`, the
    /// variable outflow fraction used by the tick simulator's per-source
    /// outflow computation.
    pub fn outflow_fraction(&self, cur_intake: f64) -> f64 {
        self.base_transfer_fraction + cur_intake / self.intake_bonus_divisor
    }
}
