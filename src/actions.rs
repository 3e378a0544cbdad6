//! Action interpretation: turning raw network outputs into world effects.
//!
//! Runs inside the parallel per-agent phase. Direct mutations touch only the
//! agent being ticked; everything that touches shared state (moves, deaths,
//! pheromone deposits) is pushed onto the deferred queues and applied at the
//! step boundary.

use crate::agent::Agent;
use crate::geometry::{Coord, Dir};
use crate::rng;
use crate::world::TickView;

/// Number of compiled-in actions; genome sink numbers reduce modulo this.
pub const NUM_ACTIONS: usize = 17;

/// Output actions available to neural networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    /// Urge along the X axis (positive = east)
    MoveX,
    /// Urge along the Y axis (positive = north)
    MoveY,
    /// Continue in the last movement direction
    MoveForward,
    /// Urge along the left-right axis (synonym for MoveRight)
    MoveRl,
    /// Urge in a fresh random direction
    MoveRandom,
    /// Retune the internal oscillator
    SetOscillatorPeriod,
    /// Retune the long probe reach
    SetLongProbeDist,
    /// Set behavioral responsiveness
    SetResponsiveness,
    /// Deposit pheromone on layer 0
    EmitSignal0,
    MoveEast,
    MoveWest,
    MoveNorth,
    MoveSouth,
    /// Move 90 degrees counterclockwise from the last direction
    MoveLeft,
    /// Move 90 degrees clockwise from the last direction
    MoveRight,
    /// Move opposite to the last direction
    MoveReverse,
    /// Kill the agent directly ahead (config-gated)
    KillForward,
}

impl Action {
    /// `KillForward` is only live when the config allows it; every other
    /// action is always compiled in.
    #[inline]
    pub fn is_enabled(self, view: &TickView) -> bool {
        match self {
            Action::KillForward => view.config.reproduction.kill_enable,
            _ => true,
        }
    }
}

/// Bernoulli trial: true with probability `factor`.
#[inline]
pub fn prob2bool(factor: f32) -> bool {
    debug_assert!((0.0..=1.0).contains(&factor));
    rng::random_unit() < factor
}

/// Squash an arbitrary activation into `[0, 1]`.
#[inline]
fn normalize(level: f32) -> f32 {
    (level.tanh() + 1.0) / 2.0
}

/// Responsiveness shaping curve: `(r - 2)^(-2k) - 2^(-2k) * (1 - r)`.
/// Higher `k` demands stronger activations before actions fire. The curve
/// blows up near r = 0 for small k, so the output is clamped to `[0, 1]`
/// before use as a probability.
pub fn response_curve(responsiveness: f32, k_factor: u32) -> f32 {
    let k = k_factor as i32;
    let value = (responsiveness - 2.0).powi(-2 * k)
        - 2.0f32.powi(-2 * k) * (1.0 - responsiveness);
    value.clamp(0.0, 1.0)
}

/// Interpret one agent's action levels.
///
/// Scalar state (responsiveness, oscillator period, probe distance) updates
/// in place. Movement urges accumulate vectorially, squash through tanh,
/// scale by the shaped responsiveness, and finally round probabilistically
/// into a single-cell offset. Moves, kills, and deposits go to the queues.
pub fn execute_actions(agent: &mut Agent, levels: &[f32; NUM_ACTIONS], view: &TickView) {
    let level_of = |action: Action| levels[action as usize];

    // Responsiveness first: it shapes everything gated below this step.
    if Action::SetResponsiveness.is_enabled(view) {
        agent.responsiveness = normalize(level_of(Action::SetResponsiveness));
    }
    let responsiveness_adjusted = response_curve(
        agent.responsiveness,
        view.config.sensors.responsiveness_curve_k_factor,
    );

    if Action::SetOscillatorPeriod.is_enabled(view) {
        let normalized = normalize(level_of(Action::SetOscillatorPeriod));
        let new_period = 1 + (1.5 + (7.0 * normalized).exp()) as u32;
        debug_assert!((2..=2048).contains(&new_period));
        agent.osc_period = new_period;
    }

    if Action::SetLongProbeDist.is_enabled(view) {
        const MAX_LONG_PROBE_DISTANCE: f32 = 32.0;
        let normalized = normalize(level_of(Action::SetLongProbeDist));
        agent.long_probe_dist = (1.0 + normalized * MAX_LONG_PROBE_DISTANCE) as u32;
    }

    if Action::EmitSignal0.is_enabled(view) && view.signals.num_layers() > 0 {
        const EMIT_THRESHOLD: f32 = 0.5;
        let level = normalize(level_of(Action::EmitSignal0)) * responsiveness_adjusted;
        if level > EMIT_THRESHOLD && prob2bool(level) {
            view.queues.queue_deposit(0, agent.loc);
        }
    }

    if Action::KillForward.is_enabled(view) {
        const KILL_THRESHOLD: f32 = 0.5;
        let level = normalize(level_of(Action::KillForward)) * responsiveness_adjusted;
        if level > KILL_THRESHOLD && prob2bool(level) {
            let other_loc = agent.loc + agent.last_move_dir;
            if view.grid.in_bounds(other_loc) && view.grid.is_occupied_at(other_loc) {
                let other_index = view.grid.at(other_loc);
                debug_assert_eq!((agent.loc - other_loc).length(), 1);
                view.queues.queue_for_death(other_index);
            }
        }
    }

    // Movement: accumulate urges from every enabled movement action, then
    // collapse the vector into a single-cell offset.
    let last_move_offset = agent.last_move_dir.as_normalized_coord();

    let mut move_x = level_of(Action::MoveX);
    let mut move_y = level_of(Action::MoveY);

    move_x += level_of(Action::MoveEast);
    move_x -= level_of(Action::MoveWest);
    move_y += level_of(Action::MoveNorth);
    move_y -= level_of(Action::MoveSouth);

    let forward = level_of(Action::MoveForward);
    move_x += last_move_offset.x as f32 * forward;
    move_y += last_move_offset.y as f32 * forward;

    let reverse = level_of(Action::MoveReverse);
    move_x -= last_move_offset.x as f32 * reverse;
    move_y -= last_move_offset.y as f32 * reverse;

    let left_offset = agent.last_move_dir.rotate_90_ccw().as_normalized_coord();
    let left = level_of(Action::MoveLeft);
    move_x += left_offset.x as f32 * left;
    move_y += left_offset.y as f32 * left;

    let right_offset = agent.last_move_dir.rotate_90_cw().as_normalized_coord();
    let right = level_of(Action::MoveRight) + level_of(Action::MoveRl);
    move_x += right_offset.x as f32 * right;
    move_y += right_offset.y as f32 * right;

    let random_offset = Dir::random8().as_normalized_coord();
    let random_level = level_of(Action::MoveRandom);
    move_x += random_offset.x as f32 * random_level;
    move_y += random_offset.y as f32 * random_level;

    move_x = move_x.tanh() * responsiveness_adjusted;
    move_y = move_y.tanh() * responsiveness_adjusted;

    // Probabilistic rounding: |component| is the chance of a step on that
    // axis, its sign the direction (zero counts as positive).
    let prob_x = prob2bool(move_x.abs()) as i16;
    let prob_y = prob2bool(move_y.abs()) as i16;
    let signum_x: i16 = if move_x < 0.0 { -1 } else { 1 };
    let signum_y: i16 = if move_y < 0.0 { -1 } else { 1 };

    let movement_offset = Coord::new(prob_x * signum_x, prob_y * signum_y);
    let new_loc = agent.loc + movement_offset;
    if view.grid.in_bounds(new_loc) && view.grid.is_empty_at(new_loc) {
        view.queues.queue_for_move(agent.index, new_loc);
    }
}
