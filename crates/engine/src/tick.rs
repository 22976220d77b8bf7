//! The Tick Simulator: advances a `MatchState` by one `TICK_INTERVAL` step.
//!
//! `step` is deterministic given the pre-state and config: iteration is
//! always in ascending id order (the `BTreeMap` iteration the Graph Store
//! already gives us), and the eight phases of §4.3 run in the fixed order
//! below with no intermediate phase ever observing a value a later phase
//! hasn't committed yet (no transfer observes a post-flip owner; no victory
//! check observes a pre-commit juice value).
//!
//! Mirrors the teacher `flowstate-sim` crate's own discipline: no wall-clock
//! reads, no randomness, no logging. `tick_count` is this crate's clock —
//! `game_start_time`/`peace_phase_started_at` are stamped from
//! `tick_count * tick_interval_seconds` rather than an externally supplied
//! timestamp, so a driver replaying the same command/tick sequence gets a
//! bitwise-identical match without having to also replay real time (see
//! DESIGN.md).

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::graph::MatchState;
use crate::lifecycle;
use crate::model::{Edge, EdgeId, Elimination, Node, NodeCapture, NodeId, Phase, PlayerId};

const EPSILON: f64 = 1e-9;

/// The observable effects of one `tick::step` call, drained by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub node_captures: Vec<NodeCapture>,
    pub eliminations: Vec<Elimination>,
    pub game_ended: bool,
    pub winner_id: Option<PlayerId>,
}

impl TickReport {
    fn empty(state: &MatchState) -> Self {
        Self {
            node_captures: Vec::new(),
            eliminations: Vec::new(),
            game_ended: state.game_ended,
            winner_id: state.winner_id,
        }
    }
}

/// Whether `edge` (given its live `on` flag) should be flowing this tick, per
/// §4.3 step 1: on, source owned, and either the target is enemy-owned
/// (attack, flows unconditionally), or the target isn't at capacity
/// (expansion/friendly).
pub(crate) fn derive_flowing(state: &MatchState, source: NodeId, target: NodeId, on: bool, juice_max: f64) -> bool {
    if !on {
        return false;
    }
    let Some(source_owner) = state.node(source).and_then(|n| n.owner) else {
        return false;
    };
    let Some(target_node) = state.node(target) else {
        return false;
    };
    match target_node.owner {
        Some(target_owner) if target_owner != source_owner => true,
        _ => target_node.juice < juice_max,
    }
}

fn refresh_flowing_and_building(state: &mut MatchState, config: &EngineConfig) {
    let edge_ids: Vec<EdgeId> = state.edges().map(|e: &Edge| e.id).collect();
    for id in edge_ids {
        let Some(edge) = state.edge(id) else { continue };
        if edge.building {
            let required = edge.build_ticks_required;
            let elapsed = edge.build_ticks_elapsed;
            if let Some(edge) = state.edge_mut(id) {
                edge.flowing = false;
                if elapsed + 1 >= required {
                    edge.building = false;
                    edge.build_ticks_elapsed = required;
                } else {
                    edge.build_ticks_elapsed = elapsed + 1;
                }
            }
            continue;
        }
        let (source, target, on) = (edge.source, edge.target, edge.on);
        let flowing = derive_flowing(state, source, target, on, config.juice_max);
        if let Some(edge) = state.edge_mut(id) {
            edge.flowing = flowing;
        }
    }
}

/// Advance `state` by one tick. Infallible by construction: ticks only read
/// and write match state, and clamps/invariants preclude out-of-range values.
pub fn step(state: &mut MatchState, config: &EngineConfig) -> TickReport {
    state.pending_node_captures.clear();
    state.pending_eliminations.clear();

    if state.phase == Phase::Ended || state.phase == Phase::Picking {
        return TickReport::empty(state);
    }

    lifecycle::check_peace_expiry(state, config);

    // --- Phase 1: refresh `flowing`, advance building edges ---
    refresh_flowing_and_building(state, config);

    // --- Phase 2: production ---
    let mut delta: BTreeMap<NodeId, f64> = BTreeMap::new();
    for node in state.nodes() {
        if node.owner.is_none() {
            continue;
        }
        let rate = if node.is_capital {
            config.production_rate_per_node * 2.0
        } else {
            config.production_rate_per_node
        };
        *delta.entry(node.id).or_insert(0.0) += rate;
    }

    // --- Phase 3: per-source outflow computation ---
    let mut outgoing: BTreeMap<NodeId, Vec<EdgeId>> = BTreeMap::new();
    for edge in state.edges() {
        if edge.flowing {
            outgoing.entry(edge.source).or_default().push(edge.id);
        }
    }

    struct Transfer {
        edge_id: EdgeId,
        source: NodeId,
        target: NodeId,
        amount: f64,
    }
    let mut transfers: Vec<Transfer> = Vec::new();
    for (&source_id, edge_ids) in &outgoing {
        let Some(source_node) = state.node(source_id) else { continue };
        let fraction = config.outflow_fraction(source_node.cur_intake);
        let total_outflow = source_node.juice * fraction;
        let per_edge = total_outflow / edge_ids.len() as f64;
        for &edge_id in edge_ids {
            let Some(edge) = state.edge(edge_id) else { continue };
            transfers.push(Transfer { edge_id, source: edge.source, target: edge.target, amount: per_edge });
        }
    }

    // --- Phase 4: apply transfers ---
    let mut new_intake: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut tentative: Vec<(EdgeId, NodeId, PlayerId)> = Vec::new();
    for t in &transfers {
        *delta.entry(t.source).or_insert(0.0) -= t.amount;
        let source_owner = state.node(t.source).and_then(|n| n.owner);
        let target_owner = state.node(t.target).and_then(|n| n.owner);

        if source_owner.is_some() && target_owner == source_owner {
            *delta.entry(t.target).or_insert(0.0) += t.amount;
            *new_intake.entry(t.target).or_insert(0.0) += t.amount;
        } else {
            let entry = delta.entry(t.target).or_insert(0.0);
            *entry -= t.amount;
            let Some(attacker) = source_owner else { continue };
            let old_juice = state.node(t.target).map(|n| n.juice).unwrap_or(0.0);
            let projected = old_juice + *entry;
            if projected <= config.juice_min + EPSILON {
                tentative.push((t.edge_id, t.target, attacker));
            }
        }
    }

    // --- Phase 5: commit deltas and clamp ---
    let node_ids: Vec<NodeId> = state.nodes().map(|n: &Node| n.id).collect();
    for id in node_ids {
        let d = delta.get(&id).copied().unwrap_or(0.0);
        let intake = new_intake.get(&id).copied().unwrap_or(0.0);
        if let Some(node) = state.node_mut(id) {
            node.juice = (node.juice + d).clamp(config.juice_min, config.juice_max);
            node.cur_intake = intake;
        }
    }

    // --- Phase 6: ownership flips ---
    // One flip per target node per tick; ties among multiple attackers
    // draining the same node in the same tick break on lowest edge id.
    let mut by_target: BTreeMap<NodeId, (EdgeId, PlayerId)> = BTreeMap::new();
    for (edge_id, target, attacker) in tentative {
        by_target
            .entry(target)
            .and_modify(|existing| {
                if edge_id < existing.0 {
                    *existing = (edge_id, attacker);
                }
            })
            .or_insert((edge_id, attacker));
    }
    let mut node_captures = Vec::new();
    for (target, (_edge_id, attacker)) in by_target {
        let Some(node) = state.node(target) else { continue };
        if node.juice > config.juice_min + EPSILON {
            continue;
        }
        let previous_owner = node.owner;
        state.set_owner(target, Some(attacker));
        let gold_reward = if previous_owner.is_none() { config.neutral_capture_gold } else { 0.0 };
        if gold_reward > 0.0 {
            state.credit_gold(attacker, gold_reward);
        }
        let capture = NodeCapture { node_id: target, new_owner: attacker, previous_owner, gold_reward };
        node_captures.push(capture);
    }
    state.pending_node_captures.extend(node_captures.iter().copied());

    // --- Phase 7: passive income ---
    if config.passive_income_enabled {
        let player_ids: Vec<PlayerId> = state
            .players()
            .map(|p| p.id)
            .filter(|id| !state.is_eliminated(*id))
            .collect();
        for pid in player_ids {
            state.credit_gold(pid, config.passive_gold_per_tick);
        }
    }

    // --- Phase 8: victory checks ---
    let outcome = lifecycle::check_victory(state, config);
    for elimination in &outcome.eliminations {
        state.eliminated_players.insert(elimination.player_id);
    }
    state.pending_eliminations.extend(outcome.eliminations.iter().copied());
    if let Some(winner) = outcome.winner {
        state.phase = Phase::Ended;
        state.winner_id = Some(winner);
        state.game_ended = true;
    }

    state.tick_count += 1;

    TickReport {
        node_captures,
        eliminations: outcome.eliminations,
        game_ended: state.game_ended,
        winner_id: state.winner_id,
    }
}

// Re-exported for `optimizer`'s post-redirect `flowing` recompute.
pub(crate) fn refresh_single_edge_flowing(state: &mut MatchState, edge_id: EdgeId, config: &EngineConfig) {
    let Some(edge) = state.edge(edge_id) else { return };
    if edge.building {
        return;
    }
    let (source, target, on) = (edge.source, edge.target, edge.on);
    let flowing = derive_flowing(state, source, target, on, config.juice_max);
    if let Some(edge) = state.edge_mut(edge_id) {
        edge.flowing = flowing;
    }
}
