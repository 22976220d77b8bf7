//! The Command Validator / Mutator: the public command surface.
//!
//! Every function here validates phase/ownership/gold preconditions against
//! a flat sequence of small private helpers composed with `?` — the shape
//! §9's design notes asks for ("a flat dispatch, not a throw/catch
//! pyramid"), generalizing the reference implementation's
//! `validate_game_active`/`validate_phase`/`validate_player_owns_node`/
//! `validate_sufficient_gold` helper family (`original_source/backend/
//! game_engine.py`) into functions returning `Result<(), CommandError>`
//! instead of raising `GameValidationError`. On success, the Graph Store is
//! mutated in place and the call returns a typed `CommandEffect`. On
//! failure, state is left untouched and the first violated precondition is
//! reported — never a later one, and never a panic.

use crate::config::EngineConfig;
use crate::error::CommandError;
use crate::geometry::{self, BridgeRejection};
use crate::graph::MatchState;
use crate::lifecycle;
use crate::model::{EdgeId, NodeId, NodeMovement, Phase, Player, PlayerId};
use crate::optimizer::{self, RedirectEffect};
use crate::tick;

const EPSILON: f64 = 1e-9;

/// The observable result of a successful command, one variant per §6 inbound
/// message.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEffect {
    Picked { node_id: NodeId, phase_after: Phase },
    Toggled { edge_id: EdgeId, on: bool },
    Reversed { edge_id: EdgeId, new_source: NodeId, new_target: NodeId, on: bool, cost: f64 },
    Built { edge_id: EdgeId, movements: Vec<NodeMovement>, cost: f64 },
    Redirected(RedirectEffect),
    Destroyed { node_id: NodeId, removed_edges: Vec<EdgeId>, cost: f64 },
    AutoExpandToggled { enabled: bool },
    Quit { eliminated: PlayerId, winner: Option<PlayerId> },
}

fn ensure_known_player(state: &MatchState, player: PlayerId) -> Result<(), CommandError> {
    if state.player(player).is_none() {
        return Err(CommandError::Authorization);
    }
    Ok(())
}

/// Shared entry check for every in-game command: caller must be a known,
/// non-eliminated player, and the match must not already be `ended` (I7).
fn ensure_active_caller(state: &MatchState, player: PlayerId) -> Result<(), CommandError> {
    ensure_known_player(state, player)?;
    if state.is_eliminated(player) {
        return Err(CommandError::Authorization);
    }
    if state.game_ended {
        return Err(CommandError::Phase);
    }
    Ok(())
}

fn ensure_phase(state: &MatchState, allowed: &[Phase]) -> Result<(), CommandError> {
    if !allowed.contains(&state.phase) {
        return Err(CommandError::Phase);
    }
    Ok(())
}

fn is_enemy(owner: Option<PlayerId>, caller: PlayerId) -> bool {
    matches!(owner, Some(o) if o != caller)
}

/// Engine-computed cost for a distance-scaled command (bridge build, edge
/// reversal): `BRIDGE_COST_PER_UNIT_DISTANCE * euclidean_distance`.
fn engine_distance_cost(state: &MatchState, config: &EngineConfig, a: NodeId, b: NodeId) -> Option<f64> {
    geometry::node_distance(state, a, b).map(|d| d * config.bridge_cost_per_unit_distance)
}

/// §6: a caller-declared cost is accepted only when it is at least the
/// engine-computed cost; the engine always deducts its own figure. Also
/// requires the caller to actually hold that much gold.
fn ensure_cost_and_gold(state: &MatchState, player: PlayerId, declared_cost: f64, engine_cost: f64) -> Result<(), CommandError> {
    if declared_cost + EPSILON < engine_cost {
        return Err(CommandError::Economy);
    }
    if state.gold(player) + EPSILON < engine_cost {
        return Err(CommandError::Economy);
    }
    Ok(())
}

/// `pick_starting_node(player, node_id)`: requires `picking` phase, an
/// unpicked caller, and an unowned existing node. Transitions to `peace` (or
/// straight to `playing`, per `EngineConfig::peace_phase_duration_seconds`)
/// once every player has picked.
pub fn pick_starting_node(state: &mut MatchState, config: &EngineConfig, player: PlayerId, node_id: NodeId) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    ensure_phase(state, &[Phase::Picking])?;
    if state.players_who_picked.get(&player).copied().unwrap_or(false) {
        return Err(CommandError::Authorization);
    }
    let node = state.node(node_id).ok_or(CommandError::NodeNotFound(node_id))?;
    if node.owner.is_some() {
        return Err(CommandError::Authorization);
    }

    state.set_owner(node_id, Some(player));
    state.players_who_picked.insert(player, true);

    let all_picked = state.players().map(|p| p.id).all(|pid| state.players_who_picked.get(&pid).copied().unwrap_or(false));
    if all_picked {
        lifecycle::begin_peace_phase(state, config);
    }

    Ok(CommandEffect::Picked { node_id, phase_after: state.phase })
}

/// `toggle_edge(player, edge_id)`: toggling off is unconditional (a
/// deliberately permissive policy decision — see DESIGN.md); toggling on
/// requires source ownership and, during peace, a non-enemy target (no
/// peace-phase attack).
pub fn toggle_edge(state: &mut MatchState, config: &EngineConfig, player: PlayerId, edge_id: EdgeId) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    ensure_phase(state, &[Phase::Peace, Phase::Playing])?;
    let edge = state.edge(edge_id).ok_or(CommandError::EdgeNotFound(edge_id))?;

    if edge.on || edge.flowing {
        if let Some(edge) = state.edge_mut(edge_id) {
            edge.on = false;
            edge.flowing = false;
        }
        return Ok(CommandEffect::Toggled { edge_id, on: false });
    }

    let source_id = edge.source;
    let target_id = edge.target;
    let source_owner = state.node(source_id).and_then(|n| n.owner);
    if source_owner != Some(player) {
        return Err(CommandError::Authorization);
    }
    if state.phase == Phase::Peace {
        let target_owner = state.node(target_id).and_then(|n| n.owner);
        if is_enemy(target_owner, player) {
            return Err(CommandError::PhaseAttack);
        }
    }

    if let Some(edge) = state.edge_mut(edge_id) {
        edge.on = true;
    }
    tick::refresh_single_edge_flowing(state, edge_id, config);
    let on = state.edge(edge_id).map(|e| e.on).unwrap_or(true);
    Ok(CommandEffect::Toggled { edge_id, on })
}

/// `reverse_edge(player, edge_id, declared_cost)`.
pub fn reverse_edge(
    state: &mut MatchState,
    config: &EngineConfig,
    player: PlayerId,
    edge_id: EdgeId,
    declared_cost: f64,
) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    ensure_phase(state, &[Phase::Peace, Phase::Playing])?;
    let edge = state.edge(edge_id).ok_or(CommandError::EdgeNotFound(edge_id))?;
    let (old_source, old_target) = (edge.source, edge.target);

    let source_owner = state.node(old_source).and_then(|n| n.owner);
    let target_owner = state.node(old_target).and_then(|n| n.owner);
    if source_owner != Some(player) && target_owner != Some(player) {
        return Err(CommandError::Authorization);
    }
    if is_enemy(source_owner, player) {
        return Err(CommandError::Authorization);
    }
    if state.phase == Phase::Peace && is_enemy(target_owner, player) {
        return Err(CommandError::PhaseAttack);
    }

    let engine_cost = engine_distance_cost(state, config, old_source, old_target).ok_or(CommandError::NodeNotFound(old_source))?;
    ensure_cost_and_gold(state, player, declared_cost, engine_cost)?;

    if let Some(edge) = state.edge_mut(edge_id) {
        std::mem::swap(&mut edge.source, &mut edge.target);
    }
    state.deduct_gold(player, engine_cost);

    let new_source_owner = state.node(old_target).and_then(|n| n.owner);
    let new_target_owner = state.node(old_source).and_then(|n| n.owner);
    let would_attack_in_peace = state.phase == Phase::Peace && is_enemy(new_target_owner, player);
    let should_flow = new_source_owner == Some(player) && !would_attack_in_peace;

    if let Some(edge) = state.edge_mut(edge_id) {
        edge.on = should_flow;
    }
    tick::refresh_single_edge_flowing(state, edge_id, config);
    let on = state.edge(edge_id).map(|e| e.on).unwrap_or(false);

    Ok(CommandEffect::Reversed { edge_id, new_source: old_target, new_target: old_source, on, cost: engine_cost })
}

/// `build_bridge(player, from_id, to_id, declared_cost)`.
pub fn build_bridge(
    state: &mut MatchState,
    config: &EngineConfig,
    player: PlayerId,
    from_id: NodeId,
    to_id: NodeId,
    declared_cost: f64,
) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    ensure_phase(state, &[Phase::Peace, Phase::Playing])?;
    if from_id == to_id {
        return Err(CommandError::SelfAction);
    }
    let from_owner = state.node(from_id).ok_or(CommandError::NodeNotFound(from_id))?.owner;
    let to_node_owner = state.node(to_id).ok_or(CommandError::NodeNotFound(to_id))?.owner;
    if from_owner != Some(player) {
        return Err(CommandError::Authorization);
    }
    if state.phase == Phase::Peace && is_enemy(to_node_owner, player) {
        return Err(CommandError::PhaseAttack);
    }

    match geometry::bridge_admissible(state, from_id, to_id) {
        Ok(()) => {}
        Err(BridgeRejection::SelfLoop) => return Err(CommandError::SelfAction),
        Err(BridgeRejection::DuplicateEdge) | Err(BridgeRejection::Crosses(_)) => return Err(CommandError::Geometry),
    }

    let engine_cost = engine_distance_cost(state, config, from_id, to_id).ok_or(CommandError::NodeNotFound(from_id))?;
    ensure_cost_and_gold(state, player, declared_cost, engine_cost)?;

    let new_edge_id = state.next_edge_id();
    state.insert_edge(new_edge_id, from_id, to_id).map_err(|_| CommandError::Geometry)?;
    state.deduct_gold(player, engine_cost);

    if let Some(edge) = state.edge_mut(new_edge_id) {
        edge.on = true;
    }
    tick::refresh_single_edge_flowing(state, new_edge_id, config);

    let movements = geometry::resolve_sharp_angles(state, new_edge_id, config);

    Ok(CommandEffect::Built { edge_id: new_edge_id, movements, cost: engine_cost })
}

/// `redirect_energy(player, target_id)`: delegates to `optimizer::apply`
/// once the §4.5 preconditions hold. The reference implementation
/// (`handle_redirect_energy`) only permits this in `playing`, not `peace`;
/// this crate follows that precedent.
pub fn redirect_energy(state: &mut MatchState, config: &EngineConfig, player: PlayerId, target_id: NodeId) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    ensure_phase(state, &[Phase::Playing])?;
    if state.node(target_id).is_none() {
        return Err(CommandError::NodeNotFound(target_id));
    }
    if state.owned_node_count(player) == 0 {
        return Err(CommandError::Authorization);
    }
    let can_reach = state
        .edges()
        .any(|e| e.target == target_id && state.node(e.source).and_then(|n| n.owner) == Some(player));
    if !can_reach {
        return Err(CommandError::Authorization);
    }

    let effect = optimizer::apply(state, config, player, target_id);
    Ok(CommandEffect::Redirected(effect))
}

/// `destroy_node(player, node_id, declared_cost)`.
pub fn destroy_node(
    state: &mut MatchState,
    config: &EngineConfig,
    player: PlayerId,
    node_id: NodeId,
    declared_cost: f64,
) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    ensure_phase(state, &[Phase::Playing])?;
    let node = state.node(node_id).ok_or(CommandError::NodeNotFound(node_id))?;
    match node.owner {
        None => return Err(CommandError::SelfAction),
        Some(owner) if owner != player => return Err(CommandError::Authorization),
        Some(_) => {}
    }

    ensure_cost_and_gold(state, player, declared_cost, config.destroy_node_cost)?;

    let removed_edges: Vec<EdgeId> = state
        .node(node_id)
        .map(|n| n.attached_edge_ids.clone())
        .unwrap_or_default();
    state.remove_node(node_id);
    state.deduct_gold(player, config.destroy_node_cost);

    Ok(CommandEffect::Destroyed { node_id, removed_edges, cost: config.destroy_node_cost })
}

/// `toggle_auto_expand(player)`: flips the per-player flag, no gold cost, no
/// phase restriction beyond the shared active-caller check.
pub fn toggle_auto_expand(state: &mut MatchState, player: PlayerId) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    let enabled = !state.player_auto_expand_flag(player);
    state.set_auto_expand(player, enabled);
    Ok(CommandEffect::AutoExpandToggled { enabled })
}

/// `quit_game(player)`: marks the caller eliminated; if exactly one
/// non-eliminated player remains, they win immediately.
pub fn quit_game(state: &mut MatchState, player: PlayerId) -> Result<CommandEffect, CommandError> {
    ensure_active_caller(state, player)?;
    state.eliminated_players.insert(player);
    let winner = lifecycle::sole_survivor(state);
    if let Some(winner) = winner {
        state.phase = Phase::Ended;
        state.winner_id = Some(winner);
        state.game_ended = true;
    }
    Ok(CommandEffect::Quit { eliminated: player, winner })
}

/// Convenience used by graph-generator-facing setup code and tests: add a
/// player with starting gold per config.
pub fn add_player(state: &mut MatchState, config: &EngineConfig, player: Player) {
    state.add_player(player, config.starting_gold);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn two_player_state() -> (MatchState, EngineConfig) {
        let config = EngineConfig::default();
        let mut state = MatchState::new(config.game_duration_seconds, config.peace_phase_duration_seconds);
        for id in 1..=5u64 {
            state.insert_node(Node::new(id, id as f64 * 10.0, 0.0, 2.0));
        }
        for i in 1..=4u64 {
            state.insert_edge(i, i, i + 1).unwrap();
        }
        add_player(&mut state, &config, Player::new(1, "#ff0000"));
        add_player(&mut state, &config, Player::new(2, "#00ff00"));
        (state, config)
    }

    #[test]
    fn pick_requires_picking_phase() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        assert_eq!(pick_starting_node(&mut state, &config, 1, 2), Err(CommandError::Phase));
    }

    #[test]
    fn pick_all_players_transitions_to_peace() {
        let (mut state, config) = two_player_state();
        pick_starting_node(&mut state, &config, 1, 2).unwrap();
        assert_eq!(state.phase, Phase::Picking);
        pick_starting_node(&mut state, &config, 2, 4).unwrap();
        assert_eq!(state.phase, Phase::Peace);
    }

    #[test]
    fn pick_rejects_already_owned_node() {
        let (mut state, config) = two_player_state();
        pick_starting_node(&mut state, &config, 1, 2).unwrap();
        assert_eq!(pick_starting_node(&mut state, &config, 2, 2), Err(CommandError::Authorization));
    }

    #[test]
    fn r1_toggle_twice_restores_original_on_state() {
        let (mut state, config) = two_player_state();
        pick_starting_node(&mut state, &config, 1, 2).unwrap();
        pick_starting_node(&mut state, &config, 2, 4).unwrap();
        state.phase = Phase::Playing;
        let before = state.edge(2).unwrap().on;
        toggle_edge(&mut state, &config, 1, 2).unwrap();
        toggle_edge(&mut state, &config, 1, 2).unwrap();
        assert_eq!(state.edge(2).unwrap().on, before);
    }

    #[test]
    fn s6_peace_phase_attack_is_rejected() {
        let (mut state, config) = two_player_state();
        pick_starting_node(&mut state, &config, 1, 2).unwrap();
        pick_starting_node(&mut state, &config, 2, 4).unwrap();
        assert_eq!(state.phase, Phase::Peace);
        // Edge 2 is 2->3; give node 3 to player 2 so 2->3 would attack.
        state.set_owner(3, Some(2));
        assert_eq!(toggle_edge(&mut state, &config, 1, 2), Err(CommandError::PhaseAttack));
        assert!(!state.edge(2).unwrap().on);
    }

    #[test]
    fn toggle_off_is_unconditional() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        state.set_owner(1, Some(1));
        toggle_edge(&mut state, &config, 1, 1).unwrap();
        assert!(state.edge(1).unwrap().on);
        // Player 2 (not the source owner) can still toggle it off.
        toggle_edge(&mut state, &config, 2, 1).unwrap();
        assert!(!state.edge(1).unwrap().on);
    }

    #[test]
    fn r2_reverse_twice_costs_double_but_restores_direction() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        state.set_owner(1, Some(1));
        state.player_gold.insert(1, 1000.0);
        let cost = engine_distance_cost(&state, &config, 1, 2).unwrap();

        reverse_edge(&mut state, &config, 1, 1, cost).unwrap();
        assert_eq!(state.edge(1).unwrap().source, 2);
        let gold_after_first = state.gold(1);

        reverse_edge(&mut state, &config, 1, 1, cost).unwrap();
        assert_eq!(state.edge(1).unwrap().source, 1);
        let gold_after_second = state.gold(1);

        assert!((gold_after_first - gold_after_second - cost).abs() < 1e-9);
    }

    #[test]
    fn reverse_rejects_declared_cost_below_engine_cost() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        state.set_owner(1, Some(1));
        state.player_gold.insert(1, 1000.0);
        let cost = engine_distance_cost(&state, &config, 1, 2).unwrap();
        assert_eq!(reverse_edge(&mut state, &config, 1, 1, cost - 1.0), Err(CommandError::Economy));
    }

    #[test]
    fn b2_build_bridge_exact_gold_succeeds_one_less_fails() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        state.set_owner(1, Some(1));
        let cost = engine_distance_cost(&state, &config, 1, 3).unwrap();

        state.player_gold.insert(1, cost);
        build_bridge(&mut state, &config, 1, 1, 3, cost).unwrap();

        state.player_gold.insert(1, cost - 1.0);
        assert_eq!(build_bridge(&mut state, &config, 1, 1, 4, cost), Err(CommandError::Economy));
    }

    #[test]
    fn s3_build_bridge_rejects_crossing_edge() {
        let mut state = MatchState::new(300.0, 10.0);
        state.insert_node(Node::new(1, 0.0, 0.0, 50.0));
        state.insert_node(Node::new(2, 10.0, 0.0, 50.0));
        state.insert_node(Node::new(3, 5.0, -5.0, 50.0));
        state.insert_node(Node::new(4, 5.0, 5.0, 50.0));
        state.insert_edge(1, 3, 4).unwrap();
        let config = EngineConfig::default();
        add_player(&mut state, &config, Player::new(1, "#ff0000"));
        state.set_owner(1, Some(1));
        state.phase = Phase::Playing;
        state.player_gold.insert(1, 1000.0);

        let gold_before = state.gold(1);
        let result = build_bridge(&mut state, &config, 1, 1, 2, 1000.0);
        assert_eq!(result, Err(CommandError::Geometry));
        assert_eq!(state.gold(1), gold_before);
    }

    #[test]
    fn destroy_node_removes_incident_edges_and_deducts_flat_cost() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        state.set_owner(2, Some(1));
        state.player_gold.insert(1, 100.0);

        let effect = destroy_node(&mut state, &config, 1, 2, config.destroy_node_cost).unwrap();
        match effect {
            CommandEffect::Destroyed { removed_edges, cost, .. } => {
                assert_eq!(removed_edges.len(), 2); // edges (1,2) and (2,3)
                assert_eq!(cost, config.destroy_node_cost);
            }
            _ => panic!("wrong effect"),
        }
        assert!(state.node(2).is_none());
        assert_eq!(state.gold(1), 100.0 - config.destroy_node_cost);
    }

    #[test]
    fn destroy_node_rejects_unowned() {
        let (mut state, config) = two_player_state();
        state.phase = Phase::Playing;
        assert_eq!(destroy_node(&mut state, &config, 1, 2, config.destroy_node_cost), Err(CommandError::SelfAction));
    }

    #[test]
    fn quit_game_with_two_players_ends_match_immediately() {
        let (mut state, config) = two_player_state();
        let _ = config;
        let effect = quit_game(&mut state, 1).unwrap();
        assert_eq!(effect, CommandEffect::Quit { eliminated: 1, winner: Some(2) });
        assert_eq!(state.phase, Phase::Ended);
        assert_eq!(state.winner_id, Some(2));
    }

    #[test]
    fn s4_redirect_energy_delegates_to_optimizer() {
        let mut state = MatchState::new(300.0, 10.0);
        for (id, x, y) in [(1, 0.0, 0.0), (2, 10.0, 5.0), (3, 10.0, -5.0), (4, 20.0, 0.0)] {
            state.insert_node(Node::new(id, x, y, 50.0));
        }
        state.insert_edge(1, 1, 2).unwrap();
        state.insert_edge(2, 1, 3).unwrap();
        state.insert_edge(3, 2, 4).unwrap();
        state.insert_edge(4, 3, 4).unwrap();
        let config = EngineConfig::default();
        add_player(&mut state, &config, Player::new(1, "#ff0000"));
        for id in 1..=4u64 {
            state.set_owner(id, Some(1));
            state.edge_mut(id).unwrap().on = true;
        }
        state.phase = Phase::Playing;

        redirect_energy(&mut state, &config, 1, 4).unwrap();
        assert!(!state.edge(2).unwrap().on);
    }

    #[test]
    fn toggle_auto_expand_flips_flag() {
        let (mut state, config) = two_player_state();
        let _ = config;
        toggle_auto_expand(&mut state, 1).unwrap();
        assert!(state.player_auto_expand_flag(1));
        toggle_auto_expand(&mut state, 1).unwrap();
        assert!(!state.player_auto_expand_flag(1));
    }
}
