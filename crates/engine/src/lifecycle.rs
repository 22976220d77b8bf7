//! Match Lifecycle: phase transitions, elimination bookkeeping, and the
//! terminal winner decision.
//!
//! Phases move strictly forward: `picking -> peace -> playing -> ended`. The
//! peace phase is enforced entirely by command validation (see `commands`);
//! this module only owns the *transitions*, not the in-peace rejection
//! rules. Elapsed time is derived from `tick_count * tick_interval_seconds`
//! rather than a wall-clock read — see `tick`'s module docs for why.

use crate::config::EngineConfig;
use crate::graph::MatchState;
use crate::model::{Elimination, Phase, PlayerId};

const EPSILON: f64 = 1e-9;

fn now_seconds(state: &MatchState, config: &EngineConfig) -> f64 {
    state.tick_count as f64 * config.tick_interval_seconds
}

/// Called once all players have picked their starting node. Transitions
/// straight to `playing` when the configured peace duration is zero or
/// negative; otherwise enters `peace` and stamps its start.
pub(crate) fn begin_peace_phase(state: &mut MatchState, config: &EngineConfig) {
    let now = now_seconds(state, config);
    if config.peace_phase_duration_seconds <= 0.0 {
        state.phase = Phase::Playing;
        state.game_start_time = Some(now);
    } else {
        state.phase = Phase::Peace;
        state.peace_phase_started_at = Some(now);
    }
}

/// Transitions `peace -> playing` once the configured duration has elapsed.
/// A no-op unless `state.phase == Phase::Peace`.
pub(crate) fn check_peace_expiry(state: &mut MatchState, config: &EngineConfig) {
    if state.phase != Phase::Peace {
        return;
    }
    let Some(started_at) = state.peace_phase_started_at else { return };
    let now = now_seconds(state, config);
    if now - started_at + EPSILON >= config.peace_phase_duration_seconds {
        state.phase = Phase::Playing;
        state.game_start_time = Some(now);
    }
}

/// The outcome of one victory-check pass: any eliminations it produced, plus
/// a winner if the match just ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VictoryOutcome {
    pub eliminations: Vec<Elimination>,
    pub winner: Option<PlayerId>,
}

/// §4.3 step 8, run in order: capital victory, zero-nodes elimination, timer
/// expiry. Only evaluated while `phase == playing`; does not itself flip
/// `state.phase` or `state.eliminated_players` (the caller — `tick::step` —
/// commits those so a single source of truth owns the mutation).
pub(crate) fn check_victory(state: &MatchState, config: &EngineConfig) -> VictoryOutcome {
    if state.phase != Phase::Playing {
        return VictoryOutcome::default();
    }

    // 1. Capital victory: ascending player-id iteration breaks a same-tick tie.
    let mut capital_counts: std::collections::BTreeMap<PlayerId, u32> = std::collections::BTreeMap::new();
    for &node_id in &state.capital_nodes {
        if let Some(owner) = state.node(node_id).and_then(|n| n.owner) {
            *capital_counts.entry(owner).or_insert(0) += 1;
        }
    }
    for (&player, &count) in &capital_counts {
        if count >= config.capital_win_count {
            return VictoryOutcome { eliminations: Vec::new(), winner: Some(player) };
        }
    }

    // 2. Zero-nodes elimination.
    let active_players: Vec<PlayerId> = state.players().map(|p| p.id).filter(|id| !state.is_eliminated(*id)).collect();
    let zero_node_players: Vec<PlayerId> = active_players
        .iter()
        .copied()
        .filter(|&id| state.owned_node_count(id) == 0)
        .collect();

    let mut eliminations: Vec<Elimination> = Vec::new();
    if !zero_node_players.is_empty() {
        if active_players.len() <= 2 {
            let remaining: Vec<PlayerId> = active_players
                .iter()
                .copied()
                .filter(|id| !zero_node_players.contains(id))
                .collect();
            if remaining.len() == 1 {
                let eliminations = zero_node_players.iter().map(|&id| Elimination { player_id: id }).collect();
                return VictoryOutcome { eliminations, winner: Some(remaining[0]) };
            }
        } else {
            eliminations = zero_node_players.iter().map(|&id| Elimination { player_id: id }).collect();
            let still_active: Vec<PlayerId> = active_players
                .iter()
                .copied()
                .filter(|id| !zero_node_players.contains(id))
                .collect();
            if still_active.len() == 1 {
                return VictoryOutcome { eliminations, winner: Some(still_active[0]) };
            }
        }
    }

    // 3. Timer expiry: most nodes wins; ties broken by juice sum, then
    // lowest player id (the base spec's resolution of an ambiguity the
    // original leaves as "shouldn't happen often" — see DESIGN.md).
    if let Some(start) = state.game_start_time {
        let elapsed = now_seconds(state, config) - start;
        if elapsed + EPSILON >= state.game_duration {
            let just_eliminated: std::collections::BTreeSet<PlayerId> = eliminations.iter().map(|e| e.player_id).collect();
            let mut best: Option<(PlayerId, usize, f64)> = None;
            for &pid in &active_players {
                if just_eliminated.contains(&pid) {
                    continue;
                }
                let count = state.owned_node_count(pid);
                let juice_sum: f64 = state.nodes().filter(|n| n.owner == Some(pid)).map(|n| n.juice).sum();
                best = Some(match best {
                    None => (pid, count, juice_sum),
                    Some((bp, bc, bj)) => {
                        if count > bc || (count == bc && juice_sum > bj) || (count == bc && (juice_sum - bj).abs() <= EPSILON && pid < bp) {
                            (pid, count, juice_sum)
                        } else {
                            (bp, bc, bj)
                        }
                    }
                });
            }
            return VictoryOutcome { eliminations, winner: best.map(|(p, _, _)| p) };
        }
    }

    VictoryOutcome { eliminations, winner: None }
}

/// Returns the sole remaining non-eliminated player, if exactly one is left.
/// Used by `commands::quit_game`.
pub(crate) fn sole_survivor(state: &MatchState) -> Option<PlayerId> {
    let mut remaining = state.players().map(|p| p.id).filter(|id| !state.is_eliminated(*id));
    let first = remaining.next()?;
    if remaining.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Player};

    fn state_with_players(n: u32) -> MatchState {
        let mut state = MatchState::new(300.0, 10.0);
        for id in 1..=n {
            state.add_player(Player::new(id, "#ffffff"), 0.0);
        }
        state
    }

    #[test]
    fn begin_peace_phase_enters_peace_when_duration_positive() {
        let mut state = state_with_players(2);
        let config = EngineConfig::default();
        begin_peace_phase(&mut state, &config);
        assert_eq!(state.phase, Phase::Peace);
        assert_eq!(state.peace_phase_started_at, Some(0.0));
    }

    #[test]
    fn begin_peace_phase_skips_straight_to_playing_when_duration_zero() {
        let mut state = state_with_players(2);
        let mut config = EngineConfig::default();
        config.peace_phase_duration_seconds = 0.0;
        begin_peace_phase(&mut state, &config);
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(state.game_start_time, Some(0.0));
    }

    #[test]
    fn check_peace_expiry_transitions_after_configured_duration() {
        let mut state = state_with_players(2);
        let config = EngineConfig::default();
        begin_peace_phase(&mut state, &config);
        state.tick_count = (config.peace_phase_duration_seconds / config.tick_interval_seconds) as u64;
        check_peace_expiry(&mut state, &config);
        assert_eq!(state.phase, Phase::Playing);
    }

    #[test]
    fn s5_timer_expiry_picks_player_with_most_nodes() {
        let mut state = state_with_players(2);
        state.phase = Phase::Playing;
        state.game_duration = 5.0;
        state.game_start_time = Some(0.0);
        for id in 1..=7u64 {
            state.insert_node(Node::new(id, id as f64, 0.0, 10.0));
            state.set_owner(id, Some(1));
        }
        for id in 8..=12u64 {
            state.insert_node(Node::new(id, id as f64, 0.0, 10.0));
            state.set_owner(id, Some(2));
        }
        let config = EngineConfig::default();
        state.tick_count = 51;
        let outcome = check_victory(&state, &config);
        assert_eq!(outcome.winner, Some(1));
    }

    #[test]
    fn zero_nodes_with_three_players_eliminates_without_ending() {
        let mut state = state_with_players(3);
        state.phase = Phase::Playing;
        state.insert_node(Node::new(1, 0.0, 0.0, 10.0));
        state.set_owner(1, Some(1));
        state.insert_node(Node::new(2, 1.0, 0.0, 10.0));
        state.set_owner(2, Some(2));
        // player 3 owns nothing.
        let config = EngineConfig::default();
        let outcome = check_victory(&state, &config);
        assert_eq!(outcome.eliminations, vec![Elimination { player_id: 3 }]);
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn zero_nodes_with_two_players_ends_the_match() {
        let mut state = state_with_players(2);
        state.phase = Phase::Playing;
        state.insert_node(Node::new(1, 0.0, 0.0, 10.0));
        state.set_owner(1, Some(1));
        let config = EngineConfig::default();
        let outcome = check_victory(&state, &config);
        assert_eq!(outcome.winner, Some(1));
    }

    #[test]
    fn sole_survivor_is_none_with_more_than_one_active_player() {
        let state = state_with_players(2);
        assert_eq!(sole_survivor(&state), None);
    }

    #[test]
    fn sole_survivor_after_elimination() {
        let mut state = state_with_players(2);
        state.eliminated_players.insert(2);
        assert_eq!(sole_survivor(&state), Some(1));
    }
}
