//! The Redirect Optimizer: turns on exactly one outgoing edge per
//! player-owned node that can reach a target along BFS shortest paths,
//! turning off every sibling and any outflow from the target itself.
//!
//! Grounded on §4.5: a reverse-adjacency BFS over edges whose source is
//! owned by the commanding player, rooted at the target. Ties between
//! multiple edges that would reach a node on the same BFS layer are broken
//! by ascending edge id, matching the ascending-id determinism convention
//! the rest of this crate uses.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::EngineConfig;
use crate::graph::MatchState;
use crate::model::{EdgeId, NodeId, PlayerId};
use crate::tick;

/// The edges the optimizer turned on or off, for the transport to diff
/// against its prior snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectEffect {
    pub turned_on: Vec<EdgeId>,
    pub turned_off: Vec<EdgeId>,
}

/// Build `best_next_hop` via BFS from `target_id` over reverse edges whose
/// source is owned by `player`, then apply it to every player-owned edge in
/// the graph. Idempotent: a second call with no intervening tick recomputes
/// the same `best_next_hop` and so leaves the on/off set unchanged (R3).
pub(crate) fn apply(state: &mut MatchState, config: &EngineConfig, player: PlayerId, target_id: NodeId) -> RedirectEffect {
    let mut best_next_hop: BTreeMap<NodeId, EdgeId> = BTreeMap::new();
    let mut visited: BTreeSet<NodeId> = BTreeSet::new();
    visited.insert(target_id);
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(target_id);

    while let Some(current) = queue.pop_front() {
        let mut candidates: Vec<(EdgeId, NodeId)> = state
            .edges()
            .filter(|e| e.target == current && state.node(e.source).and_then(|n| n.owner) == Some(player))
            .map(|e| (e.id, e.source))
            .collect();
        candidates.sort_by_key(|(edge_id, _)| *edge_id);
        for (edge_id, source) in candidates {
            if visited.contains(&source) {
                continue;
            }
            visited.insert(source);
            best_next_hop.insert(source, edge_id);
            queue.push_back(source);
        }
    }

    let player_edge_ids: Vec<EdgeId> = state
        .edges()
        .filter(|e| state.node(e.source).and_then(|n| n.owner) == Some(player))
        .map(|e| e.id)
        .collect();

    let mut effect = RedirectEffect::default();
    for edge_id in player_edge_ids {
        let Some(edge) = state.edge(edge_id) else { continue };
        let (source, was_on) = (edge.source, edge.on);

        let should_be_on = if source == target_id {
            false
        } else if best_next_hop.get(&source) == Some(&edge_id) {
            true
        } else if best_next_hop.contains_key(&source) {
            false
        } else {
            was_on
        };

        if should_be_on != was_on {
            if let Some(edge) = state.edge_mut(edge_id) {
                edge.on = should_be_on;
            }
            tick::refresh_single_edge_flowing(state, edge_id, config);
            if should_be_on {
                effect.turned_on.push(edge_id);
            } else {
                effect.turned_off.push(edge_id);
            }
        }
    }

    effect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Player};

    fn diamond() -> MatchState {
        // S4: player owns {1,2,3,4}; edges 1->2, 1->3, 2->4, 3->4, all on.
        let mut state = MatchState::new(300.0, 10.0);
        for (id, x, y) in [(1, 0.0, 0.0), (2, 10.0, 5.0), (3, 10.0, -5.0), (4, 20.0, 0.0)] {
            state.insert_node(Node::new(id, x, y, 50.0));
        }
        state.insert_edge(1, 1, 2).unwrap();
        state.insert_edge(2, 1, 3).unwrap();
        state.insert_edge(3, 2, 4).unwrap();
        state.insert_edge(4, 3, 4).unwrap();
        state.add_player(Player::new(1, "#ff0000"), 0.0);
        for id in 1..=4u64 {
            state.set_owner(id, Some(1));
        }
        for id in 1..=4u64 {
            state.edge_mut(id).unwrap().on = true;
        }
        state.phase = crate::model::Phase::Playing;
        state
    }

    #[test]
    fn s4_redirect_picks_lowest_id_next_hop_and_cuts_target_outflow() {
        let mut state = diamond();
        let config = EngineConfig::default();
        apply(&mut state, &config, 1, 4);

        assert!(state.edge(3).unwrap().on); // 2->4
        assert!(state.edge(4).unwrap().on); // 3->4
        assert!(state.edge(1).unwrap().on); // 1->2 (best hop via node 2, lower id)
        assert!(!state.edge(2).unwrap().on); // 1->3 turned off
    }

    #[test]
    fn r3_redirect_is_idempotent() {
        let mut state = diamond();
        let config = EngineConfig::default();
        apply(&mut state, &config, 1, 4);
        let after_first: Vec<bool> = (1..=4u64).map(|id| state.edge(id).unwrap().on).collect();
        apply(&mut state, &config, 1, 4);
        let after_second: Vec<bool> = (1..=4u64).map(|id| state.edge(id).unwrap().on).collect();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn targets_own_outflow_is_always_turned_off() {
        let mut state = diamond();
        state.insert_edge(5, 4, 1).unwrap();
        state.edge_mut(5).unwrap().on = true;
        let config = EngineConfig::default();
        apply(&mut state, &config, 1, 4);
        assert!(!state.edge(5).unwrap().on);
    }
}
