//! The Graph Store: the typed, mutable match state.
//!
//! Nodes, edges, and players are modelled as `BTreeMap`s keyed by their
//! stable integer id rather than as owning pointers or a duck-typed
//! dictionary — the arena-plus-index pattern, with the ascending iteration
//! order the tick simulator's determinism requirement needs coming for free
//! from the map's own ordering instead of a per-tick sort.
//!
//! This module enforces only structural consistency (I1, I4): both
//! endpoints of an edge recorded in both node's attachment lists, ids
//! unique, deletion cascades. Gameplay rules (phase, ownership, gold,
//! geometry) live in `commands`.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Edge, Elimination, NodeCapture, NodeId, EdgeId, Node, Phase, Player, PlayerId};

/// A structural violation the Graph Store itself refuses, independent of any
/// gameplay rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// The edge's source and target are the same node.
    SelfLoop,
    /// An edge already connects this unordered pair of nodes.
    DuplicateEdge,
    /// One of the referenced node ids does not exist.
    DanglingEndpoint,
}

/// The full mutable state of one match: the graph plus economy, phase, and
/// lifecycle bookkeeping. Owned exclusively by one engine instance.
#[derive(Debug, Clone)]
pub struct MatchState {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeId, Edge>,
    players: BTreeMap<PlayerId, Player>,

    pub player_gold: BTreeMap<PlayerId, f64>,
    pub players_who_picked: BTreeMap<PlayerId, bool>,
    pub capital_nodes: BTreeSet<NodeId>,
    pub eliminated_players: BTreeSet<PlayerId>,

    pub phase: Phase,
    pub tick_count: u64,

    pub game_start_time: Option<f64>,
    pub game_duration: f64,
    pub peace_phase_duration: f64,
    pub peace_phase_started_at: Option<f64>,

    pub winner_id: Option<PlayerId>,
    pub game_ended: bool,

    pub pending_node_captures: Vec<NodeCapture>,
    pub pending_eliminations: Vec<Elimination>,
}

impl MatchState {
    pub fn new(game_duration: f64, peace_phase_duration: f64) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            players: BTreeMap::new(),
            player_gold: BTreeMap::new(),
            players_who_picked: BTreeMap::new(),
            capital_nodes: BTreeSet::new(),
            eliminated_players: BTreeSet::new(),
            phase: Phase::Picking,
            tick_count: 0,
            game_start_time: None,
            game_duration,
            peace_phase_duration,
            peace_phase_started_at: None,
            winner_id: None,
            game_ended: false,
            pending_node_captures: Vec::new(),
            pending_eliminations: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    /// Remove a node and every edge incident to it, cascading cleanup into
    /// `capital_nodes` and the pending-effect queues.
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let incident: Vec<EdgeId> = self
            .nodes
            .get(&node_id)
            .map(|n| n.attached_edge_ids.clone())
            .unwrap_or_default();
        for edge_id in incident {
            self.remove_edge(edge_id);
        }
        self.capital_nodes.remove(&node_id);
        self.pending_node_captures.retain(|c| c.node_id != node_id);
        self.nodes.remove(&node_id)
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_owner(&mut self, node_id: NodeId, owner: Option<PlayerId>) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.owner = owner;
        }
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// True if any existing edge connects `a` and `b` regardless of direction.
    pub fn has_edge_between(&self, a: NodeId, b: NodeId) -> bool {
        self.edges
            .values()
            .any(|e| (e.source == a && e.target == b) || (e.source == b && e.target == a))
    }

    /// One greater than the current maximum edge id (1 if there are no edges yet).
    pub fn next_edge_id(&self) -> EdgeId {
        self.edges.keys().next_back().map_or(1, |max| max + 1)
    }

    /// Insert a new directed edge between two existing nodes, enforcing I1
    /// (distinct, existing endpoints) and I4 (no duplicate unordered pair).
    /// Gameplay admissibility (crossings, cost, ownership) is the caller's
    /// responsibility — see `geometry::bridge_admissible` and `commands`.
    pub fn insert_edge(&mut self, id: EdgeId, source: NodeId, target: NodeId) -> Result<(), GraphError> {
        if source == target {
            return Err(GraphError::SelfLoop);
        }
        if !self.nodes.contains_key(&source) || !self.nodes.contains_key(&target) {
            return Err(GraphError::DanglingEndpoint);
        }
        if self.has_edge_between(source, target) {
            return Err(GraphError::DuplicateEdge);
        }
        self.edges.insert(id, Edge::new(id, source, target));
        if let Some(node) = self.nodes.get_mut(&source) {
            node.attached_edge_ids.push(id);
        }
        if let Some(node) = self.nodes.get_mut(&target) {
            node.attached_edge_ids.push(id);
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, edge_id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(&edge_id)?;
        if let Some(node) = self.nodes.get_mut(&edge.source) {
            node.attached_edge_ids.retain(|id| *id != edge_id);
        }
        if let Some(node) = self.nodes.get_mut(&edge.target) {
            node.attached_edge_ids.retain(|id| *id != edge_id);
        }
        Some(edge)
    }

    pub fn edge(&self, edge_id: EdgeId) -> Option<&Edge> {
        self.edges.get(&edge_id)
    }

    pub fn edge_mut(&mut self, edge_id: EdgeId) -> Option<&mut Edge> {
        self.edges.get_mut(&edge_id)
    }

    /// Edges in ascending id order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn add_player(&mut self, player: Player, starting_gold: f64) {
        let id = player.id;
        self.players.insert(id, player);
        self.player_gold.insert(id, starting_gold);
        self.players_who_picked.insert(id, false);
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    pub fn player_mut(&mut self, player_id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&player_id)
    }

    /// Players in ascending id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn is_eliminated(&self, player_id: PlayerId) -> bool {
        self.eliminated_players.contains(&player_id)
    }

    pub fn gold(&self, player_id: PlayerId) -> f64 {
        self.player_gold.get(&player_id).copied().unwrap_or(0.0)
    }

    /// Deduct `amount` from a player's gold, clamped to zero (mirrors the
    /// reference implementation's `max(0.0, ...)` deduction).
    pub fn deduct_gold(&mut self, player_id: PlayerId, amount: f64) {
        let entry = self.player_gold.entry(player_id).or_insert(0.0);
        *entry = (*entry - amount).max(0.0);
    }

    pub fn credit_gold(&mut self, player_id: PlayerId, amount: f64) {
        let entry = self.player_gold.entry(player_id).or_insert(0.0);
        *entry += amount;
    }

    /// Count of nodes currently owned by `player_id`.
    pub fn owned_node_count(&self, player_id: PlayerId) -> usize {
        self.nodes.values().filter(|n| n.owner == Some(player_id)).count()
    }

    /// The reference data model carries auto-expand as both a per-`Player`
    /// field and a standalone `player_auto_expand` map; this crate keeps a
    /// single source of truth on `Player` itself and exposes it through
    /// these two accessors (see DESIGN.md).
    pub fn player_auto_expand_flag(&self, player_id: PlayerId) -> bool {
        self.player(player_id).map(|p| p.auto_expand).unwrap_or(false)
    }

    pub fn set_auto_expand(&mut self, player_id: PlayerId, enabled: bool) {
        if let Some(player) = self.player_mut(player_id) {
            player.auto_expand = enabled;
        }
    }
}
