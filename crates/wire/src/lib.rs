//! Wire message types for §6's command surface (inbound) and observation
//! surface (outbound).
//!
//! A JSON framing is canonical (`serde_json`, camelCase field names), the
//! same choice the pack's `echo-session-proto` crate makes for its own
//! tagged `Message` enum — internally-tagged enums keyed by a `type`/`op`
//! discriminant, camelCase renamed, rather than the teacher's Protobuf
//! schema this crate replaces (the teacher's netcode is out of scope per
//! §1; see `DESIGN.md`). This crate performs no I/O and holds no engine
//! state of its own: it only converts between `territory_engine` values and
//! their wire shape.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};

use territory_engine::{
    CommandEffect, CommandError, Edge as EngineEdge, EdgeId, LimitReason, MatchState, Node as EngineNode, NodeId,
    Phase as EnginePhase, Player as EnginePlayer, PlayerId, TickReport,
};

// ===========================================================================
// Inbound commands (§6 "Inbound commands")
// ===========================================================================

/// One message on the command surface, tagged by `type` and camelCase field
/// names, per §6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundCommand {
    #[serde(rename_all = "camelCase")]
    PickStartingNode { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    ToggleEdge { edge_id: EdgeId },
    #[serde(rename_all = "camelCase")]
    ReverseEdge { edge_id: EdgeId, cost: f64 },
    #[serde(rename_all = "camelCase")]
    BuildBridge { from_node_id: NodeId, to_node_id: NodeId, cost: f64 },
    #[serde(rename_all = "camelCase")]
    RedirectEnergy { target_node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    DestroyNode { node_id: NodeId, cost: f64 },
    ToggleAutoExpand {},
    QuitGame {},
}

// ===========================================================================
// Shared snapshot fragments
// ===========================================================================

/// A node as it appears in `init`/`tick` payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub juice: f64,
    pub owner: Option<PlayerId>,
}

impl From<&EngineNode> for WireNode {
    fn from(n: &EngineNode) -> Self {
        Self { id: n.id, x: n.x, y: n.y, juice: n.juice, owner: n.owner }
    }
}

/// An edge as it appears in `init`/`tick` payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub on: bool,
    pub flowing: bool,
    pub building: bool,
    pub build_ticks_required: u32,
    pub build_ticks_elapsed: u32,
}

impl From<&EngineEdge> for WireEdge {
    fn from(e: &EngineEdge) -> Self {
        Self {
            id: e.id,
            source: e.source,
            target: e.target,
            on: e.on,
            flowing: e.flowing,
            building: e.building,
            build_ticks_required: e.build_ticks_required,
            build_ticks_elapsed: e.build_ticks_elapsed,
        }
    }
}

/// A player as it appears in the `init` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePlayer {
    pub id: PlayerId,
    pub color: String,
    pub name: String,
    pub auto_expand: bool,
}

impl From<&EnginePlayer> for WirePlayer {
    fn from(p: &EnginePlayer) -> Self {
        Self { id: p.id, color: p.color.clone(), name: p.name.clone(), auto_expand: p.auto_expand }
    }
}

/// `phase` as it appears on the wire: lowercase, matching §3's
/// `phase ∈ {picking, peace, playing, ended}` spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WirePhase {
    Picking,
    Peace,
    Playing,
    Ended,
}

impl From<EnginePhase> for WirePhase {
    fn from(p: EnginePhase) -> Self {
        match p {
            EnginePhase::Picking => Self::Picking,
            EnginePhase::Peace => Self::Peace,
            EnginePhase::Playing => Self::Playing,
            EnginePhase::Ended => Self::Ended,
        }
    }
}

/// Per-player node/gold/capital tallies embedded in `init` and `tick`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTally {
    pub player_id: PlayerId,
    pub gold: f64,
    pub node_count: usize,
    pub capital_count: usize,
}

fn player_tallies(state: &MatchState) -> Vec<PlayerTally> {
    state
        .players()
        .map(|p| PlayerTally {
            player_id: p.id,
            gold: state.gold(p.id),
            node_count: state.owned_node_count(p.id),
            capital_count: state.capital_nodes.iter().filter(|&&n| state.node(n).and_then(|n| n.owner) == Some(p.id)).count(),
        })
        .collect()
}

// ===========================================================================
// Outbound observations (§6 "Outbound observations")
// ===========================================================================

/// Session-start/rejoin payload: the full state a client needs to render.
/// `screen_bounds` is supplied by the caller (graph generation, which picks
/// the playing field's extent, is out of scope per §1) rather than read off
/// `MatchState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitMessage {
    pub screen_bounds: (f64, f64),
    pub tick_interval_seconds: f64,
    pub nodes: Vec<WireNode>,
    pub edges: Vec<WireEdge>,
    pub players: Vec<WirePlayer>,
    pub win_threshold: u32,
    pub total_nodes: usize,
    pub phase: WirePhase,
    pub player_tallies: Vec<PlayerTally>,
    pub your_player_id: PlayerId,
    pub session_token: String,
}

impl InitMessage {
    pub fn build(
        state: &MatchState,
        tick_interval_seconds: f64,
        win_threshold: u32,
        screen_bounds: (f64, f64),
        your_player_id: PlayerId,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            screen_bounds,
            tick_interval_seconds,
            nodes: state.nodes().map(WireNode::from).collect(),
            edges: state.edges().map(WireEdge::from).collect(),
            players: state.players().map(WirePlayer::from).collect(),
            win_threshold,
            total_nodes: state.node_count(),
            phase: state.phase.into(),
            player_tallies: player_tallies(state),
            your_player_id,
            session_token: session_token.into(),
        }
    }
}

/// One per-tick delta, per §6: the minimal set of fields that can have
/// changed this tick (not a full resend of static fields like `x`/`y`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickMessage {
    pub tick: u64,
    pub edges: Vec<EdgeDelta>,
    pub nodes: Vec<NodeDelta>,
    pub player_tallies: Vec<PlayerTally>,
    pub phase: WirePhase,
    pub win_threshold: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDelta {
    pub id: EdgeId,
    pub on: bool,
    pub flowing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDelta {
    pub id: NodeId,
    pub juice: f64,
    pub owner: Option<PlayerId>,
}

impl TickMessage {
    pub fn build(state: &MatchState, win_threshold: u32) -> Self {
        Self {
            tick: state.tick_count,
            edges: state.edges().map(|e| EdgeDelta { id: e.id, on: e.on, flowing: e.flowing }).collect(),
            nodes: state.nodes().map(|n| NodeDelta { id: n.id, juice: n.juice, owner: n.owner }).collect(),
            player_tallies: player_tallies(state),
            phase: state.phase.into(),
            win_threshold,
        }
    }
}

/// A reported node movement from sharp-angle relaxation, as it appears in
/// `newEdge`'s movement list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNodeMovement {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
    pub moved: bool,
    pub limited: bool,
    pub limit_reasons: Vec<&'static str>,
}

fn limit_reason_str(reason: LimitReason) -> &'static str {
    match reason {
        LimitReason::DistanceCap => "distance_cap",
        LimitReason::EdgePathCollision => "edge_path_collision",
        LimitReason::NodePathCollision => "node_path_collision",
        LimitReason::EndpointOverlap => "endpoint_overlap",
    }
}

/// Event messages: one variant per §6 event, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventMessage {
    #[serde(rename_all = "camelCase")]
    NewEdge { edge: WireEdge, movements: Vec<WireNodeMovement>, cost: f64 },
    #[serde(rename_all = "camelCase")]
    EdgeReversed { edge: WireEdge, cost: f64 },
    #[serde(rename_all = "camelCase")]
    EdgeUpdated { edge: WireEdge },
    #[serde(rename_all = "camelCase")]
    NodeDestroyed { node_id: NodeId, removed_edge_ids: Vec<EdgeId> },
    #[serde(rename_all = "camelCase")]
    NodeCaptured { node_id: NodeId, new_owner: PlayerId, previous_owner: Option<PlayerId>, reward: f64 },
    #[serde(rename_all = "camelCase")]
    GameOver { winner_id: PlayerId },
    #[serde(rename_all = "camelCase")]
    BridgeError { reason: String },
    #[serde(rename_all = "camelCase")]
    ReverseEdgeError { reason: String },
    #[serde(rename_all = "camelCase")]
    DestroyError { reason: String },
}

/// Translate a `CommandEffect` into the zero-or-more event messages it
/// produces; the caller is expected to also send a `tick`/state delta
/// separately (this crate only covers the discrete event stream).
pub fn events_for_effect(state: &MatchState, effect: &CommandEffect) -> Vec<EventMessage> {
    match effect {
        CommandEffect::Built { edge_id, movements, cost } => {
            let Some(edge) = state.edge(*edge_id) else { return Vec::new() };
            vec![EventMessage::NewEdge {
                edge: WireEdge::from(edge),
                movements: movements
                    .iter()
                    .map(|m| WireNodeMovement {
                        node_id: m.node_id,
                        x: m.x,
                        y: m.y,
                        moved: m.moved,
                        limited: m.limited,
                        limit_reasons: m.limit_reasons.iter().copied().map(limit_reason_str).collect(),
                    })
                    .collect(),
                cost: *cost,
            }]
        }
        CommandEffect::Reversed { edge_id, cost, .. } => {
            let Some(edge) = state.edge(*edge_id) else { return Vec::new() };
            vec![EventMessage::EdgeReversed { edge: WireEdge::from(edge), cost: *cost }]
        }
        CommandEffect::Toggled { edge_id, .. } => {
            let Some(edge) = state.edge(*edge_id) else { return Vec::new() };
            vec![EventMessage::EdgeUpdated { edge: WireEdge::from(edge) }]
        }
        CommandEffect::Redirected(r) => {
            let mut out = Vec::new();
            for &id in r.turned_on.iter().chain(r.turned_off.iter()) {
                if let Some(edge) = state.edge(id) {
                    out.push(EventMessage::EdgeUpdated { edge: WireEdge::from(edge) });
                }
            }
            out
        }
        CommandEffect::Destroyed { node_id, removed_edges, .. } => {
            vec![EventMessage::NodeDestroyed { node_id: *node_id, removed_edge_ids: removed_edges.clone() }]
        }
        CommandEffect::Quit { winner: Some(winner), .. } => {
            vec![EventMessage::GameOver { winner_id: *winner }]
        }
        CommandEffect::Quit { winner: None, .. } | CommandEffect::Picked { .. } | CommandEffect::AutoExpandToggled { .. } => Vec::new(),
    }
}

/// Translate a tick's node captures and a possible winner into events.
pub fn events_for_tick(report: &TickReport) -> Vec<EventMessage> {
    let mut out: Vec<EventMessage> = report
        .node_captures
        .iter()
        .map(|c| EventMessage::NodeCaptured {
            node_id: c.node_id,
            new_owner: c.new_owner,
            previous_owner: c.previous_owner,
            reward: c.gold_reward,
        })
        .collect();
    if let Some(winner) = report.winner_id {
        if report.game_ended {
            out.push(EventMessage::GameOver { winner_id: winner });
        }
    }
    out
}

/// Human-readable reason string for a failed command, per §7's taxonomy —
/// used to fill `bridgeError`/`reverseEdgeError`/`destroyError.reason`.
pub fn command_error_reason(err: CommandError) -> &'static str {
    match err {
        CommandError::Phase => "not permitted in the current phase",
        CommandError::Authorization => "not authorized",
        CommandError::NodeNotFound(_) => "node not found",
        CommandError::EdgeNotFound(_) => "edge not found",
        CommandError::Geometry => "bridge would duplicate or cross an existing edge",
        CommandError::Economy => "not enough gold",
        CommandError::PhaseAttack => "ownership-changing actions are not permitted during peace",
        CommandError::SelfAction => "self-action is not permitted",
    }
}
