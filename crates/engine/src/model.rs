//! Core record types: `Node`, `Edge`, `Player`, and the small value types
//! produced alongside a command or a tick.

/// Stable integer id for a node. Assigned by the (external) graph generator
/// or by `build_bridge`'s new-edge allocation; never reused within a match.
pub type NodeId = u64;

/// Stable integer id for a directed edge.
pub type EdgeId = u64;

/// Small positive integer identifying a player within one match.
pub type PlayerId = u32;

/// A point on the planar graph. Owns a juice balance and an undirected
/// membership list of the edges attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub juice: f64,
    pub owner: Option<PlayerId>,
    /// Every edge id that has this node as either endpoint, in insertion order.
    pub attached_edge_ids: Vec<EdgeId>,
    /// Per-tick accumulator of friendly inflow; amplifies next tick's outflow fraction.
    pub cur_intake: f64,
    /// Doubles this node's production rate; a win condition counts these per owner.
    pub is_capital: bool,
}

impl Node {
    pub fn new(id: NodeId, x: f64, y: f64, juice: f64) -> Self {
        Self {
            id,
            x,
            y,
            juice,
            owner: None,
            attached_edge_ids: Vec::new(),
            cur_intake: 0.0,
            is_capital: false,
        }
    }
}

/// A directed, one-way connection between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Player intent to flow. Flipped by `toggle_edge`, `reverse_edge`, `build_bridge`.
    pub on: bool,
    /// Derived effective flow for the current tick; recomputed every tick.
    pub flowing: bool,
    /// True while this edge is still under construction (a freshly built
    /// bridge with a nonzero build duration). Never flows while building.
    pub building: bool,
    pub build_ticks_required: u32,
    pub build_ticks_elapsed: u32,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            on: false,
            flowing: false,
            building: false,
            build_ticks_required: 0,
            build_ticks_elapsed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub color: String,
    pub name: String,
    pub auto_expand: bool,
}

impl Player {
    pub fn new(id: PlayerId, color: impl Into<String>) -> Self {
        Self {
            id,
            color: color.into(),
            name: String::new(),
            auto_expand: false,
        }
    }
}

/// Match phase. Transitions strictly forward; see `lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Picking,
    Peace,
    Playing,
    Ended,
}

/// Why a sharp-angle relaxation did not apply the full rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReason {
    /// The requested rotation exceeded `max_sharp_angle_displacement`.
    DistanceCap,
    /// The swept wedge crossed another edge's path.
    EdgePathCollision,
    /// The swept wedge passed within `collision_clearance` of another node.
    NodePathCollision,
    /// The final (post-rotation) position itself collides.
    EndpointOverlap,
}

/// One node's displacement (or attempted, blocked displacement) produced by
/// `geometry::resolve_sharp_angles`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMovement {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
    pub moved: bool,
    pub limited: bool,
    pub limit_reasons: Vec<LimitReason>,
}

/// Emitted when the tick simulator flips a node's ownership via drain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeCapture {
    pub node_id: NodeId,
    pub new_owner: PlayerId,
    pub previous_owner: Option<PlayerId>,
    pub gold_reward: f64,
}

/// Emitted when a player is removed from play (zero nodes, or quit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elimination {
    pub player_id: PlayerId,
}
