//! The Geometry Kernel: planar admissibility checks for bridges, and the
//! sharp-angle relaxation that keeps the overlay readable after one is
//! built.
//!
//! `segments_intersect` and `point_segment_distance` are pure functions over
//! coordinates. `bridge_admissible` is pure over a `MatchState` (it only
//! reads). `resolve_sharp_angles` is the one function in this module that
//! mutates its `MatchState` argument — it *is* the node movement, not a
//! planner for one — mirroring the reference implementation's
//! `resolve_sharp_angles`, which repositions nodes as it scans rather than
//! returning a plan for someone else to apply.

use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::graph::MatchState;
use crate::model::{EdgeId, LimitReason, NodeId, NodeMovement};

type Point = (f64, f64);

const EPSILON: f64 = 1e-9;

/// Why a proposed bridge was rejected. `SelfLoop` maps to the command
/// layer's Self-action taxonomy; the other two map to Geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeRejection {
    SelfLoop,
    DuplicateEdge,
    Crosses(EdgeId),
}

fn orientation(p: Point, q: Point, r: Point) -> i8 {
    let value = (q.1 - p.1) * (r.0 - q.0) - (q.0 - p.0) * (r.1 - q.1);
    if value.abs() <= EPSILON {
        0
    } else if value > 0.0 {
        1
    } else {
        2
    }
}

fn on_segment(p: Point, q: Point, r: Point) -> bool {
    r.0 <= p.0.max(q.0) + EPSILON
        && r.0 >= p.0.min(q.0) - EPSILON
        && r.1 <= p.1.max(q.1) + EPSILON
        && r.1 >= p.1.min(q.1) - EPSILON
}

/// Classical orientation + on-segment intersection test. Two segments that
/// share an endpoint are reported as non-intersecting — callers rely on
/// this convention when validating a proposed bridge against the existing
/// graph (a bridge sharing an endpoint with a neighbor is fine; a bridge
/// crossing through the *middle* of a neighbor is not).
pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let shares_endpoint = |a: Point, b: Point| (a.0 - b.0).abs() <= EPSILON && (a.1 - b.1).abs() <= EPSILON;
    if shares_endpoint(p1, q1) || shares_endpoint(p1, q2) || shares_endpoint(p2, q1) || shares_endpoint(p2, q2) {
        return false;
    }

    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    if o1 == 0 && on_segment(p1, p2, q1) {
        return true;
    }
    if o2 == 0 && on_segment(p1, p2, q2) {
        return true;
    }
    if o3 == 0 && on_segment(q1, q2, p1) {
        return true;
    }
    if o4 == 0 && on_segment(q1, q2, p2) {
        return true;
    }

    false
}

/// Shortest distance from a point to a segment.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let seg_len_sq = dx * dx + dy * dy;
    if seg_len_sq <= EPSILON * EPSILON {
        return ((p.0 - a.0).powi(2) + (p.1 - a.1).powi(2)).sqrt();
    }
    let t = ((p.0 - a.0) * dx + (p.1 - a.1) * dy) / seg_len_sq;
    let t = t.clamp(0.0, 1.0);
    let proj = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - proj.0).powi(2) + (p.1 - proj.1).powi(2)).sqrt()
}

/// Euclidean distance between two node positions (used for bridge/reversal cost).
pub fn node_distance(state: &MatchState, a: NodeId, b: NodeId) -> Option<f64> {
    let a = state.node(a)?;
    let b = state.node(b)?;
    Some(((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt())
}

/// Whether a bridge from `from_id` to `to_id` is admissible: distinct
/// endpoints, no duplicate edge, and no crossing of an existing edge that
/// doesn't share an endpoint with it.
pub fn bridge_admissible(state: &MatchState, from_id: NodeId, to_id: NodeId) -> Result<(), BridgeRejection> {
    if from_id == to_id {
        return Err(BridgeRejection::SelfLoop);
    }
    if state.has_edge_between(from_id, to_id) {
        return Err(BridgeRejection::DuplicateEdge);
    }
    let (Some(from), Some(to)) = (state.node(from_id), state.node(to_id)) else {
        return Err(BridgeRejection::DuplicateEdge);
    };
    let p1 = (from.x, from.y);
    let p2 = (to.x, to.y);

    for edge in state.edges() {
        let (Some(source), Some(target)) = (state.node(edge.source), state.node(edge.target)) else {
            continue;
        };
        if segments_intersect(p1, p2, (source.x, source.y), (target.x, target.y)) {
            return Err(BridgeRejection::Crosses(edge.id));
        }
    }
    Ok(())
}

/// Which check tripped a collision while probing a candidate rotation.
/// Threaded back up through `find_max_safe_rotation` so `resolve_sharp_angles`
/// can report `LimitReason::NodePathCollision` separately from
/// `LimitReason::EdgePathCollision` instead of folding both into one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollisionKind {
    Edge,
    Node,
}

/// Whether moving `moving_node_id` to `candidate` makes any edge attached to
/// it — including the one actually being rotated — cross another edge or
/// pass within `collision_clearance` of another node. Every attached edge is
/// tested, not just the others: the edge under relaxation is exactly the one
/// whose path changes, so excluding it here would mean it never gets checked
/// against anything. `ignore_edge_ids` only suppresses existing edges that
/// share an endpoint with the segment under test from being flagged as false
/// positives (on top of the endpoint check below, which already covers the
/// common case).
fn movement_would_collide(
    state: &MatchState,
    moving_node_id: NodeId,
    candidate: Point,
    ignore_edge_ids: &BTreeSet<EdgeId>,
    collision_clearance: f64,
) -> Option<CollisionKind> {
    let moving = state.node(moving_node_id)?;

    for &edge_id in &moving.attached_edge_ids {
        let Some(edge) = state.edge(edge_id) else { continue };
        let other_id = if edge.source == moving_node_id { edge.target } else { edge.source };
        let Some(other) = state.node(other_id) else { continue };
        let segment = (candidate, (other.x, other.y));

        for existing in state.edges() {
            if existing.id == edge_id || ignore_edge_ids.contains(&existing.id) {
                continue;
            }
            if existing.source == moving_node_id
                || existing.target == moving_node_id
                || existing.source == other_id
                || existing.target == other_id
            {
                continue;
            }
            let (Some(es), Some(et)) = (state.node(existing.source), state.node(existing.target)) else {
                continue;
            };
            if segments_intersect(segment.0, segment.1, (es.x, es.y), (et.x, et.y)) {
                return Some(CollisionKind::Edge);
            }
        }

        for candidate_node in state.nodes() {
            if candidate_node.id == moving_node_id || candidate_node.id == other_id {
                continue;
            }
            let distance = point_segment_distance((candidate_node.x, candidate_node.y), segment.0, segment.1);
            if distance <= collision_clearance {
                return Some(CollisionKind::Node);
            }
        }
    }

    None
}

/// A rotation step fine enough that the reference implementation's sampled
/// ghost-move (`_simulate_path_collisions`) catches a neighbor passing
/// *through* another edge or node mid-sweep, not just at its final position.
const PATH_SIMULATION_MAX_STEP_DEGREES: f64 = 3.0;
const PATH_SIMULATION_MAX_STEPS: u32 = 32;

/// Samples the swept arc from the unrotated position to `rotation` in small
/// angular increments and checks each sampled position for a collision, so a
/// neighbor whose straight-line endpoints look clear can still be caught
/// mid-sweep.
fn sweep_collides(
    state: &MatchState,
    shared: Point,
    moving_node_id: NodeId,
    vec_length: f64,
    old_angle: f64,
    direction: f64,
    rotation: f64,
    ignore_edge_ids: &BTreeSet<EdgeId>,
    collision_clearance: f64,
) -> Option<CollisionKind> {
    if rotation <= EPSILON || vec_length <= EPSILON {
        return None;
    }
    let max_step = PATH_SIMULATION_MAX_STEP_DEGREES.to_radians();
    let steps = ((rotation / max_step).ceil() as u32).clamp(1, PATH_SIMULATION_MAX_STEPS);
    for step in 1..=steps {
        let fraction = step as f64 / steps as f64;
        let angle = old_angle + direction * rotation * fraction;
        let sample = (shared.0 + vec_length * angle.cos(), shared.1 + vec_length * angle.sin());
        if let Some(kind) = movement_would_collide(state, moving_node_id, sample, ignore_edge_ids, collision_clearance) {
            return Some(kind);
        }
    }
    None
}

/// Bisection search (18 iterations, 1e-4 rad minimum interval — matching the
/// reference implementation's relaxation tuning) for the largest rotation,
/// up to `max_rotation`, that leaves the moving node's swept path and final
/// position collision-free. The result is shrunk by a clearance margin so
/// the final position keeps a safety gap instead of sitting exactly on the
/// boundary. Returns which kind of collision bounded the search, if any, so
/// the caller can report `EdgePathCollision` versus `NodePathCollision`.
fn find_max_safe_rotation(
    state: &MatchState,
    shared: Point,
    moving_node_id: NodeId,
    vec_length: f64,
    old_angle: f64,
    direction: f64,
    max_rotation: f64,
    ignore_edge_ids: &BTreeSet<EdgeId>,
    collision_clearance: f64,
) -> (f64, Option<CollisionKind>) {
    if max_rotation <= EPSILON {
        return (0.0, None);
    }

    let probe = |rotation: f64| -> Option<CollisionKind> {
        sweep_collides(state, shared, moving_node_id, vec_length, old_angle, direction, rotation, ignore_edge_ids, collision_clearance).or_else(|| {
            let angle = old_angle + direction * rotation;
            let candidate = (shared.0 + vec_length * angle.cos(), shared.1 + vec_length * angle.sin());
            movement_would_collide(state, moving_node_id, candidate, ignore_edge_ids, collision_clearance)
        })
    };

    let initial = probe(max_rotation);
    if initial.is_none() {
        return (max_rotation, None);
    }

    let mut low = 0.0_f64;
    let mut high = max_rotation;
    let mut best = 0.0_f64;
    let mut best_kind = initial;
    const MAX_ITERATIONS: u32 = 18;
    const MIN_DELTA: f64 = 1e-4;

    for _ in 0..MAX_ITERATIONS {
        if high - low <= MIN_DELTA {
            break;
        }
        let mid = (low + high) / 2.0;
        match probe(mid) {
            Some(kind) => {
                high = mid;
                best_kind = Some(kind);
            }
            None => {
                best = mid;
                low = mid;
            }
        }
    }

    if best <= EPSILON {
        return (0.0, best_kind);
    }

    let clearance_rotation = collision_clearance / vec_length.max(EPSILON);
    if best <= clearance_rotation + EPSILON {
        (0.0, best_kind)
    } else {
        (best - clearance_rotation, best_kind)
    }
}

/// For each endpoint of `new_edge_id`, relax every other edge incident to
/// that endpoint to meet it at least at `min_join_angle_degrees`, moving the
/// neighbor's far endpoint, bounded by `max_sharp_angle_displacement` and
/// collision-free travel. Mutates `state` in place; returns the log of
/// attempted and actual movements.
pub fn resolve_sharp_angles(state: &mut MatchState, new_edge_id: EdgeId, config: &EngineConfig) -> Vec<NodeMovement> {
    let Some(new_edge) = state.edge(new_edge_id).cloned() else {
        return Vec::new();
    };

    let min_angle_rad = config.min_join_angle_degrees.max(0.0).to_radians();
    if min_angle_rad <= 0.0 {
        return Vec::new();
    }

    let mut movements = Vec::new();
    let endpoint_pairs = [(new_edge.source, new_edge.target), (new_edge.target, new_edge.source)];

    for (shared_id, opposite_id) in endpoint_pairs {
        let Some(shared) = state.node(shared_id) else { continue };
        let shared_pos = (shared.x, shared.y);
        let Some(opposite) = state.node(opposite_id) else { continue };
        let base = (opposite.x - shared_pos.0, opposite.y - shared_pos.1);
        let base_length = (base.0 * base.0 + base.1 * base.1).sqrt();
        if base_length <= EPSILON {
            continue;
        }

        let attached_ids: Vec<EdgeId> = shared.attached_edge_ids.clone();
        for neighbor_edge_id in attached_ids {
            if neighbor_edge_id == new_edge_id {
                continue;
            }
            let Some(neighbor_edge) = state.edge(neighbor_edge_id) else { continue };
            let moving_node_id = if neighbor_edge.source == shared_id {
                neighbor_edge.target
            } else if neighbor_edge.target == shared_id {
                neighbor_edge.source
            } else {
                continue;
            };
            if moving_node_id == opposite_id {
                continue;
            }

            let Some(moving) = state.node(moving_node_id) else { continue };
            let vec = (moving.x - shared_pos.0, moving.y - shared_pos.1);
            let vec_length = (vec.0 * vec.0 + vec.1 * vec.1).sqrt();
            if vec_length <= EPSILON {
                continue;
            }

            let dot = base.0 * vec.0 + base.1 * vec.1;
            let denom = base_length * vec_length;
            if denom <= EPSILON {
                continue;
            }
            let cos_angle = (dot / denom).clamp(-1.0, 1.0);
            let angle = cos_angle.acos();
            if angle >= min_angle_rad {
                continue;
            }
            let angle_shortfall = min_angle_rad - angle;
            if angle_shortfall <= EPSILON {
                continue;
            }

            let cross = base.0 * vec.1 - base.1 * vec.0;
            let direction = if cross.abs() <= EPSILON || cross > 0.0 { 1.0 } else { -1.0 };

            // A budget of zero (or negative) permits no movement at all —
            // distinct from a small-but-positive budget, which still runs
            // the bisection below and may itself bottom out at zero.
            if config.max_sharp_angle_displacement <= 0.0 {
                movements.push(NodeMovement {
                    node_id: moving_node_id,
                    x: moving.x,
                    y: moving.y,
                    moved: false,
                    limited: true,
                    limit_reasons: vec![LimitReason::DistanceCap],
                });
                continue;
            }

            let mut reasons = Vec::new();
            let mut bounded_shortfall = angle_shortfall;
            let chord_ratio = (config.max_sharp_angle_displacement / (2.0 * vec_length)).clamp(0.0, 1.0);
            let allowed_shortfall = 2.0 * chord_ratio.asin();
            if allowed_shortfall <= EPSILON {
                movements.push(NodeMovement {
                    node_id: moving_node_id,
                    x: moving.x,
                    y: moving.y,
                    moved: false,
                    limited: true,
                    limit_reasons: vec![LimitReason::DistanceCap],
                });
                continue;
            }
            if bounded_shortfall > allowed_shortfall {
                bounded_shortfall = allowed_shortfall;
                reasons.push(LimitReason::DistanceCap);
            }

            let old_angle = vec.1.atan2(vec.0);
            let mut ignore_edge_ids: BTreeSet<EdgeId> = state
                .node(moving_node_id)
                .map(|n| n.attached_edge_ids.iter().copied().collect())
                .unwrap_or_default();
            ignore_edge_ids.insert(neighbor_edge_id);

            let (applied_rotation, blocking_kind) = find_max_safe_rotation(
                state,
                shared_pos,
                moving_node_id,
                vec_length,
                old_angle,
                direction,
                bounded_shortfall,
                &ignore_edge_ids,
                config.collision_clearance,
            );

            if applied_rotation + EPSILON < bounded_shortfall {
                if let Some(kind) = blocking_kind {
                    reasons.push(match kind {
                        CollisionKind::Edge => LimitReason::EdgePathCollision,
                        CollisionKind::Node => LimitReason::NodePathCollision,
                    });
                }
            }

            let Some(moving) = state.node(moving_node_id) else { continue };
            if applied_rotation <= EPSILON {
                movements.push(NodeMovement {
                    node_id: moving_node_id,
                    x: moving.x,
                    y: moving.y,
                    moved: false,
                    limited: true,
                    limit_reasons: if reasons.is_empty() { vec![LimitReason::EndpointOverlap] } else { reasons },
                });
                continue;
            }

            let new_angle = old_angle + direction * applied_rotation;
            let new_x = shared_pos.0 + vec_length * new_angle.cos();
            let new_y = shared_pos.1 + vec_length * new_angle.sin();
            if let Some(node) = state.node_mut(moving_node_id) {
                node.x = new_x;
                node.y = new_y;
            }
            movements.push(NodeMovement {
                node_id: moving_node_id,
                x: new_x,
                y: new_y,
                moved: true,
                limited: !reasons.is_empty(),
                limit_reasons: reasons,
            });
        }
    }

    movements
}
