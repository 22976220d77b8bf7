//! Deterministic game engine core for a territory-control match.
//!
//! This crate owns the Graph Store (`graph`), the Geometry Kernel
//! (`geometry`), the Tick Simulator (`tick`), the Command Validator/Mutator
//! (`commands`), the Redirect Optimizer (`optimizer`), and Match Lifecycle
//! (`lifecycle`) — the "hard part" this workspace's core is scoped to. The
//! transport, lobby/matchmaking, persistence, graph generation, and bot
//! heuristics are out of scope by design; this crate only consumes/exposes
//! the interfaces they need (a `MatchState` to mutate, a `CommandEffect` or
//! `TickReport` to observe).
//!
//! Like the teacher `flowstate-sim` crate this workspace started from, the
//! engine performs no I/O, reads no wall clock, and uses no ambient
//! randomness — every `commands::*` call and every `tick::step` call is a
//! pure function of its explicit arguments. See `tick`'s module docs for how
//! match timers are derived from `tick_count` instead of a wall-clock read.

#![deny(unsafe_code)]

pub mod commands;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod lifecycle;
pub mod model;
pub mod optimizer;
pub mod tick;

pub use commands::CommandEffect;
pub use config::EngineConfig;
pub use error::CommandError;
pub use graph::{GraphError, MatchState};
pub use lifecycle::VictoryOutcome;
pub use model::{Edge, EdgeId, Elimination, LimitReason, Node, NodeCapture, NodeId, NodeMovement, Phase, Player, PlayerId};
pub use optimizer::RedirectEffect;
pub use tick::TickReport;

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// S1-shaped end-to-end smoke test: picking through a contested capture.
    #[test]
    fn full_match_lifecycle_smoke_test() {
        let config = EngineConfig::default();
        let mut state = MatchState::new(config.game_duration_seconds, 0.0);
        for id in 1..=5u64 {
            state.insert_node(Node::new(id, id as f64 * 10.0, 0.0, 2.0));
        }
        for i in 1..=4u64 {
            state.insert_edge(i, i, i + 1).unwrap();
        }
        commands::add_player(&mut state, &config, Player::new(1, "#ff0000"));
        commands::add_player(&mut state, &config, Player::new(2, "#00ff00"));

        commands::pick_starting_node(&mut state, &config, 1, 2).unwrap();
        commands::pick_starting_node(&mut state, &config, 2, 4).unwrap();
        assert_eq!(state.phase, Phase::Playing); // peace duration 0 -> straight to playing

        commands::toggle_edge(&mut state, &config, 1, 2).unwrap(); // 2->3
        state.insert_edge(5, 4, 3).unwrap();
        commands::toggle_edge(&mut state, &config, 2, 5).unwrap(); // 4->3

        let mut captured = false;
        for _ in 0..5000 {
            let report = tick::step(&mut state, &config);
            if !report.node_captures.is_empty() {
                captured = true;
                break;
            }
            if report.game_ended {
                break;
            }
        }
        assert!(captured, "node 3 should eventually flip ownership");
        assert!(state.node(3).unwrap().owner.is_some());

        // P1, for example, should be able to quit and hand P2 the win.
        let effect = commands::quit_game(&mut state, 1).unwrap();
        assert!(matches!(effect, CommandEffect::Quit { eliminated: 1, winner: Some(2) }));
        assert_eq!(state.phase, Phase::Ended);

        // And once ended, further commands are rejected.
        assert_eq!(commands::toggle_auto_expand(&mut state, 2), Err(CommandError::Phase));
    }
}
