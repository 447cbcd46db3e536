//! Deterministic game simulation
//!
//! Everything in here is pure state plus a monotonic millisecond clock fed
//! in from outside. Given the same settings, seed and key sequence, a run
//! is reproducible tick for tick. No I/O happens below this module except
//! the asset-catalog lookups behind [`crate::anim`].

pub mod board;
pub mod game;
pub mod player;
pub mod troggle;

pub use board::{Board, Munch};
pub use game::{Game, GameEvent};
pub use player::{Attack, FoodChain, Key, Motion, Player, PlayerEvent, PlayerKind};
pub use troggle::{OnMove, OnStop, Strategy, Surroundings, TroggleDef};
