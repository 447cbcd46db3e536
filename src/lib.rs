//! Gnumch - a number-munching arcade puzzle game
//!
//! Core modules:
//! - `sim`: deterministic board/player/troggle simulation
//! - `anim`: sprite-frame timing, linked frames and sound cues
//! - `level`: puzzle number generation (multiples, factors, primes)
//! - `config`: game settings and spec files
//! - `assets`: sprite/sound catalog boundary (rendering lives elsewhere)

pub mod anim;
pub mod assets;
pub mod config;
pub mod error;
pub mod level;
pub mod sim;

pub use config::GameSettings;
pub use error::ConfigError;

use glam::IVec2;

/// Milliseconds of wall-clock (or simulated) time
pub type Ms = u64;

/// Game timing and sizing constants (used as setting defaults)
pub mod consts {
    use super::Ms;

    /// Frame rate of the outer game loop
    pub const FRAME_RATE: u32 = 50;
    /// Milliseconds per loop frame
    pub const FRAME_MS: Ms = 1000 / FRAME_RATE as Ms;

    /// Walk duration between adjacent squares
    pub const CHANGE_TIME_MS: Ms = 300;
    /// Chew duration after munching a number
    pub const EAT_TIME_MS: Ms = 500;
    /// Idle time before a troggle picks its next move
    pub const TROG_WAIT_MS: Ms = 1000;
    /// Bounds for the random respawn delay of a dead troggle
    pub const TROG_SPAWN_MIN_MS: Ms = 3000;
    pub const TROG_SPAWN_MAX_MS: Ms = 7000;
    /// How long the pre-spawn warning banner shows
    pub const TROG_WARN_MS: Ms = 1000;

    /// Board dimensions in squares
    pub const BOARD_WIDTH: i32 = 6;
    pub const BOARD_HEIGHT: i32 = 6;
    /// Concurrent troggle slots
    pub const TROG_NUMBER: usize = 3;

    /// Starting lives
    pub const START_LIVES: i32 = 3;
    /// Score interval that grants an extra life
    pub const EXTRA_LIFE_POINTS: u32 = 50;
    /// Default milliseconds-per-frame for unconfigured animations
    pub const DEFAULT_MPF: Ms = 1000;
}

/// Manhattan distance between two squares
#[inline]
pub fn manhattan(a: IVec2, b: IVec2) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Chebyshev (king-move) distance between two squares
#[inline]
pub fn chebyshev(a: IVec2, b: IVec2) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}
