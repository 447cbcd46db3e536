//! Game settings and character configuration
//!
//! Everything here has built-in defaults so the game runs with no files on
//! disk. A JSON settings file, when present, overrides them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Ms;
use crate::anim::{AnimKind, Direction};
use crate::consts;
use crate::error::ConfigError;
use crate::sim::troggle::{OnMove, OnStop, Strategy, TroggleDef};

/// Tunable timings and board dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Board width in squares
    pub board_width: i32,
    /// Board height in squares
    pub board_height: i32,
    /// Concurrent troggles at level 1
    pub trog_number: usize,
    /// Lives at game start
    pub start_lives: i32,

    // === Timings (milliseconds) ===
    /// One grid step
    pub change_time: Ms,
    /// Chewing a number
    pub eat_time: Ms,
    /// Idle pause between troggle moves
    pub trog_wait: Ms,
    /// Troggle respawn delay, lower bound
    pub trog_spawn_min: Ms,
    /// Troggle respawn delay, upper bound (exclusive)
    pub trog_spawn_max: Ms,
    /// Warning banner lead time before a troggle appears
    pub trog_warn: Ms,

    /// Fixed RNG seed for reproducible runs; None seeds from entropy
    pub seed: Option<u64>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            board_width: consts::BOARD_WIDTH,
            board_height: consts::BOARD_HEIGHT,
            trog_number: consts::TROG_NUMBER,
            start_lives: consts::START_LIVES,
            change_time: consts::CHANGE_TIME_MS,
            eat_time: consts::EAT_TIME_MS,
            trog_wait: consts::TROG_WAIT_MS,
            trog_spawn_min: consts::TROG_SPAWN_MIN_MS,
            trog_spawn_max: consts::TROG_SPAWN_MAX_MS,
            trog_warn: consts::TROG_WARN_MS,
            seed: None,
        }
    }
}

impl GameSettings {
    /// Load from a JSON file. A missing file is not an error; defaults apply.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        };
        let settings: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        settings.validate()?;
        log::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write back as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_width < 3 || self.board_height < 3 {
            return Err(ConfigError::InvalidSetting(format!(
                "board must be at least 3x3, got {}x{}",
                self.board_width, self.board_height
            )));
        }
        if self.change_time == 0 || self.eat_time == 0 || self.trog_wait == 0 {
            return Err(ConfigError::InvalidSetting(
                "timings must be positive".into(),
            ));
        }
        if self.trog_spawn_min >= self.trog_spawn_max {
            return Err(ConfigError::InvalidSetting(format!(
                "spawn delay range is empty: {}..{}",
                self.trog_spawn_min, self.trog_spawn_max
            )));
        }
        Ok(())
    }
}

/// Sound cued when an animation state starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundSpec {
    pub name: String,
    /// Extra repeats after the first play; -1 loops forever
    pub loops: i32,
}

/// One animation state of one character: frame count and pacing, optional
/// sound, and link redirects into other states' frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpec {
    pub kind: AnimKind,
    pub dir: Direction,
    pub frames: u32,
    pub ms_per_frame: Ms,
    #[serde(default)]
    pub sound: Option<SoundSpec>,
    /// `(local frame, "kind_dir_frame" target)` pairs
    #[serde(default)]
    pub links: Vec<(u32, String)>,
}

impl StateSpec {
    fn new(kind: AnimKind, dir: Direction, frames: u32, ms_per_frame: Ms) -> Self {
        Self {
            kind,
            dir,
            frames,
            ms_per_frame,
            sound: None,
            links: Vec::new(),
        }
    }
}

/// Full sprite sheet description for one character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimSpec {
    /// Character name, also the sprite file prefix
    pub name: String,
    pub states: Vec<StateSpec>,
}

/// Parse a `kind_dir_frame` link target, e.g. `walking_left_2`.
pub fn parse_link_target(s: &str) -> Result<(AnimKind, Direction, u32), ConfigError> {
    let mut parts = s.rsplitn(3, '_');
    let (Some(frame), Some(dir), Some(kind)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ConfigError::MalformedLink(s.into()));
    };
    let kind = AnimKind::from_str(kind).ok_or(ConfigError::UnknownAnim(kind.into()))?;
    let dir = Direction::from_str(dir).ok_or(ConfigError::UnknownDirection(dir.into()))?;
    let frame = frame
        .parse()
        .map_err(|_| ConfigError::MalformedLink(s.into()))?;
    Ok((kind, dir, frame))
}

impl AnimSpec {
    /// Every kind+dir combination at one frame each; missing entries in a
    /// loaded spec fall back to this shape.
    pub fn single_frame(name: &str) -> Self {
        let mut states = Vec::new();
        for kind in AnimKind::ALL {
            for dir in Direction::ALL {
                states.push(StateSpec::new(kind, dir, 1, consts::DEFAULT_MPF));
            }
        }
        Self {
            name: name.to_string(),
            states,
        }
    }

    fn state_mut(&mut self, kind: AnimKind, dir: Direction) -> &mut StateSpec {
        let idx = self
            .states
            .iter()
            .position(|s| s.kind == kind && s.dir == dir)
            .unwrap_or_else(|| {
                self.states
                    .push(StateSpec::new(kind, dir, 1, consts::DEFAULT_MPF));
                self.states.len() - 1
            });
        &mut self.states[idx]
    }

    /// Built-in muncher sheet: 4-frame walk cycles, chewing and pop in/out
    pub fn muncher_default() -> Self {
        let mut spec = Self::single_frame("muncher");
        for dir in Direction::ALL {
            let s = spec.state_mut(AnimKind::Walking, dir);
            s.frames = 4;
            s.ms_per_frame = 75;
        }
        let eat = spec.state_mut(AnimKind::Eating, Direction::Down);
        eat.frames = 5;
        eat.ms_per_frame = 100;
        eat.sound = Some(SoundSpec {
            name: "chomp.wav".into(),
            loops: 0,
        });
        for kind in [AnimKind::Appearing, AnimKind::Disappearing] {
            let s = spec.state_mut(kind, Direction::Down);
            s.frames = 3;
            s.ms_per_frame = 100;
        }
        spec
    }

    /// Built-in troggle sheet; all troggle kinds share the frame layout and
    /// differ only by sprite prefix.
    pub fn troggle_default(name: &str) -> Self {
        let mut spec = Self::single_frame(name);
        for dir in Direction::ALL {
            let s = spec.state_mut(AnimKind::Walking, dir);
            s.frames = 2;
            s.ms_per_frame = 150;
        }
        let eat = spec.state_mut(AnimKind::Eating, Direction::Down);
        eat.frames = 3;
        eat.ms_per_frame = 100;
        for kind in [AnimKind::Appearing, AnimKind::Disappearing] {
            let s = spec.state_mut(kind, Direction::Down);
            s.frames = 3;
            s.ms_per_frame = 100;
        }
        spec
    }
}

/// The stock troggle roster, in unlock order
pub fn default_troggle_defs() -> Vec<TroggleDef> {
    vec![
        TroggleDef {
            name: "reggie".into(),
            strategy: Strategy::Straight,
            on_move: None,
            on_stop: None,
        },
        TroggleDef {
            name: "bashful".into(),
            strategy: Strategy::Flee,
            on_move: None,
            on_stop: None,
        },
        TroggleDef {
            name: "helper".into(),
            strategy: Strategy::Random,
            on_move: None,
            on_stop: Some(OnStop::Munch),
        },
        TroggleDef {
            name: "worker".into(),
            strategy: Strategy::Random,
            on_move: Some(OnMove::LeaveNumber),
            on_stop: None,
        },
        TroggleDef {
            name: "smartie".into(),
            strategy: Strategy::Chase,
            on_move: None,
            on_stop: None,
        },
    ]
}
