//! Sprite-frame timing, linked frames and sound cues
//!
//! `Animation` owns one character's frame table and resolves sprite handles
//! through the asset catalog on a background thread. `AnimationState` is the
//! per-player cursor into it: which state is showing, which frame, and when
//! the frame last changed. The mixer is an excluded collaborator; sound
//! start/stop requests are queued as [`SoundCue`]s for the caller to drain.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::JoinHandle;

use glam::IVec2;
use serde::{Deserialize, Serialize};

use crate::Ms;
use crate::assets::{AssetCatalog, SoundHandle, SpriteHandle};
use crate::config::{AnimSpec, parse_link_target};
use crate::consts;
use crate::error::ConfigError;

/// Animation states a character can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AnimKind {
    #[default]
    Normal,
    Walking,
    Eating,
    Appearing,
    Disappearing,
}

impl AnimKind {
    pub const ALL: [AnimKind; 5] = [
        AnimKind::Normal,
        AnimKind::Walking,
        AnimKind::Eating,
        AnimKind::Appearing,
        AnimKind::Disappearing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnimKind::Normal => "normal",
            AnimKind::Walking => "walking",
            AnimKind::Eating => "eating",
            AnimKind::Appearing => "appearing",
            AnimKind::Disappearing => "disappearing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(AnimKind::Normal),
            "walking" => Some(AnimKind::Walking),
            "eating" => Some(AnimKind::Eating),
            "appearing" => Some(AnimKind::Appearing),
            "disappearing" => Some(AnimKind::Disappearing),
            _ => None,
        }
    }
}

/// Facing direction on the grid (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }

    /// Facing for a grid step. Zero delta faces the viewer.
    pub fn from_delta(d: IVec2) -> Self {
        if d == IVec2::ZERO {
            Direction::Down
        } else if d.x.abs() >= d.y.abs() {
            if d.x > 0 { Direction::Right } else { Direction::Left }
        } else if d.y > 0 {
            Direction::Down
        } else {
            Direction::Up
        }
    }
}

const SLOTS: usize = AnimKind::ALL.len() * Direction::ALL.len();

fn slot(kind: AnimKind, dir: Direction) -> usize {
    kind as usize * Direction::ALL.len() + dir as usize
}

/// How one frame gets its sprite: its own file, or a one-level redirect into
/// another state's frame.
#[derive(Debug, Clone)]
enum FramePlan {
    Sprite(String),
    Link { slot: usize, frame: usize },
}

#[derive(Debug, Clone)]
struct StatePlan {
    frames: Vec<FramePlan>,
    ms_per_frame: Ms,
    sound: Option<(String, i32)>,
}

impl Default for StatePlan {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            ms_per_frame: consts::DEFAULT_MPF,
            sound: None,
        }
    }
}

struct LoadedState {
    frames: Vec<SpriteHandle>,
    sound: Option<(SoundHandle, i32)>,
}

/// Result of the background load: every frame resolved to a handle, links
/// already flattened.
struct Loaded {
    states: Vec<LoadedState>,
}

enum LoadPhase {
    Unloaded,
    Loading(JoinHandle<Loaded>),
    Ready(Arc<Loaded>),
}

/// Only one animation load runs at a time, system-wide.
fn load_gate() -> &'static Mutex<()> {
    static GATE: OnceLock<Mutex<()>> = OnceLock::new();
    GATE.get_or_init(|| Mutex::new(()))
}

fn lock_ignoring_poison<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One character's complete frame table. Shared as `Arc<Animation>` between
/// every player wearing that skin.
pub struct Animation {
    name: String,
    plan: Vec<StatePlan>,
    catalog: Arc<dyn AssetCatalog>,
    phase: Mutex<LoadPhase>,
}

impl Animation {
    /// Build and validate the frame table. Links are checked here: the
    /// target state must have enough frames and must not be a link itself.
    pub fn new(spec: &AnimSpec, catalog: Arc<dyn AssetCatalog>) -> Result<Self, ConfigError> {
        let mut plan: Vec<StatePlan> = (0..SLOTS).map(|_| StatePlan::default()).collect();

        for st in &spec.states {
            let s = slot(st.kind, st.dir);
            plan[s].ms_per_frame = st.ms_per_frame;
            plan[s].sound = st.sound.as_ref().map(|snd| (snd.name.clone(), snd.loops));
            plan[s].frames = (0..st.frames)
                .map(|i| {
                    FramePlan::Sprite(format!(
                        "{}__{}_{}_{i:02}.png",
                        spec.name,
                        st.kind.as_str(),
                        st.dir.as_str()
                    ))
                })
                .collect();
        }
        // Unconfigured states still need one frame to show
        for (s, st) in plan.iter_mut().enumerate() {
            if st.frames.is_empty() {
                let kind = AnimKind::ALL[s / Direction::ALL.len()];
                let dir = Direction::ALL[s % Direction::ALL.len()];
                st.frames.push(FramePlan::Sprite(format!(
                    "{}__{}_{}_00.png",
                    spec.name,
                    kind.as_str(),
                    dir.as_str()
                )));
            }
        }

        // Install links after every state has its frame list
        for st in &spec.states {
            let s = slot(st.kind, st.dir);
            for (local, target) in &st.links {
                let (tk, td, tf) = parse_link_target(target)?;
                let local = *local as usize;
                let tf = tf as usize;
                let ts = slot(tk, td);
                if local >= plan[s].frames.len() || tf >= plan[ts].frames.len() {
                    return Err(ConfigError::FrameOutOfRange {
                        target: target.clone(),
                        frame: tf,
                        count: plan[ts].frames.len(),
                    });
                }
                plan[s].frames[local] = FramePlan::Link {
                    slot: ts,
                    frame: tf,
                };
            }
        }
        // One level of indirection only
        for st in &plan {
            for f in &st.frames {
                if let FramePlan::Link { slot, frame } = f {
                    if let FramePlan::Link { .. } = plan[*slot].frames[*frame] {
                        let kind = AnimKind::ALL[slot / Direction::ALL.len()];
                        let dir = Direction::ALL[slot % Direction::ALL.len()];
                        return Err(ConfigError::DoubleLink(format!(
                            "{}_{}_{frame}",
                            kind.as_str(),
                            dir.as_str()
                        )));
                    }
                }
            }
        }

        Ok(Self {
            name: spec.name.clone(),
            plan,
            catalog,
            phase: Mutex::new(LoadPhase::Unloaded),
        })
    }

    /// Start the background load. Idempotent; later calls are no-ops.
    pub fn load(&self) {
        let mut phase = lock_ignoring_poison(&self.phase);
        if !matches!(*phase, LoadPhase::Unloaded) {
            return;
        }
        let plan = self.plan.clone();
        let catalog = Arc::clone(&self.catalog);
        let name = self.name.clone();
        *phase = LoadPhase::Loading(std::thread::spawn(move || {
            let _gate = lock_ignoring_poison(load_gate());
            log::debug!("loading animation {name}");
            resolve(&plan, catalog.as_ref())
        }));
    }

    /// Block until the background load has finished.
    pub fn ready(&self) {
        self.wait_loaded();
    }

    fn wait_loaded(&self) -> Arc<Loaded> {
        let mut phase = lock_ignoring_poison(&self.phase);
        match &*phase {
            LoadPhase::Ready(loaded) => return Arc::clone(loaded),
            LoadPhase::Unloaded => {
                log::warn!("frame requested before load() for {}", self.name);
                let loaded = Arc::new(resolve(&self.plan, self.catalog.as_ref()));
                *phase = LoadPhase::Ready(Arc::clone(&loaded));
                return loaded;
            }
            LoadPhase::Loading(_) => {}
        }
        let LoadPhase::Loading(handle) = std::mem::replace(&mut *phase, LoadPhase::Unloaded)
        else {
            unreachable!()
        };
        let loaded = match handle.join() {
            Ok(loaded) => loaded,
            Err(_) => {
                log::error!("animation loader for {} panicked", self.name);
                resolve(&self.plan, &crate::assets::NullCatalog)
            }
        };
        let loaded = Arc::new(loaded);
        *phase = LoadPhase::Ready(Arc::clone(&loaded));
        loaded
    }

    /// Number of frames in a state (always at least 1)
    pub fn frames(&self, kind: AnimKind, dir: Direction) -> u32 {
        self.plan[slot(kind, dir)].frames.len() as u32
    }

    pub fn ms_per_frame(&self, kind: AnimKind, dir: Direction) -> Ms {
        self.plan[slot(kind, dir)].ms_per_frame
    }

    /// Sprite for one frame, links already followed. Blocks on first use
    /// until the background load is done.
    pub fn get_frame(&self, kind: AnimKind, dir: Direction, frame: u32) -> SpriteHandle {
        let loaded = self.wait_loaded();
        let frames = &loaded.states[slot(kind, dir)].frames;
        frames[frame as usize % frames.len()].clone()
    }

    /// Sound cued when this state starts, with its loop count
    pub fn sound(&self, kind: AnimKind, dir: Direction) -> Option<(SoundHandle, i32)> {
        let loaded = self.wait_loaded();
        loaded.states[slot(kind, dir)].sound.clone()
    }
}

impl std::fmt::Debug for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animation").field("name", &self.name).finish()
    }
}

fn resolve(plan: &[StatePlan], catalog: &dyn AssetCatalog) -> Loaded {
    let direct: Vec<Vec<Option<SpriteHandle>>> = plan
        .iter()
        .map(|st| {
            st.frames
                .iter()
                .map(|f| match f {
                    FramePlan::Sprite(name) => Some(catalog.sprite(name)),
                    FramePlan::Link { .. } => None,
                })
                .collect()
        })
        .collect();

    let states = plan
        .iter()
        .enumerate()
        .map(|(s, st)| LoadedState {
            frames: st
                .frames
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let (s, i) = match f {
                        FramePlan::Sprite(_) => (s, i),
                        FramePlan::Link { slot, frame } => (*slot, *frame),
                    };
                    // Link targets are validated to be direct frames
                    direct[s][i].clone().unwrap_or_else(|| {
                        catalog.sprite("missing.png")
                    })
                })
                .collect(),
            sound: st
                .sound
                .as_ref()
                .and_then(|(name, loops)| catalog.sound(name).map(|h| (h, *loops))),
        })
        .collect();

    Loaded { states }
}

/// Request to the (external) mixer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundCue {
    Start {
        sound: SoundHandle,
        /// Extra repeats after the first play; -1 loops forever
        loops: i32,
        channel: usize,
    },
    Stop {
        channel: usize,
    },
}

/// One player's cursor into an [`Animation`]
#[derive(Debug)]
pub struct AnimationState {
    anim: Option<Arc<Animation>>,
    kind: AnimKind,
    dir: Direction,
    frame: u32,
    frame_start: Ms,
    /// Mixer channel for this player's sounds
    channel: usize,
    sound_live: bool,
    cues: Vec<SoundCue>,
}

impl AnimationState {
    pub fn new(channel: usize) -> Self {
        Self {
            anim: None,
            kind: AnimKind::Normal,
            dir: Direction::Down,
            frame: 0,
            frame_start: 0,
            channel,
            sound_live: false,
            cues: Vec::new(),
        }
    }

    pub fn kind(&self) -> AnimKind {
        self.kind
    }

    pub fn dir(&self) -> Direction {
        self.dir
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Swap the whole frame table (skin change), restarting the current state
    pub fn set_anim(&mut self, anim: Arc<Animation>, now: Ms) {
        self.anim = Some(anim);
        self.frame = 0;
        self.frame_start = now;
    }

    fn frame_count(&self) -> u32 {
        self.anim
            .as_ref()
            .map_or(1, |a| a.frames(self.kind, self.dir))
    }

    fn budget(&self) -> Ms {
        self.anim
            .as_ref()
            .map_or(consts::DEFAULT_MPF, |a| a.ms_per_frame(self.kind, self.dir))
    }

    /// Switch animation state: restart frames, stop the old sound, cue the
    /// new state's sound if it has one.
    pub fn set_state(&mut self, kind: AnimKind, now: Ms) {
        if self.sound_live {
            self.cues.push(SoundCue::Stop {
                channel: self.channel,
            });
            self.sound_live = false;
        }
        self.kind = kind;
        self.frame = 0;
        self.frame_start = now;
        if let Some(anim) = &self.anim {
            if let Some((sound, loops)) = anim.sound(kind, self.dir) {
                self.cues.push(SoundCue::Start {
                    sound,
                    loops,
                    channel: self.channel,
                });
                self.sound_live = true;
            }
        }
    }

    pub fn set_dir(&mut self, dir: Direction) {
        self.dir = dir;
    }

    /// Advance at most one frame, wrapping. Returns whether it moved.
    pub fn next_frame(&mut self, now: Ms) -> bool {
        if now.saturating_sub(self.frame_start) < self.budget() {
            return false;
        }
        self.frame = (self.frame + 1) % self.frame_count();
        self.frame_start = now;
        true
    }

    /// On the last frame and its time budget spent
    pub fn finished(&self, now: Ms) -> bool {
        self.frame == self.frame_count() - 1
            && now.saturating_sub(self.frame_start) >= self.budget()
    }

    /// Sprite to draw right now
    pub fn current_frame(&self) -> Option<SpriteHandle> {
        self.anim
            .as_ref()
            .map(|a| a.get_frame(self.kind, self.dir, self.frame))
    }

    /// Shift the frame clock forward after a pause
    pub fn delay(&mut self, ms: Ms) {
        self.frame_start += ms;
    }

    /// Hand pending mixer requests to the caller
    pub fn drain_cues(&mut self) -> Vec<SoundCue> {
        std::mem::take(&mut self.cues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NullCatalog;
    use crate::config::{AnimSpec, SoundSpec};

    fn anim(spec: &AnimSpec) -> Arc<Animation> {
        Arc::new(Animation::new(spec, Arc::new(NullCatalog)).unwrap())
    }

    fn walking_spec(frames: u32, mpf: Ms) -> AnimSpec {
        let mut spec = AnimSpec::single_frame("trog");
        for st in &mut spec.states {
            if st.kind == AnimKind::Walking {
                st.frames = frames;
                st.ms_per_frame = mpf;
            }
        }
        spec
    }

    #[test]
    fn test_next_frame_advances_at_most_one_and_wraps() {
        let a = anim(&walking_spec(3, 100));
        a.load();
        let mut st = AnimationState::new(0);
        st.set_anim(a, 0);
        st.set_state(AnimKind::Walking, 0);

        assert!(!st.next_frame(50));
        assert_eq!(st.frame(), 0);
        // A long gap still moves only one frame per call
        assert!(st.next_frame(1000));
        assert_eq!(st.frame(), 1);
        assert!(st.next_frame(1100));
        assert_eq!(st.frame(), 2);
        assert!(st.next_frame(1200));
        assert_eq!(st.frame(), 0);
    }

    #[test]
    fn test_finished_on_last_frame_after_budget() {
        let a = anim(&walking_spec(2, 100));
        let mut st = AnimationState::new(0);
        st.set_anim(a, 0);
        st.set_state(AnimKind::Walking, 0);

        assert!(!st.finished(0));
        st.next_frame(100);
        assert_eq!(st.frame(), 1);
        assert!(!st.finished(150));
        assert!(st.finished(200));
    }

    #[test]
    fn test_link_resolves_to_target_sprite() {
        let mut spec = walking_spec(2, 100);
        for st in &mut spec.states {
            if st.kind == AnimKind::Walking && st.dir == Direction::Right {
                st.links = vec![(1, "walking_left_0".into())];
            }
        }
        let a = anim(&spec);
        a.load();
        let linked = a.get_frame(AnimKind::Walking, Direction::Right, 1);
        let target = a.get_frame(AnimKind::Walking, Direction::Left, 0);
        assert_eq!(linked, target);
    }

    #[test]
    fn test_double_link_is_fatal() {
        let mut spec = walking_spec(2, 100);
        for st in &mut spec.states {
            if st.kind == AnimKind::Walking {
                match st.dir {
                    Direction::Right => st.links = vec![(1, "walking_left_1".into())],
                    Direction::Left => st.links = vec![(1, "walking_up_0".into())],
                    _ => {}
                }
            }
        }
        let err = Animation::new(&spec, Arc::new(NullCatalog)).unwrap_err();
        assert!(matches!(err, ConfigError::DoubleLink(_)));
    }

    #[test]
    fn test_link_out_of_range_is_fatal() {
        let mut spec = walking_spec(2, 100);
        for st in &mut spec.states {
            if st.kind == AnimKind::Walking && st.dir == Direction::Right {
                st.links = vec![(1, "walking_left_7".into())];
            }
        }
        let err = Animation::new(&spec, Arc::new(NullCatalog)).unwrap_err();
        assert!(matches!(err, ConfigError::FrameOutOfRange { .. }));
    }

    #[test]
    fn test_set_state_cues_sound_start_and_stop() {
        let mut spec = AnimSpec::single_frame("muncher");
        for st in &mut spec.states {
            if st.kind == AnimKind::Eating {
                st.sound = Some(SoundSpec {
                    name: "chomp.wav".into(),
                    loops: 0,
                });
            }
        }
        let a = anim(&spec);
        a.load();
        let mut st = AnimationState::new(3);
        st.set_anim(a, 0);
        st.set_state(AnimKind::Eating, 0);
        let cues = st.drain_cues();
        assert!(matches!(
            cues.as_slice(),
            [SoundCue::Start { loops: 0, channel: 3, .. }]
        ));

        st.set_state(AnimKind::Normal, 100);
        let cues = st.drain_cues();
        assert_eq!(cues, vec![SoundCue::Stop { channel: 3 }]);
        // Draining empties the queue
        assert!(st.drain_cues().is_empty());
    }

    #[test]
    fn test_load_is_idempotent() {
        let a = anim(&walking_spec(2, 100));
        a.load();
        a.load();
        a.ready();
        let h = a.get_frame(AnimKind::Walking, Direction::Up, 0);
        assert_eq!(h.name(), "trog__walking_up_00.png");
    }

    #[test]
    fn test_direction_from_delta() {
        assert_eq!(Direction::from_delta(IVec2::new(1, 0)), Direction::Right);
        assert_eq!(Direction::from_delta(IVec2::new(0, -1)), Direction::Up);
        assert_eq!(Direction::from_delta(IVec2::ZERO), Direction::Down);
    }
}
