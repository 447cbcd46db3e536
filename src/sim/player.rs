//! Players on the board and their motion state machine
//!
//! A player is a muncher (human or scripted input through a key queue) or a
//! troggle (AI). Both share the same motion states and combat stats; the
//! mediator in [`crate::sim::game`] routes everything that touches more than
//! one player.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::IVec2;

use crate::Ms;
use crate::anim::{AnimKind, Animation, AnimationState, Direction, SoundCue};
use crate::config::GameSettings;
use crate::sim::troggle::TroggleDef;

/// Queued muncher input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Munch,
    Spawn,
}

/// What a player is doing right now. `NotOnBoard` doubles as "does not
/// exist"; every other state is on-board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Motion {
    #[default]
    NotOnBoard,
    Idle,
    Moving,
    Appearing,
    Disappearing,
    Eating,
}

/// Outcome of one attack, from the attacker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attack {
    DefenderWins,
    Tie,
    AttackerWins,
}

/// Combat stats. Offense is how hard this player bites; the defenses say
/// what happens when someone bites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoodChain {
    pub offense: i32,
    /// Survive (and shrug off) attacks up to this strength
    pub live_defense: i32,
    /// Eat attackers weaker than this
    pub eatback_defense: i32,
}

impl FoodChain {
    pub const MUNCHER: FoodChain = FoodChain {
        offense: 1,
        live_defense: 1,
        eatback_defense: 0,
    };
    pub const TROGGLE: FoodChain = FoodChain {
        offense: 3,
        live_defense: 2,
        eatback_defense: 2,
    };

    /// Resolve an incoming attack of the given strength
    pub fn attacked(&self, offense: i32) -> Attack {
        if self.eatback_defense > offense {
            Attack::DefenderWins
        } else if self.live_defense >= offense {
            Attack::Tie
        } else {
            Attack::AttackerWins
        }
    }
}

/// What distinguishes a muncher from a troggle
#[derive(Debug)]
pub enum PlayerKind {
    Muncher { keys: VecDeque<Key> },
    Troggle { def: TroggleDef },
}

/// Things a player's own update cannot handle and hands to the mediator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A square this player's sprite moved over needs redrawing
    Dirty(IVec2),
    /// Movement finished; resolve combat and callbacks at `pos`
    Stopped { pos: IVec2 },
    /// The disappearing animation ended; the player left the board
    Vanished,
}

#[derive(Debug)]
pub struct Player {
    pos: IVec2,
    old_pos: IVec2,
    motion: Motion,
    /// When the current motion state began
    action_start: Ms,
    chain: FoodChain,
    anim: AnimationState,
    pub kind: PlayerKind,
}

impl Player {
    pub fn muncher(channel: usize) -> Self {
        Self {
            pos: IVec2::ZERO,
            old_pos: IVec2::ZERO,
            motion: Motion::NotOnBoard,
            action_start: 0,
            chain: FoodChain::MUNCHER,
            anim: AnimationState::new(channel),
            kind: PlayerKind::Muncher {
                keys: VecDeque::new(),
            },
        }
    }

    pub fn troggle(def: TroggleDef, channel: usize) -> Self {
        Self {
            pos: IVec2::ZERO,
            old_pos: IVec2::ZERO,
            motion: Motion::NotOnBoard,
            action_start: 0,
            chain: FoodChain::TROGGLE,
            anim: AnimationState::new(channel),
            kind: PlayerKind::Troggle { def },
        }
    }

    pub fn pos(&self) -> IVec2 {
        self.pos
    }

    pub fn old_pos(&self) -> IVec2 {
        self.old_pos
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    pub fn chain(&self) -> FoodChain {
        self.chain
    }

    pub fn exists(&self) -> bool {
        self.motion != Motion::NotOnBoard
    }

    /// Accepting move/munch input. Eating is interruptible.
    pub fn is_idle(&self) -> bool {
        matches!(self.motion, Motion::Idle | Motion::Eating)
    }

    pub fn is_muncher(&self) -> bool {
        matches!(self.kind, PlayerKind::Muncher { .. })
    }

    /// Standing on `p` (a player mid-step is on neither square)
    pub fn is_at(&self, p: IVec2) -> bool {
        self.exists() && self.motion != Motion::Moving && self.pos == p
    }

    /// On `p`, or mid-step into or out of it
    pub fn is_near(&self, p: IVec2) -> bool {
        self.is_at(p)
            || (self.exists()
                && self.motion == Motion::Moving
                && (self.pos == p || self.old_pos == p))
    }

    pub fn set_anim(&mut self, anim: Arc<Animation>, now: Ms) {
        self.anim.set_anim(anim, now);
    }

    /// Pop into existence on a square
    pub fn spawn(&mut self, p: IVec2, now: Ms) {
        self.pos = p;
        self.old_pos = p;
        self.motion = Motion::Appearing;
        self.action_start = now;
        self.anim.set_dir(Direction::Down);
        self.anim.set_state(AnimKind::Appearing, now);
        if let PlayerKind::Muncher { keys } = &mut self.kind {
            // Stale input must not steer a fresh life
            keys.clear();
        }
    }

    /// Start walking from `old` to `new`. Equal squares mean a teleport,
    /// shown as popping in at the destination.
    pub fn move_to(&mut self, old: IVec2, new: IVec2, now: Ms) {
        self.action_start = now;
        if new == old {
            self.pos = new;
            self.old_pos = new;
            self.motion = Motion::Appearing;
            self.anim.set_dir(Direction::Down);
            self.anim.set_state(AnimKind::Appearing, now);
            return;
        }
        self.old_pos = old;
        self.pos = new;
        self.motion = Motion::Moving;
        self.anim.set_dir(Direction::from_delta(new - old));
        self.anim.set_state(AnimKind::Walking, now);
    }

    /// Start chewing
    pub fn munch(&mut self, now: Ms) {
        self.motion = Motion::Eating;
        self.action_start = now;
        self.anim.set_state(AnimKind::Eating, now);
    }

    /// Start dying. No-op off the board.
    pub fn die(&mut self, now: Ms) {
        if !self.exists() {
            return;
        }
        self.motion = Motion::Disappearing;
        self.action_start = now;
        self.anim.set_state(AnimKind::Disappearing, now);
    }

    /// Drive the self-transitions and report what the mediator must handle.
    /// Dirty positions may lie off the board; the caller filters.
    pub fn update(&mut self, now: Ms, settings: &GameSettings) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        if !self.exists() {
            return events;
        }

        // State transitions first: `finished` reads the frame clock that
        // `next_frame` resets.
        match self.motion {
            Motion::Moving => {
                if now.saturating_sub(self.action_start) >= settings.change_time {
                    let from = self.old_pos;
                    self.stop(now);
                    events.push(PlayerEvent::Dirty(from));
                    events.push(PlayerEvent::Dirty(self.pos));
                    events.push(PlayerEvent::Stopped { pos: self.pos });
                }
            }
            Motion::Eating => {
                if now.saturating_sub(self.action_start) >= settings.eat_time {
                    self.stop(now);
                    events.push(PlayerEvent::Dirty(self.pos));
                }
            }
            Motion::Appearing => {
                if self.anim.finished(now) {
                    self.stop(now);
                    events.push(PlayerEvent::Dirty(self.pos));
                }
            }
            Motion::Disappearing => {
                if self.anim.finished(now) {
                    self.motion = Motion::NotOnBoard;
                    events.push(PlayerEvent::Dirty(self.pos));
                    events.push(PlayerEvent::Vanished);
                }
            }
            Motion::Idle | Motion::NotOnBoard => {}
        }

        if self.exists() && self.anim.next_frame(now) {
            events.push(PlayerEvent::Dirty(self.pos));
            if self.motion == Motion::Moving {
                events.push(PlayerEvent::Dirty(self.old_pos));
            }
        }
        events
    }

    // Keeps old_pos: momentum feeds the troggle strategies.
    fn stop(&mut self, now: Ms) {
        self.motion = Motion::Idle;
        self.action_start = now;
        self.anim.set_state(AnimKind::Normal, now);
    }

    /// Milliseconds since the current motion state began
    pub fn idle_for(&self, now: Ms) -> Ms {
        now.saturating_sub(self.action_start)
    }

    /// Shift the action clock forward after a pause
    pub fn delay(&mut self, ms: Ms) {
        self.action_start += ms;
        self.anim.delay(ms);
    }

    pub fn drain_cues(&mut self) -> Vec<SoundCue> {
        self.anim.drain_cues()
    }

    /// Queue muncher input. Ignored for troggles.
    pub fn push_key(&mut self, key: Key) {
        if let PlayerKind::Muncher { keys } = &mut self.kind {
            keys.push_back(key);
        }
    }

    pub fn pop_key(&mut self) -> Option<Key> {
        match &mut self.kind {
            PlayerKind::Muncher { keys } => keys.pop_front(),
            PlayerKind::Troggle { .. } => None,
        }
    }
}
