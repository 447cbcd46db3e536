//! The game mediator
//!
//! `Game` owns the board, the players (muncher first, troggles after, always
//! iterated in that order), the seeded RNG and the level. Every interaction
//! that touches more than one player goes through it: moves, collisions,
//! munching, spawn admission and the troggle respawn scheduler. Rendering,
//! mixing and input hardware live outside; they feed keys in and drain
//! [`GameEvent`]s out.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use glam::IVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::anim::{Animation, SoundCue};
use crate::assets::AssetCatalog;
use crate::chebyshev;
use crate::config::{AnimSpec, GameSettings};
use crate::consts;
use crate::error::ConfigError;
use crate::level::{Level, Number, NumberPool};
use crate::sim::board::{Board, Munch};
use crate::sim::player::{Attack, Key, Player, PlayerEvent, PlayerKind};
use crate::sim::troggle::{OnMove, OnStop, Surroundings, TroggleDef, spawn_entry};
use crate::Ms;

/// What happened this tick, for the outer shell to render or play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    ScoreChanged(u32),
    LivesChanged(i32),
    LevelStarted { title: String },
    Message(String),
    MessageTimed { text: String, ms: Ms },
    HideMessage,
    /// Troggle warning banner on or off
    TrogWarning(bool),
    Sound(SoundCue),
    LevelWon,
    GameOver,
}

pub struct Game {
    settings: GameSettings,
    board: Board,
    /// Muncher at index 0, troggle slots after
    players: Vec<Player>,
    level: Box<dyn Level>,
    pool: NumberPool,
    rng: Pcg32,

    score: u32,
    lives: i32,
    won: bool,
    lost: bool,

    /// Players waiting for a safe square: (player index, target)
    spawning: VecDeque<(usize, IVec2)>,

    // Troggle scheduler: dead slots waiting for their warning, then warned
    // slots waiting to walk in. Parallel deques, timestamps non-decreasing.
    trog_dead: VecDeque<usize>,
    trog_warning_times: VecDeque<Ms>,
    trog_spawning: VecDeque<usize>,
    trog_spawning_times: VecDeque<Ms>,
    warning_shown: bool,

    trog_defs: Vec<TroggleDef>,
    anims: HashMap<String, Arc<Animation>>,
    /// How many troggle species are in play
    cur_trog_types: usize,
    /// How many troggle slots are in play
    cur_num_trog: usize,
    /// Difficulty bumps every second level
    bump_next_level: bool,

    paused_at: Option<Ms>,
    events: VecDeque<GameEvent>,
}

impl Game {
    pub fn new(
        settings: GameSettings,
        level: Box<dyn Level>,
        trog_defs: Vec<TroggleDef>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        if trog_defs.is_empty() {
            return Err(ConfigError::InvalidSetting(
                "at least one troggle definition is required".into(),
            ));
        }

        let mut anims = HashMap::new();
        let muncher_anim = Arc::new(Animation::new(
            &AnimSpec::muncher_default(),
            Arc::clone(&catalog),
        )?);
        for def in &trog_defs {
            let spec = AnimSpec::troggle_default(&def.name);
            anims.insert(
                def.name.clone(),
                Arc::new(Animation::new(&spec, Arc::clone(&catalog))?),
            );
        }
        muncher_anim.load();
        for a in anims.values() {
            a.load();
        }

        let seed = settings.seed.unwrap_or_else(rand::random);
        log::info!("new game, seed {seed}");
        let mut players = vec![Player::muncher(0)];
        players[0].set_anim(muncher_anim, 0);
        for i in 0..settings.trog_number {
            players.push(Player::troggle(trog_defs[0].clone(), 1 + i));
        }

        let board = Board::new(settings.board_width, settings.board_height);
        let lives = settings.start_lives;
        Ok(Self {
            settings,
            board,
            players,
            level,
            pool: NumberPool::new(),
            rng: Pcg32::seed_from_u64(seed),
            score: 0,
            lives,
            won: false,
            lost: false,
            spawning: VecDeque::new(),
            trog_dead: VecDeque::new(),
            trog_warning_times: VecDeque::new(),
            trog_spawning: VecDeque::new(),
            trog_spawning_times: VecDeque::new(),
            warning_shown: false,
            trog_defs,
            anims,
            cur_trog_types: 0,
            cur_num_trog: 0,
            bump_next_level: false,
            paused_at: None,
            events: VecDeque::new(),
        })
    }

    // === Accessors ===

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> i32 {
        self.lives
    }

    pub fn level_won(&self) -> bool {
        self.won
    }

    pub fn game_over(&self) -> bool {
        self.lost
    }

    pub fn level_title(&self) -> &str {
        self.level.title()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Take everything that happened since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    // === Level lifecycle ===

    /// Advance the level and set the round up: difficulty bump every second
    /// level, troggles recycled into the scheduler, fresh board, muncher
    /// spawned at the origin.
    pub fn start_level(&mut self, now: Ms) {
        self.level.next_level();
        if self.bump_next_level {
            self.next_trog_level();
        }
        self.bump_next_level = !self.bump_next_level;

        self.won = false;
        self.spawning.clear();
        self.reset_troggles(now);
        self.board.reset(self.level.as_mut(), &mut self.pool, &mut self.rng);

        let title = self.level.title().to_string();
        log::info!("level started: {title}");
        self.events.push_back(GameEvent::LevelStarted { title });
        self.events
            .push_back(GameEvent::Message("Ready...".to_string()));
        self.events.push_back(GameEvent::MessageTimed {
            text: "GO!".to_string(),
            ms: 1500,
        });
        self.players[0].spawn(IVec2::ZERO, now);
    }

    /// One species and one slot more, capped by the roster and settings
    fn next_trog_level(&mut self) {
        if self.cur_trog_types < self.trog_defs.len() {
            self.cur_trog_types += 1;
        }
        if self.cur_num_trog < self.settings.trog_number {
            self.cur_num_trog += 1;
        }
        log::debug!(
            "troggle difficulty: {} slots, {} species",
            self.cur_num_trog,
            self.cur_trog_types
        );
    }

    /// Recycle every active troggle into the spawn scheduler
    fn reset_troggles(&mut self, now: Ms) {
        self.trog_dead.clear();
        self.trog_warning_times.clear();
        self.trog_spawning.clear();
        self.trog_spawning_times.clear();
        self.set_warning(false);

        for i in 0..self.cur_num_trog {
            let idx = 1 + i;
            if self.players[idx].exists() {
                self.players[idx].die(now);
            } else {
                self.troggle_next_spawn(idx, now);
            }
        }
    }

    // === Input ===

    /// Queue muncher input; it drains one key per idle tick
    pub fn handle_key(&mut self, key: Key, _now: Ms) {
        self.players[0].push_key(key);
    }

    pub fn pause(&mut self, now: Ms) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
            log::debug!("paused at {now}");
        }
    }

    /// Shift every pending timestamp by the paused duration
    pub fn resume(&mut self, now: Ms) {
        let Some(paused_at) = self.paused_at.take() else {
            return;
        };
        let delay = now.saturating_sub(paused_at);
        for t in self
            .trog_warning_times
            .iter_mut()
            .chain(self.trog_spawning_times.iter_mut())
        {
            *t += delay;
        }
        for p in &mut self.players {
            p.delay(delay);
        }
        log::debug!("resumed after {delay}ms");
    }

    // === The tick ===

    /// Advance the whole simulation to `now`
    pub fn tick(&mut self, now: Ms) {
        if self.lost || self.paused_at.is_some() {
            return;
        }

        self.handle_trog_spawns(now);
        self.try_player_spawn(now);
        self.muncher_input(now);
        self.troggle_moves(now);

        for idx in 0..self.players.len() {
            let events = self.players[idx].update(now, &self.settings);
            for ev in events {
                match ev {
                    PlayerEvent::Dirty(p) => {
                        if self.board.contains(p) {
                            self.board.set_dirty(p);
                        }
                    }
                    PlayerEvent::Stopped { pos } => self.player_stop(idx, pos, now),
                    PlayerEvent::Vanished => {
                        if !self.players[idx].is_muncher() {
                            self.troggle_next_spawn(idx, now);
                        }
                    }
                }
            }
            for cue in self.players[idx].drain_cues() {
                self.events.push_back(GameEvent::Sound(cue));
            }
        }
    }

    /// Drain one key if the muncher can act; while dead, wait for Spawn
    fn muncher_input(&mut self, now: Ms) {
        if !self.players[0].exists() {
            while let Some(key) = self.players[0].pop_key() {
                if key == Key::Spawn {
                    self.muncher_respawn(now);
                    break;
                }
            }
            return;
        }
        if !self.players[0].is_idle() {
            return;
        }
        let Some(key) = self.players[0].pop_key() else {
            return;
        };
        let pos = self.players[0].pos();
        let (w, h) = (self.board.width(), self.board.height());
        match key {
            Key::Up if pos.y > 0 => self.player_move(0, pos, pos + IVec2::new(0, -1), now),
            Key::Down if pos.y < h - 1 => self.player_move(0, pos, pos + IVec2::new(0, 1), now),
            Key::Left if pos.x > 0 => self.player_move(0, pos, pos + IVec2::new(-1, 0), now),
            Key::Right if pos.x < w - 1 => self.player_move(0, pos, pos + IVec2::new(1, 0), now),
            Key::Munch => self.player_munch(0, pos, now, false),
            _ => {}
        }
    }

    fn muncher_respawn(&mut self, _now: Ms) {
        self.events.push_back(GameEvent::HideMessage);
        if self.lives < 0 {
            self.lost = true;
            self.events.push_back(GameEvent::GameOver);
            log::info!("game over, final score {}", self.score);
            return;
        }
        self.queue_player_spawn(0, IVec2::ZERO);
    }

    /// Idle troggles whose wait has elapsed pick a destination and route it
    /// through the same move path as human input
    fn troggle_moves(&mut self, now: Ms) {
        let nearest_muncher = self.players[0]
            .exists()
            .then(|| self.players[0].pos());
        for idx in 1..self.players.len() {
            let p = &self.players[idx];
            if !p.is_idle() || p.idle_for(now) < self.settings.trog_wait {
                continue;
            }
            let PlayerKind::Troggle { def } = &p.kind else {
                continue;
            };
            let strategy = def.strategy;
            let (pos, old_pos) = (p.pos(), p.old_pos());
            let s = Surroundings {
                width: self.board.width(),
                height: self.board.height(),
                nearest_muncher,
            };
            let target = strategy.next_move(pos, old_pos, &s, &mut self.rng);
            self.player_move(idx, pos, target, now);
        }
    }

    // === Mediated player operations ===

    /// Start a player moving. A troggle already on the board fires its
    /// on-move callback (at the square it is leaving) first.
    pub fn player_move(&mut self, idx: usize, old: IVec2, new: IVec2, now: Ms) {
        log::debug!("player {idx} moving {old} -> {new} at t={now}");
        if let PlayerKind::Troggle { def } = &self.players[idx].kind {
            if def.on_move == Some(OnMove::LeaveNumber) && self.board.contains(old) {
                let num = self.level.random_number(&mut self.pool, &mut self.rng);
                self.set_num(old, Some(num));
            }
        }
        self.players[idx].move_to(old, new, now);
    }

    /// A player finished a step: walking off the board kills it, otherwise
    /// combat resolves against everyone standing on the square, then the
    /// troggle on-stop callback runs.
    pub fn player_stop(&mut self, idx: usize, pos: IVec2, now: Ms) {
        log::debug!("player {idx} stopped at {pos} t={now}");
        if !self.board.contains(pos) {
            self.players[idx].die(now);
            return;
        }

        let offense = self.players[idx].chain().offense;
        for j in 0..self.players.len() {
            if j == idx || !self.players[j].is_at(pos) {
                continue;
            }
            match self.players[j].chain().attacked(offense) {
                Attack::AttackerWins => {
                    if self.players[j].is_muncher() {
                        self.muncher_eaten(now);
                    } else {
                        self.players[j].die(now);
                    }
                    self.players[idx].munch(now);
                }
                Attack::DefenderWins => {
                    if self.players[idx].is_muncher() {
                        self.muncher_eaten(now);
                    } else {
                        self.players[idx].die(now);
                    }
                    self.players[j].munch(now);
                }
                Attack::Tie => {}
            }
        }

        let on_stop = match &self.players[idx].kind {
            PlayerKind::Troggle { def } => def.on_stop,
            PlayerKind::Muncher { .. } => None,
        };
        if on_stop == Some(OnStop::Munch) && self.players[idx].is_idle() {
            self.player_munch(idx, pos, now, true);
        }
    }

    /// Eat whatever is on the square. `immune` players chew bad numbers
    /// without consequence; everyone clears the square.
    pub fn player_munch(&mut self, idx: usize, pos: IVec2, now: Ms, immune: bool) {
        match self.board.munch(pos) {
            Munch::Empty => {}
            found @ (Munch::Good | Munch::Bad) => {
                if found == Munch::Good || immune {
                    if self.players[idx].is_muncher() {
                        self.give_points(1);
                    }
                    self.set_num(pos, None);
                    self.players[idx].munch(now);
                } else if self.players[idx].is_muncher() {
                    self.muncher_indigestion(pos, now);
                    self.set_num(pos, None);
                } else {
                    self.players[idx].die(now);
                    self.set_num(pos, None);
                }
            }
        }
    }

    /// Put a player in line for a square; it enters once no troggle is on
    /// or adjacent to it
    pub fn queue_player_spawn(&mut self, idx: usize, target: IVec2) {
        self.spawning.push_back((idx, target));
    }

    /// Admit queued spawns whose target is clear of troggles. Each admitted
    /// entry leaves the queue exactly once.
    fn try_player_spawn(&mut self, now: Ms) {
        let mut i = 0;
        while i < self.spawning.len() {
            let (idx, target) = self.spawning[i];
            let blocked = self.players.iter().enumerate().any(|(j, p)| {
                j != 0
                    && p.exists()
                    && (p.is_near(target) || chebyshev(p.pos(), target) <= 1)
            });
            if blocked {
                i += 1;
                continue;
            }
            self.spawning.remove(i);
            log::debug!("player {idx} spawning at {target}");
            self.players[idx].spawn(target, now);
        }
    }

    /// Clear or place a number, signalling the win exactly once when the
    /// last good number leaves the board
    pub fn set_num(&mut self, pos: IVec2, num: Option<Rc<Number>>) {
        if self.board.set_num(pos, num) && !self.won {
            self.won = true;
            self.events.push_back(GameEvent::LevelWon);
            log::info!("level cleared");
        }
    }

    fn give_points(&mut self, points: u32) {
        let before = self.score;
        self.score += points;
        if self.score / consts::EXTRA_LIFE_POINTS > before / consts::EXTRA_LIFE_POINTS {
            self.lives += 1;
            self.events.push_back(GameEvent::LivesChanged(self.lives));
        }
        self.events.push_back(GameEvent::ScoreChanged(self.score));
    }

    fn lose_life(&mut self, now: Ms) {
        self.lives -= 1;
        if self.lives >= 0 {
            self.events.push_back(GameEvent::LivesChanged(self.lives));
        }
        self.players[0].die(now);
    }

    fn muncher_eaten(&mut self, now: Ms) {
        self.events.push_back(GameEvent::Message(
            "You were eaten by a Troggle.\nPress <Return> to continue.".to_string(),
        ));
        self.lose_life(now);
    }

    /// The error message reads the number, so it is built before the square
    /// is cleared
    fn muncher_indigestion(&mut self, pos: IVec2, now: Ms) {
        let mut msg = match self.board.get_num(pos) {
            Some(num) => self.level.error_message(&num),
            None => String::new(),
        };
        msg.push_str("\nPress <Return> to continue.");
        self.events.push_back(GameEvent::Message(msg));
        self.lose_life(now);
    }

    // === Troggle scheduler ===

    /// Book a dead troggle slot for a future respawn, keeping the warning
    /// times non-decreasing by staggering entries behind the last one
    pub fn troggle_next_spawn(&mut self, idx: usize, now: Ms) {
        let delay = self
            .rng
            .random_range(self.settings.trog_spawn_min..self.settings.trog_spawn_max);
        let slots = (self.players.len() - 1).max(1) as Ms;
        let at = match self.trog_warning_times.back() {
            None => now + delay,
            Some(&back) => back + delay / slots,
        };
        self.trog_dead.push_back(idx);
        self.trog_warning_times.push_back(at);
        log::debug!("troggle {idx} respawn warning at t={at}");
    }

    /// Move due dead slots into the warning phase (assigning them a random
    /// species), drive the warning banner, and walk due warned slots in
    /// from a random edge
    fn handle_trog_spawns(&mut self, now: Ms) {
        debug_assert_eq!(self.trog_dead.len(), self.trog_warning_times.len());
        debug_assert_eq!(self.trog_spawning.len(), self.trog_spawning_times.len());

        while let Some(&time) = self.trog_warning_times.front() {
            if time > now {
                break;
            }
            self.trog_warning_times.pop_front();
            let Some(idx) = self.trog_dead.pop_front() else {
                break;
            };
            let def = self.random_troggle();
            log::debug!("troggle {idx} warned as {}", def.name);
            if let Some(anim) = self.anims.get(&def.name) {
                self.players[idx].set_anim(Arc::clone(anim), time);
            }
            self.players[idx].kind = PlayerKind::Troggle { def };
            self.trog_spawning.push_back(idx);
            self.trog_spawning_times
                .push_back(time + self.settings.trog_warn);
        }

        let warn = !self.trog_spawning_times.is_empty();
        self.set_warning(warn);

        while let Some(&time) = self.trog_spawning_times.front() {
            if time > now {
                break;
            }
            self.trog_spawning_times.pop_front();
            let Some(idx) = self.trog_spawning.pop_front() else {
                break;
            };
            let (outside, edge) =
                spawn_entry(self.board.width(), self.board.height(), &mut self.rng);
            self.player_move(idx, outside, edge, time);
        }
    }

    fn random_troggle(&mut self) -> TroggleDef {
        let types = self.cur_trog_types.max(1);
        self.trog_defs[self.rng.random_range(0..types)].clone()
    }

    fn set_warning(&mut self, on: bool) {
        if self.warning_shown != on {
            self.warning_shown = on;
            self.events.push_back(GameEvent::TrogWarning(on));
        }
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("score", &self.score)
            .field("lives", &self.lives)
            .field("goodies", &self.board.goodies())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NullCatalog;
    use crate::level::MultipleLevel;
    use crate::sim::player::{FoodChain, Motion};

    fn test_settings() -> GameSettings {
        GameSettings {
            seed: Some(99),
            ..GameSettings::default()
        }
    }

    fn game() -> Game {
        Game::new(
            test_settings(),
            Box::new(MultipleLevel::default()),
            crate::config::default_troggle_defs(),
            Arc::new(NullCatalog),
        )
        .unwrap()
    }

    /// Run ticks until `t`, 20ms apart like the real loop
    fn run_until(g: &mut Game, from: Ms, to: Ms) {
        let mut t = from;
        while t <= to {
            g.tick(t);
            t += consts::FRAME_MS;
        }
    }

    #[test]
    fn test_start_level_spawns_muncher_at_origin() {
        let mut g = game();
        g.start_level(0);
        assert!(g.players()[0].exists());
        assert_eq!(g.players()[0].pos(), IVec2::ZERO);
        let events = g.drain_events();
        assert!(matches!(events[0], GameEvent::LevelStarted { .. }));
        assert_eq!(g.lives(), 3);
    }

    #[test]
    fn test_good_munch_scores_and_clears() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);
        assert_eq!(g.players()[0].motion(), Motion::Idle);

        let pos = g.players()[0].pos();
        let mut pool = NumberPool::new();
        g.set_num(pos, Some(pool.intern(4, true)));
        g.drain_events();

        g.handle_key(Key::Munch, 2000);
        g.tick(2020);
        assert_eq!(g.score(), 1);
        assert!(!g.board().filled(pos));
        assert_eq!(g.players()[0].motion(), Motion::Eating);
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::ScoreChanged(1)));

        // Chewing lasts exactly eat_time
        let eat = g.settings().eat_time;
        g.tick(2020 + eat - consts::FRAME_MS);
        assert_eq!(g.players()[0].motion(), Motion::Eating);
        g.tick(2020 + eat);
        assert_eq!(g.players()[0].motion(), Motion::Idle);
    }

    #[test]
    fn test_bad_munch_costs_a_life_with_explanation() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);

        let pos = g.players()[0].pos();
        let mut pool = NumberPool::new();
        g.set_num(pos, Some(pool.intern(7, false)));
        g.drain_events();

        g.handle_key(Key::Munch, 2000);
        g.tick(2020);
        assert_eq!(g.lives(), 2);
        assert!(!g.board().filled(pos));
        assert_eq!(g.players()[0].motion(), Motion::Disappearing);
        let events = g.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Message(m) if m.starts_with("Oops! 7 is not a multiple of 2.")
        )));
        assert!(events.contains(&GameEvent::LivesChanged(2)));
    }

    #[test]
    fn test_troggle_eats_muncher_on_collision() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);
        let pos = g.players()[0].pos();
        g.drain_events();

        // Walk a troggle onto the muncher's square
        g.player_move(1, pos + IVec2::new(1, 0), pos, 2000);
        let arrive = 2000 + g.settings().change_time;
        run_until(&mut g, 2020, arrive + 20);

        assert_eq!(g.lives(), 2);
        assert_eq!(g.players()[0].motion(), Motion::Disappearing);
        assert_eq!(g.players()[1].motion(), Motion::Eating);
        let events = g.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::Message(m) if m.starts_with("You were eaten")
        )));
    }

    #[test]
    fn test_combat_outcome_matches_either_initiator() {
        // The muncher loses this pairing whichever side walks in
        let m = FoodChain::MUNCHER;
        let t = FoodChain::TROGGLE;
        assert_eq!(m.attacked(t.offense), Attack::AttackerWins);
        assert_eq!(t.attacked(m.offense), Attack::DefenderWins);
    }

    #[test]
    fn test_spawn_admission_waits_for_clear_square() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);

        // Park a troggle next to the target square
        g.player_move(1, IVec2::new(2, 1), IVec2::new(1, 1), 2000);
        let arrive = 2000 + g.settings().change_time;
        run_until(&mut g, 2020, arrive + 20);
        assert!(g.players()[1].is_at(IVec2::new(1, 1)));

        g.queue_player_spawn(0, IVec2::ZERO);
        g.players[0].die(arrive + 20);
        run_until(&mut g, arrive + 40, arrive + 2000);
        // Adjacent troggle blocks the spawn
        assert!(!g.players()[0].exists());

        // Clear the troggle out and the spawn goes through, once
        g.players[1].die(arrive + 2000);
        run_until(&mut g, arrive + 2020, arrive + 4000);
        assert!(g.players()[0].exists());
        assert!(g.spawning.is_empty());
    }

    #[test]
    fn test_win_signal_fires_once() {
        let mut g = game();
        g.start_level(0);
        let mut pool = NumberPool::new();

        // Strip the board down to a single good number
        for y in 0..g.board().height() {
            for x in 0..g.board().width() {
                g.set_num(IVec2::new(x, y), None);
            }
        }
        assert!(!g.level_won());
        g.set_num(IVec2::new(3, 3), Some(pool.intern(4, true)));
        g.drain_events();

        g.set_num(IVec2::new(3, 3), None);
        assert!(g.level_won());
        let events = g.drain_events();
        assert_eq!(
            events.iter().filter(|e| **e == GameEvent::LevelWon).count(),
            1
        );

        // Further clears stay quiet
        g.set_num(IVec2::new(2, 2), Some(pool.intern(6, true)));
        g.set_num(IVec2::new(2, 2), None);
        assert!(!g.drain_events().contains(&GameEvent::LevelWon));
    }

    #[test]
    fn test_extra_life_every_fifty_points() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);
        let pos = g.players()[0].pos();
        let mut pool = NumberPool::new();
        g.drain_events();

        for _ in 0..consts::EXTRA_LIFE_POINTS {
            g.set_num(pos, Some(pool.intern(4, true)));
            g.player_munch(0, pos, 2000, false);
        }
        assert_eq!(g.score(), 50);
        assert_eq!(g.lives(), 4);
        assert!(g.drain_events().contains(&GameEvent::LivesChanged(4)));
    }

    #[test]
    fn test_scheduler_times_stay_ordered() {
        let mut g = game();
        // Several levels in, all slots cycle through the scheduler
        g.start_level(0);
        g.troggle_next_spawn(1, 1000);
        g.troggle_next_spawn(2, 1000);
        g.troggle_next_spawn(3, 1200);
        g.troggle_next_spawn(1, 1500);

        assert_eq!(g.trog_dead.len(), g.trog_warning_times.len());
        let times: Vec<Ms> = g.trog_warning_times.iter().copied().collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]), "{times:?}");
    }

    #[test]
    fn test_warning_banner_precedes_spawn() {
        let mut g = game();
        g.start_level(0);
        g.drain_events();
        g.troggle_next_spawn(1, 0);
        let warn_at = g.trog_warning_times[0];

        run_until(&mut g, 0, warn_at + consts::FRAME_MS);
        assert!(g.drain_events().contains(&GameEvent::TrogWarning(true)));
        assert!(!g.players()[1].exists());

        let spawn_deadline = warn_at + g.settings().trog_warn + consts::FRAME_MS;
        run_until(&mut g, warn_at, spawn_deadline);
        let events = g.drain_events();
        assert!(events.contains(&GameEvent::TrogWarning(false)));
        // Walking in from the edge
        assert!(g.players()[1].exists());
        assert_eq!(g.players()[1].motion(), Motion::Moving);
    }

    #[test]
    fn test_pause_shifts_pending_times() {
        let mut g = game();
        g.start_level(0);
        g.troggle_next_spawn(1, 0);
        let before = g.trog_warning_times[0];

        g.pause(1000);
        // Ticks while paused change nothing
        g.tick(before + 1000);
        assert!(!g.players()[1].exists());
        g.resume(3000);
        assert_eq!(g.trog_warning_times.front().copied(), Some(before + 2000));
    }

    #[test]
    fn test_game_over_after_last_life() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);
        g.lives = 0;

        let pos = g.players()[0].pos();
        let mut pool = NumberPool::new();
        g.set_num(pos, Some(pool.intern(7, false)));
        g.player_munch(0, pos, 2000, false);
        assert_eq!(g.lives(), -1);
        // Let the muncher finish disappearing, then ask to respawn
        run_until(&mut g, 2020, 4000);
        g.handle_key(Key::Spawn, 4000);
        g.tick(4020);
        assert!(g.game_over());
        assert!(g.drain_events().contains(&GameEvent::GameOver));
    }

    #[test]
    fn test_worker_troggle_leaves_number_behind() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);

        let worker = TroggleDef {
            name: "worker".into(),
            strategy: crate::sim::troggle::Strategy::Random,
            on_move: Some(OnMove::LeaveNumber),
            on_stop: None,
        };
        g.players[1].kind = PlayerKind::Troggle { def: worker };
        // Walk it in from off the board first: no number left behind
        g.player_move(1, IVec2::new(-1, 2), IVec2::new(0, 2), 2000);
        let arrive = 2000 + g.settings().change_time;
        run_until(&mut g, 2020, arrive + 20);

        g.set_num(IVec2::new(0, 2), None);
        // A move from an on-board square drops a number on it
        let t = arrive + 100;
        g.player_move(1, IVec2::new(0, 2), IVec2::new(1, 2), t);
        assert!(g.board().filled(IVec2::new(0, 2)));
    }

    #[test]
    fn test_helper_troggle_munches_where_it_stops() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);

        let helper = TroggleDef {
            name: "helper".into(),
            strategy: crate::sim::troggle::Strategy::Random,
            on_move: None,
            on_stop: Some(OnStop::Munch),
        };
        g.players[1].kind = PlayerKind::Troggle { def: helper };
        let target = IVec2::new(4, 4);
        let mut pool = NumberPool::new();
        g.set_num(target, Some(pool.intern(7, false)));

        g.player_move(1, target + IVec2::new(1, 0), target, 2000);
        let arrive = 2000 + g.settings().change_time;
        run_until(&mut g, 2020, arrive + 20);
        // Immune to the bad number, and the square is cleared
        assert!(!g.board().filled(target));
        assert_eq!(g.players()[1].motion(), Motion::Eating);
        assert_eq!(g.score(), 0);
    }

    #[test]
    fn test_helper_still_munches_while_chewing_its_victim() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);

        let helper = TroggleDef {
            name: "helper".into(),
            strategy: crate::sim::troggle::Strategy::Random,
            on_move: None,
            on_stop: Some(OnStop::Munch),
        };
        g.players[1].kind = PlayerKind::Troggle { def: helper };
        let pos = g.players()[0].pos();
        let mut pool = NumberPool::new();
        g.set_num(pos, Some(pool.intern(7, false)));
        g.drain_events();

        // Stop on the muncher's square: combat puts the helper in Eating,
        // which still counts as able to act, so the square is eaten too
        g.player_move(1, pos + IVec2::new(0, 1), pos, 2000);
        let arrive = 2000 + g.settings().change_time;
        run_until(&mut g, 2020, arrive + 20);

        assert_eq!(g.lives(), 2);
        assert_eq!(g.players()[0].motion(), Motion::Disappearing);
        assert_eq!(g.players()[1].motion(), Motion::Eating);
        assert!(!g.board().filled(pos));
    }

    #[test]
    fn test_spawn_admission_waits_for_troggle_mid_move() {
        let mut g = game();
        g.start_level(0);
        run_until(&mut g, 0, 2000);

        // Free the target square and queue the respawn
        g.players[0].die(2000);
        run_until(&mut g, 2020, 2400);
        assert!(!g.players()[0].exists());
        g.queue_player_spawn(0, IVec2::ZERO);

        // Troggle stepping into the target: blocked while in flight
        g.player_move(1, IVec2::new(0, 1), IVec2::ZERO, 2400);
        g.tick(2500);
        assert!(!g.players()[0].exists());

        // Arrived on the target: still blocked
        run_until(&mut g, 2520, 2720);
        assert!(g.players()[1].is_at(IVec2::ZERO));
        assert!(!g.players()[0].exists());

        // Stepping out of the target: the move still straddles it
        g.player_move(1, IVec2::ZERO, IVec2::new(1, 0), 2720);
        g.tick(2740);
        assert!(!g.players()[0].exists());

        // Parked next door: adjacency still blocks
        run_until(&mut g, 2760, 3040);
        assert!(g.players()[1].is_at(IVec2::new(1, 0)));
        assert!(!g.players()[0].exists());

        // Two squares away mid-move: admitted at last, exactly once
        g.player_move(1, IVec2::new(1, 0), IVec2::new(2, 0), 3040);
        g.tick(3060);
        assert!(g.players()[0].exists());
        assert!(g.spawning.is_empty());
    }

    #[test]
    fn test_deterministic_for_a_seed() {
        let run = || {
            let mut g = game();
            g.start_level(0);
            for i in 1..200u64 {
                if i % 17 == 0 {
                    g.handle_key(Key::Right, i * consts::FRAME_MS);
                }
                if i % 23 == 0 {
                    g.handle_key(Key::Munch, i * consts::FRAME_MS);
                }
                g.tick(i * consts::FRAME_MS);
            }
            (g.score(), g.lives(), g.players()[0].pos())
        };
        assert_eq!(run(), run());
    }
}
