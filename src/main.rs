//! Gnumch entry point
//!
//! Headless demo runner: loads settings, builds a seeded game and lets a
//! scripted muncher play a bounded run at 50 Hz, logging the drained events.
//! Pass `multiples`, `factors`, `primes` or `equality` to pick the puzzle.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use glam::IVec2;

use gnumch::assets::NullCatalog;
use gnumch::config::default_troggle_defs;
use gnumch::consts;
use gnumch::level::{EqualityLevel, FactorLevel, Level, MultipleLevel, PrimeLevel};
use gnumch::sim::{Board, Game, GameEvent, Key, Munch};
use gnumch::{ConfigError, GameSettings, Ms, manhattan};

/// Bounded demo run length in simulated milliseconds
const DEMO_MS: Ms = 120_000;

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ConfigError> {
    let settings = GameSettings::load(Path::new("gnumch.json"))?;
    let level: Box<dyn Level> = match std::env::args().nth(1).as_deref() {
        Some("factors") => Box::new(FactorLevel::default()),
        Some("primes") => Box::new(PrimeLevel::default()),
        Some("equality") => Box::new(EqualityLevel::default()),
        Some("multiples") | None => Box::new(MultipleLevel::default()),
        Some(other) => {
            return Err(ConfigError::InvalidSetting(format!(
                "unknown level `{other}` (expected multiples, factors, primes or equality)"
            )));
        }
    };

    let mut game = Game::new(
        settings,
        level,
        default_troggle_defs(),
        Arc::new(NullCatalog),
    )?;
    game.start_level(0);
    log::info!("playing: {}", game.level_title());

    let mut now: Ms = 0;
    while now < DEMO_MS && !game.game_over() {
        autoplay(&mut game, now);
        game.tick(now);

        let mut won = false;
        for ev in game.drain_events() {
            report(&ev);
            won |= ev == GameEvent::LevelWon;
        }
        if won {
            game.start_level(now);
        }
        now += consts::FRAME_MS;
    }

    log::info!(
        "demo ended at t={now}: score {}, lives {}",
        game.score(),
        game.lives()
    );
    Ok(())
}

/// One scripted decision per tick: respawn when dead, munch a good number
/// underfoot, otherwise step toward the nearest one.
fn autoplay(game: &mut Game, now: Ms) {
    let muncher = &game.players()[0];
    if !muncher.exists() {
        game.handle_key(Key::Spawn, now);
        return;
    }
    if !muncher.is_idle() {
        return;
    }
    let pos = muncher.pos();
    if game.board().munch(pos) == Munch::Good {
        game.handle_key(Key::Munch, now);
        return;
    }
    if let Some(target) = nearest_good(game.board(), pos) {
        let d = target - pos;
        let key = if d.x.abs() >= d.y.abs() {
            if d.x > 0 { Key::Right } else { Key::Left }
        } else if d.y > 0 {
            Key::Down
        } else {
            Key::Up
        };
        game.handle_key(key, now);
    }
}

fn nearest_good(board: &Board, from: IVec2) -> Option<IVec2> {
    let mut best: Option<(i32, IVec2)> = None;
    for y in 0..board.height() {
        for x in 0..board.width() {
            let p = IVec2::new(x, y);
            if p != from && board.munch(p) == Munch::Good {
                let d = manhattan(from, p);
                if best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, p));
                }
            }
        }
    }
    best.map(|(_, p)| p)
}

fn report(ev: &GameEvent) {
    match ev {
        GameEvent::ScoreChanged(s) => log::info!("score = {s}"),
        GameEvent::LivesChanged(l) => log::info!("lives = {l}"),
        GameEvent::LevelStarted { title } => log::info!("=== {title} ==="),
        GameEvent::Message(m) => log::info!("message: {}", m.replace('\n', " / ")),
        GameEvent::MessageTimed { text, ms } => log::info!("message ({ms}ms): {text}"),
        GameEvent::HideMessage => log::debug!("message cleared"),
        GameEvent::TrogWarning(on) => log::info!("troggle warning {}", if *on { "on" } else { "off" }),
        GameEvent::Sound(cue) => log::debug!("sound cue: {cue:?}"),
        GameEvent::LevelWon => log::info!("level cleared!"),
        GameEvent::GameOver => log::info!("game over"),
    }
}
