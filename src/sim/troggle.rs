//! Troggle AI: movement strategies and scripted callbacks
//!
//! Strategies are pure: they read the troggle's position and momentum plus a
//! snapshot of its surroundings and produce a candidate destination. The
//! destination goes through the same mediator path as human input, so a
//! troggle can happily march off the board and die.

use glam::IVec2;
use rand::Rng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// How a troggle picks its next square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Keep walking the way it came
    Straight,
    /// Half the time straight, otherwise turn left or right
    Random,
    /// Home in on the nearest muncher
    Chase,
    /// Avoid a nearby muncher
    Flee,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Straight => "straight",
            Strategy::Random => "random",
            Strategy::Chase => "chase",
            Strategy::Flee => "flee",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "straight" => Some(Strategy::Straight),
            "random" => Some(Strategy::Random),
            "chase" => Some(Strategy::Chase),
            "flee" | "run" => Some(Strategy::Flee),
            _ => None,
        }
    }
}

/// Fired through the mediator when the troggle starts a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnMove {
    /// Drop a fresh number on the square being left
    LeaveNumber,
}

/// Fired through the mediator after the troggle arrives and combat resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnStop {
    /// Eat whatever is on the square (troggles are immune to bad numbers)
    Munch,
}

/// One troggle species: skin plus behavior. The scheduler assigns a random
/// def to a slot just before its warning phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TroggleDef {
    /// Species name, also the sprite sheet prefix
    pub name: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub on_move: Option<OnMove>,
    #[serde(default)]
    pub on_stop: Option<OnStop>,
}

/// Read-only snapshot a strategy decides from
#[derive(Debug, Clone, Copy)]
pub struct Surroundings {
    pub width: i32,
    pub height: i32,
    /// Nearest existing muncher by Manhattan distance
    pub nearest_muncher: Option<IVec2>,
}

fn straight(pos: IVec2, old: IVec2) -> IVec2 {
    2 * pos - old
}

fn random_walk(pos: IVec2, old: IVec2, rng: &mut Pcg32) -> IVec2 {
    if rng.random::<bool>() {
        straight(pos, old)
    } else {
        let d = pos - old;
        if rng.random::<bool>() {
            pos + IVec2::new(-d.y, -d.x)
        } else {
            pos + IVec2::new(d.y, d.x)
        }
    }
}

/// One step toward (`sign` = -1) or away from (`sign` = 1) the muncher,
/// along the axis with the larger gap, coin flip on ties.
fn step_about(pos: IVec2, m: IVec2, sign: i32, rng: &mut Pcg32) -> IVec2 {
    let d = (pos - m).abs();
    let toward = if d.x > d.y || (d.x == d.y && rng.random::<bool>()) {
        IVec2::new(if pos.x > m.x { -1 } else { 1 }, 0)
    } else {
        IVec2::new(0, if pos.y > m.y { -1 } else { 1 })
    };
    pos - sign * toward
}

impl Strategy {
    /// Candidate destination. May lie off the board.
    pub fn next_move(
        self,
        pos: IVec2,
        old_pos: IVec2,
        s: &Surroundings,
        rng: &mut Pcg32,
    ) -> IVec2 {
        match self {
            Strategy::Straight => straight(pos, old_pos),
            Strategy::Random => random_walk(pos, old_pos, rng),
            Strategy::Chase => match s.nearest_muncher {
                Some(m) => {
                    let d = (pos - m).abs();
                    if d.x <= s.width / 2 && d.y <= s.height / 2 {
                        step_about(pos, m, -1, rng)
                    } else {
                        straight(pos, old_pos)
                    }
                }
                None => straight(pos, old_pos),
            },
            Strategy::Flee => match s.nearest_muncher {
                Some(m) => {
                    let d = (pos - m).abs();
                    if d.x <= 2 && d.y <= 2 {
                        step_about(pos, m, 1, rng)
                    } else {
                        random_walk(pos, old_pos, rng)
                    }
                }
                None => random_walk(pos, old_pos, rng),
            },
        }
    }
}

/// Pick a random board edge to enter from. Returns the off-board square the
/// troggle walks in from and the edge square it lands on.
pub fn spawn_entry(width: i32, height: i32, rng: &mut Pcg32) -> (IVec2, IVec2) {
    if rng.random::<bool>() {
        let x = rng.random_range(0..width);
        if rng.random::<bool>() {
            (IVec2::new(x, -1), IVec2::new(x, 0))
        } else {
            (IVec2::new(x, height), IVec2::new(x, height - 1))
        }
    } else {
        let y = rng.random_range(0..height);
        if rng.random::<bool>() {
            (IVec2::new(-1, y), IVec2::new(0, y))
        } else {
            (IVec2::new(width, y), IVec2::new(width - 1, y))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manhattan;
    use rand::SeedableRng;

    fn rng() -> Pcg32 {
        Pcg32::seed_from_u64(42)
    }

    fn surroundings(m: Option<IVec2>) -> Surroundings {
        Surroundings {
            width: 6,
            height: 6,
            nearest_muncher: m,
        }
    }

    #[test]
    fn test_straight_keeps_momentum() {
        let mut r = rng();
        let pos = IVec2::new(3, 3);
        let old = IVec2::new(2, 3);
        let next = Strategy::Straight.next_move(pos, old, &surroundings(None), &mut r);
        assert_eq!(next, IVec2::new(4, 3));
    }

    #[test]
    fn test_random_stays_one_step_away() {
        let mut r = rng();
        let pos = IVec2::new(3, 3);
        let old = IVec2::new(3, 2);
        for _ in 0..50 {
            let next = Strategy::Random.next_move(pos, old, &surroundings(None), &mut r);
            assert_eq!(manhattan(pos, next), 1, "bad step to {next}");
        }
    }

    #[test]
    fn test_chase_closes_in_when_near() {
        let mut r = rng();
        let pos = IVec2::new(4, 4);
        let m = IVec2::new(2, 4);
        for _ in 0..20 {
            let next =
                Strategy::Chase.next_move(pos, IVec2::new(4, 3), &surroundings(Some(m)), &mut r);
            assert!(manhattan(next, m) < manhattan(pos, m));
        }
    }

    #[test]
    fn test_chase_goes_straight_when_far() {
        let mut r = rng();
        // Muncher more than half the board away on x
        let next = Strategy::Chase.next_move(
            IVec2::new(5, 0),
            IVec2::new(5, 1),
            &surroundings(Some(IVec2::new(1, 5))),
            &mut r,
        );
        assert_eq!(next, IVec2::new(5, -1));
    }

    #[test]
    fn test_flee_backs_off_when_close() {
        let mut r = rng();
        let pos = IVec2::new(3, 3);
        let m = IVec2::new(2, 3);
        for _ in 0..20 {
            let next =
                Strategy::Flee.next_move(pos, IVec2::new(3, 2), &surroundings(Some(m)), &mut r);
            assert!(manhattan(next, m) > manhattan(pos, m));
        }
    }

    #[test]
    fn test_spawn_entry_lands_on_an_edge() {
        let mut r = rng();
        for _ in 0..100 {
            let (outside, edge) = spawn_entry(6, 6, &mut r);
            assert!(edge.x >= 0 && edge.x < 6 && edge.y >= 0 && edge.y < 6);
            assert!(edge.x == 0 || edge.x == 5 || edge.y == 0 || edge.y == 5);
            assert!(outside.x < 0 || outside.x >= 6 || outside.y < 0 || outside.y >= 6);
            assert_eq!(manhattan(outside, edge), 1);
        }
    }

    #[test]
    fn test_strategy_names_round_trip() {
        for s in [
            Strategy::Straight,
            Strategy::Random,
            Strategy::Chase,
            Strategy::Flee,
        ] {
            assert_eq!(Strategy::from_str(s.as_str()), Some(s));
        }
        assert_eq!(Strategy::from_str("run"), Some(Strategy::Flee));
        assert_eq!(Strategy::from_str("zigzag"), None);
    }
}
