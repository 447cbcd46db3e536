//! The munching grid
//!
//! A board is W x H squares, each holding at most one interned number, plus a
//! parallel dirty grid for the renderer and a running count of good numbers.
//! `goodies` is kept incrementally consistent by funnelling every mutation
//! through [`Board::set_num`].

use std::rc::Rc;

use glam::IVec2;
use rand_pcg::Pcg32;

use crate::level::{Level, Number, NumberPool};

/// What a player finds when it munches a square
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Munch {
    Empty,
    Good,
    Bad,
}

/// One board square
#[derive(Debug, Default)]
pub struct Square {
    num: Option<Rc<Number>>,
}

impl Square {
    pub fn filled(&self) -> bool {
        self.num.is_some()
    }

    /// An empty square is safe, so it counts as good
    pub fn good(&self) -> bool {
        self.num.as_ref().is_none_or(|n| n.good())
    }
}

#[derive(Debug)]
pub struct Board {
    width: i32,
    height: i32,
    squares: Vec<Square>,
    dirty: Vec<bool>,
    goodies: i32,
}

impl Board {
    pub fn new(width: i32, height: i32) -> Self {
        let n = (width * height) as usize;
        Self {
            width,
            height,
            squares: (0..n).map(|_| Square::default()).collect(),
            dirty: vec![true; n],
            goodies: 0,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, p: IVec2) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    fn idx(&self, p: IVec2) -> usize {
        debug_assert!(self.contains(p));
        (p.y * self.width + p.x) as usize
    }

    /// Count of good numbers still on the board
    pub fn goodies(&self) -> i32 {
        self.goodies
    }

    /// Put `num` (or nothing) on a square, keeping `goodies` consistent.
    /// Returns true exactly when the good count just reached zero, which is
    /// the level-won edge.
    pub fn set_num(&mut self, p: IVec2, num: Option<Rc<Number>>) -> bool {
        let i = self.idx(p);
        let was_good = self.squares[i].num.as_ref().is_some_and(|n| n.good());
        let now_good = num.as_ref().is_some_and(|n| n.good());
        self.squares[i].num = num;
        self.dirty[i] = true;

        let before = self.goodies;
        self.goodies += now_good as i32 - was_good as i32;
        before > 0 && self.goodies == 0
    }

    /// Clear a square. Returns the win edge like [`Board::set_num`].
    pub fn unset(&mut self, p: IVec2) -> bool {
        self.set_num(p, None)
    }

    pub fn get_num(&self, p: IVec2) -> Option<Rc<Number>> {
        self.squares[self.idx(p)].num.clone()
    }

    pub fn filled(&self, p: IVec2) -> bool {
        self.squares[self.idx(p)].filled()
    }

    pub fn good(&self, p: IVec2) -> bool {
        self.squares[self.idx(p)].good()
    }

    /// What munching this square would find
    pub fn munch(&self, p: IVec2) -> Munch {
        match &self.squares[self.idx(p)].num {
            None => Munch::Empty,
            Some(n) if n.good() => Munch::Good,
            Some(_) => Munch::Bad,
        }
    }

    /// Mark a square for redraw without touching its number
    pub fn set_dirty(&mut self, p: IVec2) {
        let i = self.idx(p);
        self.dirty[i] = true;
    }

    /// Drain the squares needing redraw
    pub fn take_dirty(&mut self) -> Vec<IVec2> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let p = IVec2::new(x, y);
                let i = self.idx(p);
                if self.dirty[i] {
                    self.dirty[i] = false;
                    out.push(p);
                }
            }
        }
        out
    }

    /// Refill every square from the level for a new round. The old round's
    /// numbers are dropped and pruned first: a stale pool entry would hand
    /// back the previous round's goodness for the same text.
    pub fn reset(&mut self, level: &mut dyn Level, pool: &mut NumberPool, rng: &mut Pcg32) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_num(IVec2::new(x, y), None);
            }
        }
        pool.prune();
        for y in 0..self.height {
            for x in 0..self.width {
                let p = IVec2::new(x, y);
                let num = level.random_number(pool, rng);
                self.set_num(p, Some(num));
            }
        }
        log::debug!("board reset, {} goodies", self.goodies);
    }
}
