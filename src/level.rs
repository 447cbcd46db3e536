//! Puzzle levels and the interned numbers they hand out
//!
//! A level owns the good/bad split for the current round and produces
//! [`Number`]s for the board. Numbers are interned by display text in a
//! [`NumberPool`] so every square showing "12" shares one allocation.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use rand::Rng;
use rand_pcg::Pcg32;

/// A number on the game board: display text, whether it is safe to eat, and
/// its integer value as a shortcut for error messages.
#[derive(Debug, PartialEq, Eq)]
pub struct Number {
    text: String,
    good: bool,
    value: i32,
}

impl Number {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn good(&self) -> bool {
        self.good
    }

    pub fn value(&self) -> i32 {
        self.value
    }
}

/// Interning pool keyed by display text. Holds weak entries; a number dies
/// when the last board square drops it.
#[derive(Debug, Default)]
pub struct NumberPool {
    entries: HashMap<String, Weak<Number>>,
}

impl NumberPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the shared number for `value`
    pub fn intern(&mut self, value: i32, good: bool) -> Rc<Number> {
        self.intern_text(&value.to_string(), good, value)
    }

    /// Fetch or create a shared number whose display text is detached from
    /// its value, as expression squares need ("3 + 4" valued 7)
    pub fn intern_text(&mut self, text: &str, good: bool, value: i32) -> Rc<Number> {
        if let Some(num) = self.entries.get(text).and_then(Weak::upgrade) {
            debug_assert_eq!(num.good, good);
            return num;
        }
        let num = Rc::new(Number {
            text: text.to_string(),
            good,
            value,
        });
        self.entries.insert(text.to_string(), Rc::downgrade(&num));
        num
    }

    /// Numbers still alive on some square
    pub fn live(&self) -> usize {
        self.entries
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Drop entries whose numbers have died
    pub fn prune(&mut self) {
        self.entries.retain(|_, w| w.strong_count() > 0);
    }
}

/// "a, b, c and d"
fn list_to_string(list: &[i32]) -> String {
    let mut s = String::new();
    for (i, n) in list.iter().enumerate() {
        if i > 0 {
            s.push_str(if i + 1 == list.len() { " and " } else { ", " });
        }
        s.push_str(&n.to_string());
    }
    s
}

/// All factors of `n`, including 1 and `n` itself, ascending
fn factors(n: i32) -> Vec<i32> {
    let mut v = vec![1];
    for i in 2..=(n / 2) {
        if n % i == 0 {
            v.push(i);
        }
    }
    if n > 1 {
        v.push(n);
    }
    v
}

fn is_prime(n: i32) -> bool {
    if n < 2 {
        return false;
    }
    let mut i = 2;
    while i * i <= n {
        if n % i == 0 {
            return false;
        }
        i += 1;
    }
    true
}

/// One puzzle type. Levels are stateful: `next_level` advances the round and
/// rebuilds the good/bad split. A fresh level has no round yet; call
/// `next_level` once before drawing numbers.
pub trait Level {
    /// A random number for an empty square, interned through the pool
    fn random_number(&mut self, pool: &mut NumberPool, rng: &mut Pcg32) -> Rc<Number>;

    /// Explanation shown when a muncher eats `num` by mistake
    fn error_message(&self, num: &Number) -> String;

    /// Advance to the next round, wrapping back to the easiest
    fn next_level(&mut self);

    /// Caption for the current round, e.g. "Multiples of 4"
    fn title(&self) -> &str;
}

/// The good/bad split shared by every listed-number level
#[derive(Debug, Default)]
struct Listed {
    good: Vec<i32>,
    bad: Vec<i32>,
}

impl Listed {
    /// Coin-flip goodness, then a uniform pick from that list
    fn random(&self, pool: &mut NumberPool, rng: &mut Pcg32) -> Rc<Number> {
        let good = rng.random::<bool>();
        let list = if good { &self.good } else { &self.bad };
        let value = list[rng.random_range(0..list.len())];
        pool.intern(value, good)
    }
}

/// Munch multiples of the round number
#[derive(Debug)]
pub struct MultipleLevel {
    cur: i32,
    min: i32,
    max: i32,
    /// Largest multiplier used when listing candidates
    max_multiplier: i32,
    listed: Listed,
    title: String,
}

impl MultipleLevel {
    pub fn new(min: i32, max: i32, max_multiplier: i32) -> Self {
        Self {
            cur: min - 1,
            min,
            max,
            max_multiplier,
            listed: Listed::default(),
            title: String::new(),
        }
    }
}

impl Default for MultipleLevel {
    fn default() -> Self {
        Self::new(2, 12, 12)
    }
}

impl Level for MultipleLevel {
    fn random_number(&mut self, pool: &mut NumberPool, rng: &mut Pcg32) -> Rc<Number> {
        self.listed.random(pool, rng)
    }

    fn error_message(&self, num: &Number) -> String {
        let mut msg = format!(
            "Oops! {} is not a multiple of {}.\n",
            num.text(),
            self.cur
        );
        if num.value() == 1 {
            msg.push_str("The only factor of 1 is itself.");
        } else {
            msg.push_str(&format!(
                "The factors of {} are {}.",
                num.text(),
                list_to_string(&factors(num.value()))
            ));
        }
        msg
    }

    fn next_level(&mut self) {
        self.cur += 1;
        if self.cur > self.max {
            self.cur = self.min;
        }
        self.listed.good.clear();
        self.listed.bad.clear();
        for i in 1..=self.cur * self.max_multiplier {
            if i % self.cur == 0 {
                self.listed.good.push(i);
            } else {
                self.listed.bad.push(i);
            }
        }
        self.title = format!("Multiples of {}", self.cur);
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// Munch factors of the round number
#[derive(Debug)]
pub struct FactorLevel {
    cur: i32,
    min: i32,
    max: i32,
    /// Skip round numbers with fewer factors than this
    min_factors: usize,
    listed: Listed,
    title: String,
}

impl FactorLevel {
    pub fn new(min: i32, max: i32, min_factors: usize) -> Self {
        Self {
            cur: min - 1,
            min,
            max,
            min_factors,
            listed: Listed::default(),
            title: String::new(),
        }
    }

    /// Four consecutive multiples of `fac`, ending near the round number
    fn nearby_multiples(&self, fac: i32) -> Vec<i32> {
        let mut t = 2 * fac;
        while t + 2 * fac < self.cur {
            t += fac;
        }
        (0..4).map(|i| t + i * fac).collect()
    }
}

impl Default for FactorLevel {
    fn default() -> Self {
        Self::new(4, 50, 3)
    }
}

impl Level for FactorLevel {
    fn random_number(&mut self, pool: &mut NumberPool, rng: &mut Pcg32) -> Rc<Number> {
        self.listed.random(pool, rng)
    }

    fn error_message(&self, num: &Number) -> String {
        format!(
            "Oops! {} is not a factor of {}.\nMultiples of {} include {}.",
            num.text(),
            self.cur,
            num.text(),
            list_to_string(&self.nearby_multiples(num.value()))
        )
    }

    fn next_level(&mut self) {
        self.cur += 1;
        while factors(self.cur).len() < self.min_factors {
            self.cur += 1;
        }
        if self.cur > self.max {
            self.cur = self.min;
        }
        self.listed.good.clear();
        self.listed.bad.clear();
        for i in 1..=self.cur {
            if self.cur % i == 0 {
                self.listed.good.push(i);
            } else {
                self.listed.bad.push(i);
            }
        }
        self.title = format!("Factors of {}", self.cur);
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// Munch prime numbers up to the round bound
#[derive(Debug)]
pub struct PrimeLevel {
    cur: i32,
    min: i32,
    max: i32,
    /// Candidates are classified incrementally as the bound grows
    max_listed: i32,
    listed: Listed,
    title: String,
}

impl PrimeLevel {
    pub fn new(min: i32, max: i32) -> Self {
        Self {
            cur: min - 1,
            min,
            max,
            max_listed: 1,
            listed: Listed::default(),
            title: String::new(),
        }
    }
}

impl Default for PrimeLevel {
    fn default() -> Self {
        Self::new(3, 50)
    }
}

impl Level for PrimeLevel {
    fn random_number(&mut self, pool: &mut NumberPool, rng: &mut Pcg32) -> Rc<Number> {
        self.listed.random(pool, rng)
    }

    fn error_message(&self, num: &Number) -> String {
        if num.value() == 1 {
            return "Oops! 1 is not a prime number.".to_string();
        }
        // Proper factors only, capped for readability
        let mut f = factors(num.value());
        f.remove(0);
        f.pop();
        f.truncate(10);
        let verb = if f.len() == 1 { "is a factor" } else { "are factors" };
        format!(
            "Oops! {} is not a prime number.\n{} {} of {}.",
            num.text(),
            list_to_string(&f),
            verb,
            num.text()
        )
    }

    fn next_level(&mut self) {
        self.cur += 1;
        while !is_prime(self.cur) {
            self.cur += 1;
        }
        if self.cur > self.max {
            self.cur = self.min;
            self.max_listed = 1;
            self.listed.good.clear();
            self.listed.bad.clear();
        }
        while self.max_listed <= self.cur {
            if is_prime(self.max_listed) {
                self.listed.good.push(self.max_listed);
            } else {
                self.listed.bad.push(self.max_listed);
            }
            self.max_listed += 1;
        }
        self.title = format!("Primes less than {}", self.cur + 1);
    }

    fn title(&self) -> &str {
        &self.title
    }
}

/// Munch expressions equal to the round number
#[derive(Debug)]
pub struct EqualityLevel {
    cur: i32,
    min: i32,
    max: i32,
    /// How far off a wrong expression's value can be
    max_error: i32,
    /// Largest subtrahend in generated subtractions
    max_sub: i32,
    /// Largest divisor in generated divisions
    max_div: i32,
    title: String,
}

impl EqualityLevel {
    pub fn new(min: i32, max: i32, max_error: i32) -> Self {
        Self {
            cur: min - 1,
            min,
            max,
            max_error,
            max_sub: 5,
            max_div: 5,
            title: String::new(),
        }
    }

    /// A random arithmetic expression evaluating to `val` (always >= 1)
    fn expression(&self, val: i32, rng: &mut Pcg32) -> String {
        match rng.random_range(0..4) {
            0 => {
                let op1 = rng.random_range(0..=val);
                format!("{op1} + {}", val - op1)
            }
            1 => {
                let op2 = rng.random_range(0..=self.max_sub);
                format!("{} \u{2212} {op2}", val + op2)
            }
            2 => {
                let f = factors(val);
                // Skip the leading 1 when a bigger factor exists
                let op1 = if f.len() > 1 {
                    f[rng.random_range(1..f.len())]
                } else {
                    1
                };
                format!("{op1} \u{00d7} {}", val / op1)
            }
            _ => {
                let op2 = rng.random_range(1..=self.max_div);
                format!("{} \u{00f7} {op2}", val * op2)
            }
        }
    }
}

impl Default for EqualityLevel {
    fn default() -> Self {
        Self::new(4, 20, 4)
    }
}

impl Level for EqualityLevel {
    fn random_number(&mut self, pool: &mut NumberPool, rng: &mut Pcg32) -> Rc<Number> {
        let (val, good) = if rng.random::<bool>() {
            (self.cur, true)
        } else {
            let err = rng.random_range(1..=self.max_error);
            let val = if rng.random::<bool>() {
                self.cur + err
            } else {
                // Stay positive; still off the round number
                (self.cur - err).max(1)
            };
            (val, false)
        };
        let expr = self.expression(val, rng);
        pool.intern_text(&expr, good, val)
    }

    fn error_message(&self, num: &Number) -> String {
        format!("Oops! {} = {}", num.text(), num.value())
    }

    fn next_level(&mut self) {
        self.cur += 1;
        if self.cur > self.max {
            self.cur = self.min;
        }
        self.title = format!("Equal to {}", self.cur);
    }

    fn title(&self) -> &str {
        &self.title
    }
}
