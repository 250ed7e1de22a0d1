//! Restart strategies.
//!
//! A restart abandons the current search path and backtracks to decision
//! level 0 while keeping learned clauses, variable activities and saved
//! phases. Restarts let the solver escape regions where early decisions were
//! poor, and they are also where a portfolio worker imports clauses shared by
//! its peers.
//!
//! This module provides:
//! - The `Restarter` trait, a conflict-driven countdown to the next restart.
//! - `Luby`: intervals follow the Luby sequence `1, 1, 2, 1, 1, 2, 4, ...`
//!   scaled by a unit number of conflicts.
//! - `Geometric`: each interval is the previous one times a constant factor.
//! - `Fixed`: a restart every `unit` conflicts.
//! - `Never`: restarts disabled.
//!
//! `RestarterImpls` wraps the strategies for run-time selection and
//! `RestarterType` names them on the command line.

use clap::ValueEnum;
use std::fmt::{Debug, Display};

/// Default number of conflicts per Luby unit.
pub const DEFAULT_RESTART_UNIT: usize = 100;

/// Interface for restart strategies.
///
/// The solver calls `should_restart` once per conflict.
pub trait Restarter: Debug + Clone {
    /// Creates the strategy with `unit` conflicts as its base interval.
    fn new(unit: usize) -> Self;

    /// Conflicts remaining until the next restart.
    fn restarts_in(&self) -> usize;

    /// Counts down one conflict.
    fn increment_restarts_in(&mut self);

    /// Records a restart and schedules the next one.
    fn restart(&mut self);

    /// Total number of restarts performed so far.
    fn num_restarts(&self) -> usize;

    /// Counts a conflict and reports whether the countdown has expired.
    ///
    /// On expiry the next interval is scheduled and `true` is returned.
    fn should_restart(&mut self) -> bool {
        self.increment_restarts_in();
        if self.restarts_in() == 0 {
            self.restart();
            true
        } else {
            false
        }
    }
}

/// Restarts on the Luby schedule.
///
/// The `i`-th interval is `luby(i) * unit` conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Luby {
    unit: usize,
    /// Total number of restarts performed.
    restarts: usize,
    /// Conflicts remaining until the next restart.
    restarts_in: usize,
    /// Index of the next interval in the Luby sequence.
    restarts_next: usize,
}

impl Luby {
    /// The `x`-th element (zero-based) of the Luby sequence.
    ///
    /// Finds the smallest complete subsequence `2^k - 1` containing `x`,
    /// then descends into the repeated prefix until `x` is its last element.
    #[must_use]
    pub fn luby(mut x: usize) -> usize {
        let mut size = 1;
        let mut seq = 0;
        while size < x + 1 {
            seq += 1;
            size = 2 * size + 1;
        }
        while size - 1 != x {
            size = (size - 1) >> 1;
            seq -= 1;
            x %= size;
        }
        1 << seq
    }
}

impl Restarter for Luby {
    fn new(unit: usize) -> Self {
        let unit = unit.max(1);
        Self {
            unit,
            restarts: 0,
            restarts_in: Self::luby(0) * unit,
            restarts_next: 1,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts = self.restarts.wrapping_add(1);
        self.restarts_in = Self::luby(self.restarts_next).saturating_mul(self.unit);
        self.restarts_next = self.restarts_next.wrapping_add(1);
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

/// Growth factor of [`Geometric`] intervals, in percent.
const GEOMETRIC_FACTOR_PERCENT: usize = 150;

/// Restarts after `unit`, `1.5 * unit`, `2.25 * unit`, ... conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometric {
    restarts: usize,
    restarts_in: usize,
    restarts_interval: usize,
}

impl Restarter for Geometric {
    fn new(unit: usize) -> Self {
        let unit = unit.max(1);
        Self {
            restarts: 0,
            restarts_in: unit,
            restarts_interval: unit,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts = self.restarts.wrapping_add(1);
        self.restarts_interval = (self
            .restarts_interval
            .saturating_mul(GEOMETRIC_FACTOR_PERCENT)
            / 100)
            .max(self.restarts_interval + 1);
        self.restarts_in = self.restarts_interval;
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

/// Restarts every `unit` conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixed {
    restarts: usize,
    restarts_in: usize,
    restarts_interval: usize,
}

impl Restarter for Fixed {
    fn new(unit: usize) -> Self {
        let unit = unit.max(1);
        Self {
            restarts: 0,
            restarts_in: unit,
            restarts_interval: unit,
        }
    }

    fn restarts_in(&self) -> usize {
        self.restarts_in
    }

    fn increment_restarts_in(&mut self) {
        self.restarts_in = self.restarts_in.saturating_sub(1);
    }

    fn restart(&mut self) {
        self.restarts = self.restarts.wrapping_add(1);
        self.restarts_in = self.restarts_interval;
    }

    fn num_restarts(&self) -> usize {
        self.restarts
    }
}

/// Never restarts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Never;

impl Restarter for Never {
    fn new(_unit: usize) -> Self {
        Self
    }

    fn restarts_in(&self) -> usize {
        usize::MAX
    }

    fn increment_restarts_in(&mut self) {}

    fn restart(&mut self) {}

    fn num_restarts(&self) -> usize {
        0
    }

    fn should_restart(&mut self) -> bool {
        false
    }
}

/// Run-time selectable restart strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestarterImpls {
    Luby(Luby),
    Geometric(Geometric),
    Fixed(Fixed),
    Never(Never),
}

impl Restarter for RestarterImpls {
    fn new(unit: usize) -> Self {
        Self::Luby(Luby::new(unit))
    }

    fn restarts_in(&self) -> usize {
        match self {
            Self::Luby(r) => r.restarts_in(),
            Self::Geometric(r) => r.restarts_in(),
            Self::Fixed(r) => r.restarts_in(),
            Self::Never(r) => r.restarts_in(),
        }
    }

    fn increment_restarts_in(&mut self) {
        match self {
            Self::Luby(r) => r.increment_restarts_in(),
            Self::Geometric(r) => r.increment_restarts_in(),
            Self::Fixed(r) => r.increment_restarts_in(),
            Self::Never(r) => r.increment_restarts_in(),
        }
    }

    fn restart(&mut self) {
        match self {
            Self::Luby(r) => r.restart(),
            Self::Geometric(r) => r.restart(),
            Self::Fixed(r) => r.restart(),
            Self::Never(r) => r.restart(),
        }
    }

    fn num_restarts(&self) -> usize {
        match self {
            Self::Luby(r) => r.num_restarts(),
            Self::Geometric(r) => r.num_restarts(),
            Self::Fixed(r) => r.num_restarts(),
            Self::Never(r) => r.num_restarts(),
        }
    }

    fn should_restart(&mut self) -> bool {
        match self {
            Self::Luby(r) => r.should_restart(),
            Self::Geometric(r) => r.should_restart(),
            Self::Fixed(r) => r.should_restart(),
            Self::Never(r) => r.should_restart(),
        }
    }
}

/// Restart strategy names accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum RestarterType {
    #[default]
    Luby,
    Geometric,
    Fixed,
    Never,
}

impl Display for RestarterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Luby => write!(f, "luby"),
            Self::Geometric => write!(f, "geometric"),
            Self::Fixed => write!(f, "fixed"),
            Self::Never => write!(f, "never"),
        }
    }
}

impl RestarterType {
    #[must_use]
    pub fn to_impl(self, unit: usize) -> RestarterImpls {
        match self {
            Self::Luby => RestarterImpls::Luby(Luby::new(unit)),
            Self::Geometric => RestarterImpls::Geometric(Geometric::new(unit)),
            Self::Fixed => RestarterImpls::Fixed(Fixed::new(unit)),
            Self::Never => RestarterImpls::Never(Never::new(unit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luby_sequence() {
        let seq: Vec<usize> = (0..15).map(Luby::luby).collect();
        assert_eq!(seq, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }

    fn restart_points<R: Restarter>(mut r: R, conflicts: usize) -> Vec<usize> {
        (1..=conflicts).filter(|_| r.should_restart()).collect()
    }

    #[test]
    fn test_luby_schedule() {
        // Intervals 2, 2, 4, 2, 2, 4, 8 conflicts.
        assert_eq!(
            restart_points(Luby::new(2), 24),
            vec![2, 4, 8, 10, 12, 16, 24]
        );
    }

    #[test]
    fn test_fixed_schedule() {
        let mut r = Fixed::new(3);
        assert_eq!(restart_points(r.clone(), 10), vec![3, 6, 9]);
        for _ in 0..6 {
            r.should_restart();
        }
        assert_eq!(r.num_restarts(), 2);
    }

    #[test]
    fn test_geometric_grows() {
        assert_eq!(restart_points(Geometric::new(2), 12), vec![2, 5, 9]);
    }

    #[test]
    fn test_never() {
        assert!(restart_points(Never, 1000).is_empty());
    }

    #[test]
    fn test_impls_dispatch() {
        let r = RestarterType::Fixed.to_impl(5);
        assert_eq!(restart_points(r, 10), vec![5, 10]);
        assert_eq!(RestarterType::Geometric.to_string(), "geometric");
    }
}
