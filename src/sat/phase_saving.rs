#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Phase saving: a decision on a variable reuses the value it last had.

use crate::sat::literal::{Literal, Variable};
use bit_vec::BitVec;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SavedPhases(BitVec);

impl SavedPhases {
    /// Every phase starts positive when `seed == 0`; other seeds draw the
    /// initial phases from a seeded generator.
    #[must_use]
    pub fn new(num_vars: usize, seed: u64) -> Self {
        if seed == 0 {
            return Self(BitVec::from_elem(num_vars, true));
        }
        let mut rng = fastrand::Rng::with_seed(seed);
        Self((0..num_vars).map(|_| rng.bool()).collect())
    }

    /// Remembers the value `lit` gave its variable.
    pub fn save(&mut self, lit: Literal) {
        self.0.set(lit.variable() as usize, lit.polarity());
    }

    #[must_use]
    pub fn get(&self, var: Variable) -> bool {
        self.0.get(var as usize).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_true() {
        let phases = SavedPhases::new(3, 0);
        assert!((0..3).all(|v| phases.get(v)));
    }

    #[test]
    fn test_save_overwrites() {
        let mut phases = SavedPhases::new(3, 0);
        phases.save(Literal::negative(1));
        assert!(!phases.get(1));
        phases.save(Literal::positive(1));
        assert!(phases.get(1));
        phases.save(Literal::negative(2));
        assert!(!phases.get(2));
        assert!(phases.get(0));
    }

    #[test]
    fn test_seeded_phases_are_reproducible() {
        assert_eq!(SavedPhases::new(64, 11), SavedPhases::new(64, 11));
    }
}
