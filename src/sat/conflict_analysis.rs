#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! First-UIP conflict analysis.
//!
//! Analysis walks the trail backwards from a falsified clause, resolving
//! with reason clauses until a single literal of the conflict level is left
//! (the first unique implication point). Everything is iterative: the
//! resolution walk follows the trail, and the walk over level-0 reasons
//! used for premise tracking keeps an explicit stack.

use crate::sat::clause::ClauseLiterals;
use crate::sat::cnf::Cnf;
use crate::sat::literal::{Literal, Variable};
use crate::sat::trail::{Reason, Trail};
use bit_vec::BitVec;

/// A learned clause ready to be added to the database.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Analysis {
    /// Asserting literal at position 0; if the clause has more than one
    /// literal, position 1 holds one from the backtrack level.
    pub learnt: ClauseLiterals,
    pub backtrack_level: u32,
    pub lbd: u32,
    /// Original clause ids the learned clause follows from. Empty when
    /// premise tracking is disabled.
    pub premises: Vec<u32>,
    /// Variables seen during analysis, for activity bumping.
    pub bumped: Vec<Variable>,
    /// Clauses resolved on, for clause activity bumping.
    pub involved: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Conflict at decision level 0: the formula is unsatisfiable. Carries
    /// the original clause ids of the refutation.
    Ground(Vec<u32>),
    Learned(Analysis),
}

/// Reusable scratch state for conflict analysis.
#[derive(Debug, Clone, Default)]
pub struct Analyser {
    seen: BitVec,
    seen_ground: BitVec,
    to_clear: Vec<Variable>,
    ground_to_clear: Vec<Variable>,
    level_stamp: Vec<u64>,
    stamp: u64,
    track_premises: bool,
}

impl Analyser {
    #[must_use]
    pub fn new(num_vars: usize, track_premises: bool) -> Self {
        Self {
            seen: BitVec::from_elem(num_vars, false),
            seen_ground: BitVec::from_elem(num_vars, false),
            to_clear: Vec::new(),
            ground_to_clear: Vec::new(),
            level_stamp: vec![0; num_vars + 1],
            stamp: 0,
            track_premises,
        }
    }

    /// Analyses the conflict in clause `cref`.
    pub fn analyse(&mut self, cnf: &Cnf, trail: &Trail, cref: usize) -> Conflict {
        let dl = trail.decision_level();
        if dl == 0 {
            let lits: Vec<Literal> = cnf[cref].iter().copied().collect();
            let mut premises = cnf[cref].premises.clone();
            premises.extend(self.ground_premises(cnf, trail, &lits));
            return Conflict::Ground(normalise(premises));
        }

        let mut learnt = ClauseLiterals::new();
        learnt.push(Literal::default());
        let mut premises = Vec::new();
        let mut ground = Vec::new();
        let mut bumped = Vec::new();
        let mut involved = Vec::new();

        let mut path_c = 0usize;
        let mut p: Option<Literal> = None;
        let mut idx = trail.len();
        let mut cref = cref;

        loop {
            let clause = &cnf[cref];
            involved.push(cref);
            if self.track_premises {
                premises.extend_from_slice(&clause.premises);
            }

            let start = usize::from(p.is_some());
            for &q in clause.iter().skip(start) {
                let var = q.variable();
                if self.seen[var as usize] {
                    continue;
                }
                let level = trail.level(var);
                if level == 0 {
                    ground.push(q);
                    continue;
                }
                self.seen.set(var as usize, true);
                self.to_clear.push(var);
                bumped.push(var);
                if level >= dl {
                    path_c += 1;
                } else {
                    learnt.push(q);
                }
            }

            loop {
                idx -= 1;
                if self.seen[trail[idx].lit.variable() as usize] {
                    break;
                }
            }
            let lit = trail[idx].lit;
            p = Some(lit);
            self.seen.set(lit.variable() as usize, false);
            path_c -= 1;
            if path_c == 0 {
                break;
            }

            match trail.reason(lit.variable()) {
                Reason::Clause(next) => cref = next,
                Reason::Decision => break,
            }
        }

        if let Some(uip) = p {
            learnt[0] = uip.negated();
        }

        self.minimise(cnf, trail, &mut learnt, &mut premises, &mut ground);

        let backtrack_level = if learnt.len() == 1 {
            0
        } else {
            let (max_i, level) = learnt
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, l)| (i, trail.level(l.variable())))
                .max_by_key(|&(i, level)| (level, std::cmp::Reverse(i)))
                .unwrap_or((1, 0));
            learnt.swap(1, max_i);
            level
        };

        let lbd = self.compute_lbd(&learnt, trail);

        for var in self.to_clear.drain(..) {
            self.seen.set(var as usize, false);
        }

        if self.track_premises {
            premises.extend(self.ground_premises(cnf, trail, &ground));
        }

        Conflict::Learned(Analysis {
            learnt,
            backtrack_level,
            lbd,
            premises: normalise(premises),
            bumped,
            involved,
        })
    }

    /// Drops literals of `learnt[1..]` whose reason clause is subsumed by the
    /// rest of the learned clause.
    fn minimise(
        &self,
        cnf: &Cnf,
        trail: &Trail,
        learnt: &mut ClauseLiterals,
        premises: &mut Vec<u32>,
        ground: &mut Vec<Literal>,
    ) {
        let mut i = 1;
        while i < learnt.len() {
            let var = learnt[i].variable();
            let redundant = match trail.reason(var) {
                Reason::Decision => false,
                Reason::Clause(r) => cnf[r].iter().skip(1).all(|q| {
                    self.seen[q.variable() as usize] || trail.level(q.variable()) == 0
                }),
            };
            if redundant {
                if let Reason::Clause(r) = trail.reason(var) {
                    if self.track_premises {
                        premises.extend_from_slice(&cnf[r].premises);
                        ground.extend(
                            cnf[r]
                                .iter()
                                .skip(1)
                                .filter(|q| trail.level(q.variable()) == 0)
                                .copied(),
                        );
                    }
                }
                learnt.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Number of distinct decision levels among `lits`.
    pub fn compute_lbd(&mut self, lits: &[Literal], trail: &Trail) -> u32 {
        self.stamp += 1;
        let mut lbd = 0;
        for lit in lits {
            let level = trail.level(lit.variable()) as usize;
            if level >= self.level_stamp.len() {
                self.level_stamp.resize(level + 1, 0);
            }
            if self.level_stamp[level] != self.stamp {
                self.level_stamp[level] = self.stamp;
                lbd += 1;
            }
        }
        lbd
    }

    /// Original clause ids behind the level-0 assignments of `lits`.
    pub fn ground_premises(&mut self, cnf: &Cnf, trail: &Trail, lits: &[Literal]) -> Vec<u32> {
        if !self.track_premises {
            return Vec::new();
        }
        let mut premises = Vec::new();
        let mut stack: Vec<Variable> = lits.iter().map(|l| l.variable()).collect();

        while let Some(var) = stack.pop() {
            if self.seen_ground[var as usize] || trail.position(var).is_none() {
                continue;
            }
            self.seen_ground.set(var as usize, true);
            self.ground_to_clear.push(var);
            if let Reason::Clause(r) = trail.reason(var) {
                premises.extend_from_slice(&cnf[r].premises);
                stack.extend(cnf[r].iter().skip(1).map(|q| q.variable()));
            }
        }

        for var in self.ground_to_clear.drain(..) {
            self.seen_ground.set(var as usize, false);
        }
        premises
    }
}

fn normalise(mut premises: Vec<u32>) -> Vec<u32> {
    premises.sort_unstable();
    premises.dedup();
    premises
}
