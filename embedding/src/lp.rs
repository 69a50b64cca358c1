// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! A small dense linear programming solver.
//!
//! Minimises `c'x` subject to linear constraints and `x >= 0` with the
//! two-phase simplex method. Pivots follow Bland's rule (lowest index
//! entering column, lowest basic index on ratio ties), so the solver cannot
//! cycle on degenerate programs.

use crate::callbacks::{ExecutionCallbacks, Progress};
use crate::error::Error;

const EPS: f64 = 1e-9;
const FEASIBILITY: f64 = 1e-7;
const PROGRESS_INTERVAL: usize = 500;

/// Default limit on simplex pivots per solve.
pub const MAX_PIVOTS: usize = 200_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    Equal,
    GreaterEq,
}

#[derive(Clone, Debug)]
struct Constraint {
    coefficients: Vec<(usize, f64)>,
    relation: Relation,
    rhs: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub objective: f64,
    pub values: Vec<f64>,
    pub pivots: usize,
}

impl Solution {
    pub fn value(&self, variable: usize) -> f64 {
        self.values[variable]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LpOutcome {
    Optimal(Solution),
    Infeasible,
    Unbounded,
    PivotLimit,
}

#[derive(Clone, Debug)]
pub struct LinearProgram {
    costs: Vec<f64>,
    constraints: Vec<Constraint>,
    max_pivots: usize,
}

impl Default for LinearProgram {
    fn default() -> Self {
        Self {
            costs: Vec::new(),
            constraints: Vec::new(),
            max_pivots: MAX_PIVOTS,
        }
    }
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a non negative variable with objective coefficient `cost` and
    /// returns its index.
    pub fn add_variable(&mut self, cost: f64) -> usize {
        self.costs.push(cost);
        self.costs.len() - 1
    }

    pub fn variable_count(&self) -> usize {
        self.costs.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Adds `sum(coefficient * variable) <relation> rhs`. Repeated variables
    /// add up.
    pub fn add_constraint(&mut self, coefficients: Vec<(usize, f64)>, relation: Relation, rhs: f64) {
        assert!(
            coefficients.iter().all(|(v, _)| *v < self.costs.len()),
            "constraint on unknown variable"
        );
        self.constraints.push(Constraint {
            coefficients,
            relation,
            rhs,
        });
    }

    pub fn set_max_pivots(&mut self, max_pivots: usize) {
        self.max_pivots = max_pivots;
    }

    pub fn solve(&self, callbacks: &mut ExecutionCallbacks) -> Result<LpOutcome, Error> {
        let mut tableau = Tableau::build(self);
        let mut pivots = 0;

        // phase 1: drive the artificial variables to zero
        let mut phase_one = vec![0.0; tableau.cols + 1];
        for col in tableau.artificial_start..tableau.cols {
            phase_one[col] = 1.0;
        }
        for row in 0..tableau.rows.len() {
            if tableau.basis[row] >= tableau.artificial_start {
                for (o, v) in phase_one.iter_mut().zip(tableau.rows[row].iter()) {
                    *o -= v;
                }
            }
        }
        let all_columns = tableau.cols;
        match tableau.optimize(&mut phase_one, all_columns, self.max_pivots, &mut pivots, callbacks)? {
            Phase::Optimal => {}
            Phase::Unbounded => return Ok(LpOutcome::Infeasible),
            Phase::PivotLimit => return Ok(LpOutcome::PivotLimit),
        }
        if -phase_one[tableau.cols] > FEASIBILITY {
            log::trace!("lp infeasible, phase one value {}", -phase_one[tableau.cols]);
            callbacks.progress(Progress::LpIterations { iterations: pivots });
            return Ok(LpOutcome::Infeasible);
        }
        tableau.evict_artificials(&mut phase_one);

        // phase 2: the real objective over the structural and slack columns
        let mut objective = vec![0.0; tableau.cols + 1];
        objective[..self.costs.len()].copy_from_slice(&self.costs);
        for row in 0..tableau.rows.len() {
            let factor = objective[tableau.basis[row]];
            if factor.abs() > EPS {
                for (o, v) in objective.iter_mut().zip(tableau.rows[row].iter()) {
                    *o -= factor * v;
                }
            }
        }
        let allowed = tableau.artificial_start;
        let phase = tableau.optimize(&mut objective, allowed, self.max_pivots, &mut pivots, callbacks)?;
        callbacks.progress(Progress::LpIterations { iterations: pivots });
        match phase {
            Phase::Optimal => {}
            Phase::Unbounded => return Ok(LpOutcome::Unbounded),
            Phase::PivotLimit => return Ok(LpOutcome::PivotLimit),
        }

        let mut values = vec![0.0; self.costs.len()];
        for (row, basic) in tableau.basis.iter().enumerate() {
            if *basic < values.len() {
                values[*basic] = tableau.rows[row][tableau.cols].max(0.0);
            }
        }
        let objective = values.iter().zip(self.costs.iter()).map(|(x, c)| x * c).sum();
        Ok(LpOutcome::Optimal(Solution {
            objective,
            values,
            pivots,
        }))
    }
}

enum Phase {
    Optimal,
    Unbounded,
    PivotLimit,
}

struct Tableau {
    // each row holds the coefficients of all columns followed by the rhs
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    cols: usize,
    artificial_start: usize,
}

impl Tableau {
    fn build(lp: &LinearProgram) -> Self {
        let structural = lp.costs.len();
        // normalise to non negative right hand sides
        let constraints = lp
            .constraints
            .iter()
            .map(|c| {
                if c.rhs < 0.0 {
                    let relation = match c.relation {
                        Relation::LessEq => Relation::GreaterEq,
                        Relation::Equal => Relation::Equal,
                        Relation::GreaterEq => Relation::LessEq,
                    };
                    let coefficients = c.coefficients.iter().map(|(v, a)| (*v, -a)).collect();
                    (coefficients, relation, -c.rhs)
                } else {
                    (c.coefficients.clone(), c.relation, c.rhs)
                }
            })
            .collect::<Vec<(Vec<(usize, f64)>, Relation, f64)>>();

        let slacks = constraints
            .iter()
            .filter(|(_, relation, _)| *relation != Relation::Equal)
            .count();
        let artificials = constraints
            .iter()
            .filter(|(_, relation, _)| *relation != Relation::LessEq)
            .count();
        let artificial_start = structural + slacks;
        let cols = artificial_start + artificials;

        let mut rows = Vec::with_capacity(constraints.len());
        let mut basis = Vec::with_capacity(constraints.len());
        let mut next_slack = structural;
        let mut next_artificial = artificial_start;
        for (coefficients, relation, rhs) in constraints {
            let mut row = vec![0.0; cols + 1];
            for (variable, a) in coefficients {
                row[variable] += a;
            }
            row[cols] = rhs;
            match relation {
                Relation::LessEq => {
                    row[next_slack] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                Relation::GreaterEq => {
                    row[next_slack] = -1.0;
                    next_slack += 1;
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
                Relation::Equal => {
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            rows.push(row);
        }
        Self {
            rows,
            basis,
            cols,
            artificial_start,
        }
    }

    fn pivot(&mut self, row: usize, col: usize, objective: &mut [f64]) {
        #[cfg(feature = "trace-simplex-pivots")]
        log::trace!("pivot row {} col {} leaving {}", row, col, self.basis[row]);
        let p = self.rows[row][col];
        for v in self.rows[row].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.rows[row].clone();
        for (r, other) in self.rows.iter_mut().enumerate() {
            if r == row {
                continue;
            }
            let factor = other[col];
            if factor.abs() > EPS {
                for (x, y) in other.iter_mut().zip(pivot_row.iter()) {
                    *x -= factor * y;
                }
                other[col] = 0.0;
            }
        }
        let factor = objective[col];
        if factor.abs() > EPS {
            for (x, y) in objective.iter_mut().zip(pivot_row.iter()) {
                *x -= factor * y;
            }
            objective[col] = 0.0;
        }
        self.basis[row] = col;
    }

    /// Runs simplex iterations on `objective`; only columns below `allowed`
    /// may enter the basis.
    fn optimize(
        &mut self,
        objective: &mut [f64],
        allowed: usize,
        max_pivots: usize,
        pivots: &mut usize,
        callbacks: &mut ExecutionCallbacks,
    ) -> Result<Phase, Error> {
        loop {
            callbacks.check_cancelled()?;
            let entering = match (0..allowed).find(|col| objective[*col] < -EPS) {
                Some(col) => col,
                None => return Ok(Phase::Optimal),
            };
            let mut leaving: Option<(usize, f64)> = None;
            for (r, row) in self.rows.iter().enumerate() {
                let a = row[entering];
                if a <= EPS {
                    continue;
                }
                let ratio = row[self.cols] / a;
                leaving = match leaving {
                    None => Some((r, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - EPS
                            || (ratio <= best_ratio + EPS && self.basis[r] < self.basis[best])
                        {
                            Some((r, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }
            let (row, _) = match leaving {
                Some(leaving) => leaving,
                None => return Ok(Phase::Unbounded),
            };
            if *pivots >= max_pivots {
                log::warn!("simplex stopped after {} pivots", pivots);
                return Ok(Phase::PivotLimit);
            }
            self.pivot(row, entering, objective);
            *pivots += 1;
            if *pivots % PROGRESS_INTERVAL == 0 {
                callbacks.progress(Progress::LpIterations { iterations: *pivots });
            }
        }
    }

    /// Replaces artificial variables left in the basis at zero level by
    /// structural or slack columns. Rows where that is impossible are
    /// redundant and keep their artificial.
    fn evict_artificials(&mut self, objective: &mut [f64]) {
        for row in 0..self.rows.len() {
            if self.basis[row] < self.artificial_start {
                continue;
            }
            if let Some(col) = (0..self.artificial_start).find(|col| self.rows[row][*col].abs() > EPS) {
                self.pivot(row, col, objective);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::CancellationToken;
    use std::sync::{Arc, Mutex};

    fn optimal(lp: &LinearProgram) -> Solution {
        match lp.solve(&mut ExecutionCallbacks::default()).unwrap() {
            LpOutcome::Optimal(solution) => solution,
            other => panic!("expected an optimum, got {:?}", other),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn test_maximize_two_variables() {
        // max x + y  s.t.  x + 2y <= 4, 3x + y <= 6
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(-1.0);
        let y = lp.add_variable(-1.0);
        lp.add_constraint(vec![(x, 1.0), (y, 2.0)], Relation::LessEq, 4.0);
        lp.add_constraint(vec![(x, 3.0), (y, 1.0)], Relation::LessEq, 6.0);
        let solution = optimal(&lp);
        assert!(close(solution.value(x), 1.6));
        assert!(close(solution.value(y), 1.2));
        assert!(close(solution.objective, -2.8));
    }

    #[test]
    fn test_equality_and_lower_bounds() {
        // min 2x + 3y  s.t.  x + y = 10, x >= 3, y >= 2, x <= 6
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(2.0);
        let y = lp.add_variable(3.0);
        lp.add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::Equal, 10.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::GreaterEq, 3.0);
        lp.add_constraint(vec![(y, 1.0)], Relation::GreaterEq, 2.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::LessEq, 6.0);
        let solution = optimal(&lp);
        assert!(close(solution.value(x), 6.0));
        assert!(close(solution.value(y), 4.0));
        assert!(close(solution.objective, 24.0));
    }

    #[test]
    fn test_negative_rhs() {
        // -x <= -2 is x >= 2
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(1.0);
        lp.add_constraint(vec![(x, -1.0)], Relation::LessEq, -2.0);
        assert!(close(optimal(&lp).value(x), 2.0));
    }

    #[test]
    fn test_redundant_equalities() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(1.0);
        let y = lp.add_variable(1.0);
        lp.add_constraint(vec![(x, 1.0), (y, 1.0)], Relation::Equal, 1.0);
        lp.add_constraint(vec![(x, 2.0), (y, 2.0)], Relation::Equal, 2.0);
        let solution = optimal(&lp);
        assert!(close(solution.value(x) + solution.value(y), 1.0));
        assert!(close(solution.objective, 1.0));
    }

    #[test]
    fn test_infeasible() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(1.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::GreaterEq, 2.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::LessEq, 1.0);
        assert_eq!(
            lp.solve(&mut ExecutionCallbacks::default()),
            Ok(LpOutcome::Infeasible)
        );
    }

    #[test]
    fn test_unbounded() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(-1.0);
        let y = lp.add_variable(0.0);
        lp.add_constraint(vec![(x, 1.0), (y, -1.0)], Relation::LessEq, 1.0);
        assert_eq!(
            lp.solve(&mut ExecutionCallbacks::default()),
            Ok(LpOutcome::Unbounded)
        );
    }

    #[test]
    fn test_pivot_limit() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(-1.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::LessEq, 1.0);
        lp.set_max_pivots(0);
        assert_eq!(
            lp.solve(&mut ExecutionCallbacks::default()),
            Ok(LpOutcome::PivotLimit)
        );
    }

    #[test]
    fn test_cancelled() {
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(-1.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::LessEq, 1.0);
        let mut callbacks = ExecutionCallbacks::default();
        let token = CancellationToken::new();
        callbacks.set_cancellation(token.clone());
        token.cancel();
        assert_eq!(lp.solve(&mut callbacks), Err(Error::Cancelled));
    }

    #[test]
    fn test_reports_iterations() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut callbacks = ExecutionCallbacks::with_observer(move |event| {
            if let Progress::LpIterations { iterations } = event {
                *sink.lock().unwrap() = Some(iterations);
            }
        });
        let mut lp = LinearProgram::new();
        let x = lp.add_variable(-1.0);
        lp.add_constraint(vec![(x, 1.0)], Relation::LessEq, 1.0);
        lp.solve(&mut callbacks).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(1));
    }
}
