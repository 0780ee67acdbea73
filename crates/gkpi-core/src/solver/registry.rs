use super::backend::{FaerSolver, GaussSolver, LinearSystemBackend};
use crate::error::KpiError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Linear solvers selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Gauss,
    Faer,
}

impl FromStr for SolverKind {
    type Err = KpiError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "gauss" | "default" => Ok(SolverKind::Gauss),
            "faer" => Ok(SolverKind::Faer),
            other => Err(KpiError::Config(format!(
                "unknown solver '{}'; supported values: {}",
                other,
                SolverKind::available().join(", ")
            ))),
        }
    }
}

impl SolverKind {
    pub fn build_solver(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Arc::new(GaussSolver),
            SolverKind::Faer => Arc::new(FaerSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_kind_parsing_supports_all_engines() {
        assert_eq!("gauss".parse::<SolverKind>().unwrap(), SolverKind::Gauss);
        assert_eq!("FAER".parse::<SolverKind>().unwrap(), SolverKind::Faer);
        assert!(matches!(
            "unknown".parse::<SolverKind>(),
            Err(KpiError::Config(_))
        ));
    }

    #[test]
    fn solver_backend_options_solve_diagonal_system() {
        let matrix = vec![vec![2.0, 0.0], vec![0.0, 3.0]];
        let rhs = vec![4.0, 6.0];

        for kind in [SolverKind::Gauss, SolverKind::Faer] {
            let solver = kind.build_solver();
            let x = solver.solve(&matrix, &rhs).unwrap();
            assert!((x[0] - 2.0).abs() < 1e-12, "{}", solver.name());
            assert!((x[1] - 2.0).abs() < 1e-12, "{}", solver.name());
        }
    }

    #[test]
    fn singular_system_is_an_error_for_every_backend() {
        let matrix = vec![vec![1.0, -1.0], vec![-1.0, 1.0]];
        let rhs = vec![1.0, 1.0];

        for kind in [SolverKind::Gauss, SolverKind::Faer] {
            assert!(kind.build_solver().solve(&matrix, &rhs).is_err());
        }
    }

    #[test]
    fn mismatched_rhs_is_rejected() {
        let matrix = vec![vec![1.0]];
        assert!(GaussSolver.solve(&matrix, &[1.0, 2.0]).is_err());
    }
}
