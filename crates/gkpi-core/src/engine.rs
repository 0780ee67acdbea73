//! Capability interface of the steady-state power-flow engine.
//!
//! The utilization analysis only talks to [`PowerFlowEngine`]; any load-flow
//! implementation can be injected behind it. Divergence is reported as a
//! [`ComputationStatus`], never as an error. `Err` is reserved for failures
//! that abort the evaluation.

use crate::error::KpiResult;
use crate::network::NetworkModel;
use crate::units::Amperes;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one load-flow case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationStatus {
    Converged,
    MaxIterationReached,
    Failed,
}

impl ComputationStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, ComputationStatus::Converged)
    }
}

/// Current magnitudes measured at both ends of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BranchCurrents {
    pub i1: Amperes,
    pub i2: Amperes,
}

impl BranchCurrents {
    pub fn new(i1: f64, i2: f64) -> Self {
        Self {
            i1: Amperes(i1),
            i2: Amperes(i2),
        }
    }

    /// Larger of the two directional measurements. NaN ends count as zero.
    pub fn max(&self) -> Amperes {
        let clean = |a: Amperes| if a.0.is_nan() { 0.0 } else { a.0.abs() };
        Amperes(clean(self.i1).max(clean(self.i2)))
    }
}

/// Status and branch currents of one case (base or post-contingency).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub status: ComputationStatus,
    pub branch_currents: BTreeMap<String, BranchCurrents>,
}

impl CaseResult {
    pub fn new(status: ComputationStatus) -> Self {
        Self {
            status,
            branch_currents: BTreeMap::new(),
        }
    }

    pub fn with_current(mut self, branch_id: impl Into<String>, currents: BranchCurrents) -> Self {
        self.branch_currents.insert(branch_id.into(), currents);
        self
    }
}

/// Single-element outage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contingency {
    pub id: String,
    pub element_id: String,
}

impl Contingency {
    /// Contingency named after the branch it removes.
    pub fn branch(branch_id: impl Into<String>) -> Self {
        let id = branch_id.into();
        Self {
            element_id: id.clone(),
            id,
        }
    }
}

/// Contingencies to simulate and branches to monitor.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SecurityAnalysis {
    pub contingencies: Vec<Contingency>,
    pub monitored_branches: Vec<String>,
}

impl SecurityAnalysis {
    /// Every branch is both a contingency and a monitored element.
    pub fn n_minus_one(branch_ids: &[String]) -> Self {
        Self {
            contingencies: branch_ids.iter().map(Contingency::branch).collect(),
            monitored_branches: branch_ids.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityAnalysisResult {
    pub pre_contingency: CaseResult,
    /// Keyed by contingency id
    pub post_contingency: BTreeMap<String, CaseResult>,
}

impl SecurityAnalysisResult {
    /// Currents of a monitored branch; `None` contingency reads the base case.
    pub fn flow(&self, contingency_id: Option<&str>, branch_id: &str) -> Option<BranchCurrents> {
        let case = match contingency_id {
            None => Some(&self.pre_contingency),
            Some(id) => self.post_contingency.get(id),
        };
        case.and_then(|c| c.branch_currents.get(branch_id).copied())
    }
}

/// Steady-state solver treated as a black box.
///
/// Implementations read the setpoints already applied to the model.
pub trait PowerFlowEngine: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, network: &NetworkModel) -> KpiResult<CaseResult>;

    fn solve_with_contingencies(
        &self,
        network: &NetworkModel,
        analysis: &SecurityAnalysis,
    ) -> KpiResult<SecurityAnalysisResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_current_ignores_nan_end() {
        let c = BranchCurrents::new(f64::NAN, 120.0);
        assert_eq!(c.max().value(), 120.0);
        assert_eq!(BranchCurrents::new(-30.0, 10.0).max().value(), 30.0);
    }

    #[test]
    fn n_minus_one_covers_every_branch() {
        let ids = vec!["L1".to_string(), "L2".to_string()];
        let analysis = SecurityAnalysis::n_minus_one(&ids);
        assert_eq!(analysis.contingencies.len(), 2);
        assert_eq!(analysis.contingencies[1].element_id, "L2");
        assert_eq!(analysis.monitored_branches, ids);
    }

    #[test]
    fn flow_lookup_by_contingency_and_branch() {
        let mut post = BTreeMap::new();
        post.insert(
            "L1".to_string(),
            CaseResult::new(ComputationStatus::Converged)
                .with_current("L2", BranchCurrents::new(5.0, 6.0)),
        );
        let result = SecurityAnalysisResult {
            pre_contingency: CaseResult::new(ComputationStatus::Converged)
                .with_current("L1", BranchCurrents::new(1.0, 2.0)),
            post_contingency: post,
        };
        assert_eq!(result.flow(None, "L1").unwrap().max().value(), 2.0);
        assert_eq!(result.flow(Some("L1"), "L2").unwrap().max().value(), 6.0);
        assert!(result.flow(Some("L1"), "L1").is_none());
        assert!(result.flow(Some("L9"), "L2").is_none());
    }
}
