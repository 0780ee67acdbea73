//! # gkpi-algo: KPI Computation for Recorded Grid Episodes
//!
//! Turns a recorded operation episode into a set of numeric KPIs.
//!
//! ## KPIs
//!
//! | KPI | Values | Source |
//! |-----|--------|--------|
//! | [`CarbonIntensityKpi`] | gCO2eq/kWh | generator energy grouped by fuel |
//! | [`TopologicalActionComplexityKpi`] | min/max/avg actions and bus changes | action log, line bus tables |
//! | [`NetworkUtilizationKpi`] | N and N-1 loading statistics | replay + security analysis |
//! | [`OperationScoreKpi`] | action counts and energy totals | action log, power tables |
//! | [`AssistantAlertAccuracyKpi`], [`TotalDecisionTimeKpi`] | placeholder zero | - |
//!
//! [`KpiRegistry::standard`] registers them in that order and
//! [`KpiRegistry::evaluate_all`] evaluates each independently: one failing
//! KPI never prevents the others from producing values.
//!
//! ## Building Blocks
//!
//! - [`actions`] - split an action payload into topological, redispatch and
//!   curtailment views and count them
//! - [`energy`] - trapezoidal energy integration over the episode time index
//! - [`replay`] - [`NetworkStateReplayer`], which pushes each step's recorded
//!   state into the network model
//! - [`utilization`] - [`UtilizationAnalysis`], the N-1 loading cube
//! - [`power_flow`] - [`DcSecurityEngine`], a linearized reference engine
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gkpi_algo::{DcSecurityEngine, KpiRegistry};
//! use gkpi_core::{EvaluationConfig, SolverKind};
//! use gkpi_io::DirectoryEpisodeStore;
//!
//! let config = EvaluationConfig::default();
//! let engine = Arc::new(DcSecurityEngine::from_kind(SolverKind::Gauss));
//! let registry = KpiRegistry::standard(&config, engine);
//! let store = DirectoryEpisodeStore::open("episodes/ep_0001")?;
//! for outcome in registry.evaluate_all(&store) {
//!     println!("{}={:?}", outcome.name, outcome.result);
//! }
//! ```

pub mod actions;
pub mod energy;
pub mod kpi;
pub mod power_flow;
pub mod replay;
#[doc(hidden)]
pub mod test_utils;
pub mod utilization;

pub use actions::{classify, count, ActionCounts, ClassifiedAction};
pub use energy::{integrate, step_durations, EnergyByAsset};
pub use kpi::{
    AssistantAlertAccuracyKpi, CarbonIntensityKpi, GridKpi, KpiOutcome, KpiRegistry,
    NetworkUtilizationKpi, OperationScoreKpi, TopologicalActionComplexityKpi,
    TotalDecisionTimeKpi,
};
pub use power_flow::DcSecurityEngine;
pub use replay::{resolve_bus, BoundAsset, NetworkStateReplayer, ReplayReport};
pub use utilization::{
    loading_ratio, RhoCube, RhoSummary, UtilizationAnalysis, UtilizationReport, UtilizationStats,
};
