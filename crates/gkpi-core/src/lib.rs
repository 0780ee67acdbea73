//! # gkpi-core: Episode and Network Model Core
//!
//! Data structures shared by every gkpi crate: the recorded episode, the
//! bus-breaker network model replayed step by step, and the capability
//! interface of the power-flow engine that solves it.
//!
//! ## Design Philosophy
//!
//! - An **episode** is immutable: asset tables, time series aligned on one
//!   time index, and a per-step action log with a termination flag.
//! - The **network model** is the only mutable object of an evaluation. It is
//!   owned by one evaluation and updated in place once per step.
//! - The **power-flow engine** is a black box behind [`PowerFlowEngine`];
//!   non-convergence is a status, not an error.
//!
//! ## Quick Start
//!
//! ```rust
//! use gkpi_core::*;
//!
//! let time = vec![0.0, 3600.0, 7200.0];
//! let gen_p = TimeSeriesTable::new(time, vec![("gen_0".into(), vec![10.0; 3])]).unwrap();
//!
//! let episode = InMemoryEpisode::new()
//!     .with_assets(AssetClass::Generator, AssetTable::new(AssetClass::Generator, vec!["gen_0".into()]))
//!     .with_series(Quantity::GenP, gen_p);
//!
//! assert_eq!(episode.series(Quantity::GenP).unwrap().len(), 3);
//! ```
//!
//! ## Modules
//!
//! - [`episode`] - Episode tables, action log, metadata and the [`EpisodeStore`] trait
//! - [`network`] - Bus-breaker [`NetworkModel`] and per-step setpoints
//! - [`engine`] - [`PowerFlowEngine`] capability and security-analysis results
//! - [`graph_utils`] - Energized bus graph and islands
//! - [`solver`] - Dense linear solvers for reference engines
//! - [`config`] - TOML evaluation settings
//! - [`diagnostics`] - Recoverable grid import issues

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod episode;
pub mod error;
pub mod graph_utils;
pub mod network;
pub mod solver;
pub mod units;

pub use config::{CountMode, EvaluationConfig};
pub use diagnostics::{DiagnosticIssue, Diagnostics, IssueKind};
pub use engine::{
    BranchCurrents, CaseResult, ComputationStatus, Contingency, PowerFlowEngine,
    SecurityAnalysis, SecurityAnalysisResult,
};
pub use episode::{
    ActionLog, ActionPayload, AssetClass, AssetTable, EpisodeMetadata, EpisodeStore,
    InMemoryEpisode, Quantity, TimeSeriesTable,
};
pub use error::{KpiError, KpiResult};
pub use network::{
    Battery, BatterySetpoint, Branch, BranchKind, BranchSetpoint, Bus, BusAssignment, Generator,
    GeneratorSetpoint, IdResolution, Load, LoadSetpoint, NetworkModel, Setpoints, Terminal,
    VoltageLevel,
};
pub use solver::{FaerSolver, GaussSolver, LinearSystemBackend, SolverKind};
pub use units::{Amperes, Hours, Kilovolts, Megavars, MegawattHours, Megawatts};
