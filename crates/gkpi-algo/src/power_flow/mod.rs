//! Reference power-flow engines.
//!
//! The utilization analysis only depends on [`gkpi_core::PowerFlowEngine`];
//! the engines here are one interchangeable implementation of it.

pub mod dc;

pub use dc::DcSecurityEngine;
