//! Recoverable problems found while importing a grid file.
//!
//! ```
//! use gkpi_core::diagnostics::{Diagnostics, IssueKind};
//!
//! let mut diag = Diagnostics::new();
//! diag.push(IssueKind::MissingEnergySource, "gen_1_0");
//!
//! assert_eq!(diag.len(), 1);
//! assert_eq!(diag.of_kind(IssueKind::MissingEnergySource).count(), 1);
//! ```

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Voltage level without a positive nominal voltage; its currents read as zero.
    MissingNominalVoltage,
    MissingEnergySource,
    /// Branch reactance small enough to be clamped by the DC engine.
    NegligibleReactance,
    /// Element wired to a bus the grid file does not define; left out of the model.
    UnknownBus,
}

impl IssueKind {
    fn describe(&self) -> &'static str {
        match self {
            IssueKind::MissingNominalVoltage => {
                "nominal_kv missing or non-positive; currents will be zero"
            }
            IssueKind::MissingEnergySource => "generator without energy_source",
            IssueKind::NegligibleReactance => "reactance below 1e-6 pu is clamped by the DC engine",
            IssueKind::UnknownBus => "element references an unknown bus and was skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticIssue {
    pub kind: IssueKind,
    /// Id of the offending grid element.
    pub element_id: String,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.describe(), self.element_id)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: IssueKind, element_id: &str) {
        self.issues.push(DiagnosticIssue {
            kind,
            element_id: element_id.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_element() {
        let mut diag = Diagnostics::new();
        diag.push(IssueKind::NegligibleReactance, "0_1_0");
        assert_eq!(
            diag.issues[0].to_string(),
            "reactance below 1e-6 pu is clamped by the DC engine (0_1_0)"
        );
    }

    #[test]
    fn filters_by_kind() {
        let mut diag = Diagnostics::new();
        diag.push(IssueKind::MissingNominalVoltage, "VL0");
        diag.push(IssueKind::MissingEnergySource, "gen_0_0");
        diag.push(IssueKind::MissingEnergySource, "gen_1_0");
        assert_eq!(diag.of_kind(IssueKind::MissingEnergySource).count(), 2);
        assert_eq!(diag.of_kind(IssueKind::NegligibleReactance).count(), 0);
    }
}
