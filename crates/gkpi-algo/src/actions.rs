//! Action classification.
//!
//! A step's payload maps an action category to its parameters. Three fixed
//! category tables split it into topological, redispatch and curtailment
//! views; categories outside all three are dropped.

use gkpi_core::{ActionLog, ActionPayload, CountMode};
use serde_json::Value;

/// Bus categories that count as topological only when they address line ends.
pub const BUS_CATEGORIES: [&str; 2] = ["set_bus", "change_bus"];

/// Parameters of a bus category that address line ends.
pub const LINE_END_KEYS: [&str; 2] = ["lines_or_id", "lines_ex_id"];

pub const LINE_TOPOLOGY_CATEGORIES: [&str; 6] = [
    "line_or_set_bus",
    "line_ex_set_bus",
    "line_or_change_bus",
    "line_ex_change_bus",
    "line_set_status",
    "line_change_status",
];

pub const REDISPATCH_CATEGORIES: [&str; 2] = ["redispatch", "storage_p"];

pub const CURTAILMENT_CATEGORIES: [&str; 1] = ["curtail"];

/// Keep the listed categories present in `payload`.
fn select(payload: &ActionPayload, categories: &[&str]) -> ActionPayload {
    categories
        .iter()
        .filter_map(|c| payload.get(*c).map(|v| (c.to_string(), v.clone())))
        .collect()
}

fn addresses_line_ends(params: &Value) -> bool {
    match params {
        Value::Object(map) => LINE_END_KEYS.iter().any(|k| map.contains_key(*k)),
        Value::Array(items) => items
            .iter()
            .any(|item| LINE_END_KEYS.iter().any(|k| item.as_str() == Some(*k))),
        _ => false,
    }
}

pub fn topological_view(payload: &ActionPayload) -> ActionPayload {
    let mut view: ActionPayload = BUS_CATEGORIES
        .iter()
        .filter_map(|c| payload.get(*c).map(|v| (*c, v)))
        .filter(|(_, v)| addresses_line_ends(v))
        .map(|(c, v)| (c.to_string(), v.clone()))
        .collect();
    view.extend(select(payload, &LINE_TOPOLOGY_CATEGORIES));
    view
}

pub fn redispatch_view(payload: &ActionPayload) -> ActionPayload {
    select(payload, &REDISPATCH_CATEGORIES)
}

pub fn curtailment_view(payload: &ActionPayload) -> ActionPayload {
    select(payload, &CURTAILMENT_CATEGORIES)
}

/// The three filtered views of one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedAction {
    pub topological: ActionPayload,
    pub redispatch: ActionPayload,
    pub curtailment: ActionPayload,
}

pub fn classify(payload: &ActionPayload) -> ClassifiedAction {
    ClassifiedAction {
        topological: topological_view(payload),
        redispatch: redispatch_view(payload),
        curtailment: curtailment_view(payload),
    }
}

/// Assets addressed by one category's parameters.
///
/// Objects count their leaves, arrays count their items and scalars count one.
fn sub_actions(params: &Value) -> usize {
    match params {
        Value::Object(map) => map.values().map(sub_actions).sum(),
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}

/// Size of a filtered view under the configured counting unit.
pub fn count(view: &ActionPayload, mode: CountMode) -> usize {
    match mode {
        CountMode::Categories => view.len(),
        CountMode::SubActions => view.values().map(sub_actions).sum(),
    }
}

/// Per-step counts of each action kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub topological: Vec<usize>,
    pub redispatch: Vec<usize>,
    pub curtailment: Vec<usize>,
}

impl ActionCounts {
    pub fn from_log(log: &ActionLog, mode: CountMode) -> Self {
        let mut counts = ActionCounts::default();
        for payload in &log.payloads {
            let classified = classify(payload);
            counts.topological.push(count(&classified.topological, mode));
            counts.redispatch.push(count(&classified.redispatch, mode));
            counts.curtailment.push(count(&classified.curtailment, mode));
        }
        counts
    }

    pub fn topological_total(&self) -> usize {
        self.topological.iter().sum()
    }

    pub fn redispatch_total(&self) -> usize {
        self.redispatch.iter().sum()
    }

    pub fn curtailment_total(&self) -> usize {
        self.curtailment.iter().sum()
    }
}
