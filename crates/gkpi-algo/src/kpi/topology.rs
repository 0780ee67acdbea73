//! Topological action complexity.
//!
//! Two reductions over the episode: per-step topological action counts, and
//! the step-to-step change in the number of distinct connected
//! (substation, local bus) pairs among line ends, as a percentage of all
//! addressable buses.

use std::collections::BTreeSet;

use anyhow::Result;
use gkpi_core::{AssetClass, CountMode, EpisodeStore, Quantity};

use super::{min_max_mean, GridKpi};
use crate::actions::ActionCounts;
use crate::replay::DISCONNECTED;

pub const ORIGIN_SUBSTATION: &str = "origin_substation_id";
pub const EXTREMITY_SUBSTATION: &str = "extremity_substation_id";

#[derive(Debug, Clone, Default)]
pub struct TopologicalActionComplexityKpi {
    count_mode: CountMode,
}

impl TopologicalActionComplexityKpi {
    pub fn new(count_mode: CountMode) -> Self {
        Self { count_mode }
    }
}

/// Distinct connected (substation, local bus) pairs at each of the first
/// `steps` steps. Disconnected and unrecorded ends are ignored.
pub fn connected_bus_counts(episode: &dyn EpisodeStore, steps: usize) -> Result<Vec<usize>> {
    let lines = episode.asset_table(AssetClass::Line)?;
    let or_bus = episode.series(Quantity::LineOrBus)?;
    let ex_bus = episode.series(Quantity::LineExBus)?;
    let origin = lines.attribute(ORIGIN_SUBSTATION)?;
    let extremity = lines.attribute(EXTREMITY_SUBSTATION)?;

    let steps = steps.min(or_bus.len()).min(ex_bus.len());
    let mut counts = Vec::with_capacity(steps);
    for step in 0..steps {
        let mut connected: BTreeSet<(&str, i64)> = BTreeSet::new();
        for (row, name) in lines.names.iter().enumerate() {
            for (table, substation) in [(&or_bus, &origin[row]), (&ex_bus, &extremity[row])] {
                let bus = table.value(name, step)?;
                if !bus.is_finite() || bus as i64 == DISCONNECTED {
                    continue;
                }
                connected.insert((substation.as_str(), bus as i64));
            }
        }
        counts.push(connected.len());
    }
    Ok(counts)
}

/// First differences with a leading zero.
fn deltas(counts: &[usize]) -> Vec<f64> {
    let mut out = Vec::with_capacity(counts.len());
    for (i, c) in counts.iter().enumerate() {
        if i == 0 {
            out.push(0.0);
        } else {
            out.push(*c as f64 - counts[i - 1] as f64);
        }
    }
    out
}

impl GridKpi for TopologicalActionComplexityKpi {
    fn name(&self) -> &str {
        "Topological action complexity"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["min_topo", "max_topo", "avg_topo", "min_bus", "max_bus", "avg_bus"]
    }

    fn evaluate(&self, episode: &dyn EpisodeStore) -> Result<Vec<f64>> {
        let log = episode.action_log()?;
        let metadata = episode.metadata()?;

        let counts = ActionCounts::from_log(&log, self.count_mode);
        let n_topo: Vec<f64> = counts.topological.iter().map(|n| *n as f64).collect();
        let (min_topo, max_topo, avg_topo) = min_max_mean(&n_topo);

        let n_max_bus = (metadata.n_sub * metadata.n_busbar_per_sub) as f64;
        let buses = connected_bus_counts(episode, log.live_steps())?;
        let normalized: Vec<f64> = deltas(&buses)
            .into_iter()
            .map(|d| d * 100.0 / n_max_bus)
            .collect();
        let (min_bus, max_bus, avg_bus) = min_max_mean(&normalized);

        Ok(vec![min_topo, max_topo, avg_topo, min_bus, max_bus, avg_bus])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{payload, quiet_log, series, two_bus_episode};
    use serde_json::json;

    #[test]
    fn quiet_episode_is_flat() {
        let episode = two_bus_episode(&[0.0, 300.0, 600.0]).unwrap();
        let kpi = TopologicalActionComplexityKpi::default();
        assert_eq!(kpi.evaluate(&episode).unwrap(), vec![0.0; 6]);
        assert_eq!(connected_bus_counts(&episode, 3).unwrap(), vec![2, 2, 2]);
    }

    #[test]
    fn bus_split_and_disconnection_change_the_count() {
        let time = [0.0, 300.0, 600.0];
        let mut log = quiet_log(&time);
        log.payloads[1] = payload(json!({"set_bus": {"lines_or_id": {"0": 2}}}));
        log.payloads[2] = payload(json!({
            "line_set_status": {"1": -1},
            "set_bus": {"lines_or_id": {"0": 1}}
        }));
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_series(
                Quantity::LineOrBus,
                series(&time, vec![("0_1_0", vec![1.0, 2.0, 1.0]), ("0_1_1", vec![1.0, 1.0, -1.0])])
                    .unwrap(),
            )
            .with_series(
                Quantity::LineExBus,
                series(&time, vec![("0_1_0", vec![1.0, 1.0, 1.0]), ("0_1_1", vec![1.0, 1.0, -1.0])])
                    .unwrap(),
            )
            .with_actions(log);

        // (sub 0, bus 1/2) and (sub 1, bus 1): 2 -> 3 -> 2
        assert_eq!(connected_bus_counts(&episode, 3).unwrap(), vec![2, 3, 2]);

        let v = TopologicalActionComplexityKpi::default()
            .evaluate(&episode)
            .unwrap();
        assert_eq!(&v[..3], &[0.0, 2.0, 1.0]);
        // deltas [0, 1, -1] over 4 addressable buses
        assert_eq!(v[3], -25.0);
        assert_eq!(v[4], 25.0);
        assert_eq!(v[5], 0.0);
    }

    #[test]
    fn sub_action_mode_counts_assets() {
        let time = [0.0];
        let mut log = quiet_log(&time);
        log.payloads[0] = payload(json!({"set_bus": {"lines_or_id": {"0": 2, "1": 2}}}));
        let episode = two_bus_episode(&time).unwrap().with_actions(log);
        let v = TopologicalActionComplexityKpi::new(CountMode::SubActions)
            .evaluate(&episode)
            .unwrap();
        assert_eq!(v[1], 2.0);
        let v = TopologicalActionComplexityKpi::new(CountMode::Categories)
            .evaluate(&episode)
            .unwrap();
        assert_eq!(v[1], 1.0);
    }
}
