//! Network state replay.
//!
//! Rebuilds the per-asset setpoints of one recorded step and applies them to
//! the network model in place. Asset identities are resolved once, when the
//! replayer is built; the recorded tables are then read by asset name.

use std::collections::BTreeMap;
use std::sync::Arc;

use gkpi_core::{
    ActionLog, AssetClass, BatterySetpoint, BranchSetpoint, BusAssignment, EpisodeStore,
    GeneratorSetpoint, IdResolution, Kilovolts, KpiError, KpiResult, LoadSetpoint, Megavars,
    Megawatts, NetworkModel, Quantity, Setpoints, TimeSeriesTable,
};
use tracing::{debug, warn};

/// Local bus index recorded for a disconnected element.
pub const DISCONNECTED: i64 = -1;

/// Recorded tables feeding the setpoints of one asset class.
fn class_quantities(class: AssetClass) -> &'static [Quantity] {
    match class {
        AssetClass::Load => &[Quantity::LoadP, Quantity::LoadQ, Quantity::LoadBus],
        AssetClass::Generator => &[Quantity::GenP, Quantity::GenV, Quantity::GenBus],
        AssetClass::Storage => &[Quantity::StoragePower, Quantity::StorageBus],
        AssetClass::Line => &[Quantity::LineOrBus, Quantity::LineExBus],
    }
}

/// Map a recorded local bus index to a bus of `voltage_level_id`.
///
/// `-1` is always a disconnection, even when the element has no wiring.
/// Indices `1..=n_busbar_per_sub` select the bus whose zero-based local number
/// is `index - 1`.
pub fn resolve_bus(
    model: &NetworkModel,
    voltage_level_id: &str,
    local_index: i64,
    n_busbar_per_sub: usize,
) -> KpiResult<BusAssignment> {
    if local_index == DISCONNECTED {
        return Ok(BusAssignment::Disconnected);
    }
    if local_index < 1 || local_index as u64 > n_busbar_per_sub as u64 {
        return Err(KpiError::Validation(format!(
            "local bus index {} outside 1..={} (or -1) in voltage level '{}'",
            local_index, n_busbar_per_sub, voltage_level_id
        )));
    }
    let local_num = (local_index - 1) as usize;
    model
        .bus_by_local_num(voltage_level_id, local_num)
        .map(|bus| BusAssignment::Connected(bus.id.clone()))
        .ok_or_else(|| {
            KpiError::Network(format!(
                "voltage level '{}' has no bus with local number {}",
                voltage_level_id, local_num
            ))
        })
}

/// Episode asset bound to an engine element.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundAsset {
    pub name: String,
    pub id: String,
    pub voltage_level1_id: String,
    /// Second end of a branch
    pub voltage_level2_id: Option<String>,
}

/// What one replayed step changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub step: usize,
    /// Setpoints applied to the model
    pub applied: usize,
    /// Episode assets with no engine element, skipped every step
    pub unresolved: usize,
}

/// Replays recorded steps onto a [`NetworkModel`].
///
/// Classes with no instance in the model are skipped entirely; their tables
/// are never read.
#[derive(Debug, Clone)]
pub struct NetworkStateReplayer {
    n_busbar_per_sub: usize,
    bindings: BTreeMap<AssetClass, Vec<BoundAsset>>,
    tables: BTreeMap<Quantity, Arc<TimeSeriesTable>>,
    unresolved: Vec<(AssetClass, String)>,
}

impl NetworkStateReplayer {
    pub fn new(
        store: &dyn EpisodeStore,
        model: &NetworkModel,
        n_busbar_per_sub: usize,
    ) -> KpiResult<Self> {
        let mut bindings = BTreeMap::new();
        let mut tables = BTreeMap::new();
        let mut unresolved = Vec::new();

        for class in AssetClass::ALL {
            if model.element_count(class) == 0 {
                debug!("network has no {} element; skipping replay of that class", class);
                continue;
            }
            let assets = store.asset_table(class)?;
            let mut bound = Vec::with_capacity(assets.len());
            for name in &assets.names {
                let id = match model.resolve_id(class, name) {
                    IdResolution::Found(id) => id,
                    IdResolution::FallbackIdentifier(id) => {
                        debug!("{} '{}' matched by identifier", class, name);
                        id
                    }
                    IdResolution::NotFound => {
                        warn!("{} '{}' not found in network; it will not be replayed", class, name);
                        unresolved.push((class, name.clone()));
                        continue;
                    }
                };
                let Some((vl1, vl2)) = model.element_voltage_levels(class, &id) else {
                    return Err(KpiError::Network(format!(
                        "{} '{}' has no voltage level",
                        class, id
                    )));
                };
                bound.push(BoundAsset {
                    name: name.clone(),
                    voltage_level1_id: vl1.to_string(),
                    voltage_level2_id: vl2.map(str::to_string),
                    id,
                });
            }
            for quantity in class_quantities(class) {
                tables.insert(*quantity, store.series(*quantity)?);
            }
            bindings.insert(class, bound);
        }

        Ok(Self {
            n_busbar_per_sub,
            bindings,
            tables,
            unresolved,
        })
    }

    pub fn bound(&self, class: AssetClass) -> &[BoundAsset] {
        self.bindings.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Episode assets that matched no engine element.
    pub fn unresolved(&self) -> &[(AssetClass, String)] {
        &self.unresolved
    }

    fn table(&self, quantity: Quantity) -> KpiResult<&TimeSeriesTable> {
        self.tables
            .get(&quantity)
            .map(Arc::as_ref)
            .ok_or_else(|| KpiError::MissingData(format!("table '{}'", quantity)))
    }

    fn value(&self, quantity: Quantity, name: &str, step: usize) -> KpiResult<f64> {
        self.table(quantity)?.value(name, step)
    }

    fn bus(
        &self,
        model: &NetworkModel,
        quantity: Quantity,
        name: &str,
        voltage_level_id: &str,
        step: usize,
    ) -> KpiResult<BusAssignment> {
        let index = self.table(quantity)?.bus_index(name, step)?;
        resolve_bus(model, voltage_level_id, index, self.n_busbar_per_sub)
    }

    /// Setpoints recorded at `step`, without touching the model.
    pub fn setpoints(&self, model: &NetworkModel, step: usize) -> KpiResult<Setpoints> {
        let mut setpoints = Setpoints::default();

        for asset in self.bound(AssetClass::Load) {
            setpoints.loads.push(LoadSetpoint {
                id: asset.id.clone(),
                p0: Megawatts(self.value(Quantity::LoadP, &asset.name, step)?),
                q0: Megavars(self.value(Quantity::LoadQ, &asset.name, step)?),
                bus: self.bus(model, Quantity::LoadBus, &asset.name, &asset.voltage_level1_id, step)?,
            });
        }

        for asset in self.bound(AssetClass::Generator) {
            let v = self.value(Quantity::GenV, &asset.name, step)?;
            setpoints.generators.push(GeneratorSetpoint {
                id: asset.id.clone(),
                target_p: Megawatts(self.value(Quantity::GenP, &asset.name, step)?),
                target_v: Kilovolts(v),
                voltage_regulator_on: v > 0.0,
                bus: self.bus(model, Quantity::GenBus, &asset.name, &asset.voltage_level1_id, step)?,
            });
        }

        for asset in self.bound(AssetClass::Storage) {
            setpoints.batteries.push(BatterySetpoint {
                id: asset.id.clone(),
                target_p: Megawatts(self.value(Quantity::StoragePower, &asset.name, step)?),
                target_q: Megavars(0.0),
                bus: self.bus(
                    model,
                    Quantity::StorageBus,
                    &asset.name,
                    &asset.voltage_level1_id,
                    step,
                )?,
            });
        }

        for asset in self.bound(AssetClass::Line) {
            let vl2 = asset
                .voltage_level2_id
                .as_deref()
                .unwrap_or(&asset.voltage_level1_id);
            setpoints.branches.push(BranchSetpoint {
                id: asset.id.clone(),
                bus1: self.bus(
                    model,
                    Quantity::LineOrBus,
                    &asset.name,
                    &asset.voltage_level1_id,
                    step,
                )?,
                bus2: self.bus(model, Quantity::LineExBus, &asset.name, vl2, step)?,
            });
        }

        Ok(setpoints)
    }

    /// Apply the setpoints of `step` to the model.
    pub fn apply_step(&self, model: &mut NetworkModel, step: usize) -> KpiResult<ReplayReport> {
        let setpoints = self.setpoints(model, step)?;
        model.apply(&setpoints)?;
        debug!("replayed step {} ({} setpoints)", step, setpoints.len());
        Ok(ReplayReport {
            step,
            applied: setpoints.len(),
            unresolved: self.unresolved.len(),
        })
    }

    /// Like [`apply_step`](Self::apply_step), but leaves the model untouched
    /// at and after the first `done` step.
    pub fn replay(
        &self,
        model: &mut NetworkModel,
        log: &ActionLog,
        step: usize,
    ) -> KpiResult<Option<ReplayReport>> {
        if step >= log.live_steps() {
            debug!("step {} is past episode termination; not replayed", step);
            return Ok(None);
        }
        self.apply_step(model, step).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{series, two_bus_episode, two_bus_network};
    use gkpi_core::InMemoryEpisode;

    #[test]
    fn bus_index_maps_to_local_number() {
        let model = two_bus_network();
        assert_eq!(
            resolve_bus(&model, "VL1", 1, 2).unwrap(),
            BusAssignment::Connected("VL1_0".into())
        );
        assert_eq!(
            resolve_bus(&model, "VL1", 2, 2).unwrap(),
            BusAssignment::Connected("VL1_extra_busbar_1".into())
        );
    }

    #[test]
    fn disconnection_never_fails() {
        let model = two_bus_network();
        assert_eq!(
            resolve_bus(&model, "no_such_level", -1, 2).unwrap(),
            BusAssignment::Disconnected
        );
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let model = two_bus_network();
        assert!(matches!(
            resolve_bus(&model, "VL1", 0, 2),
            Err(KpiError::Validation(_))
        ));
        assert!(matches!(
            resolve_bus(&model, "VL1", 3, 2),
            Err(KpiError::Validation(_))
        ));
        assert!(resolve_bus(&model, "VL1", -2, 2).is_err());
    }

    #[test]
    fn applies_recorded_setpoints() {
        let time = [0.0, 300.0];
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_series(
                Quantity::GenV,
                series(&time, vec![("gen_0_0", vec![20.0, 0.0])]).unwrap(),
            )
            .with_series(
                Quantity::LineOrBus,
                series(&time, vec![("0_1_0", vec![1.0, 2.0]), ("0_1_1", vec![1.0, -1.0])]).unwrap(),
            );
        let mut model = two_bus_network();
        let replayer = NetworkStateReplayer::new(&episode, &model, 2).unwrap();

        let report = replayer.apply_step(&mut model, 1).unwrap();
        assert_eq!(report.applied, 4);
        assert_eq!(report.unresolved, 0);

        let gen = &model.generators[0];
        assert!(!gen.voltage_regulator_on);
        let line0 = &model.branches[0];
        assert_eq!(line0.terminal1.bus_id.as_deref(), Some("VL0_extra_busbar_1"));
        let line1 = &model.branches[1];
        assert!(!line1.terminal1.connected);
        assert!(!line1.is_in_service());
    }

    #[test]
    fn classes_absent_from_network_are_skipped() {
        // no battery in the network and no storage table in the episode
        let episode = two_bus_episode(&[0.0]).unwrap();
        let model = two_bus_network();
        let replayer = NetworkStateReplayer::new(&episode, &model, 2).unwrap();
        assert!(replayer.bound(AssetClass::Storage).is_empty());
        assert_eq!(replayer.setpoints(&model, 0).unwrap().batteries.len(), 0);
    }

    #[test]
    fn unknown_assets_are_reported_and_skipped() {
        let time = [0.0];
        let base = two_bus_episode(&time).unwrap();
        let loads = gkpi_core::AssetTable::new(
            AssetClass::Load,
            vec!["load_1_0".into(), "ghost".into()],
        );
        let episode: InMemoryEpisode = base.with_assets(AssetClass::Load, loads);
        let mut model = two_bus_network();
        let replayer = NetworkStateReplayer::new(&episode, &model, 2).unwrap();
        assert_eq!(replayer.unresolved(), &[(AssetClass::Load, "ghost".to_string())]);
        let report = replayer.apply_step(&mut model, 0).unwrap();
        assert_eq!(report.unresolved, 1);
    }

    #[test]
    fn done_steps_leave_the_model_untouched() {
        let time = [0.0, 300.0];
        let episode = two_bus_episode(&time)
            .unwrap()
            .with_series(
                Quantity::LoadP,
                series(&time, vec![("load_1_0", vec![7.0, 99.0])]).unwrap(),
            );
        let log = ActionLog::new(
            time.to_vec(),
            vec![Default::default(), Default::default()],
            vec![false, true],
        )
        .unwrap();
        let mut model = two_bus_network();
        let replayer = NetworkStateReplayer::new(&episode, &model, 2).unwrap();
        assert!(replayer.replay(&mut model, &log, 0).unwrap().is_some());
        assert!(replayer.replay(&mut model, &log, 1).unwrap().is_none());
        assert_eq!(model.loads[0].p0, Megawatts(7.0));
    }
}
