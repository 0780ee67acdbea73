//! Energy integration over irregular time steps.
//!
//! Every integral uses the same backward rule: step `i > 0` contributes
//! `power[i] * (time[i] - time[i-1]) / 3600` MWh and step `0` contributes
//! nothing. Non-finite power samples contribute nothing either.

use gkpi_core::{Hours, KpiError, KpiResult, MegawattHours, Megawatts, TimeSeriesTable};

/// Duration of the interval ending at each step; the first step has none.
pub fn step_durations(time: &[f64]) -> KpiResult<Vec<Hours>> {
    let mut durations = Vec::with_capacity(time.len());
    for (i, t) in time.iter().enumerate() {
        if i == 0 {
            durations.push(Hours(0.0));
            continue;
        }
        let dt = t - time[i - 1];
        if !dt.is_finite() || dt < 0.0 {
            return Err(KpiError::Validation(format!(
                "time index is not increasing at step {}: {} -> {}",
                i,
                time[i - 1],
                t
            )));
        }
        durations.push(Hours::from_seconds(dt));
    }
    Ok(durations)
}

/// Duration of the single interval ending at `step`.
pub fn step_duration(time: &[f64], step: usize) -> Hours {
    if step == 0 || step >= time.len() {
        return Hours(0.0);
    }
    Hours::from_seconds(time[step] - time[step - 1])
}

fn accumulate(durations: &[Hours], power: &[f64]) -> MegawattHours {
    durations
        .iter()
        .zip(power)
        .filter(|(_, p)| p.is_finite())
        .map(|(dt, p)| Megawatts(*p) * *dt)
        .sum()
}

/// Energy of one power series.
pub fn integrate(time: &[f64], power: &[f64]) -> KpiResult<MegawattHours> {
    if power.len() != time.len() {
        return Err(KpiError::Validation(format!(
            "power series has {} values but time index has {}",
            power.len(),
            time.len()
        )));
    }
    Ok(accumulate(&step_durations(time)?, power))
}

/// Energy per named asset, in the order the assets were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyByAsset {
    pub names: Vec<String>,
    pub energy: Vec<MegawattHours>,
}

impl EnergyByAsset {
    pub fn total(&self) -> MegawattHours {
        self.energy.iter().sum()
    }

    pub fn get(&self, name: &str) -> Option<MegawattHours> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.energy[i])
    }

    /// Element-wise sum of two integrations over the same assets.
    pub fn plus(&self, other: &EnergyByAsset) -> KpiResult<EnergyByAsset> {
        if self.names != other.names {
            return Err(KpiError::Validation(
                "energy tables cover different assets".into(),
            ));
        }
        Ok(EnergyByAsset {
            names: self.names.clone(),
            energy: self
                .energy
                .iter()
                .zip(&other.energy)
                .map(|(a, b)| *a + *b)
                .collect(),
        })
    }
}

/// Integrate `f(step)` per asset, using the time index of `table`.
fn integrate_assets<F>(table: &TimeSeriesTable, names: &[String], mut power: F) -> KpiResult<EnergyByAsset>
where
    F: FnMut(&str) -> KpiResult<Vec<f64>>,
{
    let durations = step_durations(&table.time)?;
    let mut energy = Vec::with_capacity(names.len());
    for name in names {
        let series = power(name)?;
        if series.len() != durations.len() {
            return Err(KpiError::Validation(format!(
                "series of '{}' has {} values but time index has {}",
                name,
                series.len(),
                durations.len()
            )));
        }
        energy.push(accumulate(&durations, &series));
    }
    Ok(EnergyByAsset {
        names: names.to_vec(),
        energy,
    })
}

/// Plain per-asset integration of a power table.
pub fn energy_by_asset(table: &TimeSeriesTable, names: &[String]) -> KpiResult<EnergyByAsset> {
    integrate_assets(table, names, |name| Ok(table.column(name)?.to_vec()))
}

/// Per-asset integral of `minuend - subtrahend`, on the time index of `subtrahend`.
pub fn difference_energy(
    minuend: &TimeSeriesTable,
    subtrahend: &TimeSeriesTable,
    names: &[String],
) -> KpiResult<EnergyByAsset> {
    integrate_assets(subtrahend, names, |name| {
        let a = minuend.column(name)?;
        let b = subtrahend.column(name)?;
        Ok(a.iter().zip(b).map(|(x, y)| x - y).collect())
    })
}

/// Curtailment energy per generator: `gen_p - gen_p_before_curtail`.
pub fn curtailment_energy(
    gen_p: &TimeSeriesTable,
    gen_p_before_curtail: &TimeSeriesTable,
    generators: &[String],
) -> KpiResult<EnergyByAsset> {
    difference_energy(gen_p, gen_p_before_curtail, generators)
}

/// Dispatched energy per generator.
pub fn dispatch_energy(
    gen_actual_dispatch: &TimeSeriesTable,
    generators: &[String],
) -> KpiResult<EnergyByAsset> {
    energy_by_asset(gen_actual_dispatch, generators)
}

/// Balancing energy per generator: `actual - target` dispatch.
pub fn balancing_energy(
    gen_actual_dispatch: &TimeSeriesTable,
    gen_target_dispatch: &TimeSeriesTable,
    generators: &[String],
) -> KpiResult<EnergyByAsset> {
    difference_energy(gen_actual_dispatch, gen_target_dispatch, generators)
}

/// Generation minus load, integrated on the generation time index.
pub fn lost_energy(
    gen_p: &TimeSeriesTable,
    generators: &[String],
    load_p: &TimeSeriesTable,
    loads: &[String],
) -> KpiResult<MegawattHours> {
    let produced = integrate_assets(gen_p, generators, |name| Ok(gen_p.column(name)?.to_vec()))?;
    let consumed = integrate_assets(gen_p, loads, |name| Ok(load_p.column(name)?.to_vec()))?;
    Ok(produced.total() - consumed.total())
}

/// Load lost when the episode terminates early.
///
/// With `k` the first `done` step, this is the total load at `k - 1` times the
/// duration of the interval ending at `k`. Zero when the episode never ends
/// early or ends at step 0.
pub fn blackout_energy(
    done: &[bool],
    load_p: &TimeSeriesTable,
    loads: &[String],
) -> KpiResult<MegawattHours> {
    let Some(k) = done.iter().position(|d| *d) else {
        return Ok(MegawattHours(0.0));
    };
    if k == 0 {
        return Ok(MegawattHours(0.0));
    }
    if k >= load_p.len() {
        return Err(KpiError::MissingData(format!(
            "load_p has {} steps but the episode ends at step {}",
            load_p.len(),
            k
        )));
    }
    let duration = step_duration(&load_p.time, k);
    let mut energy = MegawattHours(0.0);
    for name in loads {
        let p = load_p.value(name, k - 1)?;
        if p.is_finite() {
            energy += Megawatts(p) * duration;
        }
    }
    Ok(energy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(time: Vec<f64>, columns: Vec<(&str, Vec<f64>)>) -> TimeSeriesTable {
        TimeSeriesTable::new(
            time,
            columns
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        )
        .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_step_integrates_to_zero() {
        let e = integrate(&[42.0], &[1000.0]).unwrap();
        assert_eq!(e.value(), 0.0);
    }

    #[test]
    fn constant_power_over_equal_steps() {
        // p * dt * (T - 1) / 3600
        let time: Vec<f64> = (0..5).map(|i| i as f64 * 300.0).collect();
        let e = integrate(&time, &[12.0; 5]).unwrap();
        assert!((e.value() - 12.0 * 300.0 * 4.0 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn irregular_steps_use_backward_rule() {
        let e = integrate(&[0.0, 1800.0, 5400.0], &[100.0, 2.0, 4.0]).unwrap();
        assert!((e.value() - (2.0 * 0.5 + 4.0 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn decreasing_time_is_rejected() {
        assert!(matches!(
            integrate(&[0.0, 10.0, 5.0], &[1.0, 1.0, 1.0]),
            Err(KpiError::Validation(_))
        ));
    }

    #[test]
    fn nan_samples_contribute_nothing() {
        let e = integrate(&[0.0, 3600.0, 7200.0], &[1.0, f64::NAN, 3.0]).unwrap();
        assert_eq!(e.value(), 3.0);
    }

    #[test]
    fn curtailment_and_balancing_are_differences() {
        let time = vec![0.0, 3600.0, 7200.0];
        let gen_p = table(time.clone(), vec![("g", vec![5.0, 5.0, 5.0])]);
        let before = table(time.clone(), vec![("g", vec![5.0, 8.0, 6.0])]);
        let e = curtailment_energy(&gen_p, &before, &names(&["g"])).unwrap();
        assert!((e.total().value() + 4.0).abs() < 1e-12);

        let target = table(time, vec![("g", vec![0.0, 4.0, 4.0])]);
        let b = balancing_energy(&gen_p, &target, &names(&["g"])).unwrap();
        assert!((b.get("g").unwrap().value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn lost_energy_is_generation_minus_load() {
        let time = vec![0.0, 3600.0];
        let gen_p = table(time.clone(), vec![("g1", vec![0.0, 6.0]), ("g2", vec![0.0, 4.0])]);
        let load_p = table(time, vec![("l", vec![0.0, 9.0])]);
        let e = lost_energy(&gen_p, &names(&["g1", "g2"]), &load_p, &names(&["l"])).unwrap();
        assert!((e.value() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn blackout_uses_load_before_terminal_step() {
        let load_p = table(
            vec![0.0, 900.0, 1800.0],
            vec![("l", vec![3.0, 5.0, 99.0])],
        );
        let e = blackout_energy(&[false, false, true], &load_p, &names(&["l"])).unwrap();
        assert!((e.value() - 1.25).abs() < 1e-12);
    }

    #[test]
    fn no_blackout_or_blackout_at_start_is_zero() {
        let load_p = table(vec![0.0, 900.0], vec![("l", vec![3.0, 5.0])]);
        let loads = names(&["l"]);
        assert_eq!(blackout_energy(&[false, false], &load_p, &loads).unwrap().value(), 0.0);
        assert_eq!(blackout_energy(&[true, true], &load_p, &loads).unwrap().value(), 0.0);
    }

    #[test]
    fn plus_requires_same_assets() {
        let a = EnergyByAsset {
            names: names(&["g"]),
            energy: vec![MegawattHours(1.0)],
        };
        let b = EnergyByAsset {
            names: names(&["h"]),
            energy: vec![MegawattHours(1.0)],
        };
        assert!(a.plus(&b).is_err());
        assert_eq!(a.plus(&a).unwrap().total().value(), 2.0);
    }
}
