//! Transient and steady-state measurement collectors.
//!
//! The transient collectors bin carrier populations, velocities, and
//! energies on a log-spaced time axis; the steady-state collector
//! accumulates occupied/total density-of-states histograms and the
//! displacement-weighted transport energy. All collectors are passive:
//! the scheduling loop feeds them snapshots, and they never touch the
//! lattice themselves.

use excimer_core::ObjectId;
use indexmap::IndexMap;

// ── Log-spaced time axis ────────────────────────────────────────

/// A log-spaced transient time axis with `pnts_per_decade` bins per
/// decade between `start` and `end`.
#[derive(Clone, Debug)]
pub struct TransientBins {
    start: f64,
    pnts_per_decade: u32,
    times: Vec<f64>,
}

impl TransientBins {
    /// Build the axis. `start` and `end` must be positive with
    /// `end > start`; the configuration validator guarantees this.
    pub fn new(start: f64, end: f64, pnts_per_decade: u32) -> Self {
        let decades = end.log10() - start.log10();
        let count = (decades * f64::from(pnts_per_decade)).floor() as usize + 1;
        let times = (0..count)
            .map(|i| 10f64.powf(start.log10() + i as f64 / f64::from(pnts_per_decade)))
            .collect();
        Self {
            start,
            pnts_per_decade,
            times,
        }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the axis is empty.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// The bin times in seconds.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// The bin index for an elapsed time, or `None` outside the window.
    pub fn index_of(&self, elapsed: f64) -> Option<usize> {
        if elapsed < self.start {
            return None;
        }
        let index =
            ((elapsed.log10() - self.start.log10()) * f64::from(self.pnts_per_decade)).floor();
        if index < 0.0 {
            return None;
        }
        let index = index as usize;
        (index < self.times.len()).then_some(index)
    }
}

// ── Time-of-flight transient ────────────────────────────────────

/// A per-carrier position/energy snapshot handed to the ToF collector.
#[derive(Clone, Copy, Debug)]
pub struct CarrierSample {
    /// The carrier.
    pub id: ObjectId,
    /// Its transport-axis position in lattice units.
    pub z: i32,
    /// Its current site energy in eV.
    pub energy: f64,
}

/// Time-of-flight transient data: per-bin carrier counts, summed drift
/// velocities, and summed site energies, plus per-carrier transit times.
#[derive(Clone, Debug, Default)]
pub struct ToFData {
    bins: Option<TransientBins>,
    /// Live-carrier count per bin (summed over transient cycles).
    pub counts: Vec<u64>,
    /// Summed |drift velocity| per bin, cm/s.
    pub velocities: Vec<f64>,
    /// Summed site energy per bin, eV.
    pub energies: Vec<f64>,
    /// Transport-axis position of each carrier at its last sample.
    pub prev_positions: IndexMap<ObjectId, i32>,
    /// Transit times of extracted carriers, s.
    pub transit_times: Vec<f64>,
    prev_index: Option<usize>,
    last_sample_time: f64,
}

impl ToFData {
    /// Build the collector for the configured transient window.
    pub fn new(start: f64, end: f64, pnts_per_decade: u32) -> Self {
        let bins = TransientBins::new(start, end, pnts_per_decade);
        let n = bins.len();
        Self {
            bins: Some(bins),
            counts: vec![0; n],
            velocities: vec![0.0; n],
            energies: vec![0.0; n],
            ..Self::default()
        }
    }

    /// The time axis.
    pub fn times(&self) -> &[f64] {
        self.bins.as_ref().map_or(&[], TransientBins::times)
    }

    /// Rewind the per-cycle state before seeding a fresh carrier batch.
    /// Accumulated bin data and transit times are kept.
    pub fn begin_cycle(&mut self, seeds: impl Iterator<Item = (ObjectId, i32)>) {
        self.prev_positions.clear();
        for (id, z) in seeds {
            self.prev_positions.insert(id, z);
        }
        self.prev_index = None;
        self.last_sample_time = 0.0;
    }

    /// Record a snapshot of the live carriers at `elapsed` seconds into
    /// the cycle. `unit_size` is the lattice constant in nm.
    pub fn record(&mut self, elapsed: f64, unit_size: f64, samples: &[CarrierSample]) {
        let Some(bins) = &self.bins else { return };
        let Some(index) = bins.index_of(elapsed) else {
            return;
        };
        if self.prev_index.is_some_and(|prev| index <= prev) {
            return;
        }
        // Backfill bins skipped since the previous sample so the count
        // transient has no gaps.
        if let Some(prev) = self.prev_index {
            for i in prev + 1..index {
                self.counts[i] = self.counts[prev];
                self.energies[i] = self.energies[prev];
            }
        }
        let dt = elapsed - self.last_sample_time;
        self.counts[index] += samples.len() as u64;
        for sample in samples {
            if let Some(prev_z) = self.prev_positions.insert(sample.id, sample.z) {
                let drift_cm = (1e-7 * unit_size * f64::from(sample.z - prev_z)).abs();
                self.velocities[index] += drift_cm / dt;
            }
            self.energies[index] += sample.energy;
        }
        self.prev_index = Some(index);
        self.last_sample_time = elapsed;
    }
}

// ── Dynamics transient ──────────────────────────────────────────

/// A per-object snapshot handed to the dynamics collector.
#[derive(Clone, Copy, Debug)]
pub struct DynamicsSample {
    /// Site energy in eV.
    pub energy: f64,
    /// True displacement accumulated since the last sample, lattice units.
    pub displacement: f64,
}

/// Transient dynamics data: per-bin population counts, mean-squared
/// displacement rates, and summed site energies for each species group.
#[derive(Clone, Debug, Default)]
pub struct DynamicsData {
    bins: Option<TransientBins>,
    /// Live singlets per bin.
    pub singlet_counts: Vec<u64>,
    /// Live triplets per bin.
    pub triplet_counts: Vec<u64>,
    /// Live electrons per bin.
    pub electron_counts: Vec<u64>,
    /// Live holes per bin.
    pub hole_counts: Vec<u64>,
    /// Summed squared displacement per unit time for excitons, cm^2/s.
    pub exciton_msdv: Vec<f64>,
    /// Summed squared displacement per unit time for electrons, cm^2/s.
    pub electron_msdv: Vec<f64>,
    /// Summed squared displacement per unit time for holes, cm^2/s.
    pub hole_msdv: Vec<f64>,
    /// Summed exciton site energies per bin, eV.
    pub exciton_energies: Vec<f64>,
    /// Summed electron site energies per bin, eV.
    pub electron_energies: Vec<f64>,
    /// Summed hole site energies per bin, eV.
    pub hole_energies: Vec<f64>,
    prev_index: Option<usize>,
    last_sample_time: f64,
}

impl DynamicsData {
    /// Build the collector for the configured transient window.
    pub fn new(start: f64, end: f64, pnts_per_decade: u32) -> Self {
        let bins = TransientBins::new(start, end, pnts_per_decade);
        let n = bins.len();
        Self {
            bins: Some(bins),
            singlet_counts: vec![0; n],
            triplet_counts: vec![0; n],
            electron_counts: vec![0; n],
            hole_counts: vec![0; n],
            exciton_msdv: vec![0.0; n],
            electron_msdv: vec![0.0; n],
            hole_msdv: vec![0.0; n],
            exciton_energies: vec![0.0; n],
            electron_energies: vec![0.0; n],
            hole_energies: vec![0.0; n],
            ..Self::default()
        }
    }

    /// The time axis.
    pub fn times(&self) -> &[f64] {
        self.bins.as_ref().map_or(&[], TransientBins::times)
    }

    /// Rewind the per-cycle state before seeding a fresh exciton batch.
    pub fn begin_cycle(&mut self) {
        self.prev_index = None;
        self.last_sample_time = 0.0;
    }

    /// Record a snapshot at `elapsed` seconds into the cycle. Returns
    /// true when a bin was filled, signalling the caller to reset the
    /// per-object displacement accumulators.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &mut self,
        elapsed: f64,
        unit_size: f64,
        singlets: u64,
        triplets: u64,
        excitons: &[DynamicsSample],
        electrons: &[DynamicsSample],
        holes: &[DynamicsSample],
    ) -> bool {
        let Some(bins) = &self.bins else { return false };
        let Some(index) = bins.index_of(elapsed) else {
            return false;
        };
        if self.prev_index.is_some_and(|prev| index <= prev) {
            return false;
        }
        if let Some(prev) = self.prev_index {
            for i in prev + 1..index {
                self.singlet_counts[i] = self.singlet_counts[prev];
                self.triplet_counts[i] = self.triplet_counts[prev];
                self.electron_counts[i] = self.electron_counts[prev];
                self.hole_counts[i] = self.hole_counts[prev];
                self.exciton_energies[i] = self.exciton_energies[prev];
                self.electron_energies[i] = self.electron_energies[prev];
                self.hole_energies[i] = self.hole_energies[prev];
            }
        }
        let dt = elapsed - self.last_sample_time;
        self.singlet_counts[index] += singlets;
        self.triplet_counts[index] += triplets;
        self.electron_counts[index] += electrons.len() as u64;
        self.hole_counts[index] += holes.len() as u64;
        let msd = |s: &DynamicsSample| (1e-7 * unit_size * s.displacement).powi(2) / dt;
        for s in excitons {
            self.exciton_msdv[index] += msd(s);
            self.exciton_energies[index] += s.energy;
        }
        for s in electrons {
            self.electron_msdv[index] += msd(s);
            self.electron_energies[index] += s.energy;
        }
        for s in holes {
            self.hole_msdv[index] += msd(s);
            self.hole_energies[index] += s.energy;
        }
        self.prev_index = Some(index);
        self.last_sample_time = elapsed;
        true
    }
}

// ── Histograms and steady-state transport ───────────────────────

/// A fixed-bin-width histogram over energies, grown on demand in both
/// directions so no sample is ever dropped.
#[derive(Clone, Debug)]
pub struct Histogram {
    bin_size: f64,
    bins: Vec<(f64, f64)>,
}

impl Histogram {
    /// An empty histogram with the given bin width in eV.
    pub fn new(bin_size: f64) -> Self {
        Self {
            bin_size,
            bins: Vec::new(),
        }
    }

    /// Count one sample. Bin centers are integer multiples of the bin
    /// width.
    pub fn add(&mut self, energy: f64) {
        let center = (energy / self.bin_size).round() * self.bin_size;
        if self.bins.is_empty() {
            self.bins.push((center, 1.0));
            return;
        }
        while energy < self.bins[0].0 - 0.5 * self.bin_size {
            let next = self.bins[0].0 - self.bin_size;
            self.bins.insert(0, (next, 0.0));
        }
        while energy >= self.bins[self.bins.len() - 1].0 + 0.5 * self.bin_size {
            let next = self.bins[self.bins.len() - 1].0 + self.bin_size;
            self.bins.push((next, 0.0));
        }
        let offset = energy - (self.bins[0].0 - 0.5 * self.bin_size);
        let index = ((offset / self.bin_size).floor() as usize).min(self.bins.len() - 1);
        self.bins[index].1 += 1.0;
    }

    /// The (bin center, count) pairs in ascending energy order.
    pub fn bins(&self) -> &[(f64, f64)] {
        &self.bins
    }

    /// Total sample count.
    pub fn total(&self) -> f64 {
        self.bins.iter().map(|(_, count)| count).sum()
    }
}

/// Steady-state transport measurement accumulators.
#[derive(Clone, Debug)]
pub struct SteadyData {
    /// Clock value when the equilibration budget was met.
    pub equilibration_time: Option<f64>,
    /// Displacement-weighted transport-energy sum, plain site energies.
    pub transport_energy_weighted_sum: f64,
    /// Displacement-weighted transport-energy sum including the carrier's
    /// Coulomb self-energy.
    pub transport_energy_weighted_sum_coulomb: f64,
    /// Sum of displacement weights.
    pub sum_of_weights: f64,
    /// Occupied density of states (plain site energies).
    pub doos: Histogram,
    /// Occupied density of states including Coulomb self-energies.
    pub doos_coulomb: Histogram,
    /// Carrier samples contributing to the DOOS histograms.
    pub doos_samples: u64,
    /// Summed plain carrier energies since equilibration.
    pub equilibration_energy_sum: f64,
    /// Summed Coulomb-corrected carrier energies since equilibration.
    pub equilibration_energy_sum_coulomb: f64,
    /// Whole-lattice density of states including Coulomb contributions.
    pub dos_coulomb: Histogram,
    /// Site samples contributing to the DOS histogram.
    pub dos_samples: u64,
}

impl SteadyData {
    /// Empty accumulators with the configured histogram bin width.
    pub fn new(bin_size: f64) -> Self {
        Self {
            equilibration_time: None,
            transport_energy_weighted_sum: 0.0,
            transport_energy_weighted_sum_coulomb: 0.0,
            sum_of_weights: 0.0,
            doos: Histogram::new(bin_size),
            doos_coulomb: Histogram::new(bin_size),
            doos_samples: 0,
            equilibration_energy_sum: 0.0,
            equilibration_energy_sum_coulomb: 0.0,
            dos_coulomb: Histogram::new(bin_size),
            dos_samples: 0,
        }
    }

    /// Mark the end of equilibration and zero the transport sums.
    pub fn mark_equilibrated(&mut self, clock: f64) {
        self.equilibration_time = Some(clock);
        self.transport_energy_weighted_sum = 0.0;
        self.transport_energy_weighted_sum_coulomb = 0.0;
        self.sum_of_weights = 0.0;
    }

    /// Fold one measured hop into the transport-energy estimate.
    /// `displacement` is the wrap-corrected transport-axis step and the
    /// energies are the mean of the origin and destination values.
    pub fn record_hop(&mut self, displacement: f64, mean_energy: f64, mean_energy_coulomb: f64) {
        if displacement == 0.0 {
            return;
        }
        self.transport_energy_weighted_sum += mean_energy * displacement;
        self.transport_energy_weighted_sum_coulomb += mean_energy_coulomb * displacement;
        self.sum_of_weights += displacement;
    }

    /// The displacement-weighted transport energy, plain and
    /// Coulomb-corrected. NaN until a nonzero-displacement hop has been
    /// recorded.
    pub fn transport_energies(&self) -> (f64, f64) {
        (
            self.transport_energy_weighted_sum / self.sum_of_weights,
            self.transport_energy_weighted_sum_coulomb / self.sum_of_weights,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_are_log_spaced() {
        let bins = TransientBins::new(1e-12, 2e-9, 10);
        assert_eq!(bins.len(), 34);
        assert!((bins.times()[0] - 1e-12).abs() / 1e-12 < 1e-9);
        // Constant ratio between adjacent bins.
        let ratio = bins.times()[1] / bins.times()[0];
        assert!((ratio - 10f64.powf(0.1)).abs() < 1e-9);
    }

    #[test]
    fn index_of_respects_the_window() {
        let bins = TransientBins::new(1e-12, 2e-9, 10);
        assert_eq!(bins.index_of(1e-13), None);
        assert_eq!(bins.index_of(1.05e-12), Some(0));
        assert_eq!(bins.index_of(1.1e-11), Some(10));
        assert_eq!(bins.index_of(3e-9), None);
    }

    #[test]
    fn tof_counts_and_velocities_accumulate() {
        let mut data = ToFData::new(1e-12, 1e-9, 10);
        let id = ObjectId(1);
        data.begin_cycle([(id, 50)].into_iter());
        data.record(
            2e-12,
            1.0,
            &[CarrierSample {
                id,
                z: 48,
                energy: -0.1,
            }],
        );
        let index = 3; // log10(2) * 10 floored
        assert_eq!(data.counts[index], 1);
        // Two sites of 1 nm in 2 ps.
        let expected = (2.0 * 1e-7) / 2e-12;
        assert!((data.velocities[index] - expected).abs() / expected < 1e-9);
        assert_eq!(data.prev_positions[&id], 48);
        // A second sample in the same bin is ignored.
        data.record(
            2.1e-12,
            1.0,
            &[CarrierSample {
                id,
                z: 47,
                energy: -0.1,
            }],
        );
        assert_eq!(data.counts[index], 1);
    }

    #[test]
    fn tof_backfills_skipped_bins() {
        let mut data = ToFData::new(1e-12, 1e-9, 10);
        let id = ObjectId(1);
        data.begin_cycle([(id, 10)].into_iter());
        data.record(1.0e-12, 1.0, &[CarrierSample { id, z: 10, energy: 0.0 }]);
        data.record(1.1e-11, 1.0, &[CarrierSample { id, z: 9, energy: 0.0 }]);
        // Bins 1..10 carry the bin-0 count forward.
        for i in 1..10 {
            assert_eq!(data.counts[i], data.counts[0]);
        }
        assert_eq!(data.counts[10], 1);
    }

    #[test]
    fn dynamics_records_msd_per_bin() {
        let mut data = DynamicsData::new(1e-12, 1e-9, 10);
        data.begin_cycle();
        let filled = data.record(
            1.5e-12,
            1.0,
            2,
            1,
            &[DynamicsSample {
                energy: -0.05,
                displacement: 3.0,
            }],
            &[],
            &[],
        );
        assert!(filled);
        let index = 1;
        assert_eq!(data.singlet_counts[index], 2);
        assert_eq!(data.triplet_counts[index], 1);
        let expected = (3.0 * 1e-7f64).powi(2) / 1.5e-12;
        assert!((data.exciton_msdv[index] - expected).abs() / expected < 1e-9);
        assert!((data.exciton_energies[index] + 0.05).abs() < 1e-12);
    }

    #[test]
    fn histogram_grows_in_both_directions() {
        let mut hist = Histogram::new(0.1);
        hist.add(0.0);
        hist.add(0.32);
        hist.add(-0.48);
        assert_eq!(hist.total(), 3.0);
        let bins = hist.bins();
        assert!((bins[0].0 + 0.5).abs() < 1e-12);
        assert!((bins[bins.len() - 1].0 - 0.3).abs() < 1e-12);
        // Interior bins created by growth hold zero counts.
        assert_eq!(bins.iter().filter(|(_, c)| *c == 0.0).count(), 6);
        let hit: f64 = bins
            .iter()
            .filter(|(center, _)| (*center - 0.3).abs() < 1e-9)
            .map(|(_, c)| *c)
            .sum();
        assert_eq!(hit, 1.0);
    }

    #[test]
    fn steady_transport_energy_is_displacement_weighted() {
        let mut data = SteadyData::new(0.02);
        data.mark_equilibrated(0.0);
        data.record_hop(2.0, -5.0, -5.1);
        data.record_hop(1.0, -5.3, -5.4);
        // Zero-displacement hops carry no weight.
        data.record_hop(0.0, 99.0, 99.0);
        assert_eq!(data.sum_of_weights, 3.0);
        let (plain, coulomb) = data.transport_energies();
        assert!((plain - (-5.0 * 2.0 - 5.3) / 3.0).abs() < 1e-12);
        assert!((coulomb - (-5.1 * 2.0 - 5.4) / 3.0).abs() < 1e-12);
    }
}
