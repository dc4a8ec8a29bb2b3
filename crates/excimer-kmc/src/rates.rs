//! Rate laws and the precomputed neighbor offset table.
//!
//! Three microscopic rate laws cover every transition in the engine:
//! Foerster (FRET) for singlet transfer, an exponential-overlap law shared
//! by Dexter triplet transfer and Miller-Abrahams polaron hopping, and
//! Marcus theory as the alternative polaron law. All take distances in nm
//! and energies in eV and return first-order rates in 1/s.

use excimer_core::Parameters;
use rand::Rng;
use std::f64::consts::PI;

/// Boltzmann penalty for uphill transitions: `exp(-dE/kT)` when `dE > 0`,
/// otherwise 1.
pub fn uphill_penalty(delta_e: f64, kt: f64) -> f64 {
    if delta_e > 0.0 {
        (-delta_e / kt).exp()
    } else {
        1.0
    }
}

/// Foerster resonance transfer rate: `R * (1/d)^6`, uphill-penalized.
pub fn fret(prefactor: f64, distance: f64, delta_e: f64, kt: f64) -> f64 {
    prefactor * (1.0 / distance).powi(6) * uphill_penalty(delta_e, kt)
}

/// Exponential wavefunction-overlap rate: `R * exp(-2 a d)`,
/// uphill-penalized. Covers Dexter triplet transfer and Miller-Abrahams
/// polaron hopping; `localization` is the inverse localization length in
/// nm^-1.
pub fn miller_abrahams(
    prefactor: f64,
    localization: f64,
    distance: f64,
    delta_e: f64,
    kt: f64,
) -> f64 {
    prefactor * (-2.0 * localization * distance).exp() * uphill_penalty(delta_e, kt)
}

/// Marcus rate: `(R / sqrt(4 pi lambda kT)) * exp(-2 a d)
/// * exp(-(dE + lambda)^2 / (4 lambda kT))`.
pub fn marcus(
    prefactor: f64,
    localization: f64,
    distance: f64,
    delta_e: f64,
    reorganization: f64,
    kt: f64,
) -> f64 {
    let activation = (delta_e + reorganization).powi(2) / (4.0 * reorganization * kt);
    (prefactor / (4.0 * PI * reorganization * kt).sqrt())
        * (-2.0 * localization * distance).exp()
        * (-activation).exp()
}

/// Sample an absolute execution time for a candidate of the given rate:
/// `clock - ln(u) / rate` with `u` uniform on (0, 1].
///
/// `Rng::random::<f64>()` is uniform on [0, 1); the reflection keeps
/// `ln(u)` finite.
pub fn sample_execution_time<R: Rng + ?Sized>(clock: f64, rate: f64, rng: &mut R) -> f64 {
    let u = 1.0 - rng.random::<f64>();
    clock - u.ln() / rate
}

// ── Neighbor offsets ────────────────────────────────────────────

/// One relative lattice offset inside an interaction cutoff.
#[derive(Clone, Copy, Debug)]
pub struct NeighborOffset {
    /// x offset in lattice units.
    pub dx: i32,
    /// y offset in lattice units.
    pub dy: i32,
    /// z offset in lattice units.
    pub dz: i32,
    /// Squared lattice distance.
    pub d2: i32,
    /// Physical distance in nm.
    pub distance: f64,
    /// Inside the primary cutoff (FRET/hop range for excitons, hop range
    /// for polarons).
    pub in_primary: bool,
    /// Inside the secondary cutoff (dissociation range; excitons only).
    pub in_secondary: bool,
}

/// The precomputed sphere of relative offsets an object can interact
/// through, built once per run.
///
/// Cutoff membership uses a 1e-4 nm tolerance so offsets landing exactly
/// on the cutoff radius are kept despite rounding.
#[derive(Clone, Debug)]
pub struct NeighborTable {
    offsets: Vec<NeighborOffset>,
}

impl NeighborTable {
    fn build(unit_size: f64, primary_cutoff: f64, secondary_cutoff: f64) -> Self {
        let outer = primary_cutoff.max(secondary_cutoff);
        let radius = (outer / unit_size).ceil() as i32;
        let mut offsets = Vec::new();
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                for dz in -radius..=radius {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let d2 = dx * dx + dy * dy + dz * dz;
                    let distance = unit_size * f64::from(d2).sqrt();
                    let in_primary = distance - 0.0001 <= primary_cutoff;
                    let in_secondary = distance - 0.0001 <= secondary_cutoff;
                    if in_primary || in_secondary {
                        offsets.push(NeighborOffset {
                            dx,
                            dy,
                            dz,
                            d2,
                            distance,
                            in_primary,
                            in_secondary,
                        });
                    }
                }
            }
        }
        Self { offsets }
    }

    /// Offsets for exciton mechanisms: primary is the FRET/hop cutoff,
    /// secondary the dissociation cutoff.
    pub fn exciton(params: &Parameters) -> Self {
        Self::build(
            params.unit_size,
            params.fret_cutoff,
            params.exciton_dissociation_cutoff,
        )
    }

    /// Offsets for polaron hops.
    pub fn polaron(params: &Parameters) -> Self {
        Self::build(params.unit_size, params.polaron_hopping_cutoff, 0.0)
    }

    /// All offsets inside either cutoff.
    pub fn offsets(&self) -> &[NeighborOffset] {
        &self.offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const KT: f64 = 0.02585;

    #[test]
    fn fret_follows_inverse_sixth_power() {
        let near = fret(1e12, 1.0, 0.0, KT);
        let far = fret(1e12, 2.0, 0.0, KT);
        assert!((near / far - 64.0).abs() < 1e-9);
    }

    #[test]
    fn miller_abrahams_detailed_balance() {
        // Uphill and downhill rates across the same barrier differ by the
        // Boltzmann factor.
        let up = miller_abrahams(1e12, 2.0, 1.0, 0.1, KT);
        let down = miller_abrahams(1e12, 2.0, 1.0, -0.1, KT);
        assert!((up / down - (-0.1 / KT).exp()).abs() < 1e-12);
        // Downhill transitions carry no penalty at all.
        assert_eq!(down, miller_abrahams(1e12, 2.0, 1.0, 0.0, KT));
    }

    #[test]
    fn marcus_peaks_at_minus_lambda() {
        let lambda = 0.2;
        let at_peak = marcus(1e12, 2.0, 1.0, -lambda, lambda, KT);
        let off_peak = marcus(1e12, 2.0, 1.0, 0.0, lambda, KT);
        let inverted = marcus(1e12, 2.0, 1.0, -2.0 * lambda, lambda, KT);
        assert!(at_peak > off_peak);
        assert!(at_peak > inverted);
        // The parabola is symmetric about -lambda.
        assert!((off_peak - inverted).abs() / off_peak < 1e-12);
    }

    #[test]
    fn execution_times_never_precede_the_clock() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            let t = sample_execution_time(1.0e-9, 1e12, &mut rng);
            assert!(t > 1.0e-9);
            assert!(t.is_finite());
        }
    }

    #[test]
    fn nearest_neighbor_table_has_six_offsets() {
        let params = Parameters {
            polaron_hopping_cutoff: 1.0,
            ..Parameters::default()
        };
        let table = NeighborTable::polaron(&params);
        assert_eq!(table.offsets().len(), 6);
        assert!(table.offsets().iter().all(|o| o.d2 == 1 && o.in_primary));
    }

    #[test]
    fn exciton_table_distinguishes_the_two_cutoffs() {
        let params = Parameters {
            fret_cutoff: 2.0,
            exciton_dissociation_cutoff: 1.0,
            ..Parameters::default()
        };
        let table = NeighborTable::exciton(&params);
        // d^2 <= 4 inside the FRET range: 6 + 12 + 8 + 6 offsets.
        assert_eq!(table.offsets().len(), 32);
        let secondary: Vec<_> =
            table.offsets().iter().filter(|o| o.in_secondary).collect();
        assert_eq!(secondary.len(), 6);
        assert!(secondary.iter().all(|o| o.d2 == 1));
    }

    #[test]
    fn cutoff_boundary_offsets_are_kept() {
        // An offset at exactly the cutoff radius survives the tolerance.
        let params = Parameters {
            polaron_hopping_cutoff: 2.0,
            ..Parameters::default()
        };
        let table = NeighborTable::polaron(&params);
        assert!(table.offsets().iter().any(|o| o.d2 == 4));
        assert!(!table.offsets().iter().any(|o| o.d2 == 5));
    }

    proptest! {
        #[test]
        fn rates_are_finite_and_positive(
            delta_e in -1.0f64..1.0,
            distance in 0.5f64..5.0,
        ) {
            let f = fret(1e12, distance, delta_e, KT);
            let ma = miller_abrahams(1e12, 2.0, distance, delta_e, KT);
            let m = marcus(1e12, 2.0, distance, delta_e, 0.2, KT);
            prop_assert!(f.is_finite() && f > 0.0);
            prop_assert!(ma.is_finite() && ma > 0.0);
            prop_assert!(m.is_finite() && m >= 0.0);
        }

        #[test]
        fn larger_uphill_steps_are_slower(de in 0.0f64..0.5) {
            let base = miller_abrahams(1e12, 2.0, 1.0, de, KT);
            let steeper = miller_abrahams(1e12, 2.0, 1.0, de + 0.1, KT);
            prop_assert!(steeper < base);
        }
    }
}
