//! Energetic disorder assignment.
//!
//! Assigns the per-site energetic offsets from the configured disorder
//! model: none, Gaussian, double-sided exponential, or imported from a
//! file. Optional post-passes impart spatial correlation by Gaussian
//! kernel smoothing and shift energies near the donor/acceptor interface.

use crate::lattice::Lattice;
use crate::site::SiteType;
use excimer_core::{DisorderModel, ImportError, Parameters, SiteIndex};
use rand::Rng;
use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};

/// Assign all site energies according to the configured disorder model
/// and post-passes.
///
/// Must run after morphology assignment; an unassigned site is an error.
pub fn assign<R: Rng + ?Sized>(
    lattice: &mut Lattice,
    params: &Parameters,
    rng: &mut R,
) -> Result<(), ImportError> {
    let unassigned = lattice
        .sites()
        .filter(|s| s.site_type == SiteType::Unassigned)
        .count();
    if unassigned > 0 {
        return Err(ImportError::UnassignedSites { count: unassigned });
    }

    let procedural = matches!(
        params.disorder,
        DisorderModel::Gaussian { .. } | DisorderModel::Exponential { .. }
    );
    for n in 0..lattice.num_sites() {
        let site = lattice.site_mut(SiteIndex(n));
        site.energy = match (&params.disorder, site.site_type) {
            (DisorderModel::None | DisorderModel::Imported { .. }, _) => 0.0,
            (DisorderModel::Gaussian { stdev_donor, .. }, SiteType::Donor) => {
                gaussian_sample(rng, *stdev_donor)
            }
            (DisorderModel::Gaussian { stdev_acceptor, .. }, _) => {
                gaussian_sample(rng, *stdev_acceptor)
            }
            (DisorderModel::Exponential { urbach_donor, .. }, SiteType::Donor) => {
                exponential_sample(rng, *urbach_donor)
            }
            (DisorderModel::Exponential { urbach_acceptor, .. }, _) => {
                exponential_sample(rng, *urbach_acceptor)
            }
        };
    }

    if params.correlated_disorder && procedural {
        let target_stdev = match params.disorder {
            DisorderModel::Gaussian { stdev_donor, .. } => stdev_donor,
            DisorderModel::Exponential { urbach_donor, .. } => urbach_donor,
            _ => unreachable!(),
        };
        impart_correlation(lattice, params.disorder_correlation_length, target_stdev);
    }

    if params.interfacial_energy_shift {
        apply_interfacial_shift(lattice, params, procedural);
    }

    if let DisorderModel::Imported { filename } = &params.disorder {
        let file = File::open(filename).map_err(|e| ImportError::Io {
            reason: e.to_string(),
        })?;
        import(lattice, BufReader::new(file))?;
    }
    Ok(())
}

/// One zero-mean Gaussian sample by the Box-Muller transform.
fn gaussian_sample<R: Rng + ?Sized>(rng: &mut R, stdev: f64) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    stdev * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// One zero-mean double-sided exponential sample with the given Urbach
/// energy as the decay scale.
fn exponential_sample<R: Rng + ?Sized>(rng: &mut R, urbach: f64) -> f64 {
    let u: f64 = rng.random();
    let magnitude = -urbach * (1.0 - u).ln();
    if rng.random::<bool>() {
        magnitude
    } else {
        -magnitude
    }
}

/// Smooth the site energies with a Gaussian kernel until the measured
/// energy autocorrelation extends to the target correlation length, then
/// renormalize the distribution back to the target width.
///
/// The kernel scale is an empirical fit in the correlation length; the
/// smoothing range grows by 2 until the measured correlation function is
/// fully contained within it.
fn impart_correlation(lattice: &mut Lattice, correlation_length: f64, target_stdev: f64) {
    let scale = -0.07 * ((correlation_length - 1.0) / -0.21).exp()
        - 0.09 * ((correlation_length - 1.0) / -0.9).exp();
    let original: Vec<f64> = lattice.sites().map(|s| s.energy).collect();
    let mut range = 2i32;
    loop {
        let mut new_energies = vec![0.0f64; lattice.num_sites()];
        for n in 0..lattice.num_sites() {
            let coords = lattice.site_coords(SiteIndex(n));
            // Per-shell neighbor counts normalize each distance's
            // contribution before the kernel weight is applied.
            let shells = (range * range + 1) as usize;
            let mut counts = vec![0usize; shells];
            let mut sums = vec![0.0f64; shells];
            for i in -range..=range {
                for j in -range..=range {
                    for k in -range..=range {
                        let d2 = i * i + j * j + k * k;
                        if d2 == 0 || d2 >= range * range {
                            continue;
                        }
                        if !lattice.move_is_valid(coords, i, j, k) {
                            continue;
                        }
                        let dest = lattice.destination_coords(coords, i, j, k);
                        let index = lattice
                            .site_index(dest)
                            .unwrap_or_else(|_| unreachable!("validated move"));
                        counts[d2 as usize] += 1;
                        sums[d2 as usize] += original[index.0];
                    }
                }
            }
            let mut total = original[n];
            for d2 in 1..shells {
                if counts[d2] > 0 {
                    let d_nm = lattice.unit_size() * (d2 as f64).sqrt();
                    total += (sums[d2] / counts[d2] as f64) * (scale * d_nm * d_nm).exp();
                }
            }
            new_energies[n] = total;
        }
        let stdev = stdev_of(&new_energies);
        if stdev > 0.0 {
            let norm = stdev / target_stdev;
            for e in &mut new_energies {
                *e /= norm;
            }
        }
        for (n, e) in new_energies.iter().enumerate() {
            lattice.site_mut(SiteIndex(n)).energy = *e;
        }
        let correlation = dos_correlation(lattice);
        if (correlation.len() as i32 - 1) < 2 * range {
            return;
        }
        // Correlation still extends past the smoothing range; widen and
        // redo from the original energies.
        for (n, e) in original.iter().enumerate() {
            lattice.site_mut(SiteIndex(n)).energy = *e;
        }
        range += 2;
    }
}

/// Site-energy autocorrelation versus distance, in half-lattice-unit bins,
/// extended until it decays below 0.01.
fn dos_correlation(lattice: &Lattice) -> Vec<(f64, f64)> {
    let mut cutoff = 1.0f64;
    loop {
        let data = dos_correlation_to(lattice, cutoff);
        match data.last() {
            Some((_, c)) if *c > 0.01 => cutoff += 1.0,
            _ => return data,
        }
    }
}

fn dos_correlation_to(lattice: &Lattice, cutoff_radius: f64) -> Vec<(f64, f64)> {
    let range = (cutoff_radius / lattice.unit_size()).ceil() as i32;
    let size = (2.0 * cutoff_radius / lattice.unit_size()).ceil() as usize + 1;
    let mut sums = vec![0.0f64; size];
    let mut counts = vec![0usize; size];
    let energies: Vec<f64> = lattice.sites().map(|s| s.energy).collect();
    for n in 0..lattice.num_sites() {
        let coords = lattice.site_coords(SiteIndex(n));
        for i in -range..=range {
            for j in -range..=range {
                for k in -range..=range {
                    if !lattice.move_is_valid(coords, i, j, k) {
                        continue;
                    }
                    let bin =
                        (2.0 * ((i * i + j * j + k * k) as f64).sqrt()).round() as usize;
                    if bin < size {
                        let dest = lattice.destination_coords(coords, i, j, k);
                        let index = lattice
                            .site_index(dest)
                            .unwrap_or_else(|_| unreachable!("validated move"));
                        sums[bin] += energies[n] * energies[index.0];
                        counts[bin] += 1;
                    }
                }
            }
        }
    }
    let stdev = stdev_of(&energies);
    let mut data = vec![(0.0, 0.0); size.max(2)];
    data[0] = (0.0, 1.0);
    data[1] = (lattice.unit_size() * 0.5, 1.0);
    for (m, slot) in data.iter_mut().enumerate().skip(2) {
        if counts[m] > 1 && stdev > 0.0 {
            *slot = (
                lattice.unit_size() * m as f64 / 2.0,
                sums[m] / ((counts[m] - 1) as f64 * stdev * stdev),
            );
        }
    }
    data
}

/// Shift energies of sites adjacent to the opposite phase.
///
/// First, second, and third nearest neighbors of the other phase weigh
/// `1`, `1/sqrt(2)`, and `1/sqrt(3)` per neighbor. When no procedural
/// disorder is active the shift replaces the site energy outright.
fn apply_interfacial_shift(lattice: &mut Lattice, params: &Parameters, procedural: bool) {
    let mut shifts: Vec<Option<f64>> = vec![None; lattice.num_sites()];
    for n in 0..lattice.num_sites() {
        let coords = lattice.site_coords(SiteIndex(n));
        let here = lattice.site(SiteIndex(n)).site_type;
        let mut counts = [0usize; 3];
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1i32 {
                    if !lattice.move_is_valid(coords, i, j, k) {
                        continue;
                    }
                    let dest = lattice.destination_coords(coords, i, j, k);
                    let there = lattice
                        .site_type(dest)
                        .unwrap_or_else(|_| unreachable!("validated move"));
                    if there != here {
                        counts[(i.abs() + j.abs() + k.abs() - 1) as usize] += 1;
                    }
                }
            }
        }
        if counts.iter().any(|c| *c > 0) {
            let shift_unit = match here {
                SiteType::Donor => params.energy_shift_donor,
                _ => params.energy_shift_acceptor,
            };
            shifts[n] = Some(
                counts[0] as f64 * shift_unit
                    + counts[1] as f64 * shift_unit / 2.0f64.sqrt()
                    + counts[2] as f64 * shift_unit / 3.0f64.sqrt(),
            );
        }
    }
    for (n, shift) in shifts.into_iter().enumerate() {
        if let Some(shift) = shift {
            let site = lattice.site_mut(SiteIndex(n));
            if procedural {
                site.energy += shift;
            } else {
                site.energy = shift;
            }
        }
    }
}

// ── Export and import ───────────────────────────────────────────

/// Write the site energies: three dimension lines, then one energy per
/// line in canonical x-major, z-fastest order.
pub fn export<W: Write>(lattice: &Lattice, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "{}", lattice.length())?;
    writeln!(writer, "{}", lattice.width())?;
    writeln!(writer, "{}", lattice.height())?;
    for site in lattice.sites() {
        writeln!(writer, "{}", site.energy)?;
    }
    Ok(())
}

/// Read site energies in the [`export`] format and commit them to the
/// lattice. The dimension header must match the lattice before any site
/// is touched, and the energy count must equal the site count.
pub fn import<R: BufRead>(lattice: &mut Lattice, reader: R) -> Result<(), ImportError> {
    let lines: Vec<String> = reader
        .lines()
        .collect::<Result<_, _>>()
        .map_err(|e| ImportError::Io {
            reason: e.to_string(),
        })?;
    if lines.len() < 3 {
        return Err(ImportError::Truncated);
    }
    let mut dims = [0i32; 3];
    for (n, dim) in dims.iter_mut().enumerate() {
        *dim = lines[n].trim().parse().map_err(|_| ImportError::Malformed {
            line: n + 1,
            reason: format!("expected a lattice dimension, got '{}'", lines[n]),
        })?;
    }
    let expected = (lattice.length(), lattice.width(), lattice.height());
    let found = (dims[0], dims[1], dims[2]);
    if found != expected {
        return Err(ImportError::DimensionMismatch { found, expected });
    }
    if lines.len() - 3 != lattice.num_sites() {
        return Err(ImportError::Malformed {
            line: lines.len(),
            reason: format!(
                "expected {} energies, found {}",
                lattice.num_sites(),
                lines.len() - 3
            ),
        });
    }
    let mut scratch = Vec::with_capacity(lattice.num_sites());
    for (n, line) in lines.iter().enumerate().skip(3) {
        let energy: f64 = line.trim().parse().map_err(|_| ImportError::Malformed {
            line: n + 1,
            reason: format!("expected an energy value, got '{line}'"),
        })?;
        scratch.push(energy);
    }
    for (n, energy) in scratch.into_iter().enumerate() {
        lattice.site_mut(SiteIndex(n)).energy = energy;
    }
    Ok(())
}

fn stdev_of(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>()
        / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology;
    use excimer_core::Coords;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn filled_lattice(l: i32, w: i32, h: i32) -> Lattice {
        let mut lat = Lattice::new(l, w, h, 1.0, true, true, true);
        morphology::fill_neat(&mut lat);
        lat
    }

    fn params_with(disorder: DisorderModel) -> Parameters {
        Parameters {
            disorder,
            ..Parameters::default()
        }
    }

    #[test]
    fn no_disorder_zeroes_all_energies() {
        let mut lat = filled_lattice(4, 4, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assign(&mut lat, &params_with(DisorderModel::None), &mut rng).unwrap();
        assert!(lat.sites().all(|s| s.energy == 0.0));
    }

    #[test]
    fn unassigned_sites_are_rejected() {
        let mut lat = Lattice::new(2, 2, 2, 1.0, true, true, true);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = assign(&mut lat, &params_with(DisorderModel::None), &mut rng).unwrap_err();
        assert_eq!(err, ImportError::UnassignedSites { count: 8 });
    }

    #[test]
    fn gaussian_disorder_matches_target_width() {
        let mut lat = filled_lattice(20, 20, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let params = params_with(DisorderModel::Gaussian {
            stdev_donor: 0.05,
            stdev_acceptor: 0.05,
        });
        assign(&mut lat, &params, &mut rng).unwrap();
        let energies: Vec<f64> = lat.sites().map(|s| s.energy).collect();
        let stdev = stdev_of(&energies);
        assert!((stdev - 0.05).abs() < 0.005, "stdev {stdev}");
        let mean = energies.iter().sum::<f64>() / energies.len() as f64;
        assert!(mean.abs() < 0.005, "mean {mean}");
    }

    #[test]
    fn exponential_disorder_is_symmetric() {
        let mut lat = filled_lattice(20, 20, 20);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let params = params_with(DisorderModel::Exponential {
            urbach_donor: 0.03,
            urbach_acceptor: 0.03,
        });
        assign(&mut lat, &params, &mut rng).unwrap();
        let positive = lat.sites().filter(|s| s.energy > 0.0).count();
        let total = lat.num_sites();
        let fraction = positive as f64 / total as f64;
        assert!((fraction - 0.5).abs() < 0.05, "positive fraction {fraction}");
    }

    #[test]
    fn interfacial_shift_touches_only_interface_sites() {
        let mut lat = Lattice::new(4, 4, 4, 1.0, true, true, false);
        morphology::fill_bilayer(&mut lat, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let params = Parameters {
            height: 4,
            periodic_z: false,
            morphology: excimer_core::MorphologyModel::Bilayer {
                thickness_donor: 2,
                thickness_acceptor: 2,
            },
            interfacial_energy_shift: true,
            energy_shift_donor: 0.1,
            energy_shift_acceptor: -0.1,
            ..Parameters::default()
        };
        assign(&mut lat, &params, &mut rng).unwrap();
        // Sites two layers from the junction see no opposite-phase
        // neighbor within the 3x3x3 shell.
        assert_eq!(lat.energy(Coords::new(0, 0, 0)).unwrap(), 0.0);
        assert_eq!(lat.energy(Coords::new(0, 0, 3)).unwrap(), 0.0);
        // Junction-adjacent donor sites shift up, acceptor sites down.
        assert!(lat.energy(Coords::new(0, 0, 2)).unwrap() > 0.0);
        assert!(lat.energy(Coords::new(0, 0, 1)).unwrap() < 0.0);
    }

    #[test]
    fn energies_round_trip_through_export() {
        let mut lat = filled_lattice(3, 3, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let params = params_with(DisorderModel::Gaussian {
            stdev_donor: 0.08,
            stdev_acceptor: 0.08,
        });
        assign(&mut lat, &params, &mut rng).unwrap();
        let before: Vec<f64> = lat.sites().map(|s| s.energy).collect();

        let mut buffer = Vec::new();
        export(&lat, &mut buffer).unwrap();
        let mut other = filled_lattice(3, 3, 3);
        import(&mut other, buffer.as_slice()).unwrap();
        let after: Vec<f64> = other.sites().map(|s| s.energy).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn energy_import_rejects_wrong_dimensions() {
        let mut lat = filled_lattice(3, 3, 3);
        let data = "2\n3\n3\n";
        let err = import(&mut lat, data.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ImportError::DimensionMismatch {
                found: (2, 3, 3),
                expected: (3, 3, 3),
            }
        );
    }

    #[test]
    fn energy_import_rejects_wrong_count() {
        let mut lat = filled_lattice(2, 2, 2);
        let data = "2\n2\n2\n0.1\n0.2\n";
        let err = import(&mut lat, data.as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::Malformed { .. }));
    }

    #[test]
    fn correlated_disorder_preserves_target_width() {
        let mut lat = filled_lattice(12, 12, 12);
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let params = Parameters {
            disorder: DisorderModel::Gaussian {
                stdev_donor: 0.05,
                stdev_acceptor: 0.05,
            },
            correlated_disorder: true,
            disorder_correlation_length: 1.5,
            ..Parameters::default()
        };
        assign(&mut lat, &params, &mut rng).unwrap();
        let energies: Vec<f64> = lat.sites().map(|s| s.energy).collect();
        let stdev = stdev_of(&energies);
        assert!((stdev - 0.05).abs() < 0.01, "stdev {stdev}");
    }
}
