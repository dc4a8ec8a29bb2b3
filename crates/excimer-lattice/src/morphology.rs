//! Donor/acceptor film architecture providers.
//!
//! Three procedural morphologies (neat, bilayer, random blend) and an
//! importer for the Ising_OPV morphology file format, v3.2 and v4.x, in
//! both compressed and uncompressed form. Imports parse into scratch
//! storage and commit only on success, so a failing import leaves the
//! lattice untouched.

use crate::lattice::Lattice;
use crate::site::SiteType;
use excimer_core::{Coords, ImportError, MorphologyModel};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Assign site types according to the configured morphology model.
pub fn apply<R: Rng + ?Sized>(
    lattice: &mut Lattice,
    model: &MorphologyModel,
    rng: &mut R,
) -> Result<(), ImportError> {
    match model {
        MorphologyModel::Neat => {
            fill_neat(lattice);
            Ok(())
        }
        MorphologyModel::Bilayer {
            thickness_acceptor, ..
        } => {
            fill_bilayer(lattice, *thickness_acceptor);
            Ok(())
        }
        MorphologyModel::RandomBlend { acceptor_fraction } => {
            fill_random_blend(lattice, *acceptor_fraction, rng);
            Ok(())
        }
        MorphologyModel::Imported { filename } => {
            let file = File::open(filename).map_err(|e| ImportError::Io {
                reason: e.to_string(),
            })?;
            import(lattice, BufReader::new(file))
        }
    }
}

/// Make every site donor.
pub fn fill_neat(lattice: &mut Lattice) {
    let types = vec![SiteType::Donor; lattice.num_sites()];
    lattice.assign_types(&types);
}

/// Planar heterojunction: acceptor below `thickness_acceptor` (the
/// electron-extracting face at z = 0), donor above.
pub fn fill_bilayer(lattice: &mut Lattice, thickness_acceptor: i32) {
    let types: Vec<SiteType> = (0..lattice.num_sites())
        .map(|n| {
            if lattice.site_coords(n.into()).z < thickness_acceptor {
                SiteType::Acceptor
            } else {
                SiteType::Donor
            }
        })
        .collect();
    lattice.assign_types(&types);
}

/// Uniformly random blend with an exact acceptor site count of
/// `round(acceptor_fraction * num_sites)`.
pub fn fill_random_blend<R: Rng + ?Sized>(
    lattice: &mut Lattice,
    acceptor_fraction: f64,
    rng: &mut R,
) {
    let n = lattice.num_sites();
    let n_acceptor = (acceptor_fraction * n as f64).round() as usize;
    let mut types = vec![SiteType::Donor; n];
    for t in types.iter_mut().take(n_acceptor) {
        *t = SiteType::Acceptor;
    }
    types.shuffle(rng);
    lattice.assign_types(&types);
}

/// Parse an Ising_OPV morphology file and commit it to the lattice.
///
/// Accepted headers declare `Ising_OPV v3.2` or `v4.0` and newer; the
/// header also declares whether the site data is run-length compressed.
/// The three dimension lines must match the lattice exactly, and every
/// site must receive a type.
pub fn import<R: BufRead>(lattice: &mut Lattice, reader: R) -> Result<(), ImportError> {
    let mut lines = reader.lines().enumerate();
    let mut next_line = |expected: &'static str| -> Result<(usize, String), ImportError> {
        match lines.next() {
            Some((n, Ok(line))) => Ok((n + 1, line)),
            Some((_, Err(e))) => Err(ImportError::Io {
                reason: e.to_string(),
            }),
            None => Err(ImportError::Malformed {
                line: 0,
                reason: format!("missing {expected}"),
            }),
        }
    };

    let (_, header) = next_line("header line")?;
    if !header.starts_with("Ising_OPV") {
        return Err(ImportError::UnsupportedFormat { header });
    }
    let version = parse_version(&header)?;
    let is_v3 = version.0 == 3;
    if version < (3, 2) {
        return Err(ImportError::UnsupportedVersion {
            version: format!("{}.{}", version.0, version.1),
        });
    }
    let compressed = !header.contains("uncompressed");

    let mut dims = [0i32; 3];
    for dim in dims.iter_mut() {
        let (n, line) = next_line("dimension line")?;
        *dim = line
            .trim()
            .parse()
            .map_err(|_| ImportError::Malformed {
                line: n,
                reason: format!("expected a lattice dimension, got '{line}'"),
            })?;
    }
    let expected = (lattice.length(), lattice.width(), lattice.height());
    let found = (dims[0], dims[1], dims[2]);
    if found != expected {
        return Err(ImportError::DimensionMismatch { found, expected });
    }

    // v3 carries 3 header lines of domain statistics; v4 carries 3
    // boundary-condition lines, a site-type count, and 2 lines per type.
    if is_v3 {
        for _ in 0..3 {
            next_line("v3 metadata line")?;
        }
    } else {
        for _ in 0..3 {
            next_line("boundary condition line")?;
        }
        let (n, line) = next_line("site type count")?;
        let n_types: usize = line.trim().parse().map_err(|_| ImportError::Malformed {
            line: n,
            reason: format!("expected a site type count, got '{line}'"),
        })?;
        for _ in 0..2 * n_types {
            next_line("site type metadata line")?;
        }
    }

    let mut scratch = vec![SiteType::Unassigned; lattice.num_sites()];
    if compressed {
        // Run-length data in canonical x-major, z-fastest order; each line
        // is a single type digit followed by a repeat count.
        let mut run_type = SiteType::Unassigned;
        let mut run_left = 0usize;
        for slot in scratch.iter_mut() {
            if run_left == 0 {
                let (n, line) = match lines.next() {
                    Some((n, Ok(line))) => (n + 1, line),
                    Some((_, Err(e))) => {
                        return Err(ImportError::Io {
                            reason: e.to_string(),
                        })
                    }
                    None => return Err(ImportError::Truncated),
                };
                let mut chars = line.trim().chars();
                run_type = match chars.next() {
                    Some('1') => SiteType::Donor,
                    Some('2') => SiteType::Acceptor,
                    other => {
                        return Err(ImportError::Malformed {
                            line: n,
                            reason: format!("unknown site type '{other:?}'"),
                        })
                    }
                };
                run_left = chars.as_str().parse().map_err(|_| ImportError::Malformed {
                    line: n,
                    reason: format!("bad run length in '{line}'"),
                })?;
                if run_left == 0 {
                    return Err(ImportError::Malformed {
                        line: n,
                        reason: "zero-length run".into(),
                    });
                }
            }
            *slot = run_type;
            run_left -= 1;
        }
    } else {
        for (n, line) in lines {
            let line = line.map_err(|e| ImportError::Io {
                reason: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.trim().split(',');
            let mut field = |what: &str| -> Result<i32, ImportError> {
                fields
                    .next()
                    .and_then(|f| f.trim().parse().ok())
                    .ok_or_else(|| ImportError::Malformed {
                        line: n + 1,
                        reason: format!("missing or invalid {what} in '{line}'"),
                    })
            };
            let coords = Coords::new(field("x")?, field("y")?, field("z")?);
            let site_type = match field("site type")? {
                1 => SiteType::Donor,
                2 => SiteType::Acceptor,
                other => {
                    return Err(ImportError::Malformed {
                        line: n + 1,
                        reason: format!("unknown site type {other}"),
                    })
                }
            };
            let index = lattice
                .site_index(coords)
                .map_err(|_| ImportError::Malformed {
                    line: n + 1,
                    reason: format!("coordinates {coords} are outside the lattice"),
                })?;
            scratch[index.0] = site_type;
        }
    }

    let unassigned = scratch
        .iter()
        .filter(|t| **t == SiteType::Unassigned)
        .count();
    if unassigned > 0 {
        return Err(ImportError::UnassignedSites { count: unassigned });
    }
    lattice.assign_types(&scratch);
    Ok(())
}

/// Extract `(major, minor)` from a header like `Ising_OPV v4.0 compressed`.
fn parse_version(header: &str) -> Result<(u32, u32), ImportError> {
    let malformed = || ImportError::UnsupportedFormat {
        header: header.to_string(),
    };
    let after_v = header.split('v').nth(1).ok_or_else(malformed)?;
    let token = after_v.split_whitespace().next().ok_or_else(malformed)?;
    // Pre-release suffixes like "4.0.0-beta.1" compare by their numeric core.
    let core = token.split('-').next().ok_or_else(malformed)?;
    let mut parts = core.split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(malformed)?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn lattice_2x2x2() -> Lattice {
        Lattice::new(2, 2, 2, 1.0, true, true, true)
    }

    #[test]
    fn neat_fill_is_all_donor() {
        let mut lat = lattice_2x2x2();
        fill_neat(&mut lat);
        assert_eq!(lat.phase_counts(), (8, 0));
    }

    #[test]
    fn bilayer_splits_at_acceptor_thickness() {
        let mut lat = Lattice::new(3, 3, 4, 1.0, true, true, false);
        fill_bilayer(&mut lat, 1);
        assert_eq!(lat.phase_counts(), (27, 9));
        assert_eq!(
            lat.site_type(Coords::new(0, 0, 0)).unwrap(),
            SiteType::Acceptor
        );
        assert_eq!(
            lat.site_type(Coords::new(0, 0, 1)).unwrap(),
            SiteType::Donor
        );
    }

    #[test]
    fn random_blend_hits_exact_fraction() {
        let mut lat = Lattice::new(10, 10, 10, 1.0, true, true, true);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        fill_random_blend(&mut lat, 0.3, &mut rng);
        assert_eq!(lat.phase_counts(), (700, 300));
    }

    #[test]
    fn imports_uncompressed_v4() {
        let mut lat = lattice_2x2x2();
        let mut data = String::from(
            "Ising_OPV v4.0 uncompressed\n2\n2\n2\ntrue\ntrue\nfalse\n2\n0.5\n0.5\n0.5\n0.5\n",
        );
        for x in 0..2 {
            for y in 0..2 {
                for z in 0..2 {
                    let t = if z == 0 { 2 } else { 1 };
                    data.push_str(&format!("{x},{y},{z},{t}\n"));
                }
            }
        }
        import(&mut lat, data.as_bytes()).unwrap();
        assert_eq!(lat.phase_counts(), (4, 4));
        assert_eq!(
            lat.site_type(Coords::new(1, 1, 0)).unwrap(),
            SiteType::Acceptor
        );
    }

    #[test]
    fn imports_compressed_v3() {
        let mut lat = lattice_2x2x2();
        // 8 sites in canonical order: 4 acceptor runs then 4 donor.
        let data = "Ising_OPV v3.2 compressed\n2\n2\n2\nskip\nskip\nskip\n24\n14\n";
        import(&mut lat, data.as_bytes()).unwrap();
        assert_eq!(lat.phase_counts(), (4, 4));
        assert_eq!(
            lat.site_type(Coords::new(0, 0, 0)).unwrap(),
            SiteType::Acceptor
        );
        assert_eq!(
            lat.site_type(Coords::new(1, 1, 1)).unwrap(),
            SiteType::Donor
        );
    }

    #[test]
    fn rejects_unknown_header() {
        let mut lat = lattice_2x2x2();
        let err = import(&mut lat, "some other format\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat { .. }));
    }

    #[test]
    fn rejects_old_version() {
        let mut lat = lattice_2x2x2();
        let err = import(&mut lat, "Ising_OPV v3.1 compressed\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedVersion { .. }));
    }

    #[test]
    fn dimension_mismatch_leaves_lattice_untouched() {
        let mut lat = lattice_2x2x2();
        fill_neat(&mut lat);
        let data = "Ising_OPV v4.0 compressed\n3\n2\n2\n";
        let err = import(&mut lat, data.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ImportError::DimensionMismatch {
                found: (3, 2, 2),
                expected: (2, 2, 2),
            }
        );
        assert_eq!(lat.phase_counts(), (8, 0));
    }

    #[test]
    fn truncated_compressed_data_fails_without_commit() {
        let mut lat = lattice_2x2x2();
        fill_neat(&mut lat);
        let data = "Ising_OPV v4.0 compressed\n2\n2\n2\nt\nt\nf\n0\n16\n";
        let err = import(&mut lat, data.as_bytes()).unwrap_err();
        assert_eq!(err, ImportError::Truncated);
        assert_eq!(lat.phase_counts(), (8, 0));
    }

    #[test]
    fn uncompressed_with_missing_sites_fails() {
        let mut lat = lattice_2x2x2();
        let data = "Ising_OPV v4.0 uncompressed\n2\n2\n2\nt\nt\nf\n1\n0.5\n0.5\n0,0,0,1\n";
        let err = import(&mut lat, data.as_bytes()).unwrap_err();
        assert_eq!(err, ImportError::UnassignedSites { count: 7 });
    }
}
