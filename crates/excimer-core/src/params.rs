//! The validated simulation configuration.
//!
//! [`Parameters`] carries every physical and operational knob of the
//! engine: lattice geometry, film morphology selection, energetic disorder
//! model, hopping-rate model, per-phase rate prefactors and energy levels,
//! Coulomb settings, and the run-mode selection with its mode-specific
//! settings. External collaborators build and populate it; the engine
//! requires [`Parameters::validate`] to pass before initialization.
//!
//! Units: lengths nm, energies eV, times s, volumetric rates cm^-3 s^-1,
//! temperatures K, potentials V.

use crate::error::ParametersError;
use crate::K_B;

/// Film morphology provider selection.
#[derive(Clone, Debug, PartialEq)]
pub enum MorphologyModel {
    /// All sites are donor.
    Neat,
    /// Acceptor slab below `thickness_acceptor`, donor above.
    Bilayer {
        /// Donor layer thickness in sites.
        thickness_donor: i32,
        /// Acceptor layer thickness in sites.
        thickness_acceptor: i32,
    },
    /// Random donor/acceptor blend with an exact acceptor site fraction.
    RandomBlend {
        /// Target acceptor site fraction in (0, 1).
        acceptor_fraction: f64,
    },
    /// Site types parsed from a morphology file (see the lattice crate's
    /// import module for the accepted formats).
    Imported {
        /// Path of the morphology file.
        filename: String,
    },
}

/// Energetic disorder provider selection.
#[derive(Clone, Debug, PartialEq)]
pub enum DisorderModel {
    /// All site energies zero.
    None,
    /// Gaussian density of states with per-phase standard deviations.
    Gaussian {
        /// Donor-phase standard deviation.
        stdev_donor: f64,
        /// Acceptor-phase standard deviation.
        stdev_acceptor: f64,
    },
    /// Double-sided exponential (Urbach tail) density of states.
    Exponential {
        /// Donor-phase Urbach energy.
        urbach_donor: f64,
        /// Acceptor-phase Urbach energy.
        urbach_acceptor: f64,
    },
    /// Site energies parsed from an energies file.
    Imported {
        /// Path of the energies file.
        filename: String,
    },
}

/// Hopping-rate law selection for polaron hops and exciton dissociation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoppingModel {
    /// Miller-Abrahams law: uphill transitions carry a Boltzmann penalty,
    /// downhill transitions none.
    MillerAbrahams,
    /// Marcus theory: Gaussian activation barrier with reorganization
    /// energy, symmetric in form for uphill and downhill.
    Marcus,
}

/// Placement policy for the initial time-of-flight carriers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToFPlacement {
    /// Uniformly random eligible sites in the generation plane.
    Random,
    /// Sites whose energy is closest to a target energy.
    Energy {
        /// Target placement energy.
        target: f64,
    },
}

/// Run-mode selection.
///
/// Each mode changes which generation/extraction events are armed, which
/// sampling hooks run, and the termination predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Photogenerate excitons continuously and record diffusion lengths
    /// and lifetimes until the recombination budget is met.
    ExcitonDiffusion,
    /// Time-of-flight transient: seed one carrier species at an electrode
    /// plane and track transit across the lattice.
    TimeOfFlight,
    /// Internal quantum efficiency: photogenerate a budget of excitons and
    /// track their fate statistics to extraction or loss.
    Iqe,
    /// Transient dynamics: seed an exciton population at t=0 and record
    /// log-spaced decay transients.
    Dynamics,
    /// Steady-state charge transport: fixed hole population, periodic
    /// transport direction, DOS/DOOS and transport-energy sampling after
    /// an equilibration event budget.
    SteadyTransport,
}

/// The full simulation configuration (~80 physical parameters).
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    // ── Lattice ─────────────────────────────────────────────────
    /// Lattice length (x-axis sites).
    pub length: i32,
    /// Lattice width (y-axis sites).
    pub width: i32,
    /// Lattice height (z-axis sites, the transport direction).
    pub height: i32,
    /// Lattice constant in nm.
    pub unit_size: f64,
    /// Periodic boundary along x.
    pub periodic_x: bool,
    /// Periodic boundary along y.
    pub periodic_y: bool,
    /// Periodic boundary along z; when false, both z faces are electrodes.
    pub periodic_z: bool,

    // ── Film architecture and energetics ────────────────────────
    /// Morphology provider.
    pub morphology: MorphologyModel,
    /// Energetic disorder provider.
    pub disorder: DisorderModel,
    /// Smooth the disorder to a spatial correlation length (nm).
    pub correlated_disorder: bool,
    /// Target disorder correlation length in nm.
    pub disorder_correlation_length: f64,
    /// Shift site energies near the heterojunction interface.
    pub interfacial_energy_shift: bool,
    /// Per-neighbor interfacial shift on donor sites.
    pub energy_shift_donor: f64,
    /// Per-neighbor interfacial shift on acceptor sites.
    pub energy_shift_acceptor: f64,
    /// HOMO level of the donor phase (positive magnitude below vacuum).
    pub homo_donor: f64,
    /// LUMO level of the donor phase.
    pub lumo_donor: f64,
    /// HOMO level of the acceptor phase.
    pub homo_acceptor: f64,
    /// LUMO level of the acceptor phase.
    pub lumo_acceptor: f64,

    // ── Environment ─────────────────────────────────────────────
    /// Temperature in K.
    pub temperature: f64,
    /// Built-in plus applied potential across the film in V.
    pub internal_potential: f64,

    // ── Exciton mechanisms ──────────────────────────────────────
    /// Volumetric exciton generation rate in the donor, cm^-3 s^-1.
    pub exciton_generation_rate_donor: f64,
    /// Volumetric exciton generation rate in the acceptor, cm^-3 s^-1.
    pub exciton_generation_rate_acceptor: f64,
    /// Singlet lifetime on donor sites, s.
    pub singlet_lifetime_donor: f64,
    /// Singlet lifetime on acceptor sites, s.
    pub singlet_lifetime_acceptor: f64,
    /// Triplet lifetime on donor sites, s.
    pub triplet_lifetime_donor: f64,
    /// Triplet lifetime on acceptor sites, s.
    pub triplet_lifetime_acceptor: f64,
    /// Singlet FRET hop attempt rate from donor sites, s^-1.
    pub r_singlet_hopping_donor: f64,
    /// Singlet FRET hop attempt rate from acceptor sites, s^-1.
    pub r_singlet_hopping_acceptor: f64,
    /// Singlet inverse localization length on the donor, nm^-1.
    pub singlet_localization_donor: f64,
    /// Singlet inverse localization length on the acceptor, nm^-1.
    pub singlet_localization_acceptor: f64,
    /// Triplet Dexter hop attempt rate from donor sites, s^-1.
    pub r_triplet_hopping_donor: f64,
    /// Triplet Dexter hop attempt rate from acceptor sites, s^-1.
    pub r_triplet_hopping_acceptor: f64,
    /// Triplet inverse localization length on the donor, nm^-1.
    pub triplet_localization_donor: f64,
    /// Triplet inverse localization length on the acceptor, nm^-1.
    pub triplet_localization_acceptor: f64,
    /// FRET/hop interaction cutoff radius, nm.
    pub fret_cutoff: f64,
    /// Exciton binding energy in the donor, eV.
    pub e_exciton_binding_donor: f64,
    /// Exciton binding energy in the acceptor, eV.
    pub e_exciton_binding_acceptor: f64,
    /// Dissociation attempt rate from donor sites, s^-1.
    pub r_exciton_dissociation_donor: f64,
    /// Dissociation attempt rate from acceptor sites, s^-1.
    pub r_exciton_dissociation_acceptor: f64,
    /// Dissociation interaction cutoff radius, nm.
    pub exciton_dissociation_cutoff: f64,
    /// Intersystem crossing rate on donor sites, s^-1.
    pub r_exciton_isc_donor: f64,
    /// Intersystem crossing rate on acceptor sites, s^-1.
    pub r_exciton_isc_acceptor: f64,
    /// Reverse intersystem crossing rate on donor sites, s^-1.
    pub r_exciton_risc_donor: f64,
    /// Reverse intersystem crossing rate on acceptor sites, s^-1.
    pub r_exciton_risc_acceptor: f64,
    /// Singlet-triplet energy splitting in the donor, eV.
    pub e_exciton_st_donor: f64,
    /// Singlet-triplet energy splitting in the acceptor, eV.
    pub e_exciton_st_acceptor: f64,
    /// Use the FRET law for triplet annihilation instead of Dexter.
    pub fret_triplet_annihilation: bool,
    /// Exciton-exciton annihilation attempt rate on the donor, s^-1.
    pub r_exciton_exciton_annihilation_donor: f64,
    /// Exciton-exciton annihilation attempt rate on the acceptor, s^-1.
    pub r_exciton_exciton_annihilation_acceptor: f64,
    /// Exciton-polaron annihilation attempt rate on the donor, s^-1.
    pub r_exciton_polaron_annihilation_donor: f64,
    /// Exciton-polaron annihilation attempt rate on the acceptor, s^-1.
    pub r_exciton_polaron_annihilation_acceptor: f64,

    // ── Polaron mechanisms ──────────────────────────────────────
    /// Restrict electrons to the acceptor phase and holes to the donor
    /// phase (hops and creation).
    pub phase_restriction: bool,
    /// Polaron hop attempt rate on donor sites, s^-1.
    pub r_polaron_hopping_donor: f64,
    /// Polaron hop attempt rate on acceptor sites, s^-1.
    pub r_polaron_hopping_acceptor: f64,
    /// Polaron inverse localization length on the donor, nm^-1.
    pub polaron_localization_donor: f64,
    /// Polaron inverse localization length on the acceptor, nm^-1.
    pub polaron_localization_acceptor: f64,
    /// Rate law for polaron hops and exciton dissociation.
    pub hopping_model: HoppingModel,
    /// Marcus reorganization energy in the donor, eV.
    pub reorganization_donor: f64,
    /// Marcus reorganization energy in the acceptor, eV.
    pub reorganization_acceptor: f64,
    /// Polaron recombination attempt rate, s^-1.
    pub r_polaron_recombination: f64,
    /// Polaron hop cutoff radius, nm.
    pub polaron_hopping_cutoff: f64,
    /// Gaussian polaron delocalization length in nm; `None` disables the
    /// error-function attenuation of the Coulomb table.
    pub polaron_delocalization: Option<f64>,

    // ── Coulomb interactions ────────────────────────────────────
    /// Coulomb interaction cutoff radius, nm.
    pub coulomb_cutoff: f64,
    /// Relative permittivity of the donor phase.
    pub dielectric_donor: f64,
    /// Relative permittivity of the acceptor phase.
    pub dielectric_acceptor: f64,

    // ── Run mode ────────────────────────────────────────────────
    /// Which test drives generation, sampling, and termination.
    pub run_mode: RunMode,
    /// Per-mode test budget (recombinations, created carriers, or
    /// measurement events).
    pub n_tests: u64,
    /// IQE wall-clock (simulated) cutoff time, s.
    pub iqe_time_cutoff: f64,
    /// Initial exciton concentration for the dynamics test, cm^-3.
    pub dynamics_initial_exciton_conc: f64,
    /// Dynamics transient window start, s.
    pub dynamics_transient_start: f64,
    /// Dynamics transient window end, s.
    pub dynamics_transient_end: f64,
    /// Dynamics transient sampling density, bins per decade.
    pub dynamics_pnts_per_decade: u32,
    /// Arm extraction events during the dynamics test.
    pub dynamics_extraction: bool,
    /// Number of carriers seeded per ToF transient cycle.
    pub tof_initial_polarons: u32,
    /// ToF transient window start, s.
    pub tof_transient_start: f64,
    /// ToF transient window end, s.
    pub tof_transient_end: f64,
    /// ToF transient sampling density, bins per decade.
    pub tof_pnts_per_decade: u32,
    /// ToF carrier species: `true` seeds holes, `false` electrons.
    pub tof_polaron_is_hole: bool,
    /// ToF initial placement policy.
    pub tof_placement: ToFPlacement,
    /// Steady-transport hole density, cm^-3.
    pub steady_carrier_density: f64,
    /// Events executed before steady-state measurement begins.
    pub n_equilibration_events: u64,
    /// DOS/DOOS histogram bin width, eV.
    pub dos_bin_size: f64,
    /// Events between DOOS samples in steady transport.
    pub steady_hops_per_doos_sample: u64,
    /// Events between DOS samples in steady transport.
    pub steady_hops_per_dos_sample: u64,

    // ── Instance ────────────────────────────────────────────────
    /// RNG stream seed for this simulation instance.
    pub seed: u64,
    /// Record a human-readable event log in memory.
    pub logging_enabled: bool,
}

impl Parameters {
    /// Thermal energy `kT` in eV.
    pub fn kt(&self) -> f64 {
        K_B * self.temperature
    }

    /// The neighborhood radius (nm) within which an executed event can
    /// invalidate another object's candidates: the largest interaction
    /// cutoff.
    pub fn recalc_cutoff(&self) -> f64 {
        self.fret_cutoff
            .max(self.exciton_dissociation_cutoff)
            .max(self.polaron_hopping_cutoff)
            .max(self.coulomb_cutoff)
    }

    /// Validate the full configuration.
    ///
    /// Returns the first inconsistency found. The engine refuses to
    /// construct from an unvalidated or invalid configuration.
    pub fn validate(&self) -> Result<(), ParametersError> {
        fn positive(name: &'static str, v: f64) -> Result<(), ParametersError> {
            if !(v.is_finite() && v > 0.0) {
                return Err(ParametersError::Invalid {
                    name,
                    reason: format!("must be finite and > 0, got {v}"),
                });
            }
            Ok(())
        }
        fn non_negative(name: &'static str, v: f64) -> Result<(), ParametersError> {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ParametersError::Invalid {
                    name,
                    reason: format!("must be finite and >= 0, got {v}"),
                });
            }
            Ok(())
        }

        if self.length <= 0 || self.width <= 0 || self.height <= 0 {
            return Err(ParametersError::Invalid {
                name: "length/width/height",
                reason: format!(
                    "lattice dimensions must be positive, got {}x{}x{}",
                    self.length, self.width, self.height
                ),
            });
        }
        positive("unit_size", self.unit_size)?;
        positive("temperature", self.temperature)?;
        if !self.internal_potential.is_finite() {
            return Err(ParametersError::Invalid {
                name: "internal_potential",
                reason: "must be finite".into(),
            });
        }

        match &self.morphology {
            MorphologyModel::Neat | MorphologyModel::Imported { .. } => {}
            MorphologyModel::Bilayer {
                thickness_donor,
                thickness_acceptor,
            } => {
                if *thickness_donor <= 0 || *thickness_acceptor <= 0 {
                    return Err(ParametersError::Invalid {
                        name: "morphology",
                        reason: "bilayer thicknesses must be positive".into(),
                    });
                }
                if thickness_donor + thickness_acceptor != self.height {
                    return Err(ParametersError::Invalid {
                        name: "morphology",
                        reason: format!(
                            "bilayer thicknesses {}+{} must sum to the lattice height {}",
                            thickness_donor, thickness_acceptor, self.height
                        ),
                    });
                }
            }
            MorphologyModel::RandomBlend { acceptor_fraction } => {
                if !(acceptor_fraction.is_finite()
                    && *acceptor_fraction > 0.0
                    && *acceptor_fraction < 1.0)
                {
                    return Err(ParametersError::Invalid {
                        name: "morphology",
                        reason: format!(
                            "acceptor_fraction must be in (0, 1), got {acceptor_fraction}"
                        ),
                    });
                }
            }
        }

        match &self.disorder {
            DisorderModel::None | DisorderModel::Imported { .. } => {}
            DisorderModel::Gaussian {
                stdev_donor,
                stdev_acceptor,
            } => {
                non_negative("disorder.stdev_donor", *stdev_donor)?;
                non_negative("disorder.stdev_acceptor", *stdev_acceptor)?;
            }
            DisorderModel::Exponential {
                urbach_donor,
                urbach_acceptor,
            } => {
                positive("disorder.urbach_donor", *urbach_donor)?;
                positive("disorder.urbach_acceptor", *urbach_acceptor)?;
            }
        }
        if self.correlated_disorder {
            positive("disorder_correlation_length", self.disorder_correlation_length)?;
            if matches!(
                self.disorder,
                DisorderModel::None | DisorderModel::Imported { .. }
            ) {
                return Err(ParametersError::Invalid {
                    name: "correlated_disorder",
                    reason: "requires a procedural disorder model".into(),
                });
            }
        }

        positive("singlet_lifetime_donor", self.singlet_lifetime_donor)?;
        positive("singlet_lifetime_acceptor", self.singlet_lifetime_acceptor)?;
        positive("triplet_lifetime_donor", self.triplet_lifetime_donor)?;
        positive("triplet_lifetime_acceptor", self.triplet_lifetime_acceptor)?;
        non_negative("exciton_generation_rate_donor", self.exciton_generation_rate_donor)?;
        non_negative(
            "exciton_generation_rate_acceptor",
            self.exciton_generation_rate_acceptor,
        )?;
        non_negative("r_singlet_hopping_donor", self.r_singlet_hopping_donor)?;
        non_negative("r_singlet_hopping_acceptor", self.r_singlet_hopping_acceptor)?;
        non_negative("r_triplet_hopping_donor", self.r_triplet_hopping_donor)?;
        non_negative("r_triplet_hopping_acceptor", self.r_triplet_hopping_acceptor)?;
        positive("fret_cutoff", self.fret_cutoff)?;
        positive("exciton_dissociation_cutoff", self.exciton_dissociation_cutoff)?;
        positive("polaron_hopping_cutoff", self.polaron_hopping_cutoff)?;
        positive("coulomb_cutoff", self.coulomb_cutoff)?;
        positive("dielectric_donor", self.dielectric_donor)?;
        positive("dielectric_acceptor", self.dielectric_acceptor)?;
        non_negative("r_polaron_hopping_donor", self.r_polaron_hopping_donor)?;
        non_negative("r_polaron_hopping_acceptor", self.r_polaron_hopping_acceptor)?;
        non_negative("r_polaron_recombination", self.r_polaron_recombination)?;
        if self.hopping_model == HoppingModel::Marcus {
            positive("reorganization_donor", self.reorganization_donor)?;
            positive("reorganization_acceptor", self.reorganization_acceptor)?;
        }
        if let Some(delta) = self.polaron_delocalization {
            positive("polaron_delocalization", delta)?;
        }

        if self.n_tests == 0 {
            return Err(ParametersError::Invalid {
                name: "n_tests",
                reason: "test budget must be at least 1".into(),
            });
        }
        match self.run_mode {
            RunMode::TimeOfFlight => {
                if self.tof_initial_polarons == 0 {
                    return Err(ParametersError::Invalid {
                        name: "tof_initial_polarons",
                        reason: "must seed at least one carrier per cycle".into(),
                    });
                }
                positive("tof_transient_start", self.tof_transient_start)?;
                positive("tof_transient_end", self.tof_transient_end)?;
                if self.tof_transient_end <= self.tof_transient_start {
                    return Err(ParametersError::Invalid {
                        name: "tof_transient_end",
                        reason: "must exceed tof_transient_start".into(),
                    });
                }
                if self.tof_pnts_per_decade == 0 {
                    return Err(ParametersError::Invalid {
                        name: "tof_pnts_per_decade",
                        reason: "must be at least 1".into(),
                    });
                }
                if self.periodic_z {
                    return Err(ParametersError::Invalid {
                        name: "periodic_z",
                        reason: "time-of-flight requires electrode (non-periodic) z faces".into(),
                    });
                }
            }
            RunMode::Dynamics => {
                positive("dynamics_initial_exciton_conc", self.dynamics_initial_exciton_conc)?;
                positive("dynamics_transient_start", self.dynamics_transient_start)?;
                positive("dynamics_transient_end", self.dynamics_transient_end)?;
                if self.dynamics_transient_end <= self.dynamics_transient_start {
                    return Err(ParametersError::Invalid {
                        name: "dynamics_transient_end",
                        reason: "must exceed dynamics_transient_start".into(),
                    });
                }
                if self.dynamics_pnts_per_decade == 0 {
                    return Err(ParametersError::Invalid {
                        name: "dynamics_pnts_per_decade",
                        reason: "must be at least 1".into(),
                    });
                }
            }
            RunMode::Iqe => {
                positive("iqe_time_cutoff", self.iqe_time_cutoff)?;
            }
            RunMode::SteadyTransport => {
                positive("steady_carrier_density", self.steady_carrier_density)?;
                positive("dos_bin_size", self.dos_bin_size)?;
                if self.steady_hops_per_doos_sample == 0 || self.steady_hops_per_dos_sample == 0 {
                    return Err(ParametersError::Invalid {
                        name: "steady_hops_per_doos_sample",
                        reason: "sampling strides must be at least 1".into(),
                    });
                }
                if !self.periodic_z {
                    return Err(ParametersError::Invalid {
                        name: "periodic_z",
                        reason: "steady transport requires a periodic transport axis".into(),
                    });
                }
            }
            RunMode::ExcitonDiffusion => {}
        }

        Ok(())
    }
}

impl Default for Parameters {
    /// A small neat-film exciton-diffusion configuration with no disorder.
    ///
    /// Every test and example starts from here and overrides what it needs;
    /// the defaults themselves pass [`Parameters::validate`].
    fn default() -> Self {
        Self {
            length: 50,
            width: 50,
            height: 50,
            unit_size: 1.0,
            periodic_x: true,
            periodic_y: true,
            periodic_z: true,
            morphology: MorphologyModel::Neat,
            disorder: DisorderModel::None,
            correlated_disorder: false,
            disorder_correlation_length: 1.0,
            interfacial_energy_shift: false,
            energy_shift_donor: 0.0,
            energy_shift_acceptor: 0.0,
            homo_donor: 5.3,
            lumo_donor: 3.4,
            homo_acceptor: 6.0,
            lumo_acceptor: 3.9,
            temperature: 300.0,
            internal_potential: 0.0,
            exciton_generation_rate_donor: 1e22,
            exciton_generation_rate_acceptor: 1e22,
            singlet_lifetime_donor: 5e-10,
            singlet_lifetime_acceptor: 5e-10,
            triplet_lifetime_donor: 1e-6,
            triplet_lifetime_acceptor: 1e-6,
            r_singlet_hopping_donor: 1e12,
            r_singlet_hopping_acceptor: 1e12,
            singlet_localization_donor: 1.0,
            singlet_localization_acceptor: 1.0,
            r_triplet_hopping_donor: 1e12,
            r_triplet_hopping_acceptor: 1e12,
            triplet_localization_donor: 2.0,
            triplet_localization_acceptor: 2.0,
            fret_cutoff: 2.0,
            e_exciton_binding_donor: 0.3,
            e_exciton_binding_acceptor: 0.3,
            r_exciton_dissociation_donor: 1e14,
            r_exciton_dissociation_acceptor: 1e14,
            exciton_dissociation_cutoff: 1.0,
            r_exciton_isc_donor: 0.0,
            r_exciton_isc_acceptor: 0.0,
            r_exciton_risc_donor: 0.0,
            r_exciton_risc_acceptor: 0.0,
            e_exciton_st_donor: 0.7,
            e_exciton_st_acceptor: 0.7,
            fret_triplet_annihilation: false,
            r_exciton_exciton_annihilation_donor: 0.0,
            r_exciton_exciton_annihilation_acceptor: 0.0,
            r_exciton_polaron_annihilation_donor: 0.0,
            r_exciton_polaron_annihilation_acceptor: 0.0,
            phase_restriction: true,
            r_polaron_hopping_donor: 1e12,
            r_polaron_hopping_acceptor: 1e12,
            polaron_localization_donor: 2.0,
            polaron_localization_acceptor: 2.0,
            hopping_model: HoppingModel::MillerAbrahams,
            reorganization_donor: 0.2,
            reorganization_acceptor: 0.2,
            r_polaron_recombination: 1e12,
            polaron_hopping_cutoff: 1.1,
            polaron_delocalization: None,
            coulomb_cutoff: 15.0,
            dielectric_donor: 3.5,
            dielectric_acceptor: 3.5,
            run_mode: RunMode::ExcitonDiffusion,
            n_tests: 1000,
            iqe_time_cutoff: 1e-4,
            dynamics_initial_exciton_conc: 1e17,
            dynamics_transient_start: 1e-13,
            dynamics_transient_end: 1e-7,
            dynamics_pnts_per_decade: 10,
            dynamics_extraction: false,
            tof_initial_polarons: 10,
            tof_transient_start: 1e-12,
            tof_transient_end: 1e-5,
            tof_pnts_per_decade: 10,
            tof_polaron_is_hole: true,
            tof_placement: ToFPlacement::Random,
            steady_carrier_density: 1e17,
            n_equilibration_events: 10_000,
            dos_bin_size: 0.02,
            steady_hops_per_doos_sample: 10,
            steady_hops_per_dos_sample: 1000,
            seed: 42,
            logging_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Parameters::default().validate().unwrap();
    }

    #[test]
    fn rejects_nonpositive_dimensions() {
        let params = Parameters {
            height: 0,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_bilayer_thickness_mismatch() {
        let params = Parameters {
            height: 40,
            morphology: MorphologyModel::Bilayer {
                thickness_donor: 10,
                thickness_acceptor: 20,
            },
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_blend_fraction_out_of_range() {
        let params = Parameters {
            morphology: MorphologyModel::RandomBlend {
                acceptor_fraction: 1.5,
            },
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn marcus_requires_reorganization_energy() {
        let params = Parameters {
            hopping_model: HoppingModel::Marcus,
            reorganization_donor: 0.0,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn tof_requires_electrode_boundaries() {
        let params = Parameters {
            run_mode: RunMode::TimeOfFlight,
            periodic_z: true,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn steady_transport_requires_periodic_z() {
        let params = Parameters {
            run_mode: RunMode::SteadyTransport,
            periodic_z: false,
            ..Parameters::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn recalc_cutoff_is_largest_interaction_radius() {
        let params = Parameters {
            fret_cutoff: 3.0,
            exciton_dissociation_cutoff: 1.0,
            polaron_hopping_cutoff: 2.0,
            coulomb_cutoff: 10.0,
            ..Parameters::default()
        };
        assert_eq!(params.recalc_cutoff(), 10.0);
    }
}
