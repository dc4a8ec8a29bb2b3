//! The simulation engine.
//!
//! [`Simulation`] owns the lattice, the live objects, and one pending
//! event per object, and drives the first-reaction-method loop: every
//! candidate mechanism samples an absolute execution time from its rate,
//! each object keeps only its earliest candidate, and the scheduler
//! repeatedly executes the globally earliest pending event, advances the
//! clock to it, and recomputes candidates for exactly the objects the
//! executed event could have invalidated (those within the largest
//! interaction cutoff of the affected sites).
//!
//! Runtime consistency failures (occupied hop destinations, stale event
//! times, phase-restriction violations) latch the error flag and surface
//! as [`SimError`]; the loop refuses to advance a latched simulation.

use crate::coulomb::CoulombTable;
use crate::counters::Counters;
use crate::event::{Event, EventKind};
use crate::latch::ErrorLatch;
use crate::object::{Object, ObjectKind, Species};
use crate::rates::{self, NeighborTable};
use crate::sampling::{
    CarrierSample, DynamicsData, DynamicsSample, SteadyData, ToFData, TransientBins,
};
use excimer_core::{
    Coords, DisorderModel, HoppingModel, ImportError, ObjectId, Parameters, ParametersError,
    RunMode, SimError, SiteIndex, ToFPlacement,
};
use excimer_lattice::{energies, morphology, Lattice, SiteType};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smallvec::SmallVec;
use std::fmt;

// ── Build errors ────────────────────────────────────────────────

/// Errors surfaced while constructing a [`Simulation`].
#[derive(Debug)]
pub enum BuildError {
    /// The configuration failed validation.
    Parameters(ParametersError),
    /// A morphology or site-energies file could not be loaded.
    Import(ImportError),
    /// Initial carrier seeding failed.
    Sim(SimError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameters(e) => write!(f, "configuration rejected: {e}"),
            Self::Import(e) => write!(f, "import failed: {e}"),
            Self::Sim(e) => write!(f, "initialization failed: {e}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parameters(e) => Some(e),
            Self::Import(e) => Some(e),
            Self::Sim(e) => Some(e),
        }
    }
}

impl From<ParametersError> for BuildError {
    fn from(e: ParametersError) -> Self {
        Self::Parameters(e)
    }
}

impl From<ImportError> for BuildError {
    fn from(e: ImportError) -> Self {
        Self::Import(e)
    }
}

impl From<SimError> for BuildError {
    fn from(e: SimError) -> Self {
        Self::Sim(e)
    }
}

/// The always-armed photogeneration event. Not tied to a live object;
/// its execution time is resampled after every firing.
#[derive(Clone, Copy, Debug)]
struct GenerationEvent {
    rate: f64,
    execution_time: f64,
}

/// Phase-keyed parameter selection.
fn by_phase<T>(site_type: SiteType, donor: T, acceptor: T) -> T {
    match site_type {
        SiteType::Acceptor => acceptor,
        _ => donor,
    }
}

// ── The simulation ──────────────────────────────────────────────

/// A kinetic Monte Carlo simulation of excitons and polarons on a 3-D
/// organic semiconductor lattice.
///
/// Construct with [`Simulation::new`] from a configuration that passes
/// [`Parameters::validate`]; construction builds the lattice, assigns the
/// morphology and energetic disorder, precomputes the Coulomb and
/// neighbor-offset tables, and seeds the initial carriers for the
/// configured run mode. Drive it with [`Simulation::run`] or step it with
/// [`Simulation::execute_next_event`], then read results through the
/// counters and the mode-specific data accessors.
pub struct Simulation {
    params: Parameters,
    lattice: Lattice,
    coulomb: CoulombTable,
    exciton_neighbors: NeighborTable,
    polaron_neighbors: NeighborTable,
    /// Internal-potential energy ramp along z, eV.
    e_potential: Vec<f64>,
    /// Squared lattice distance within which an executed event can
    /// invalidate another object's candidates.
    recalc_range: i32,
    objects: IndexMap<ObjectId, Object>,
    /// The winning candidate per live object. Objects with no computable
    /// candidates (possible for polarons) have no entry.
    pending: IndexMap<ObjectId, Event>,
    generation: Option<GenerationEvent>,
    generation_rate_donor: f64,
    generation_rate_acceptor: f64,
    counters: Counters,
    clock: f64,
    next_id: u64,
    rng: ChaCha8Rng,
    latch: ErrorLatch,
    light_on: bool,
    event_log: Vec<String>,
    tof: Option<ToFData>,
    dynamics: Option<DynamicsData>,
    steady: Option<SteadyData>,
    /// Net displacement of each removed exciton, nm. Diffusion mode only.
    diffusion_distances: Vec<f64>,
    /// Lifetime of each removed exciton, s. Diffusion mode only.
    exciton_lifetimes: Vec<f64>,
    /// Extraction counts per bottom-electrode column, `x * width + y`.
    electron_extraction_map: Vec<u64>,
    /// Extraction counts per top-electrode column, `x * width + y`.
    hole_extraction_map: Vec<u64>,
    transient_cycles: u64,
    /// Clock value when the current transient cycle was seeded.
    transient_start_time: f64,
}

impl Simulation {
    /// Build a simulation and seed the initial carriers for the
    /// configured run mode.
    pub fn new(params: Parameters) -> Result<Self, BuildError> {
        params.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut lattice = Lattice::from_params(&params);
        morphology::apply(&mut lattice, &params.morphology, &mut rng)?;
        energies::assign(&mut lattice, &params, &mut rng)?;
        let coulomb = CoulombTable::new(&params, &lattice);
        let exciton_neighbors = NeighborTable::exciton(&params);
        let polaron_neighbors = NeighborTable::polaron(&params);
        let height = params.height;
        let v = params.internal_potential;
        let e_potential = (0..height)
            .map(|z| {
                v * f64::from(height) / f64::from(height + 1)
                    - (v / f64::from(height + 1)) * f64::from(z)
            })
            .collect();
        let recalc_range = (params.recalc_cutoff() / params.unit_size).powi(2).ceil() as i32;
        let (donor_sites, acceptor_sites) = lattice.phase_counts();
        let site_volume = (1e-7 * params.unit_size).powi(3);
        let generation_rate_donor =
            params.exciton_generation_rate_donor * donor_sites as f64 * site_volume;
        let generation_rate_acceptor =
            params.exciton_generation_rate_acceptor * acceptor_sites as f64 * site_volume;
        let columns = (params.length * params.width) as usize;
        let mut sim = Self {
            params,
            lattice,
            coulomb,
            exciton_neighbors,
            polaron_neighbors,
            e_potential,
            recalc_range,
            objects: IndexMap::new(),
            pending: IndexMap::new(),
            generation: None,
            generation_rate_donor,
            generation_rate_acceptor,
            counters: Counters::default(),
            clock: 0.0,
            next_id: 0,
            rng,
            latch: ErrorLatch::default(),
            light_on: false,
            event_log: Vec::new(),
            tof: None,
            dynamics: None,
            steady: None,
            diffusion_distances: Vec::new(),
            exciton_lifetimes: Vec::new(),
            electron_extraction_map: vec![0; columns],
            hole_extraction_map: vec![0; columns],
            transient_cycles: 0,
            transient_start_time: 0.0,
        };
        sim.initialize_mode()?;
        Ok(sim)
    }

    fn initialize_mode(&mut self) -> Result<(), SimError> {
        match self.params.run_mode {
            RunMode::ExcitonDiffusion | RunMode::Iqe => {
                self.light_on = true;
                self.arm_generation();
            }
            RunMode::Dynamics => {
                self.dynamics = Some(DynamicsData::new(
                    self.params.dynamics_transient_start,
                    self.params.dynamics_transient_end,
                    self.params.dynamics_pnts_per_decade,
                ));
                self.generate_dynamics_excitons()?;
            }
            RunMode::TimeOfFlight => {
                self.tof = Some(ToFData::new(
                    self.params.tof_transient_start,
                    self.params.tof_transient_end,
                    self.params.tof_pnts_per_decade,
                ));
                self.generate_tof_polarons()?;
            }
            RunMode::SteadyTransport => {
                self.steady = Some(SteadyData::new(self.params.dos_bin_size));
                self.generate_steady_polarons()?;
            }
        }
        Ok(())
    }

    fn arm_generation(&mut self) {
        let rate = self.generation_rate_donor + self.generation_rate_acceptor;
        if rate > 0.0 {
            let execution_time = rates::sample_execution_time(self.clock, rate, &mut self.rng);
            self.generation = Some(GenerationEvent {
                rate,
                execution_time,
            });
        }
    }

    // ── Scheduling loop ─────────────────────────────────────────

    /// Execute pending events until [`check_finished`](Self::check_finished)
    /// reports completion.
    pub fn run(&mut self) -> Result<(), SimError> {
        while !self.check_finished() {
            self.execute_next_event()?;
        }
        Ok(())
    }

    /// Whether the configured run mode's termination predicate holds.
    /// A latched error always terminates the run.
    pub fn check_finished(&self) -> bool {
        if self.latch.is_set() {
            return true;
        }
        let c = &self.counters;
        let n = self.params.n_tests;
        match self.params.run_mode {
            RunMode::ExcitonDiffusion => c.excitons_recombined() >= n,
            RunMode::Dynamics => c.live_total() == 0 && c.excitons_created >= n,
            RunMode::TimeOfFlight => {
                if self.params.tof_polaron_is_hole {
                    c.holes == 0 && c.holes_created >= n
                } else {
                    c.electrons == 0 && c.electrons_created >= n
                }
            }
            RunMode::Iqe => {
                c.excitons_created >= n
                    && (c.live_total() == 0 || self.clock > self.params.iqe_time_cutoff)
            }
            RunMode::SteadyTransport => {
                c.events_executed >= self.params.n_equilibration_events + n
            }
        }
    }

    /// Select and execute the globally earliest pending event.
    ///
    /// Also performs the per-step run-mode upkeep: turning generation off
    /// once the IQE budget is met, transient sampling and cycle reseeding
    /// for the dynamics and time-of-flight tests, and steady-state
    /// sampling. A no-op on a finished simulation.
    pub fn execute_next_event(&mut self) -> Result<(), SimError> {
        if self.check_finished() {
            return Ok(());
        }
        match self.params.run_mode {
            RunMode::Iqe => {
                if self.light_on && self.counters.excitons_created >= self.params.n_tests {
                    self.light_on = false;
                    self.generation = None;
                }
            }
            RunMode::Dynamics | RunMode::TimeOfFlight => {
                self.transient_upkeep()?;
                if self.check_finished() {
                    return Ok(());
                }
            }
            RunMode::SteadyTransport => self.update_steady_data(),
            RunMode::ExcitonDiffusion => {}
        }

        let mut winner: Option<Event> = self.generation.map(|g| Event {
            kind: EventKind::ExcitonCreation,
            object: ObjectId(0),
            dest: None,
            target: None,
            rate: g.rate,
            execution_time: g.execution_time,
        });
        for event in self.pending.values() {
            let earlier = match &winner {
                Some(w) => event.execution_time < w.execution_time,
                None => true,
            };
            if earlier {
                winner = Some(*event);
            }
        }
        let Some(event) = winner else {
            return Err(self.latch_err(SimError::Stalled));
        };
        if event.execution_time < self.clock {
            return Err(self.latch_err(SimError::EventTimePrecedesClock {
                event_time: event.execution_time,
                clock: self.clock,
            }));
        }
        self.counters.events_executed += 1;
        self.clock = event.execution_time;
        if self.params.logging_enabled {
            self.event_log
                .push(format!("{:.6e} s: {}", self.clock, event.kind));
        }
        match event.kind {
            EventKind::ExcitonCreation => self.execute_exciton_creation(),
            EventKind::ExcitonHop | EventKind::PolaronHop => self.execute_hop(&event),
            EventKind::ExcitonRecombination => self.execute_exciton_recombination(&event),
            EventKind::ExcitonDissociation => self.execute_exciton_dissociation(&event),
            EventKind::ExcitonExcitonAnnihilation => {
                self.execute_exciton_exciton_annihilation(&event)
            }
            EventKind::ExcitonPolaronAnnihilation => {
                self.execute_exciton_polaron_annihilation(&event)
            }
            EventKind::IntersystemCrossing => self.execute_intersystem_crossing(&event),
            EventKind::PolaronRecombination => self.execute_polaron_recombination(&event),
            EventKind::PolaronExtraction => self.execute_polaron_extraction(&event),
        }
    }

    /// Transient-test upkeep: sample the transient, flush stranded
    /// carriers once the window has passed, and reseed the next cycle.
    fn transient_upkeep(&mut self) -> Result<(), SimError> {
        self.update_transient_data();
        let end = match self.params.run_mode {
            RunMode::Dynamics => self.params.dynamics_transient_end,
            _ => self.params.tof_transient_end,
        };
        let elapsed = self.clock - self.transient_start_time;
        if self.pending.is_empty() || elapsed > end {
            self.remove_all_objects()?;
        }
        if self.counters.live_total() == 0 && !self.check_finished() {
            match self.params.run_mode {
                RunMode::Dynamics => self.generate_dynamics_excitons()?,
                RunMode::TimeOfFlight => self.generate_tof_polarons()?,
                _ => {}
            }
        }
        Ok(())
    }

    // ── Mechanism executors ─────────────────────────────────────

    fn execute_exciton_creation(&mut self) -> Result<(), SimError> {
        let coords = self.random_generation_coords()?;
        let id = self.place_exciton(coords, true)?;
        if self.params.logging_enabled {
            self.event_log
                .push(format!("created exciton {id} at {coords}"));
        }
        if let Some(generation) = &mut self.generation {
            generation.execution_time =
                rates::sample_execution_time(self.clock, generation.rate, &mut self.rng);
        }
        let ids = self.recalc_around(&[coords]);
        self.calculate_events_for(&ids)
    }

    fn execute_hop(&mut self, event: &Event) -> Result<(), SimError> {
        let dest = self.require_dest(event)?;
        let object = self.get_object(event.object)?;
        let init = object.coords;
        if self.params.run_mode == RunMode::SteadyTransport
            && self.counters.events_executed > self.params.n_equilibration_events
            && object.is_hole()
        {
            self.record_steady_hop(&object, init, dest)?;
        }
        self.move_object(event.object, dest)?;
        let ids = self.recalc_around(&[init, dest]);
        self.calculate_events_for(&ids)
    }

    /// Fold a measured hole hop into the steady-state transport-energy
    /// estimate, weighted by its wrap-corrected transport-axis step.
    fn record_steady_hop(
        &mut self,
        object: &Object,
        init: Coords,
        dest: Coords,
    ) -> Result<(), SimError> {
        let true_dz = (dest.z - init.z) + self.lattice.displacement_correction_z(init, dest);
        if true_dz == 0 {
            return Ok(());
        }
        let displacement = f64::from(-true_dz);
        let e_init = self.hole_site_energy(init)?;
        let e_dest = self.hole_site_energy(dest)?;
        let c_init = e_init + self.coulomb_self(object, init);
        let c_dest = e_dest + self.coulomb_self(object, dest);
        if let Some(steady) = self.steady.as_mut() {
            steady.record_hop(
                displacement,
                0.5 * (e_init + e_dest),
                0.5 * (c_init + c_dest),
            );
        }
        Ok(())
    }

    fn execute_exciton_recombination(&mut self, event: &Event) -> Result<(), SimError> {
        let object = self.remove_exciton(event.object)?;
        if object.is_singlet() {
            self.counters.singlets_recombined += 1;
        } else {
            self.counters.triplets_recombined += 1;
        }
        let ids = self.recalc_around(&[object.coords]);
        self.calculate_events_for(&ids)
    }

    fn execute_exciton_dissociation(&mut self, event: &Event) -> Result<(), SimError> {
        let dest = self.require_dest(event)?;
        let exciton = self.get_object(event.object)?;
        let init = exciton.coords;
        if self.lattice.is_occupied(dest)? {
            return Err(self.latch_err(SimError::DestinationOccupied { coords: dest }));
        }
        if exciton.is_singlet() {
            self.counters.singlets_dissociated += 1;
        } else {
            self.counters.triplets_dissociated += 1;
        }
        self.decrement_live(exciton.species());
        self.discard(event.object)?;
        // Both geminate carriers share one tag so later recombination can
        // be classified geminate or bimolecular.
        let tag = self
            .counters
            .electrons_created
            .max(self.counters.holes_created)
            + 1;
        if self.lattice.site_type(dest)? == SiteType::Acceptor {
            self.place_polaron(init, true, Some(tag))?;
            self.place_polaron(dest, false, Some(tag))?;
        } else {
            self.place_polaron(init, false, Some(tag))?;
            self.place_polaron(dest, true, Some(tag))?;
        }
        let ids = self.recalc_around(&[init, dest]);
        self.calculate_events_for(&ids)
    }

    fn execute_exciton_exciton_annihilation(&mut self, event: &Event) -> Result<(), SimError> {
        let target_id = self.require_target(event)?;
        let initiator = self.get_object(event.object)?;
        let target = self.get_object(target_id)?;
        match (initiator.is_singlet(), target.is_singlet()) {
            (true, true) => self.counters.singlet_singlet_annihilations += 1,
            (false, false) => {
                self.counters.triplet_triplet_annihilations += 1;
                // Spin statistics: one in four triplet-triplet encounters
                // yields a singlet on the surviving exciton.
                if self.rng.random::<f64>() > 0.75 {
                    if let Some(survivor) = self.objects.get_mut(&target_id) {
                        survivor.flip_spin();
                    }
                    self.counters.triplets -= 1;
                    self.counters.singlets += 1;
                }
            }
            _ => self.counters.singlet_triplet_annihilations += 1,
        }
        self.remove_exciton(event.object)?;
        let ids = self.recalc_around(&[initiator.coords, target.coords]);
        self.calculate_events_for(&ids)
    }

    fn execute_exciton_polaron_annihilation(&mut self, event: &Event) -> Result<(), SimError> {
        let target_id = self.require_target(event)?;
        let initiator = self.get_object(event.object)?;
        let target = self.get_object(target_id)?;
        if initiator.is_singlet() {
            self.counters.singlet_polaron_annihilations += 1;
        } else {
            self.counters.triplet_polaron_annihilations += 1;
        }
        self.decrement_live(initiator.species());
        self.discard(event.object)?;
        let ids = self.recalc_around(&[initiator.coords, target.coords]);
        self.calculate_events_for(&ids)
    }

    fn execute_intersystem_crossing(&mut self, event: &Event) -> Result<(), SimError> {
        let object = self.get_object(event.object)?;
        if object.is_singlet() {
            self.counters.intersystem_crossings += 1;
            self.counters.singlets -= 1;
            self.counters.triplets += 1;
        } else {
            self.counters.reverse_intersystem_crossings += 1;
            self.counters.triplets -= 1;
            self.counters.singlets += 1;
        }
        if let Some(exciton) = self.objects.get_mut(&event.object) {
            exciton.flip_spin();
        }
        let ids = self.recalc_around(&[object.coords]);
        self.calculate_events_for(&ids)
    }

    fn execute_polaron_recombination(&mut self, event: &Event) -> Result<(), SimError> {
        let target_id = self.require_target(event)?;
        let initiator = self.get_object(event.object)?;
        let target = self.get_object(target_id)?;
        self.counters.electrons_recombined += 1;
        self.counters.holes_recombined += 1;
        if initiator.tag == target.tag {
            self.counters.geminate_recombinations += 1;
        } else {
            self.counters.bimolecular_recombinations += 1;
        }
        self.decrement_live(initiator.species());
        self.decrement_live(target.species());
        self.discard(event.object)?;
        self.discard(target_id)?;
        let ids = self.recalc_around(&[initiator.coords, target.coords]);
        self.calculate_events_for(&ids)
    }

    fn execute_polaron_extraction(&mut self, event: &Event) -> Result<(), SimError> {
        let object = self.get_object(event.object)?;
        if self.params.run_mode == RunMode::TimeOfFlight {
            let transit = self.clock - object.created_at;
            if let Some(tof) = self.tof.as_mut() {
                tof.transit_times.push(transit);
            }
        }
        if matches!(
            self.params.run_mode,
            RunMode::TimeOfFlight | RunMode::Iqe
        ) {
            let column =
                (object.coords.x * self.lattice.width() + object.coords.y) as usize;
            if object.is_hole() {
                self.hole_extraction_map[column] += 1;
            } else {
                self.electron_extraction_map[column] += 1;
            }
        }
        if object.is_hole() {
            self.counters.holes_collected += 1;
        } else {
            self.counters.electrons_collected += 1;
        }
        self.decrement_live(object.species());
        self.discard(event.object)?;
        let ids = self.recalc_around(&[object.coords]);
        self.calculate_events_for(&ids)
    }

    // ── Candidate enumeration ───────────────────────────────────

    /// Recompute the pending event for one exciton.
    ///
    /// Enumerates every candidate mechanism, samples a first-reaction
    /// execution time for each, and keeps the earliest. Excitons always
    /// carry at least the unimolecular recombination candidate; an empty
    /// candidate set is a latched consistency failure.
    fn calculate_exciton_events(&mut self, id: ObjectId) -> Result<(), SimError> {
        let exciton = self.get_object(id)?;
        let origin = exciton.coords;
        let origin_type = self.lattice.site_type(origin)?;
        let e_origin = self.lattice.energy(origin)?;
        let singlet = exciton.is_singlet();
        let kt = self.params.kt();
        let p = &self.params;
        let mut candidates: SmallVec<[Event; 16]> = SmallVec::new();

        for offset in self.exciton_neighbors.offsets() {
            if !self
                .lattice
                .move_is_valid(origin, offset.dx, offset.dy, offset.dz)
            {
                continue;
            }
            let dest = self
                .lattice
                .destination_coords(origin, offset.dx, offset.dy, offset.dz);
            let dest_type = self.lattice.site_type(dest)?;
            let e_dest = self.lattice.energy(dest)?;
            if let Some(target_id) = self.lattice.occupant(dest)? {
                if !offset.in_primary {
                    continue;
                }
                let target = match self.objects.get(&target_id) {
                    Some(target) => *target,
                    None => {
                        return Err(self.latch_err(SimError::UnknownObject { id: target_id }))
                    }
                };
                let (kind, prefactor) = if target.is_exciton() {
                    // A triplet cannot annihilate into a singlet target.
                    if !singlet && target.is_singlet() {
                        continue;
                    }
                    (
                        EventKind::ExcitonExcitonAnnihilation,
                        by_phase(
                            origin_type,
                            p.r_exciton_exciton_annihilation_donor,
                            p.r_exciton_exciton_annihilation_acceptor,
                        ),
                    )
                } else {
                    (
                        EventKind::ExcitonPolaronAnnihilation,
                        by_phase(
                            origin_type,
                            p.r_exciton_polaron_annihilation_donor,
                            p.r_exciton_polaron_annihilation_acceptor,
                        ),
                    )
                };
                let rate = if singlet || p.fret_triplet_annihilation {
                    rates::fret(prefactor, offset.distance, 0.0, kt)
                } else {
                    rates::miller_abrahams(
                        prefactor,
                        by_phase(
                            origin_type,
                            p.triplet_localization_donor,
                            p.triplet_localization_acceptor,
                        ),
                        offset.distance,
                        0.0,
                        kt,
                    )
                };
                if rate > 0.0 {
                    candidates.push(Event {
                        kind,
                        object: id,
                        dest: Some(dest),
                        target: Some(target_id),
                        rate,
                        execution_time: 0.0,
                    });
                }
            } else {
                if offset.in_secondary && dest_type != origin_type {
                    // Dissociation across the heterojunction. The energy
                    // change covers the orbital offset, the bound-pair
                    // Coulomb energy against the exciton binding energy,
                    // and the potential ramp.
                    let pot =
                        self.e_potential[dest.z as usize] - self.e_potential[origin.z as usize];
                    let mut e_delta = if origin_type == SiteType::Donor {
                        let coulomb_final = self.coulomb_probe(true, origin, Some(id))
                            + self.coulomb_probe(false, dest, Some(id))
                            - self.coulomb.entry(offset.d2);
                        (e_dest - e_origin) - (p.lumo_acceptor - p.lumo_donor)
                            + (coulomb_final + p.e_exciton_binding_donor)
                            + pot
                    } else {
                        let coulomb_final = self.coulomb_probe(false, origin, Some(id))
                            + self.coulomb_probe(true, dest, Some(id))
                            - self.coulomb.entry(offset.d2);
                        (e_dest - e_origin) + (p.homo_donor - p.homo_acceptor)
                            + (coulomb_final + p.e_exciton_binding_acceptor)
                            - pot
                    };
                    if !singlet {
                        e_delta +=
                            by_phase(origin_type, p.e_exciton_st_donor, p.e_exciton_st_acceptor);
                    }
                    let localization = if singlet {
                        by_phase(
                            origin_type,
                            p.singlet_localization_donor,
                            p.singlet_localization_acceptor,
                        )
                    } else {
                        by_phase(
                            origin_type,
                            p.triplet_localization_donor,
                            p.triplet_localization_acceptor,
                        )
                    };
                    let rate = self.transfer_rate(
                        by_phase(
                            origin_type,
                            p.r_exciton_dissociation_donor,
                            p.r_exciton_dissociation_acceptor,
                        ),
                        localization,
                        offset.distance,
                        e_delta,
                        by_phase(origin_type, p.reorganization_donor, p.reorganization_acceptor),
                    );
                    if rate > 0.0 {
                        candidates.push(Event {
                            kind: EventKind::ExcitonDissociation,
                            object: id,
                            dest: Some(dest),
                            target: None,
                            rate,
                            execution_time: 0.0,
                        });
                    }
                }
                if offset.in_primary {
                    let mut e_delta = e_dest - e_origin;
                    let rate = if singlet {
                        if dest_type != origin_type {
                            // Optical-gap difference for cross-phase
                            // singlet transfer.
                            let gap_donor =
                                p.homo_donor - p.lumo_donor - p.e_exciton_binding_donor;
                            let gap_acceptor =
                                p.homo_acceptor - p.lumo_acceptor - p.e_exciton_binding_acceptor;
                            e_delta += by_phase(
                                origin_type,
                                gap_acceptor - gap_donor,
                                gap_donor - gap_acceptor,
                            );
                        }
                        rates::fret(
                            by_phase(
                                origin_type,
                                p.r_singlet_hopping_donor,
                                p.r_singlet_hopping_acceptor,
                            ),
                            offset.distance,
                            e_delta,
                            kt,
                        )
                    } else {
                        rates::miller_abrahams(
                            by_phase(
                                origin_type,
                                p.r_triplet_hopping_donor,
                                p.r_triplet_hopping_acceptor,
                            ),
                            by_phase(
                                origin_type,
                                p.triplet_localization_donor,
                                p.triplet_localization_acceptor,
                            ),
                            offset.distance,
                            e_delta,
                            kt,
                        )
                    };
                    if rate > 0.0 {
                        candidates.push(Event {
                            kind: EventKind::ExcitonHop,
                            object: id,
                            dest: Some(dest),
                            target: None,
                            rate,
                            execution_time: 0.0,
                        });
                    }
                }
            }
        }

        // Unimolecular mechanisms are always available.
        let lifetime = if singlet {
            by_phase(
                origin_type,
                p.singlet_lifetime_donor,
                p.singlet_lifetime_acceptor,
            )
        } else {
            by_phase(
                origin_type,
                p.triplet_lifetime_donor,
                p.triplet_lifetime_acceptor,
            )
        };
        candidates.push(Event {
            kind: EventKind::ExcitonRecombination,
            object: id,
            dest: None,
            target: None,
            rate: 1.0 / lifetime,
            execution_time: 0.0,
        });
        let crossing_rate = if singlet {
            by_phase(origin_type, p.r_exciton_isc_donor, p.r_exciton_isc_acceptor)
        } else {
            by_phase(origin_type, p.r_exciton_risc_donor, p.r_exciton_risc_acceptor)
                * (-by_phase(origin_type, p.e_exciton_st_donor, p.e_exciton_st_acceptor) / kt)
                    .exp()
        };
        if crossing_rate > 0.0 {
            candidates.push(Event {
                kind: EventKind::IntersystemCrossing,
                object: id,
                dest: None,
                target: None,
                rate: crossing_rate,
                execution_time: 0.0,
            });
        }

        if candidates.is_empty() {
            self.pending.swap_remove(&id);
            return Err(self.latch_err(SimError::NoCandidates { object: id }));
        }
        self.select_pending(id, candidates)
    }

    /// Recompute the pending event for one polaron.
    ///
    /// Unlike excitons, a polaron can legitimately have no candidates
    /// (boxed in with extraction out of reach); its pending entry is then
    /// simply cleared.
    fn calculate_polaron_events(&mut self, id: ObjectId) -> Result<(), SimError> {
        let polaron = self.get_object(id)?;
        let origin = polaron.coords;
        let origin_type = self.lattice.site_type(origin)?;
        let is_hole = polaron.is_hole();
        if self.params.phase_restriction {
            if !is_hole && origin_type == SiteType::Donor {
                return Err(self.latch_err(SimError::PhaseRestrictionViolation {
                    reason: format!("electron {} is on a donor site at {origin}", polaron.tag),
                }));
            }
            if is_hole && origin_type == SiteType::Acceptor {
                return Err(self.latch_err(SimError::PhaseRestrictionViolation {
                    reason: format!("hole {} is on an acceptor site at {origin}", polaron.tag),
                }));
            }
        }
        let kt = self.params.kt();
        let e_origin = self.lattice.energy(origin)?;
        let coulomb_origin = self.coulomb_self(&polaron, origin);
        let p = &self.params;
        let mut candidates: SmallVec<[Event; 16]> = SmallVec::new();

        for offset in self.polaron_neighbors.offsets() {
            if !self
                .lattice
                .move_is_valid(origin, offset.dx, offset.dy, offset.dz)
            {
                continue;
            }
            let dest = self
                .lattice
                .destination_coords(origin, offset.dx, offset.dy, offset.dz);
            if let Some(target_id) = self.lattice.occupant(dest)? {
                // Recombination is electron-initiated onto a hole.
                if is_hole {
                    continue;
                }
                let target = match self.objects.get(&target_id) {
                    Some(target) => *target,
                    None => {
                        return Err(self.latch_err(SimError::UnknownObject { id: target_id }))
                    }
                };
                if !target.is_hole() {
                    continue;
                }
                let rate = rates::miller_abrahams(
                    p.r_polaron_recombination,
                    by_phase(
                        origin_type,
                        p.polaron_localization_donor,
                        p.polaron_localization_acceptor,
                    ),
                    offset.distance,
                    0.0,
                    kt,
                );
                if rate > 0.0 {
                    candidates.push(Event {
                        kind: EventKind::PolaronRecombination,
                        object: id,
                        dest: Some(dest),
                        target: Some(target_id),
                        rate,
                        execution_time: 0.0,
                    });
                }
            } else {
                let dest_type = self.lattice.site_type(dest)?;
                if p.phase_restriction && dest_type != origin_type {
                    continue;
                }
                let e_dest = self.lattice.energy(dest)?;
                let mut e_delta =
                    (e_dest - e_origin) + (self.coulomb_self(&polaron, dest) - coulomb_origin);
                let mut pot_change =
                    self.e_potential[dest.z as usize] - self.e_potential[origin.z as usize];
                // A wrap across the periodic transport axis carries the
                // full applied potential as a compensating offset.
                let wrap = self.lattice.displacement_correction_z(origin, dest);
                if wrap < 0 {
                    pot_change -= p.internal_potential;
                } else if wrap > 0 {
                    pot_change += p.internal_potential;
                }
                if is_hole {
                    e_delta -= pot_change;
                } else {
                    e_delta += pot_change;
                }
                if origin_type == SiteType::Donor && dest_type == SiteType::Acceptor {
                    e_delta -= if is_hole {
                        p.homo_acceptor - p.homo_donor
                    } else {
                        p.lumo_acceptor - p.lumo_donor
                    };
                } else if origin_type == SiteType::Acceptor && dest_type == SiteType::Donor {
                    e_delta -= if is_hole {
                        p.homo_donor - p.homo_acceptor
                    } else {
                        p.lumo_donor - p.lumo_acceptor
                    };
                }
                let rate = self.transfer_rate(
                    by_phase(
                        origin_type,
                        p.r_polaron_hopping_donor,
                        p.r_polaron_hopping_acceptor,
                    ),
                    by_phase(
                        origin_type,
                        p.polaron_localization_donor,
                        p.polaron_localization_acceptor,
                    ),
                    offset.distance,
                    e_delta,
                    by_phase(origin_type, p.reorganization_donor, p.reorganization_acceptor),
                );
                if rate > 0.0 {
                    candidates.push(Event {
                        kind: EventKind::PolaronHop,
                        object: id,
                        dest: Some(dest),
                        target: None,
                        rate,
                        execution_time: 0.0,
                    });
                }
            }
        }

        // Extraction at the electrode face: electrons leave through the
        // bottom plane, holes through the top.
        let extraction_armed = !self.lattice.periodic_z()
            && match p.run_mode {
                RunMode::Dynamics => p.dynamics_extraction,
                RunMode::SteadyTransport => false,
                _ => true,
            };
        if extraction_armed {
            let distance = if is_hole {
                self.lattice.unit_size()
                    * (f64::from(self.lattice.height() - origin.z) - 0.5)
            } else {
                self.lattice.unit_size() * (f64::from(origin.z + 1) - 0.5)
            };
            if distance - 0.0001 <= p.polaron_hopping_cutoff {
                let rate = rates::miller_abrahams(
                    by_phase(
                        origin_type,
                        p.r_polaron_hopping_donor,
                        p.r_polaron_hopping_acceptor,
                    ),
                    by_phase(
                        origin_type,
                        p.polaron_localization_donor,
                        p.polaron_localization_acceptor,
                    ),
                    distance,
                    0.0,
                    kt,
                );
                if rate > 0.0 {
                    candidates.push(Event {
                        kind: EventKind::PolaronExtraction,
                        object: id,
                        dest: None,
                        target: None,
                        rate,
                        execution_time: 0.0,
                    });
                }
            }
        }

        if candidates.is_empty() {
            self.pending.swap_remove(&id);
            return Ok(());
        }
        self.select_pending(id, candidates)
    }

    /// Sample a first-reaction time for every candidate and store the
    /// earliest as the object's pending event.
    fn select_pending(
        &mut self,
        id: ObjectId,
        candidates: SmallVec<[Event; 16]>,
    ) -> Result<(), SimError> {
        let clock = self.clock;
        let mut iter = candidates.into_iter();
        let Some(mut winner) = iter.next() else {
            return Ok(());
        };
        winner.execution_time = rates::sample_execution_time(clock, winner.rate, &mut self.rng);
        for mut candidate in iter {
            candidate.execution_time =
                rates::sample_execution_time(clock, candidate.rate, &mut self.rng);
            if candidate.execution_time < winner.execution_time {
                winner = candidate;
            }
        }
        if winner.execution_time < clock {
            self.pending.swap_remove(&id);
            return Err(self.latch_err(SimError::EventTimePrecedesClock {
                event_time: winner.execution_time,
                clock,
            }));
        }
        self.pending.insert(id, winner);
        Ok(())
    }

    fn transfer_rate(
        &self,
        prefactor: f64,
        localization: f64,
        distance: f64,
        e_delta: f64,
        reorganization: f64,
    ) -> f64 {
        let kt = self.params.kt();
        match self.params.hopping_model {
            HoppingModel::MillerAbrahams => {
                rates::miller_abrahams(prefactor, localization, distance, e_delta, kt)
            }
            HoppingModel::Marcus => {
                rates::marcus(prefactor, localization, distance, e_delta, reorganization, kt)
            }
        }
    }

    /// Objects whose candidates may depend on state at any of `spots`.
    fn recalc_around(&self, spots: &[Coords]) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|object| {
                spots
                    .iter()
                    .any(|&s| self.lattice.distance_squared(object.coords, s) <= self.recalc_range)
            })
            .map(|object| object.id)
            .collect()
    }

    fn calculate_events_for(&mut self, ids: &[ObjectId]) -> Result<(), SimError> {
        for &id in ids {
            let Some(object) = self.objects.get(&id).copied() else {
                continue;
            };
            if object.is_exciton() {
                self.calculate_exciton_events(id)?;
            } else {
                self.calculate_polaron_events(id)?;
            }
        }
        Ok(())
    }

    fn calculate_all_events(&mut self) -> Result<(), SimError> {
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        self.calculate_events_for(&ids)
    }

    // ── Object lifecycle ────────────────────────────────────────

    /// Create an exciton at explicit coordinates. Returns `None` and
    /// latches the error flag when the site is invalid or occupied;
    /// counters are untouched on failure.
    pub fn create_exciton(&mut self, coords: Coords, singlet: bool) -> Option<ObjectId> {
        if !self.lattice.contains(coords) {
            self.latch_err(SimError::InvalidCoordinates { coords });
            return None;
        }
        if self.lattice.is_occupied(coords).unwrap_or(true) {
            self.latch_err(SimError::DestinationOccupied { coords });
            return None;
        }
        let id = self.place_exciton(coords, singlet).ok()?;
        let ids = self.recalc_around(&[coords]);
        self.calculate_events_for(&ids).ok()?;
        Some(id)
    }

    /// Create an electron at explicit coordinates. Same failure contract
    /// as [`create_exciton`](Self::create_exciton); additionally refuses
    /// a donor site under phase restriction.
    pub fn create_electron(&mut self, coords: Coords) -> Option<ObjectId> {
        self.create_polaron(coords, false)
    }

    /// Create a hole at explicit coordinates. Same failure contract as
    /// [`create_electron`](Self::create_electron), with the phases
    /// swapped.
    pub fn create_hole(&mut self, coords: Coords) -> Option<ObjectId> {
        self.create_polaron(coords, true)
    }

    fn create_polaron(&mut self, coords: Coords, is_hole: bool) -> Option<ObjectId> {
        if !self.lattice.contains(coords) {
            self.latch_err(SimError::InvalidCoordinates { coords });
            return None;
        }
        if self.lattice.is_occupied(coords).unwrap_or(true) {
            self.latch_err(SimError::DestinationOccupied { coords });
            return None;
        }
        if self.params.phase_restriction {
            let site_type = self.lattice.site_type(coords).ok()?;
            let violation = if is_hole {
                site_type == SiteType::Acceptor
            } else {
                site_type == SiteType::Donor
            };
            if violation {
                let carrier = if is_hole { "hole" } else { "electron" };
                self.latch_err(SimError::PhaseRestrictionViolation {
                    reason: format!("cannot create {carrier} on a {site_type} site at {coords}"),
                });
                return None;
            }
        }
        let id = self.place_polaron(coords, is_hole, None).ok()?;
        let ids = self.recalc_around(&[coords]);
        self.calculate_events_for(&ids).ok()?;
        Some(id)
    }

    fn next_object_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    fn place_exciton(&mut self, coords: Coords, singlet: bool) -> Result<ObjectId, SimError> {
        let id = self.next_object_id();
        self.lattice
            .set_occupant(coords, id)
            .map_err(|e| self.latch_err(e.into()))?;
        let tag = self.counters.excitons_created + 1;
        self.objects.insert(
            id,
            Object {
                id,
                kind: ObjectKind::Exciton { singlet },
                tag,
                created_at: self.clock,
                coords,
                displacement: (0, 0, 0),
            },
        );
        self.counters.excitons_created += 1;
        self.counters.excitons += 1;
        if singlet {
            self.counters.singlets += 1;
        } else {
            self.counters.triplets += 1;
        }
        match self.lattice.site_type(coords)? {
            SiteType::Acceptor => self.counters.excitons_created_acceptor += 1,
            _ => self.counters.excitons_created_donor += 1,
        }
        Ok(id)
    }

    fn place_polaron(
        &mut self,
        coords: Coords,
        is_hole: bool,
        tag: Option<u64>,
    ) -> Result<ObjectId, SimError> {
        let tag = match tag {
            Some(tag) => tag,
            None if is_hole => self.counters.holes_created + 1,
            None => self.counters.electrons_created + 1,
        };
        let id = self.next_object_id();
        self.lattice
            .set_occupant(coords, id)
            .map_err(|e| self.latch_err(e.into()))?;
        self.objects.insert(
            id,
            Object {
                id,
                kind: ObjectKind::Polaron { is_hole },
                tag,
                created_at: self.clock,
                coords,
                displacement: (0, 0, 0),
            },
        );
        if is_hole {
            self.counters.holes_created += 1;
            self.counters.holes += 1;
        } else {
            self.counters.electrons_created += 1;
            self.counters.electrons += 1;
        }
        Ok(id)
    }

    fn move_object(&mut self, id: ObjectId, dest: Coords) -> Result<(), SimError> {
        let object = self.get_object(id)?;
        let init = object.coords;
        if self.lattice.is_occupied(dest)? {
            return Err(self.latch_err(SimError::DestinationOccupied { coords: dest }));
        }
        self.lattice.clear_occupant(init)?;
        self.lattice
            .set_occupant(dest, id)
            .map_err(|e| self.latch_err(e.into()))?;
        let dx = (dest.x - init.x) + self.lattice.displacement_correction_x(init, dest);
        let dy = (dest.y - init.y) + self.lattice.displacement_correction_y(init, dest);
        let dz = (dest.z - init.z) + self.lattice.displacement_correction_z(init, dest);
        if let Some(object) = self.objects.get_mut(&id) {
            object.record_move(dest, dx, dy, dz);
        }
        Ok(())
    }

    /// Remove an exciton, recording its diffusion length and lifetime in
    /// the exciton-diffusion test and decrementing the live counters.
    fn remove_exciton(&mut self, id: ObjectId) -> Result<Object, SimError> {
        let object = self.get_object(id)?;
        if self.params.run_mode == RunMode::ExcitonDiffusion {
            self.diffusion_distances
                .push(self.lattice.unit_size() * object.displacement_magnitude());
            self.exciton_lifetimes.push(self.clock - object.created_at);
        }
        self.decrement_live(object.species());
        self.discard(id)?;
        Ok(object)
    }

    /// Drop an object from the lattice, the object map, and the pending
    /// event map. Counters are the caller's responsibility.
    fn discard(&mut self, id: ObjectId) -> Result<(), SimError> {
        let object = self.get_object(id)?;
        self.lattice.clear_occupant(object.coords)?;
        self.objects.swap_remove(&id);
        self.pending.swap_remove(&id);
        Ok(())
    }

    fn decrement_live(&mut self, species: Species) {
        match species {
            Species::Singlet => {
                self.counters.excitons -= 1;
                self.counters.singlets -= 1;
            }
            Species::Triplet => {
                self.counters.excitons -= 1;
                self.counters.triplets -= 1;
            }
            Species::Electron => self.counters.electrons -= 1,
            Species::Hole => self.counters.holes -= 1,
        }
    }

    fn remove_all_objects(&mut self) -> Result<(), SimError> {
        let ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for id in ids {
            let object = self.get_object(id)?;
            self.decrement_live(object.species());
            self.discard(id)?;
        }
        Ok(())
    }

    fn get_object(&self, id: ObjectId) -> Result<Object, SimError> {
        self.objects
            .get(&id)
            .copied()
            .ok_or_else(|| self.latch_err(SimError::UnknownObject { id }))
    }

    fn require_dest(&self, event: &Event) -> Result<Coords, SimError> {
        match event.dest {
            Some(dest) => Ok(dest),
            None => Err(self.latch_err(SimError::UnknownObject { id: event.object })),
        }
    }

    fn require_target(&self, event: &Event) -> Result<ObjectId, SimError> {
        match event.target {
            Some(target) => Ok(target),
            None => Err(self.latch_err(SimError::UnknownObject { id: event.object })),
        }
    }

    fn latch_err(&self, err: SimError) -> SimError {
        self.latch.set(err.to_string());
        err
    }

    // ── Carrier seeding ─────────────────────────────────────────

    /// A random unoccupied creation site, phase-weighted by the per-phase
    /// volumetric generation rates. Rejection-samples while the lattice
    /// is mostly empty, then falls back to an exhaustive scan.
    fn random_generation_coords(&mut self) -> Result<Coords, SimError> {
        let total = self.generation_rate_donor + self.generation_rate_acceptor;
        let wanted = if self.rng.random::<f64>() * total < self.generation_rate_donor {
            SiteType::Donor
        } else {
            SiteType::Acceptor
        };
        if (self.counters.live_total() as usize) < self.lattice.num_sites() / 2 {
            for _ in 0..10 {
                let coords = self.lattice.random_coords(&mut self.rng);
                if self.lattice.site_type(coords)? == wanted
                    && !self.lattice.is_occupied(coords)?
                {
                    return Ok(coords);
                }
            }
        }
        let eligible: Vec<Coords> = (0..self.lattice.num_sites())
            .map(SiteIndex)
            .filter(|&n| {
                let site = self.lattice.site(n);
                site.site_type == wanted && !site.is_occupied()
            })
            .map(|n| self.lattice.site_coords(n))
            .collect();
        if eligible.is_empty() {
            return Err(self.latch_err(SimError::NoEligibleSite {
                what: "exciton generation",
            }));
        }
        Ok(eligible[self.rng.random_range(0..eligible.len())])
    }

    /// Seed the initial exciton population for one dynamics transient
    /// cycle and recompute all events.
    fn generate_dynamics_excitons(&mut self) -> Result<(), SimError> {
        self.refresh_energies_for_new_cycle(self.counters.excitons_created > 0)?;
        let n = (self.params.dynamics_initial_exciton_conc * self.lattice.volume_cm3()).ceil()
            as u64;
        for _ in 0..n {
            let coords = self.random_generation_coords()?;
            self.place_exciton(coords, true)?;
        }
        self.transient_start_time = self.clock;
        self.transient_cycles += 1;
        for object in self.objects.values_mut() {
            object.reset_displacement();
        }
        if let Some(dynamics) = self.dynamics.as_mut() {
            dynamics.begin_cycle();
        }
        self.calculate_all_events()
    }

    /// Seed one batch of time-of-flight carriers in the generation plane
    /// and recompute all events.
    fn generate_tof_polarons(&mut self) -> Result<(), SimError> {
        let collected = self.counters.electrons_collected + self.counters.holes_collected;
        self.refresh_energies_for_new_cycle(collected > 0)?;
        let is_hole = self.params.tof_polaron_is_hole;
        // Electrons drift toward and leave through the bottom face, so
        // they start at the top, and vice versa for holes.
        let z = if is_hole { 0 } else { self.lattice.height() - 1 };
        let mut eligible: Vec<Coords> = Vec::new();
        for x in 0..self.lattice.length() {
            for y in 0..self.lattice.width() {
                let coords = Coords::new(x, y, z);
                if self.lattice.is_occupied(coords)? {
                    continue;
                }
                if self.params.phase_restriction {
                    let site_type = self.lattice.site_type(coords)?;
                    let allowed = if is_hole {
                        site_type == SiteType::Donor
                    } else {
                        site_type == SiteType::Acceptor
                    };
                    if !allowed {
                        continue;
                    }
                }
                eligible.push(coords);
            }
        }
        let n = self.params.tof_initial_polarons as usize;
        if eligible.len() < n {
            return Err(self.latch_err(SimError::NoEligibleSite {
                what: "time-of-flight carrier seeding",
            }));
        }
        match self.params.tof_placement {
            ToFPlacement::Random => eligible.shuffle(&mut self.rng),
            ToFPlacement::Energy { target } => eligible.sort_by(|a, b| {
                let ka = self
                    .lattice
                    .energy(*a)
                    .map_or(f64::INFINITY, |e| (e - target).abs());
                let kb = self
                    .lattice
                    .energy(*b)
                    .map_or(f64::INFINITY, |e| (e - target).abs());
                ka.total_cmp(&kb)
            }),
        }
        let mut seeds: Vec<(ObjectId, i32)> = Vec::with_capacity(n);
        for &coords in eligible.iter().take(n) {
            let id = self.place_polaron(coords, is_hole, None)?;
            seeds.push((id, coords.z));
        }
        self.transient_start_time = self.clock;
        self.transient_cycles += 1;
        if let Some(tof) = self.tof.as_mut() {
            tof.begin_cycle(seeds.into_iter());
        }
        self.calculate_all_events()
    }

    /// Seed the fixed hole population for the steady-transport test and
    /// compute all events.
    fn generate_steady_polarons(&mut self) -> Result<(), SimError> {
        let n = (self.params.steady_carrier_density * self.lattice.volume_cm3()).round() as usize;
        let eligible: Vec<Coords> = (0..self.lattice.num_sites())
            .map(SiteIndex)
            .filter(|&i| {
                !self.params.phase_restriction
                    || self.lattice.site(i).site_type == SiteType::Donor
            })
            .map(|i| self.lattice.site_coords(i))
            .collect();
        if n == 0 || eligible.len() < n {
            return Err(self.latch_err(SimError::NoEligibleSite {
                what: "steady-transport carrier seeding",
            }));
        }
        let mut eligible = eligible;
        if self.procedural_disorder() {
            // Start the holes in the deepest states so equilibration is
            // short.
            eligible.sort_by(|a, b| {
                let ka = self.hole_site_energy(*a).unwrap_or(f64::INFINITY);
                let kb = self.hole_site_energy(*b).unwrap_or(f64::INFINITY);
                ka.total_cmp(&kb)
            });
        } else {
            eligible.shuffle(&mut self.rng);
        }
        for &coords in eligible.iter().take(n) {
            self.place_polaron(coords, true, None)?;
        }
        self.calculate_all_events()
    }

    fn procedural_disorder(&self) -> bool {
        matches!(
            self.params.disorder,
            DisorderModel::Gaussian { .. } | DisorderModel::Exponential { .. }
        )
    }

    /// Redraw the energetic landscape between transient cycles so cycles
    /// are statistically independent. Only procedural disorder models are
    /// redrawn; imported energies stay fixed.
    fn refresh_energies_for_new_cycle(&mut self, not_first: bool) -> Result<(), SimError> {
        if !not_first || !self.procedural_disorder() {
            return Ok(());
        }
        let params = self.params.clone();
        if let Err(e) = energies::assign(&mut self.lattice, &params, &mut self.rng) {
            self.latch.set(e.to_string());
            return Err(SimError::Stalled);
        }
        Ok(())
    }

    // ── Measurement drivers ─────────────────────────────────────

    fn update_transient_data(&mut self) {
        let elapsed = self.clock - self.transient_start_time;
        let unit = self.lattice.unit_size();
        match self.params.run_mode {
            RunMode::TimeOfFlight => {
                let mut samples = Vec::new();
                for object in self.objects.values() {
                    if object.is_exciton() {
                        continue;
                    }
                    let energy = self.lattice.energy(object.coords).unwrap_or(f64::NAN);
                    samples.push(CarrierSample {
                        id: object.id,
                        z: object.coords.z,
                        energy,
                    });
                }
                if let Some(tof) = self.tof.as_mut() {
                    tof.record(elapsed, unit, &samples);
                }
            }
            RunMode::Dynamics => {
                let mut excitons = Vec::new();
                let mut electrons = Vec::new();
                let mut holes = Vec::new();
                for object in self.objects.values() {
                    let sample = DynamicsSample {
                        energy: self.lattice.energy(object.coords).unwrap_or(f64::NAN),
                        displacement: object.displacement_magnitude(),
                    };
                    match object.species() {
                        Species::Singlet | Species::Triplet => excitons.push(sample),
                        Species::Electron => electrons.push(sample),
                        Species::Hole => holes.push(sample),
                    }
                }
                let singlets = self.counters.singlets;
                let triplets = self.counters.triplets;
                let filled = match self.dynamics.as_mut() {
                    Some(dynamics) => dynamics.record(
                        elapsed, unit, singlets, triplets, &excitons, &electrons, &holes,
                    ),
                    None => false,
                };
                if filled {
                    // Displacements are measured per bin, not cumulatively.
                    for object in self.objects.values_mut() {
                        object.reset_displacement();
                    }
                }
            }
            _ => {}
        }
    }

    fn update_steady_data(&mut self) {
        let n_equilibration = self.params.n_equilibration_events;
        let executed = self.counters.events_executed;
        if executed == n_equilibration {
            let clock = self.clock;
            if let Some(steady) = self.steady.as_mut() {
                steady.mark_equilibrated(clock);
            }
            for object in self.objects.values_mut() {
                object.reset_displacement();
            }
        }
        if executed < n_equilibration {
            return;
        }
        if executed % self.params.steady_hops_per_doos_sample == 0 {
            let mut samples: Vec<(f64, f64)> = Vec::new();
            for hole in self.objects.values().filter(|o| o.is_hole()) {
                let Ok(plain) = self.hole_site_energy(hole.coords) else {
                    continue;
                };
                let with_coulomb = plain + self.coulomb_self(hole, hole.coords);
                samples.push((plain, with_coulomb));
            }
            if let Some(steady) = self.steady.as_mut() {
                for (plain, with_coulomb) in samples {
                    steady.doos.add(plain);
                    steady.doos_coulomb.add(with_coulomb);
                    steady.equilibration_energy_sum += plain;
                    steady.equilibration_energy_sum_coulomb += with_coulomb;
                    steady.doos_samples += 1;
                }
            }
        }
        if executed % self.params.steady_hops_per_dos_sample == 0 {
            let mut sampled: Vec<f64> = Vec::with_capacity(self.lattice.num_sites());
            for n in 0..self.lattice.num_sites() {
                let index = SiteIndex(n);
                let coords = self.lattice.site_coords(index);
                let site = self.lattice.site(index);
                // An occupied site is probed through its own carrier so
                // the carrier does not interact with itself; an empty
                // site is probed with a virtual hole.
                let coulomb = match site.occupant.and_then(|id| self.objects.get(&id)) {
                    Some(occupant) if occupant.is_hole() => {
                        self.coulomb_self(occupant, coords)
                    }
                    _ => self.coulomb_probe(true, coords, None),
                };
                let plain = by_phase(
                    site.site_type,
                    self.params.homo_donor,
                    self.params.homo_acceptor,
                ) + site.energy;
                sampled.push(plain + coulomb);
            }
            if let Some(steady) = self.steady.as_mut() {
                for energy in sampled {
                    steady.dos_coulomb.add(energy);
                }
                steady.dos_samples += 1;
            }
        }
    }

    // ── Electrostatics helpers ──────────────────────────────────

    fn carriers(&self) -> impl Iterator<Item = &Object> {
        self.objects.values().filter(|o| !o.is_exciton())
    }

    /// Coulomb self-energy of a carrier evaluated at `at`, excluding its
    /// own contribution by ID. Image terms are suppressed in the
    /// time-of-flight configuration.
    fn coulomb_self(&self, polaron: &Object, at: Coords) -> f64 {
        self.coulomb.energy_at(
            polaron.is_hole(),
            at,
            Some(polaron.id),
            self.carriers(),
            &self.lattice,
            self.params.run_mode == RunMode::TimeOfFlight,
        )
    }

    /// Coulomb energy of a probe charge at `at` against all carriers.
    fn coulomb_probe(&self, probe_is_hole: bool, at: Coords, exclude: Option<ObjectId>) -> f64 {
        self.coulomb
            .energy_at(probe_is_hole, at, exclude, self.carriers(), &self.lattice, false)
    }

    /// Transport-level energy a hole sees at a site: the phase HOMO plus
    /// the site's energetic offset.
    fn hole_site_energy(&self, coords: Coords) -> Result<f64, SimError> {
        Ok(by_phase(
            self.lattice.site_type(coords)?,
            self.params.homo_donor,
            self.params.homo_acceptor,
        ) + self.lattice.energy(coords)?)
    }

    // ── Results and diagnostics ─────────────────────────────────

    /// The configuration this simulation was built from.
    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// The lattice.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// The simulation clock, s.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// A snapshot of all counters.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Whether the generation event is armed.
    pub fn is_light_on(&self) -> bool {
        self.light_on
    }

    /// The latched error message, if any consistency failure occurred.
    pub fn error_message(&self) -> Option<String> {
        self.latch.message()
    }

    /// Whether a runtime error has been latched.
    pub fn error_found(&self) -> bool {
        self.latch.is_set()
    }

    /// All live objects.
    pub fn live_objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// The pending (per-object winning) events.
    pub fn pending_events(&self) -> impl Iterator<Item = &Event> {
        self.pending.values()
    }

    /// Completed transient cycles (dynamics and time-of-flight tests).
    pub fn transient_cycles(&self) -> u64 {
        self.transient_cycles
    }

    /// Net displacement of every removed exciton, nm. Populated by the
    /// exciton-diffusion test.
    pub fn diffusion_lengths(&self) -> &[f64] {
        &self.diffusion_distances
    }

    /// Lifetime of every removed exciton, s. Populated by the
    /// exciton-diffusion test.
    pub fn exciton_lifetimes(&self) -> &[f64] {
        &self.exciton_lifetimes
    }

    /// Mean exciton diffusion length, nm. NaN before any exciton has been
    /// removed.
    pub fn average_diffusion_length(&self) -> f64 {
        let n = self.diffusion_distances.len();
        self.diffusion_distances.iter().sum::<f64>() / n as f64
    }

    /// Transit times of extracted time-of-flight carriers, s.
    pub fn transit_times(&self) -> &[f64] {
        self.tof.as_ref().map_or(&[], |tof| &tof.transit_times)
    }

    /// Per-carrier time-of-flight mobilities in cm^2/(V s), one per
    /// recorded transit time: the film thickness squared over the applied
    /// potential times the transit time.
    pub fn transit_time_mobilities(&self) -> Vec<f64> {
        let thickness = 1e-7 * self.lattice.unit_size() * f64::from(self.lattice.height());
        let potential = self.params.internal_potential.abs();
        self.transit_times()
            .iter()
            .map(|&t| thickness * thickness / (potential * t))
            .collect()
    }

    /// Log-binned probability distribution of the transit times as
    /// `(bin time, probability)` pairs. Empty until a carrier has been
    /// extracted.
    pub fn transit_time_distribution(&self, pnts_per_decade: u32) -> Vec<(f64, f64)> {
        let transits = self.transit_times();
        let Some(&min) = transits
            .iter()
            .min_by(|a, b| a.total_cmp(b))
            .filter(|&&t| t > 0.0)
        else {
            return Vec::new();
        };
        let max = transits
            .iter()
            .fold(min, |acc, &t| if t > acc { t } else { acc });
        let bins = TransientBins::new(min, max * 1.01, pnts_per_decade);
        let mut counts = vec![0u64; bins.len()];
        for &t in transits {
            if let Some(index) = bins.index_of(t) {
                counts[index] += 1;
            }
        }
        let total = transits.len() as f64;
        bins.times()
            .iter()
            .zip(counts)
            .map(|(&time, count)| (time, count as f64 / total))
            .collect()
    }

    /// Electron extraction counts per bottom-electrode column, indexed
    /// `x * width + y`.
    pub fn electron_extraction_map(&self) -> &[u64] {
        &self.electron_extraction_map
    }

    /// Hole extraction counts per top-electrode column, indexed
    /// `x * width + y`.
    pub fn hole_extraction_map(&self) -> &[u64] {
        &self.hole_extraction_map
    }

    /// Time-of-flight transient data.
    pub fn tof_data(&self) -> Option<&ToFData> {
        self.tof.as_ref()
    }

    /// Dynamics transient data.
    pub fn dynamics_data(&self) -> Option<&DynamicsData> {
        self.dynamics.as_ref()
    }

    /// Steady-transport measurement data.
    pub fn steady_data(&self) -> Option<&SteadyData> {
        self.steady.as_ref()
    }

    /// The displacement-weighted steady-state transport energies
    /// `(plain, with Coulomb)`, eV.
    pub fn steady_transport_energies(&self) -> Option<(f64, f64)> {
        self.steady.as_ref().map(SteadyData::transport_energies)
    }

    /// Steady-state hole mobility in cm^2/(V s), from the mean drift
    /// velocity since equilibration against the applied field. NaN before
    /// equilibration or at zero field.
    pub fn steady_mobility(&self) -> f64 {
        let Some(equilibrated) = self.steady.as_ref().and_then(|s| s.equilibration_time) else {
            return f64::NAN;
        };
        let elapsed = self.clock - equilibrated;
        let field = self.params.internal_potential.abs()
            / (1e-7 * self.lattice.unit_size() * f64::from(self.lattice.height()));
        if elapsed <= 0.0 || field == 0.0 {
            return f64::NAN;
        }
        let mut displacement_sum = 0.0;
        let mut count = 0u64;
        for hole in self.objects.values().filter(|o| o.is_hole()) {
            displacement_sum += 1e-7 * self.lattice.unit_size() * f64::from(hole.displacement.2);
            count += 1;
        }
        if count == 0 {
            return f64::NAN;
        }
        (displacement_sum / count as f64 / elapsed).abs() / field
    }

    /// The in-memory event log. Empty unless logging is enabled.
    pub fn event_log(&self) -> &[String] {
        &self.event_log
    }

    /// Fraction of photogenerated excitons whose charges were both
    /// collected, in percent. Meaningful for the IQE test.
    pub fn internal_quantum_efficiency(&self) -> f64 {
        let pairs =
            (self.counters.electrons_collected + self.counters.holes_collected) as f64 / 2.0;
        100.0 * pairs / self.counters.excitons_created as f64
    }

    /// Site energy at `coords`, or NaN (latching the error flag) for
    /// coordinates outside the lattice.
    pub fn site_energy_at(&self, coords: Coords) -> f64 {
        match self.lattice.energy(coords) {
            Ok(energy) => energy,
            Err(e) => {
                self.latch.set(e.to_string());
                f64::NAN
            }
        }
    }

    /// Site type at `coords`, or `None` (latching the error flag) for
    /// coordinates outside the lattice.
    pub fn site_type_at(&self, coords: Coords) -> Option<SiteType> {
        match self.lattice.site_type(coords) {
            Ok(site_type) => Some(site_type),
            Err(e) => {
                self.latch.set(e.to_string());
                None
            }
        }
    }

    /// Coulomb energy of a probe charge at `coords`, or NaN (latching the
    /// error flag) for coordinates outside the lattice.
    pub fn coulomb_at(&self, probe_is_hole: bool, coords: Coords) -> f64 {
        if !self.lattice.contains(coords) {
            self.latch
                .set(SimError::InvalidCoordinates { coords }.to_string());
            return f64::NAN;
        }
        self.coulomb_probe(probe_is_hole, coords, None)
    }

    /// A human-readable multi-line status summary.
    pub fn status_report(&self) -> String {
        let c = &self.counters;
        format!(
            "t = {:.6e} s, {} events executed\n\
             live: {} excitons ({} singlet, {} triplet), {} electrons, {} holes\n\
             excitons: {} created, {} recombined, {} dissociated\n\
             polarons: {} recombinations ({} geminate, {} bimolecular), \
             {} electrons collected, {} holes collected",
            self.clock,
            c.events_executed,
            c.excitons,
            c.singlets,
            c.triplets,
            c.electrons,
            c.holes,
            c.excitons_created,
            c.excitons_recombined(),
            c.excitons_dissociated(),
            c.electrons_recombined,
            c.geminate_recombinations,
            c.bimolecular_recombinations,
            c.electrons_collected,
            c.holes_collected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use excimer_core::MorphologyModel;

    fn diffusion_params() -> Parameters {
        Parameters {
            length: 10,
            width: 10,
            height: 10,
            n_tests: 3,
            coulomb_cutoff: 5.0,
            seed: 11,
            ..Parameters::default()
        }
    }

    fn bilayer_params() -> Parameters {
        Parameters {
            length: 8,
            width: 8,
            height: 8,
            morphology: MorphologyModel::Bilayer {
                thickness_donor: 4,
                thickness_acceptor: 4,
            },
            coulomb_cutoff: 5.0,
            exciton_generation_rate_donor: 0.0,
            exciton_generation_rate_acceptor: 0.0,
            seed: 4,
            ..Parameters::default()
        }
    }

    fn occupancy_matches_objects(sim: &Simulation) -> bool {
        let occupied = sim.lattice().sites().filter(|s| s.is_occupied()).count();
        occupied == sim.live_objects().count()
    }

    #[test]
    fn diffusion_run_reaches_the_recombination_budget() {
        let mut sim = Simulation::new(diffusion_params()).unwrap();
        sim.run().unwrap();
        assert!(!sim.error_found());
        let c = sim.counters();
        assert_eq!(c.excitons_recombined(), 3);
        assert_eq!(sim.diffusion_lengths().len(), 3);
        assert_eq!(sim.exciton_lifetimes().len(), 3);
        assert!(sim.exciton_lifetimes().iter().all(|&t| t > 0.0));
        assert!(sim.clock() > 0.0);
        // Created = recombined + still alive.
        assert_eq!(c.excitons_created, c.excitons_recombined() + c.excitons);
        assert!(occupancy_matches_objects(&sim));
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut sim = Simulation::new(diffusion_params()).unwrap();
        let mut last = 0.0;
        for _ in 0..200 {
            if sim.check_finished() {
                break;
            }
            sim.execute_next_event().unwrap();
            assert!(sim.clock() >= last);
            last = sim.clock();
        }
    }

    #[test]
    fn pending_times_never_precede_the_clock() {
        let mut sim = Simulation::new(diffusion_params()).unwrap();
        for _ in 0..100 {
            if sim.check_finished() {
                break;
            }
            sim.execute_next_event().unwrap();
            let clock = sim.clock();
            assert!(sim.pending_events().all(|e| e.execution_time >= clock));
        }
    }

    #[test]
    fn manual_exciton_creation_arms_an_event() {
        let mut sim = Simulation::new(bilayer_params()).unwrap();
        let id = sim.create_exciton(Coords::new(1, 1, 6), true).unwrap();
        assert!(sim.pending_events().any(|e| e.object == id));
        assert_eq!(sim.counters().excitons, 1);
        assert_eq!(sim.counters().excitons_created_donor, 1);
    }

    #[test]
    fn out_of_range_creation_latches_without_side_effects() {
        let mut sim = Simulation::new(bilayer_params()).unwrap();
        let before = sim.counters();
        assert!(sim.create_electron(Coords::new(-1, 0, 0)).is_none());
        assert!(sim.error_found());
        assert_eq!(sim.counters(), before);
        assert_eq!(sim.live_objects().count(), 0);
        // A latched simulation reports itself finished.
        assert!(sim.check_finished());
    }

    #[test]
    fn occupied_site_creation_latches() {
        let mut sim = Simulation::new(bilayer_params()).unwrap();
        let coords = Coords::new(2, 2, 2);
        assert!(sim.create_electron(coords).is_some());
        assert!(sim.create_electron(coords).is_none());
        assert!(sim.error_found());
        assert_eq!(sim.counters().electrons, 1);
    }

    #[test]
    fn phase_restriction_rejects_wrong_phase_creation() {
        let mut sim = Simulation::new(bilayer_params()).unwrap();
        // z=2 is in the acceptor slab; holes are not allowed there.
        assert!(sim.create_hole(Coords::new(0, 0, 2)).is_none());
        assert!(sim.error_found());
        assert_eq!(sim.counters().holes, 0);
    }

    #[test]
    fn restricted_hole_stays_in_the_donor_phase() {
        let mut sim = Simulation::new(bilayer_params()).unwrap();
        let id = sim.create_hole(Coords::new(4, 4, 6)).unwrap();
        for _ in 0..30 {
            if sim.check_finished() {
                break;
            }
            sim.execute_next_event().unwrap();
            let hole = sim.live_objects().find(|o| o.id == id).unwrap();
            assert_eq!(
                sim.site_type_at(hole.coords),
                Some(SiteType::Donor)
            );
        }
        assert!(!sim.error_found());
    }

    #[test]
    fn diagnostics_latch_on_bad_coordinates() {
        let sim = Simulation::new(diffusion_params()).unwrap();
        let bad = Coords::new(99, 0, 0);
        assert!(sim.site_energy_at(bad).is_nan());
        assert!(sim.site_type_at(bad).is_none());
        assert!(sim.coulomb_at(true, bad).is_nan());
        assert!(sim.error_found());
    }

    #[test]
    fn potential_ramp_spans_the_applied_bias() {
        let params = Parameters {
            internal_potential: 1.5,
            ..diffusion_params()
        };
        let sim = Simulation::new(params).unwrap();
        // Linear in z, spanning V * (H-1)/(H+1) across the film.
        let top = sim.e_potential[0];
        let bottom = sim.e_potential[9];
        assert!((top - bottom - 1.5 * 9.0 / 11.0).abs() < 1e-12);
        let mid = sim.e_potential[5] - sim.e_potential[4];
        assert!((mid - (bottom - top) / 9.0).abs() < 1e-12);
    }

    #[test]
    fn tof_seeding_fills_the_generation_plane() {
        let params = Parameters {
            length: 8,
            width: 8,
            height: 8,
            run_mode: RunMode::TimeOfFlight,
            periodic_z: false,
            tof_initial_polarons: 5,
            internal_potential: 1.0,
            coulomb_cutoff: 5.0,
            n_tests: 5,
            seed: 9,
            ..Parameters::default()
        };
        let sim = Simulation::new(params).unwrap();
        let c = sim.counters();
        assert_eq!(c.holes, 5);
        assert_eq!(c.holes_created, 5);
        assert!(sim.live_objects().all(|o| o.coords.z == 0));
        assert_eq!(sim.transient_cycles(), 1);
        assert!(sim.pending_events().count() > 0);
    }

    #[test]
    fn steady_seeding_places_the_configured_density() {
        let params = Parameters {
            length: 10,
            width: 10,
            height: 10,
            run_mode: RunMode::SteadyTransport,
            steady_carrier_density: 2e19,
            n_equilibration_events: 100,
            n_tests: 100,
            coulomb_cutoff: 5.0,
            seed: 3,
            ..Parameters::default()
        };
        let sim = Simulation::new(params).unwrap();
        // 2e19 cm^-3 * 1000 nm^3 = 20 holes.
        assert_eq!(sim.counters().holes, 20);
        assert!(sim
            .live_objects()
            .all(|o| o.species() == Species::Hole));
    }

    #[test]
    fn dynamics_seeds_the_initial_concentration() {
        let params = Parameters {
            length: 10,
            width: 10,
            height: 10,
            run_mode: RunMode::Dynamics,
            dynamics_initial_exciton_conc: 4.5e18,
            n_tests: 5,
            coulomb_cutoff: 5.0,
            seed: 21,
            ..Parameters::default()
        };
        let sim = Simulation::new(params).unwrap();
        // ceil(4.5e18 * 1e-18 cm^3) = 5 excitons.
        assert_eq!(sim.counters().excitons, 5);
        assert_eq!(sim.transient_cycles(), 1);
    }

    #[test]
    fn status_report_names_the_populations() {
        let sim = Simulation::new(diffusion_params()).unwrap();
        let report = sim.status_report();
        assert!(report.contains("events executed"));
        assert!(report.contains("excitons"));
    }
}
