//! Per-run event and population counters.
//!
//! All counters are plain fields of one structure owned by the simulation
//! (rather than ambient process state), so every counter's lifetime is the
//! run's lifetime and tests can assert on the whole set at once.

/// Population and mechanism counters for one simulation run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    /// Live excitons.
    pub excitons: u64,
    /// Live singlet excitons.
    pub singlets: u64,
    /// Live triplet excitons.
    pub triplets: u64,
    /// Live electrons.
    pub electrons: u64,
    /// Live holes.
    pub holes: u64,

    /// Excitons created since run start.
    pub excitons_created: u64,
    /// Excitons created on donor sites.
    pub excitons_created_donor: u64,
    /// Excitons created on acceptor sites.
    pub excitons_created_acceptor: u64,
    /// Electrons created since run start.
    pub electrons_created: u64,
    /// Holes created since run start.
    pub holes_created: u64,

    /// Singlet excitons that recombined.
    pub singlets_recombined: u64,
    /// Triplet excitons that recombined.
    pub triplets_recombined: u64,
    /// Singlet excitons that dissociated.
    pub singlets_dissociated: u64,
    /// Triplet excitons that dissociated.
    pub triplets_dissociated: u64,

    /// Singlet-singlet annihilation events.
    pub singlet_singlet_annihilations: u64,
    /// Singlet-triplet annihilation events.
    pub singlet_triplet_annihilations: u64,
    /// Triplet-triplet annihilation events.
    pub triplet_triplet_annihilations: u64,
    /// Singlet-polaron annihilation events.
    pub singlet_polaron_annihilations: u64,
    /// Triplet-polaron annihilation events.
    pub triplet_polaron_annihilations: u64,

    /// Singlet-to-triplet intersystem crossings.
    pub intersystem_crossings: u64,
    /// Triplet-to-singlet reverse intersystem crossings.
    pub reverse_intersystem_crossings: u64,

    /// Electrons destroyed by polaron recombination.
    pub electrons_recombined: u64,
    /// Holes destroyed by polaron recombination.
    pub holes_recombined: u64,
    /// Recombinations of a geminate pair (matching tags).
    pub geminate_recombinations: u64,
    /// Recombinations of carriers from different pairs.
    pub bimolecular_recombinations: u64,

    /// Electrons extracted at the electrode.
    pub electrons_collected: u64,
    /// Holes extracted at the electrode.
    pub holes_collected: u64,

    /// Events executed by the scheduling loop.
    pub events_executed: u64,
}

impl Counters {
    /// Live objects of any species.
    pub fn live_total(&self) -> u64 {
        self.excitons + self.electrons + self.holes
    }

    /// Exciton recombinations of either spin.
    pub fn excitons_recombined(&self) -> u64 {
        self.singlets_recombined + self.triplets_recombined
    }

    /// Exciton dissociations of either spin.
    pub fn excitons_dissociated(&self) -> u64 {
        self.singlets_dissociated + self.triplets_dissociated
    }
}
