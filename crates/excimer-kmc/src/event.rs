//! Pending events.

use excimer_core::{Coords, ObjectId};
use std::fmt;

/// The mechanisms an event can represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Photogeneration of a new singlet exciton (the always-armed
    /// generation event; not tied to a live object).
    ExcitonCreation,
    /// Exciton move to an unoccupied site.
    ExcitonHop,
    /// Exciton decay at its current site.
    ExcitonRecombination,
    /// Exciton splitting into a geminate electron/hole pair across the
    /// heterojunction.
    ExcitonDissociation,
    /// Exciton destroyed by energy transfer to another exciton.
    ExcitonExcitonAnnihilation,
    /// Exciton destroyed by energy transfer to a polaron.
    ExcitonPolaronAnnihilation,
    /// Singlet/triplet spin conversion in place.
    IntersystemCrossing,
    /// Polaron move to an unoccupied site.
    PolaronHop,
    /// Electron-initiated recombination with a hole.
    PolaronRecombination,
    /// Polaron collection at an electrode plane.
    PolaronExtraction,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExcitonCreation => "exciton creation",
            Self::ExcitonHop => "exciton hop",
            Self::ExcitonRecombination => "exciton recombination",
            Self::ExcitonDissociation => "exciton dissociation",
            Self::ExcitonExcitonAnnihilation => "exciton-exciton annihilation",
            Self::ExcitonPolaronAnnihilation => "exciton-polaron annihilation",
            Self::IntersystemCrossing => "intersystem crossing",
            Self::PolaronHop => "polaron hop",
            Self::PolaronRecombination => "polaron recombination",
            Self::PolaronExtraction => "polaron extraction",
        };
        write!(f, "{name}")
    }
}

/// One pending event: the winning candidate for a live object, or a
/// not-yet-selected candidate during enumeration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    /// The mechanism.
    pub kind: EventKind,
    /// The initiating object.
    pub object: ObjectId,
    /// Destination coordinate for moves, dissociations, and bimolecular
    /// mechanisms; `None` for in-place mechanisms.
    pub dest: Option<Coords>,
    /// Target object for bimolecular mechanisms.
    pub target: Option<ObjectId>,
    /// First-order rate constant, 1/s.
    pub rate: f64,
    /// Sampled absolute execution time, s.
    pub execution_time: f64,
}
