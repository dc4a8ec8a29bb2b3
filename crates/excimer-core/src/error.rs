//! Error types for the Excimer KMC engine.
//!
//! Organized by subsystem: parameter validation, lattice/site queries,
//! morphology and energy imports, and runtime consistency failures in the
//! scheduling loop. All runtime failures are latched by the simulation and
//! terminate the loop on its next check; there is no retry path, since any
//! of these conditions indicates bad input or a violated invariant that
//! would silently corrupt downstream statistics.

use crate::Coords;
use std::error::Error;
use std::fmt;

/// Errors from parameter validation, raised before any simulation state
/// is constructed.
#[derive(Clone, Debug, PartialEq)]
pub enum ParametersError {
    /// A parameter value is out of its valid range or inconsistent with
    /// another parameter.
    Invalid {
        /// Name of the offending parameter.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl fmt::Display for ParametersError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { name, reason } => {
                write!(f, "invalid parameter '{name}': {reason}")
            }
        }
    }
}

impl Error for ParametersError {}

/// Errors from lattice and site queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatticeError {
    /// A coordinate is outside the lattice bounds.
    InvalidCoordinates {
        /// The offending coordinate.
        coords: Coords,
    },
    /// The destination site of a move is already occupied.
    DestinationOccupied {
        /// The occupied destination.
        coords: Coords,
    },
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCoordinates { coords } => {
                write!(f, "coordinates {coords} are outside the lattice")
            }
            Self::DestinationOccupied { coords } => {
                write!(f, "destination site {coords} is already occupied")
            }
        }
    }
}

impl Error for LatticeError {}

/// Errors from morphology and site-energy file imports.
///
/// Imports are all-or-nothing: a failing import must not mutate any site,
/// so parsing happens onto scratch storage and commits at the end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportError {
    /// The underlying reader failed.
    Io {
        /// The I/O error message.
        reason: String,
    },
    /// The file header does not identify a supported format.
    UnsupportedFormat {
        /// The header line that was found.
        header: String,
    },
    /// The format was recognized but the declared version is not supported.
    UnsupportedVersion {
        /// The declared version string.
        version: String,
    },
    /// The declared dimensions do not match the configured lattice.
    DimensionMismatch {
        /// Dimensions declared by the file (length, width, height).
        found: (i32, i32, i32),
        /// Dimensions of the configured lattice.
        expected: (i32, i32, i32),
    },
    /// A line could not be parsed.
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
    /// The file ended before all sites were assigned.
    Truncated,
    /// Sites remained unassigned after a complete parse.
    UnassignedSites {
        /// How many sites had no type.
        count: usize,
    },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { reason } => write!(f, "import read failed: {reason}"),
            Self::UnsupportedFormat { header } => {
                write!(f, "unrecognized import format (header '{header}')")
            }
            Self::UnsupportedVersion { version } => {
                write!(f, "unsupported import format version '{version}'")
            }
            Self::DimensionMismatch { found, expected } => write!(
                f,
                "imported dimensions {}x{}x{} do not match lattice dimensions {}x{}x{}",
                found.0, found.1, found.2, expected.0, expected.1, expected.2
            ),
            Self::Malformed { line, reason } => {
                write!(f, "malformed import data at line {line}: {reason}")
            }
            Self::Truncated => write!(f, "end of file reached before all sites were assigned"),
            Self::UnassignedSites { count } => {
                write!(f, "{count} sites left unassigned after import")
            }
        }
    }
}

impl Error for ImportError {}

/// Runtime consistency errors from the scheduling loop and the object
/// lifecycle manager.
///
/// Any of these latches the simulation error flag; the loop terminates on
/// its next check.
#[derive(Clone, Debug, PartialEq)]
pub enum SimError {
    /// No unoccupied site of the required type could be found for a
    /// generation event or initial carrier placement.
    NoEligibleSite {
        /// What was being placed.
        what: &'static str,
    },
    /// The selected event's execution time precedes the simulation clock,
    /// indicating stale or corrupted rate data.
    EventTimePrecedesClock {
        /// The offending execution time.
        event_time: f64,
        /// The current clock value.
        clock: f64,
    },
    /// An exciton, which always carries unimolecular candidates, produced
    /// no computable candidate events.
    NoCandidates {
        /// The object with no candidates.
        object: crate::ObjectId,
    },
    /// No live object has any pending event and no generation event is
    /// armed; the simulation cannot advance.
    Stalled,
    /// A polaron was found on a site type forbidden by phase restriction.
    PhaseRestrictionViolation {
        /// Human-readable description of the violation.
        reason: String,
    },
    /// An object or event lookup by ID failed.
    UnknownObject {
        /// The missing ID.
        id: crate::ObjectId,
    },
    /// A hop or creation destination was occupied at execution time.
    DestinationOccupied {
        /// The occupied coordinate.
        coords: Coords,
    },
    /// A coordinate outside the lattice reached a lifecycle operation.
    InvalidCoordinates {
        /// The offending coordinate.
        coords: Coords,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEligibleSite { what } => {
                write!(f, "no eligible unoccupied site found for {what}")
            }
            Self::EventTimePrecedesClock { event_time, clock } => write!(
                f,
                "selected event time {event_time:e} precedes simulation clock {clock:e}"
            ),
            Self::NoCandidates { object } => {
                write!(f, "no valid candidate events for object {object}")
            }
            Self::Stalled => write!(f, "no events to execute; simulation is stalled"),
            Self::PhaseRestrictionViolation { reason } => {
                write!(f, "phase restriction violated: {reason}")
            }
            Self::UnknownObject { id } => write!(f, "object {id} not found"),
            Self::DestinationOccupied { coords } => {
                write!(f, "destination site {coords} is already occupied")
            }
            Self::InvalidCoordinates { coords } => {
                write!(f, "coordinates {coords} are outside the lattice")
            }
        }
    }
}

impl Error for SimError {}

impl From<LatticeError> for SimError {
    fn from(e: LatticeError) -> Self {
        match e {
            LatticeError::InvalidCoordinates { coords } => Self::InvalidCoordinates { coords },
            LatticeError::DestinationOccupied { coords } => Self::DestinationOccupied { coords },
        }
    }
}
