//! A single lattice site.

use excimer_core::ObjectId;
use std::fmt;

/// Material phase of a lattice site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SiteType {
    /// Not yet assigned by a morphology provider. Any unassigned site
    /// surviving initialization is an error.
    #[default]
    Unassigned,
    /// Electron-donating phase; holes live here under phase restriction.
    Donor,
    /// Electron-accepting phase; electrons live here under phase
    /// restriction.
    Acceptor,
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unassigned => write!(f, "unassigned"),
            Self::Donor => write!(f, "donor"),
            Self::Acceptor => write!(f, "acceptor"),
        }
    }
}

/// One site of the simulation lattice: its phase, its energetic offset,
/// and at most one occupying object.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Site {
    /// Material phase.
    pub site_type: SiteType,
    /// Energetic offset from the phase's nominal level, in eV.
    pub energy: f64,
    /// The object currently on this site, if any.
    pub occupant: Option<ObjectId>,
}

impl Site {
    /// Whether an object currently occupies this site.
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}
