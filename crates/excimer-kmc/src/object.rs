//! Live simulation objects: excitons and polarons.

use excimer_core::{Coords, ObjectId};
use std::fmt;

/// The four object species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Species {
    /// Spin-0 exciton.
    Singlet,
    /// Spin-1 exciton.
    Triplet,
    /// Negative polaron.
    Electron,
    /// Positive polaron.
    Hole,
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singlet => write!(f, "singlet"),
            Self::Triplet => write!(f, "triplet"),
            Self::Electron => write!(f, "electron"),
            Self::Hole => write!(f, "hole"),
        }
    }
}

/// Mechanism-relevant object state beyond position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    /// An exciton; `singlet` flips on intersystem crossing.
    Exciton {
        /// Spin state: singlet when true.
        singlet: bool,
    },
    /// A polaron of fixed charge sign.
    Polaron {
        /// Positive carrier when true.
        is_hole: bool,
    },
}

/// One live simulation object.
///
/// Objects are keyed by their stable [`ObjectId`]; the `tag` is a
/// per-species monotonic number used for reporting and, for polarons, for
/// geminate-pair matching (a dissociation gives both carriers the same
/// tag).
#[derive(Clone, Copy, Debug)]
pub struct Object {
    /// Stable key into the simulation's object and event maps.
    pub id: ObjectId,
    /// Exciton or polaron state.
    pub kind: ObjectKind,
    /// Per-species monotonic tag; shared by geminate polaron pairs.
    pub tag: u64,
    /// Simulation clock at creation.
    pub created_at: f64,
    /// Current lattice position.
    pub coords: Coords,
    /// Accumulated true displacement in lattice units, corrected for
    /// periodic wraps. Reset by the transient sampler.
    pub displacement: (i32, i32, i32),
}

impl Object {
    /// The object's species.
    pub fn species(&self) -> Species {
        match self.kind {
            ObjectKind::Exciton { singlet: true } => Species::Singlet,
            ObjectKind::Exciton { singlet: false } => Species::Triplet,
            ObjectKind::Polaron { is_hole: true } => Species::Hole,
            ObjectKind::Polaron { is_hole: false } => Species::Electron,
        }
    }

    /// Whether this object is an exciton.
    pub fn is_exciton(&self) -> bool {
        matches!(self.kind, ObjectKind::Exciton { .. })
    }

    /// Whether this object is a singlet exciton.
    pub fn is_singlet(&self) -> bool {
        matches!(self.kind, ObjectKind::Exciton { singlet: true })
    }

    /// Whether this object is a hole polaron.
    pub fn is_hole(&self) -> bool {
        matches!(self.kind, ObjectKind::Polaron { is_hole: true })
    }

    /// Whether this object is an electron polaron.
    pub fn is_electron(&self) -> bool {
        matches!(self.kind, ObjectKind::Polaron { is_hole: false })
    }

    /// Flip the spin of an exciton. No-op for polarons.
    pub fn flip_spin(&mut self) {
        if let ObjectKind::Exciton { singlet } = &mut self.kind {
            *singlet = !*singlet;
        }
    }

    /// Record a move by its true (wrap-corrected) displacement.
    pub fn record_move(&mut self, dest: Coords, dx: i32, dy: i32, dz: i32) {
        self.coords = dest;
        self.displacement.0 += dx;
        self.displacement.1 += dy;
        self.displacement.2 += dz;
    }

    /// True displacement since creation (or the last reset), in lattice
    /// units.
    pub fn displacement_magnitude(&self) -> f64 {
        let (dx, dy, dz) = self.displacement;
        (((dx * dx) + (dy * dy) + (dz * dz)) as f64).sqrt()
    }

    /// Zero the displacement accumulator. Used by transient samplers that
    /// measure displacement per time bin.
    pub fn reset_displacement(&mut self) {
        self.displacement = (0, 0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_follows_kind() {
        let mut obj = Object {
            id: ObjectId(1),
            kind: ObjectKind::Exciton { singlet: true },
            tag: 1,
            created_at: 0.0,
            coords: Coords::new(0, 0, 0),
            displacement: (0, 0, 0),
        };
        assert_eq!(obj.species(), Species::Singlet);
        obj.flip_spin();
        assert_eq!(obj.species(), Species::Triplet);

        let hole = Object {
            kind: ObjectKind::Polaron { is_hole: true },
            ..obj
        };
        assert_eq!(hole.species(), Species::Hole);
        assert!(!hole.is_electron());
    }

    #[test]
    fn displacement_accumulates_true_moves() {
        let mut obj = Object {
            id: ObjectId(1),
            kind: ObjectKind::Polaron { is_hole: false },
            tag: 1,
            created_at: 0.0,
            coords: Coords::new(0, 0, 9),
            displacement: (0, 0, 0),
        };
        // A wrap from z=9 to z=0 on a height-10 lattice is one true step.
        obj.record_move(Coords::new(0, 0, 0), 0, 0, 1);
        assert_eq!(obj.displacement, (0, 0, 1));
        assert_eq!(obj.displacement_magnitude(), 1.0);
        obj.reset_displacement();
        assert_eq!(obj.displacement_magnitude(), 0.0);
    }
}
