//! The 3-D simulation lattice.
//!
//! Sites are stored densely in canonical x-major, z-fastest order:
//! `index = (x * width + y) * height + z`. Each axis is independently
//! periodic or bounded; the z axis is the transport direction, and when it
//! is non-periodic its two faces act as the electrodes.

use crate::site::{Site, SiteType};
use excimer_core::{Coords, LatticeError, ObjectId, Parameters, SiteIndex};
use rand::Rng;

/// The dense 3-D site lattice.
#[derive(Clone, Debug)]
pub struct Lattice {
    length: i32,
    width: i32,
    height: i32,
    unit_size: f64,
    periodic_x: bool,
    periodic_y: bool,
    periodic_z: bool,
    sites: Vec<Site>,
}

impl Lattice {
    /// Build an all-unassigned lattice with the given geometry.
    ///
    /// Dimensions must be positive; this is normally guaranteed upstream
    /// by [`Parameters::validate`](excimer_core::Parameters::validate).
    pub fn new(
        length: i32,
        width: i32,
        height: i32,
        unit_size: f64,
        periodic_x: bool,
        periodic_y: bool,
        periodic_z: bool,
    ) -> Self {
        let n = (length as usize) * (width as usize) * (height as usize);
        Self {
            length,
            width,
            height,
            unit_size,
            periodic_x,
            periodic_y,
            periodic_z,
            sites: vec![Site::default(); n],
        }
    }

    /// Build an all-unassigned lattice from a validated configuration.
    pub fn from_params(params: &Parameters) -> Self {
        Self::new(
            params.length,
            params.width,
            params.height,
            params.unit_size,
            params.periodic_x,
            params.periodic_y,
            params.periodic_z,
        )
    }

    // ── Geometry queries ────────────────────────────────────────

    /// Lattice length (x-axis sites).
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Lattice width (y-axis sites).
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Lattice height (z-axis sites).
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Lattice constant in nm.
    pub fn unit_size(&self) -> f64 {
        self.unit_size
    }

    /// Whether the z (transport) axis is periodic.
    pub fn periodic_z(&self) -> bool {
        self.periodic_z
    }

    /// Total number of sites.
    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// Lattice volume in cm^3.
    pub fn volume_cm3(&self) -> f64 {
        self.num_sites() as f64 * (1e-7 * self.unit_size).powi(3)
    }

    /// Whether a coordinate lies inside the lattice bounds.
    pub fn contains(&self, coords: Coords) -> bool {
        (0..self.length).contains(&coords.x)
            && (0..self.width).contains(&coords.y)
            && (0..self.height).contains(&coords.z)
    }

    /// Canonical linear index of a coordinate.
    pub fn site_index(&self, coords: Coords) -> Result<SiteIndex, LatticeError> {
        if !self.contains(coords) {
            return Err(LatticeError::InvalidCoordinates { coords });
        }
        let idx = ((coords.x as usize) * (self.width as usize) + coords.y as usize)
            * (self.height as usize)
            + coords.z as usize;
        Ok(SiteIndex(idx))
    }

    /// Coordinate of the n-th site in canonical order.
    ///
    /// The inverse of [`site_index`](Self::site_index) for in-range
    /// indices.
    pub fn site_coords(&self, index: SiteIndex) -> Coords {
        let h = self.height as usize;
        let w = self.width as usize;
        let z = index.0 % h;
        let y = (index.0 / h) % w;
        let x = index.0 / (h * w);
        Coords::new(x as i32, y as i32, z as i32)
    }

    // ── Moves and distances ─────────────────────────────────────

    /// Whether the displacement `(dx, dy, dz)` from `coords` lands on a
    /// site. The null move is never valid; a non-periodic axis rejects
    /// displacements that leave the lattice.
    pub fn move_is_valid(&self, coords: Coords, dx: i32, dy: i32, dz: i32) -> bool {
        if dx == 0 && dy == 0 && dz == 0 {
            return false;
        }
        if !self.periodic_x && !(0..self.length).contains(&(coords.x + dx)) {
            return false;
        }
        if !self.periodic_y && !(0..self.width).contains(&(coords.y + dy)) {
            return false;
        }
        if !self.periodic_z && !(0..self.height).contains(&(coords.z + dz)) {
            return false;
        }
        true
    }

    /// Destination of the displacement `(dx, dy, dz)` from `coords`,
    /// wrapping periodic axes.
    ///
    /// Assumes the move passed [`move_is_valid`](Self::move_is_valid) and
    /// that each component is smaller in magnitude than its axis extent.
    pub fn destination_coords(&self, coords: Coords, dx: i32, dy: i32, dz: i32) -> Coords {
        Coords::new(
            coords.x + dx + wrap(coords.x, dx, self.length),
            coords.y + dy + wrap(coords.y, dy, self.width),
            coords.z + dz + wrap(coords.z, dz, self.height),
        )
    }

    /// Squared site-to-site distance (in lattice units) under the
    /// minimum-image convention on periodic axes.
    pub fn distance_squared(&self, a: Coords, b: Coords) -> i32 {
        let dx = min_image(b.x - a.x, self.periodic_x, self.length);
        let dy = min_image(b.y - a.y, self.periodic_y, self.width);
        let dz = min_image(b.z - a.z, self.periodic_z, self.height);
        dx * dx + dy * dy + dz * dz
    }

    /// Periodic-wrap correction for the x displacement `dest.x - init.x`:
    /// `-length`, `0`, or `+length` such that adding it yields the true
    /// displacement of the move that produced `dest`.
    pub fn displacement_correction_x(&self, init: Coords, dest: Coords) -> i32 {
        displacement_correction(dest.x - init.x, self.periodic_x, self.length)
    }

    /// Periodic-wrap correction for the y displacement.
    pub fn displacement_correction_y(&self, init: Coords, dest: Coords) -> i32 {
        displacement_correction(dest.y - init.y, self.periodic_y, self.width)
    }

    /// Periodic-wrap correction for the z displacement.
    ///
    /// Nonzero exactly when a hop wrapped the transport axis, which is
    /// when the internal-potential energy ramp needs its compensating
    /// offset.
    pub fn displacement_correction_z(&self, init: Coords, dest: Coords) -> i32 {
        displacement_correction(dest.z - init.z, self.periodic_z, self.height)
    }

    // ── Site state ──────────────────────────────────────────────

    /// The site at a linear index.
    pub fn site(&self, index: SiteIndex) -> &Site {
        &self.sites[index.0]
    }

    /// Mutable access to the site at a linear index.
    pub fn site_mut(&mut self, index: SiteIndex) -> &mut Site {
        &mut self.sites[index.0]
    }

    /// Phase of the site at `coords`.
    pub fn site_type(&self, coords: Coords) -> Result<SiteType, LatticeError> {
        Ok(self.site(self.site_index(coords)?).site_type)
    }

    /// Energetic offset of the site at `coords`, in eV.
    pub fn energy(&self, coords: Coords) -> Result<f64, LatticeError> {
        Ok(self.site(self.site_index(coords)?).energy)
    }

    /// Whether the site at `coords` is occupied.
    pub fn is_occupied(&self, coords: Coords) -> Result<bool, LatticeError> {
        Ok(self.site(self.site_index(coords)?).is_occupied())
    }

    /// The object occupying the site at `coords`, if any.
    pub fn occupant(&self, coords: Coords) -> Result<Option<ObjectId>, LatticeError> {
        Ok(self.site(self.site_index(coords)?).occupant)
    }

    /// Place an object on the site at `coords`.
    ///
    /// Fails if the site is already occupied; occupancy is exclusive.
    pub fn set_occupant(&mut self, coords: Coords, id: ObjectId) -> Result<(), LatticeError> {
        let index = self.site_index(coords)?;
        let site = self.site_mut(index);
        if site.is_occupied() {
            return Err(LatticeError::DestinationOccupied { coords });
        }
        site.occupant = Some(id);
        Ok(())
    }

    /// Clear the occupant of the site at `coords`.
    pub fn clear_occupant(&mut self, coords: Coords) -> Result<(), LatticeError> {
        let index = self.site_index(coords)?;
        self.site_mut(index).occupant = None;
        Ok(())
    }

    /// Replace all site types at once. Used by morphology providers after
    /// a complete, validated parse; `types` is in canonical site order.
    pub(crate) fn assign_types(&mut self, types: &[SiteType]) {
        debug_assert_eq!(types.len(), self.sites.len());
        for (site, t) in self.sites.iter_mut().zip(types) {
            site.site_type = *t;
        }
    }

    /// Iterate over all sites in canonical order.
    pub fn sites(&self) -> impl Iterator<Item = &Site> {
        self.sites.iter()
    }

    /// Number of sites of each phase `(donor, acceptor)`.
    pub fn phase_counts(&self) -> (usize, usize) {
        let donor = self
            .sites
            .iter()
            .filter(|s| s.site_type == SiteType::Donor)
            .count();
        let acceptor = self
            .sites
            .iter()
            .filter(|s| s.site_type == SiteType::Acceptor)
            .count();
        (donor, acceptor)
    }

    /// A uniformly random coordinate on the lattice.
    pub fn random_coords<R: Rng + ?Sized>(&self, rng: &mut R) -> Coords {
        Coords::new(
            rng.random_range(0..self.length),
            rng.random_range(0..self.width),
            rng.random_range(0..self.height),
        )
    }
}

/// Wrap correction applied when computing a destination: `extent` when the
/// raw sum underflows the axis, `-extent` when it overflows, else zero.
fn wrap(pos: i32, delta: i32, extent: i32) -> i32 {
    let raw = pos + delta;
    if raw < 0 {
        extent
    } else if raw >= extent {
        -extent
    } else {
        0
    }
}

/// Minimum-image component of a raw coordinate difference.
fn min_image(raw: i32, periodic: bool, extent: i32) -> i32 {
    let abs = raw.abs();
    if periodic && 2 * abs > extent {
        abs - extent
    } else {
        abs
    }
}

/// `-extent`, `0`, or `+extent` so that `raw + correction` is the true
/// displacement of a single move whose image landed at `raw`.
fn displacement_correction(raw: i32, periodic: bool, extent: i32) -> i32 {
    if !periodic {
        0
    } else if 2 * raw > extent {
        -extent
    } else if 2 * raw < -extent {
        extent
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn small_lattice() -> Lattice {
        Lattice::new(4, 5, 6, 1.0, true, true, true)
    }

    #[test]
    fn site_index_is_canonical_order() {
        let lat = small_lattice();
        // z-fastest: (0,0,0), (0,0,1), ... (0,1,0) after height steps.
        assert_eq!(lat.site_index(Coords::new(0, 0, 0)).unwrap(), SiteIndex(0));
        assert_eq!(lat.site_index(Coords::new(0, 0, 1)).unwrap(), SiteIndex(1));
        assert_eq!(lat.site_index(Coords::new(0, 1, 0)).unwrap(), SiteIndex(6));
        assert_eq!(
            lat.site_index(Coords::new(1, 0, 0)).unwrap(),
            SiteIndex(5 * 6)
        );
    }

    #[test]
    fn site_index_rejects_out_of_bounds() {
        let lat = small_lattice();
        let coords = Coords::new(4, 0, 0);
        assert_eq!(
            lat.site_index(coords),
            Err(LatticeError::InvalidCoordinates { coords })
        );
        assert!(lat.site_index(Coords::new(0, -1, 0)).is_err());
    }

    #[test]
    fn null_move_is_invalid() {
        let lat = small_lattice();
        assert!(!lat.move_is_valid(Coords::new(1, 1, 1), 0, 0, 0));
    }

    #[test]
    fn bounded_axis_rejects_escape() {
        let lat = Lattice::new(4, 5, 6, 1.0, true, true, false);
        assert!(!lat.move_is_valid(Coords::new(0, 0, 5), 0, 0, 1));
        assert!(!lat.move_is_valid(Coords::new(0, 0, 0), 0, 0, -1));
        assert!(lat.move_is_valid(Coords::new(0, 0, 5), 0, 0, -1));
    }

    #[test]
    fn periodic_axis_wraps_destination() {
        let lat = small_lattice();
        let dest = lat.destination_coords(Coords::new(3, 4, 5), 1, 1, 1);
        assert_eq!(dest, Coords::new(0, 0, 0));
        let dest = lat.destination_coords(Coords::new(0, 0, 0), -1, -1, -1);
        assert_eq!(dest, Coords::new(3, 4, 5));
    }

    #[test]
    fn minimum_image_distance_wraps() {
        let lat = small_lattice();
        // Across the x boundary: 3 -> 0 is 1 step, not 3.
        assert_eq!(
            lat.distance_squared(Coords::new(3, 0, 0), Coords::new(0, 0, 0)),
            1
        );
        let bounded = Lattice::new(4, 5, 6, 1.0, false, true, true);
        assert_eq!(
            bounded.distance_squared(Coords::new(3, 0, 0), Coords::new(0, 0, 0)),
            9
        );
    }

    #[test]
    fn displacement_correction_detects_wrap() {
        let lat = small_lattice();
        let init = Coords::new(0, 0, 5);
        let dest = lat.destination_coords(init, 0, 0, 1);
        assert_eq!(dest.z, 0);
        // raw dz = -5; correction +6 recovers the true +1 step.
        assert_eq!(lat.displacement_correction_z(init, dest), 6);
        let back = lat.destination_coords(dest, 0, 0, -1);
        assert_eq!(lat.displacement_correction_z(dest, back), -6);
        assert_eq!(lat.displacement_correction_z(init, init), 0);
    }

    #[test]
    fn occupancy_is_exclusive() {
        let mut lat = small_lattice();
        let c = Coords::new(1, 2, 3);
        lat.set_occupant(c, ObjectId(7)).unwrap();
        assert!(lat.is_occupied(c).unwrap());
        assert_eq!(
            lat.set_occupant(c, ObjectId(8)),
            Err(LatticeError::DestinationOccupied { coords: c })
        );
        lat.clear_occupant(c).unwrap();
        assert!(!lat.is_occupied(c).unwrap());
        assert_eq!(lat.occupant(c).unwrap(), None);
    }

    #[test]
    fn volume_matches_site_count() {
        let lat = small_lattice();
        let expected = 120.0 * (1e-7f64).powi(3);
        assert!((lat.volume_cm3() - expected).abs() < 1e-30);
    }

    proptest! {
        #[test]
        fn site_coords_inverts_site_index(
            x in 0i32..4, y in 0i32..5, z in 0i32..6,
        ) {
            let lat = small_lattice();
            let coords = Coords::new(x, y, z);
            let index = lat.site_index(coords).unwrap();
            prop_assert_eq!(lat.site_coords(index), coords);
        }

        #[test]
        fn distance_squared_is_symmetric(
            x1 in 0i32..4, y1 in 0i32..5, z1 in 0i32..6,
            x2 in 0i32..4, y2 in 0i32..5, z2 in 0i32..6,
        ) {
            let lat = small_lattice();
            let a = Coords::new(x1, y1, z1);
            let b = Coords::new(x2, y2, z2);
            prop_assert_eq!(lat.distance_squared(a, b), lat.distance_squared(b, a));
        }

        #[test]
        fn destinations_stay_in_bounds(
            x in 0i32..4, y in 0i32..5, z in 0i32..6,
            dx in -3i32..=3, dy in -3i32..=3, dz in -3i32..=3,
        ) {
            let lat = small_lattice();
            let coords = Coords::new(x, y, z);
            if lat.move_is_valid(coords, dx, dy, dz) {
                let dest = lat.destination_coords(coords, dx, dy, dz);
                prop_assert!(lat.contains(dest));
            }
        }
    }
}
