//! Excimer: kinetic Monte Carlo simulations of excitons and polarons in
//! organic semiconductor films.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the Excimer sub-crates. For most users, adding `excimer` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use excimer::prelude::*;
//!
//! // A small neat film; measure ten exciton diffusion lengths.
//! let params = Parameters {
//!     length: 10,
//!     width: 10,
//!     height: 10,
//!     coulomb_cutoff: 5.0,
//!     n_tests: 10,
//!     seed: 7,
//!     ..Parameters::default()
//! };
//! let mut sim = Simulation::new(params)?;
//! sim.run()?;
//! assert_eq!(sim.counters().excitons_recombined(), 10);
//! assert!(sim.average_diffusion_length() > 0.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the
//! prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `excimer-core` | Coordinates, IDs, parameters, errors |
//! | [`lattice`] | `excimer-lattice` | The site lattice, morphology, disorder |
//! | [`kmc`] | `excimer-kmc` | The simulation engine and measurement data |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, parameters, and errors (`excimer-core`).
///
/// Contains [`types::Coords`], [`types::Parameters`] with its model-selection
/// enums, the identifier newtypes, and the error taxonomy.
pub use excimer_core as types;

/// The site lattice and its providers (`excimer-lattice`).
///
/// The [`lattice::Lattice`] itself, plus the morphology and site-energy
/// assignment modules with their Ising_OPV import support.
pub use excimer_lattice as lattice;

/// The kinetic Monte Carlo engine (`excimer-kmc`).
///
/// [`kmc::Simulation`] is the entry point; the module also exposes the
/// rate laws, the Coulomb table, and the per-mode measurement collectors.
pub use excimer_kmc as kmc;

/// Common imports for typical Excimer usage.
///
/// ```rust
/// use excimer::prelude::*;
/// ```
pub mod prelude {
    pub use excimer_core::{
        Coords, DisorderModel, HoppingModel, MorphologyModel, ObjectId, Parameters, RunMode,
        SimError, ToFPlacement,
    };
    pub use excimer_kmc::{BuildError, Counters, Simulation, Species};
    pub use excimer_lattice::{Lattice, SiteType};
}

pub use prelude::{Parameters, Simulation};
