//! The 3-D simulation lattice for the Excimer KMC engine.
//!
//! This crate owns the spatial state of a simulation: a dense array of
//! [`Site`]s addressed by [`Coords`](excimer_core::Coords), with per-axis
//! periodic boundaries, minimum-image distance queries, and occupancy
//! tracking. On top of the bare lattice it provides the film architecture
//! layer: procedural and imported donor/acceptor morphologies
//! ([`morphology`]) and energetic disorder assignment ([`energies`]).
//!
//! All imports are all-or-nothing: a failing parse leaves the lattice
//! untouched.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod energies;
pub mod lattice;
pub mod morphology;
pub mod site;

pub use lattice::Lattice;
pub use site::{Site, SiteType};
