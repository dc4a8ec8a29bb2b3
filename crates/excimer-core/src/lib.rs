//! Core types and parameters for the Excimer kinetic Monte Carlo engine.
//!
//! This crate is the leaf dependency of the workspace: strongly-typed
//! identifiers, the 3-D [`Coords`] type, physical constants, the validated
//! [`Parameters`] configuration structure, and the error taxonomy shared
//! by the lattice and engine crates.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod constants;
pub mod coords;
pub mod error;
pub mod id;
pub mod params;

pub use constants::{COULOMB_CONSTANT, ELEMENTARY_CHARGE, K_B, VACUUM_PERMITTIVITY};
pub use coords::Coords;
pub use error::{ImportError, LatticeError, ParametersError, SimError};
pub use id::{ObjectId, SiteIndex};
pub use params::{
    DisorderModel, HoppingModel, MorphologyModel, Parameters, RunMode, ToFPlacement,
};
