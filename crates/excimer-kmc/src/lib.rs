//! The Excimer kinetic Monte Carlo engine.
//!
//! Simulates exciton and polaron dynamics in an organic semiconductor film
//! on the lattice provided by `excimer-lattice`. The engine is event
//! driven: every live object carries one pending event selected by the
//! first-reaction method from its candidate mechanisms (hops,
//! recombination, dissociation, annihilation, spin crossing, extraction),
//! and the scheduling loop repeatedly executes the globally earliest event,
//! advances the clock to its execution time, and recomputes candidates for
//! exactly the objects the event could have affected.
//!
//! [`Simulation`] is the entry point; construct it from a validated
//! [`Parameters`](excimer_core::Parameters) and drive it with
//! [`Simulation::execute_next_event`] until
//! [`Simulation::check_finished`] reports completion.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod coulomb;
pub mod counters;
pub mod event;
pub mod latch;
pub mod object;
pub mod rates;
pub mod sampling;
pub mod sim;

pub use coulomb::CoulombTable;
pub use counters::Counters;
pub use event::{Event, EventKind};
pub use latch::ErrorLatch;
pub use object::{Object, ObjectKind, Species};
pub use sim::{BuildError, Simulation};
