//! Physical constants used by the rate and Coulomb calculations.
//!
//! Energies are carried in eV throughout the engine; lengths in nm;
//! times in seconds. These constants carry SI values and are converted
//! at the point of use.

/// Boltzmann constant in eV/K.
pub const K_B: f64 = 8.617_330_35e-5;

/// Elementary charge in C.
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;

/// Coulomb force constant `1/(4*pi*eps0)` in N m^2 / C^2.
pub const COULOMB_CONSTANT: f64 = 8.987_551_787_368_176e9;

/// Vacuum permittivity in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.854_187_817e-12;
