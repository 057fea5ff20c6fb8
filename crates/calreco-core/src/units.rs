//! Internal unit system: lengths in mm, energies in GeV, angles in rad,
//! times in ns. Constants exist so config defaults read like the physics.

pub const MM: f64 = 1.0;
pub const CM: f64 = 10.0 * MM;
pub const M: f64 = 1000.0 * MM;

pub const GEV: f64 = 1.0;
pub const MEV: f64 = 1e-3 * GEV;
pub const KEV: f64 = 1e-6 * GEV;

pub const RAD: f64 = 1.0;
pub const NS: f64 = 1.0;
