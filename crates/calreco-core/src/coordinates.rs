use serde::{Serialize, Deserialize};
use std::f64::consts::{PI, TAU};
use std::ops::{Add, Mul, Sub};

/// 3D point/vector in the detector global frame (f64 for computation)
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64, // mm
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Transverse (x-y plane) distance from the beam axis
    pub fn rho(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Azimuthal angle in (-π, π]
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Pseudorapidity η = atanh(z / |r|)
    pub fn eta(&self) -> f64 {
        let r = self.magnitude();
        if r > 0.0 { (self.z / r).atanh() } else { 0.0 }
    }
}

impl Add for Point3 {
    type Output = Point3;
    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;
    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point3 {
    type Output = Point3;
    fn mul(self, s: f64) -> Point3 {
        Point3::new(self.x * s, self.y * s, self.z * s)
    }
}

/// Wrap an angle to (-π, π]
pub fn phi_mpi_pi(phi: f64) -> f64 {
    let r = phi.rem_euclid(TAU);
    if r > PI { r - TAU } else { r }
}
