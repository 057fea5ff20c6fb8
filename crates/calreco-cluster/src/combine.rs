//! Combination of calorimeter clusters into a single neutral candidate.
//!
//! All clusters from a hadronic calorimeter, plus optionally an
//! electromagnetic one in front of it, are summed into one candidate whose
//! direction points from the origin through the most energetic cluster. The
//! summed energy is corrected by 1/(1 + c0 + c1/sqrt(E) + c2/E) with
//! separate coefficient sets per calorimeter, a form chosen empirically
//! against single-particle simulations.

use serde::{Serialize, Deserialize};

use calreco_core::{Cluster, Point3, RecoError, Result};

/// Neutron mass in GeV
pub const NEUTRON_MASS: f64 = 0.93956542;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterCombinerConfig {
    /// Energy correction coefficients for the hadronic calorimeter sum
    pub scale_corr_coeff_hcal: Vec<f64>,
    /// Energy correction coefficients for the electromagnetic sum
    pub scale_corr_coeff_ecal: Vec<f64>,
    /// Assumed candidate mass, GeV
    pub mass: f64,
}

impl Default for ClusterCombinerConfig {
    fn default() -> Self {
        Self {
            scale_corr_coeff_hcal: vec![0.0, 0.0, 0.0],
            scale_corr_coeff_ecal: vec![0.0, 0.0, 0.0],
            mass: NEUTRON_MASS,
        }
    }
}

/// A combined neutral candidate
#[derive(Clone, Debug, Default)]
pub struct CombinedCandidate {
    pub energy: f64,
    pub momentum: Point3,
    pub mass: f64,
    /// Constituent cluster indices: hadronic first, then electromagnetic
    /// offset by the hadronic collection length
    pub clusters: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct ClusterCombiner {
    config: ClusterCombinerConfig,
}

impl ClusterCombiner {
    pub fn new(config: ClusterCombinerConfig) -> Result<Self> {
        if config.scale_corr_coeff_hcal.len() < 3 {
            return Err(RecoError::config(
                "scaleCorrCoeffHcal needs at least 3 parameters",
            ));
        }
        if config.scale_corr_coeff_ecal.len() < 3 {
            return Err(RecoError::config(
                "scaleCorrCoeffEcal needs at least 3 parameters",
            ));
        }
        Ok(Self { config })
    }

    fn correction(total: f64, coeffs: &[f64]) -> f64 {
        coeffs[0] + coeffs[1] / total.sqrt() + coeffs[2] / total
    }

    /// Combine the clusters of one event into at most one candidate.
    /// Returns `None` when there is no energy to combine.
    pub fn process(&self, hcal: &[Cluster], ecal: &[Cluster]) -> Option<CombinedCandidate> {
        let cfg = &self.config;

        let mut e_hcal = 0.0;
        let mut e_max = 0.0;
        let mut direction = Point3::default();
        for cluster in hcal {
            e_hcal += cluster.energy;
            if cluster.energy > e_max {
                e_max = cluster.energy;
                direction = cluster.position;
            }
        }
        let e_ecal: f64 = ecal.iter().map(|c| c.energy).sum();

        let total = e_hcal + e_ecal;
        if total <= 0.0 || e_max <= 0.0 {
            return None;
        }

        let e_hcal = e_hcal / (1.0 + Self::correction(total, &cfg.scale_corr_coeff_hcal));
        let e_ecal = e_ecal / (1.0 + Self::correction(total, &cfg.scale_corr_coeff_ecal));
        let energy = e_hcal + e_ecal;

        let p = (energy * energy - cfg.mass * cfg.mass).sqrt();
        let r = direction.magnitude();
        let momentum = direction * (p / r);
        tracing::debug!(energy, p, "combined neutral candidate");

        Some(CombinedCandidate {
            energy,
            momentum,
            mass: cfg.mass,
            clusters: (0..hcal.len() + ecal.len()).collect(),
        })
    }
}
