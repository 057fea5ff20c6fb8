//! Pairing of energy-optimized and position-optimized cluster collections.
//!
//! Each position cluster picks the unconsumed energy cluster closest in
//! energy among those inside the relative-energy, eta and phi tolerance
//! windows. A tolerance set to zero or below disables that window. Matched
//! pairs produce one merged cluster; unmatched clusters on either side are
//! dropped with a log line.

use serde::{Serialize, Deserialize};

use calreco_core::{Cluster, ClusterAssociation};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClusterMatcherConfig {
    /// Maximum |E_pos - E_energy| / E_energy; disabled when <= 0
    pub energy_rel_tolerance: f64,
    /// Maximum |eta difference|; disabled when <= 0
    pub eta_tolerance: f64,
    /// Maximum azimuthal separation in rad; disabled when <= 0
    pub phi_tolerance: f64,
}

impl Default for ClusterMatcherConfig {
    fn default() -> Self {
        Self {
            energy_rel_tolerance: 0.5,
            eta_tolerance: 0.2,
            phi_tolerance: 0.05,
        }
    }
}

/// Best-energy-match pairing between two cluster collections
#[derive(Clone, Debug)]
pub struct ClusterMatcher {
    config: ClusterMatcherConfig,
}

impl ClusterMatcher {
    pub fn new(config: ClusterMatcherConfig) -> Self {
        Self { config }
    }

    /// Merge position clusters with their best energy-cluster match.
    ///
    /// A merged cluster takes energy from the energy cluster and
    /// time/position from the position cluster; `constituents` holds the
    /// position-cluster index followed by the energy-cluster index.
    pub fn process(
        &self,
        energy_clusters: &[Cluster],
        energy_assocs: &[ClusterAssociation],
        position_clusters: &[Cluster],
        position_assocs: &[ClusterAssociation],
    ) -> (Vec<Cluster>, Vec<ClusterAssociation>) {
        let cfg = &self.config;
        let mut merged = Vec::new();
        let mut assocs = Vec::new();
        if energy_clusters.is_empty() && position_clusters.is_empty() {
            return (merged, assocs);
        }

        let mut consumed = vec![false; energy_clusters.len()];

        for (ip, pc) in position_clusters.iter().enumerate() {
            let mut best_match: Option<usize> = None;
            let mut best_delta = f64::MAX;
            for (ie, ec) in energy_clusters.iter().enumerate() {
                if consumed[ie] {
                    continue;
                }

                let de_rel = ((pc.energy - ec.energy) / ec.energy).abs();
                let deta = (pc.eta() - ec.eta()).abs();
                // compare sin(dphi/2) so phi rollovers are handled
                let dsphi = (0.5 * (pc.phi() - ec.phi())).sin().abs();
                if (cfg.energy_rel_tolerance > 0.0 && de_rel > cfg.energy_rel_tolerance)
                    || (cfg.eta_tolerance > 0.0 && deta > cfg.eta_tolerance)
                    || (cfg.phi_tolerance > 0.0 && dsphi > (0.5 * cfg.phi_tolerance).sin())
                {
                    continue;
                }

                // several matches within tolerance: keep the closest energy
                let delta = (pc.energy - ec.energy).abs();
                if delta < best_delta {
                    best_delta = delta;
                    best_match = Some(ie);
                }
            }

            let Some(ie) = best_match else {
                tracing::debug!(position_cluster = ip, "unmatched position cluster");
                continue;
            };
            let ec = &energy_clusters[ie];
            consumed[ie] = true;

            let rec_id = merged.len();
            merged.push(Cluster {
                energy: ec.energy,
                energy_error: ec.energy_error,
                time: pc.time,
                nhits: pc.nhits + ec.nhits,
                position: pc.position,
                position_error: pc.position_error,
                constituents: vec![ip, ie],
            });
            tracing::debug!(
                position_cluster = ip,
                energy_cluster = ie,
                energy = ec.energy,
                "merged cluster pair"
            );

            let ea = energy_assocs.iter().find(|a| a.rec_id == ie);
            let pa = position_assocs.iter().find(|a| a.rec_id == ip);
            match (ea, pa) {
                (Some(ea), Some(pa)) if ea.sim_id == pa.sim_id => {
                    assocs.push(ClusterAssociation { rec_id, sim_id: ea.sim_id, weight: 1.0 });
                }
                (Some(ea), Some(pa)) => {
                    // both sides claim a different truth particle
                    tracing::debug!(
                        energy_sim = ea.sim_id,
                        position_sim = pa.sim_id,
                        "associations disagree, splitting weight"
                    );
                    assocs.push(ClusterAssociation { rec_id, sim_id: ea.sim_id, weight: 0.5 });
                    assocs.push(ClusterAssociation { rec_id, sim_id: pa.sim_id, weight: 0.5 });
                }
                (Some(ea), None) => {
                    assocs.push(ClusterAssociation { rec_id, sim_id: ea.sim_id, weight: 1.0 });
                }
                (None, Some(pa)) => {
                    assocs.push(ClusterAssociation { rec_id, sim_id: pa.sim_id, weight: 1.0 });
                }
                (None, None) => {}
            }
        }

        let leftovers = consumed.iter().filter(|&&c| !c).count();
        if leftovers > 0 {
            tracing::debug!(leftovers, "energy clusters never matched");
        }
        (merged, assocs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calreco_core::Point3;

    fn cluster(energy: f64, eta: f64, phi: f64) -> Cluster {
        // place the cluster on a cylinder of radius 1 m
        let rho = 1000.0;
        let z = rho * eta.sinh();
        Cluster {
            energy,
            energy_error: 0.05 * energy,
            time: 1.0,
            nhits: 10,
            position: Point3::new(rho * phi.cos(), rho * phi.sin(), z),
            ..Default::default()
        }
    }

    fn assoc(rec_id: usize, sim_id: usize) -> ClusterAssociation {
        ClusterAssociation { rec_id, sim_id, weight: 1.0 }
    }

    #[test]
    fn test_single_compatible_pair_round_trip() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let ec = vec![cluster(10.0, 0.5, 1.0)];
        let pc = vec![cluster(10.5, 0.51, 1.01)];
        let (merged, assocs) = matcher.process(&ec, &[], &pc, &[]);
        assert_eq!(merged.len(), 1);
        assert!(assocs.is_empty());
        let m = &merged[0];
        assert!((m.energy - 10.0).abs() < 1e-12, "energy from the energy cluster");
        assert!((m.position.x - pc[0].position.x).abs() < 1e-12);
        assert_eq!(m.nhits, 20);
        assert_eq!(m.constituents, vec![0, 0]);
    }

    #[test]
    fn test_best_energy_match_wins() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let ec = vec![cluster(8.0, 0.5, 1.0), cluster(10.2, 0.5, 1.0)];
        let pc = vec![cluster(10.0, 0.5, 1.0)];
        let (merged, _) = matcher.process(&ec, &[], &pc, &[]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].constituents, vec![0, 1]);
    }

    #[test]
    fn test_consumed_energy_cluster_not_reused() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let ec = vec![cluster(10.0, 0.5, 1.0)];
        let pc = vec![cluster(10.0, 0.5, 1.0), cluster(10.0, 0.5, 1.0)];
        let (merged, _) = matcher.process(&ec, &[], &pc, &[]);
        // second position cluster finds nothing left and is dropped
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_phi_wraparound_match() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let pi = std::f64::consts::PI;
        let ec = vec![cluster(10.0, 0.0, pi - 0.01)];
        let pc = vec![cluster(10.0, 0.0, -pi + 0.01)];
        let (merged, _) = matcher.process(&ec, &[], &pc, &[]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_zero_tolerance_disables_check() {
        // energies differ by 50%, eta/phi identical
        let ec = vec![cluster(10.0, 0.5, 1.0)];
        let pc = vec![cluster(15.0, 0.5, 1.0)];

        let strict = ClusterMatcher::new(ClusterMatcherConfig {
            energy_rel_tolerance: 0.2,
            ..Default::default()
        });
        let (merged, _) = strict.process(&ec, &[], &pc, &[]);
        assert!(merged.is_empty());

        let disabled = ClusterMatcher::new(ClusterMatcherConfig {
            energy_rel_tolerance: 0.0,
            ..Default::default()
        });
        let (merged, _) = disabled.process(&ec, &[], &pc, &[]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_agreeing_associations_merge_to_one() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let ec = vec![cluster(10.0, 0.5, 1.0)];
        let pc = vec![cluster(10.0, 0.5, 1.0)];
        let (_, assocs) = matcher.process(&ec, &[assoc(0, 7)], &pc, &[assoc(0, 7)]);
        assert_eq!(assocs.len(), 1);
        assert_eq!(assocs[0].sim_id, 7);
        assert!((assocs[0].weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disagreeing_associations_split_weight() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let ec = vec![cluster(10.0, 0.5, 1.0)];
        let pc = vec![cluster(10.0, 0.5, 1.0)];
        let (_, assocs) = matcher.process(&ec, &[assoc(0, 7)], &pc, &[assoc(0, 9)]);
        assert_eq!(assocs.len(), 2);
        assert_eq!(assocs[0].sim_id, 7);
        assert_eq!(assocs[1].sim_id, 9);
        for a in &assocs {
            assert!((a.weight - 0.5).abs() < 1e-12);
            assert_eq!(a.rec_id, 0);
        }
    }

    #[test]
    fn test_single_sided_association_keeps_full_weight() {
        let matcher = ClusterMatcher::new(ClusterMatcherConfig::default());
        let ec = vec![cluster(10.0, 0.5, 1.0)];
        let pc = vec![cluster(10.0, 0.5, 1.0)];
        let (_, assocs) = matcher.process(&ec, &[], &pc, &[assoc(0, 9)]);
        assert_eq!(assocs.len(), 1);
        assert_eq!(assocs[0].sim_id, 9);
        assert!((assocs[0].weight - 1.0).abs() < 1e-12);
    }
}
