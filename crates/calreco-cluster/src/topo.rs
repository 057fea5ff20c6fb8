//! Topological clustering for imaging calorimeters.
//!
//! Hits live on discrete layers; adjacency distinguishes hits on the same
//! layer from hits on nearby layers, with separate distance modes and
//! thresholds for each case. Groups grow breadth-first from seeds passing
//! the center-energy threshold, then get filtered on size and total energy
//! before becoming weight-1 proto-clusters.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};

use calreco_core::units;
use calreco_core::{phi_mpi_pi, CalorimeterHit, ProtoCluster, RecoError, Result};

/// Distance mode applied between a layered hit pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerMode {
    /// Sector-local x/y offsets, mm
    #[serde(rename = "localXY")]
    LocalXY,
    /// Global x/y offsets, mm
    #[serde(rename = "globalXY")]
    GlobalXY,
    /// Pseudorapidity and wrapped azimuth offsets
    #[serde(rename = "etaPhi")]
    GlobalEtaPhi,
    /// Transverse radius and wrapped azimuth offsets
    #[serde(rename = "rPhi")]
    GlobalRPhi,
}

impl LayerMode {
    fn separation(&self, a: &CalorimeterHit, b: &CalorimeterHit) -> [f64; 2] {
        match self {
            LayerMode::LocalXY => {
                [(a.local.x - b.local.x).abs(), (a.local.y - b.local.y).abs()]
            }
            LayerMode::GlobalXY => [
                (a.position.x - b.position.x).abs(),
                (a.position.y - b.position.y).abs(),
            ],
            LayerMode::GlobalEtaPhi => [
                (a.position.eta() - b.position.eta()).abs(),
                phi_mpi_pi(a.position.phi() - b.position.phi()).abs(),
            ],
            LayerMode::GlobalRPhi => [
                (a.position.rho() - b.position.rho()).abs(),
                phi_mpi_pi(a.position.phi() - b.position.phi()).abs(),
            ],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopoClusterConfig {
    pub same_layer_mode: LayerMode,
    pub diff_layer_mode: LayerMode,
    /// Per-axis thresholds for hits on the same layer
    pub same_layer_dist: [f64; 2],
    /// Per-axis thresholds for hits on nearby layers
    pub diff_layer_dist: [f64; 2],
    /// Maximum layer-index separation still treated as neighbouring
    pub neighbour_layers_range: i32,
    /// Cross-sector threshold on the 3D global distance, mm
    pub sector_dist: f64,
    pub min_cluster_hit_edep: f64,
    pub min_cluster_center_edep: f64,
    /// Minimum summed group energy to emit a cluster
    pub min_cluster_edep: f64,
    /// Minimum group size to emit a cluster
    pub min_cluster_nhits: usize,
}

impl Default for TopoClusterConfig {
    fn default() -> Self {
        Self {
            same_layer_mode: LayerMode::LocalXY,
            diff_layer_mode: LayerMode::GlobalEtaPhi,
            same_layer_dist: [1.8 * units::MM, 1.8 * units::MM],
            diff_layer_dist: [0.01, 0.01 * units::RAD],
            neighbour_layers_range: 1,
            sector_dist: 1.0 * units::CM,
            min_cluster_hit_edep: 0.0,
            min_cluster_center_edep: 0.0,
            min_cluster_edep: 0.5 * units::MEV,
            min_cluster_nhits: 10,
        }
    }
}

/// Topological clustering over one layered hit collection
#[derive(Clone, Debug)]
pub struct TopoCluster {
    config: TopoClusterConfig,
}

impl TopoCluster {
    pub fn new(config: TopoClusterConfig) -> Result<Self> {
        if config.min_cluster_center_edep < config.min_cluster_hit_edep {
            return Err(RecoError::config(
                "minClusterCenterEdep must not be below minClusterHitEdep",
            ));
        }
        tracing::info!(
            same_layer = ?config.same_layer_mode,
            diff_layer = ?config.diff_layer_mode,
            layers_range = config.neighbour_layers_range,
            "topological clustering configured"
        );
        Ok(Self { config })
    }

    pub fn process(&self, hits: &[CalorimeterHit]) -> Vec<ProtoCluster> {
        let cfg = &self.config;

        // Remaining-hit bookkeeping is keyed on (layer, cell ID); equivalent
        // hits collapse here, which is an upstream data fault.
        let mut remaining: BTreeSet<(i32, u64)> = BTreeSet::new();
        let mut index_of = std::collections::BTreeMap::new();
        let mut candidates = 0usize;
        for (i, hit) in hits.iter().enumerate() {
            if hit.energy < cfg.min_cluster_hit_edep {
                continue;
            }
            candidates += 1;
            let key = (hit.layer, hit.cell_id);
            if !remaining.insert(key) {
                tracing::error!(
                    index = i,
                    cell_id = hit.cell_id,
                    layer = hit.layer,
                    "equivalent hit dropped from clustering input"
                );
                continue;
            }
            index_of.insert(key, i);
        }
        if remaining.len() != candidates {
            tracing::error!(
                hits = candidates,
                unique = remaining.len(),
                "equivalent hits were dropped"
            );
        }

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let seed_order: Vec<(i32, u64)> = remaining.iter().copied().collect();
        for seed_key in seed_order {
            if !remaining.contains(&seed_key) {
                continue;
            }
            let seed = index_of[&seed_key];
            // not energetic enough for a cluster center, but may still be
            // collected into another seed's group
            if hits[seed].energy < cfg.min_cluster_center_edep {
                continue;
            }
            remaining.remove(&seed_key);
            let mut group = vec![seed];
            self.bfs_group(hits, &mut remaining, &index_of, &mut group);
            groups.push(group);
        }
        tracing::debug!(groups = groups.len(), "potential clusters found");

        let mut proto_clusters = Vec::new();
        for group in &groups {
            if group.len() < cfg.min_cluster_nhits {
                continue;
            }
            let energy: f64 = group.iter().map(|&i| hits[i].energy).sum();
            if energy < cfg.min_cluster_edep {
                continue;
            }
            let mut pc = ProtoCluster::with_capacity(group.len());
            for &i in group {
                pc.push(i, 1.0);
            }
            proto_clusters.push(pc);
        }
        proto_clusters
    }

    fn bfs_group(
        &self,
        hits: &[CalorimeterHit],
        remaining: &mut BTreeSet<(i32, u64)>,
        index_of: &std::collections::BTreeMap<(i32, u64), usize>,
        group: &mut Vec<usize>,
    ) {
        let mut cursor = 0;
        while cursor < group.len() {
            let current = group[cursor];
            cursor += 1;
            let adjacent: Vec<(i32, u64)> = remaining
                .iter()
                .copied()
                .filter(|key| self.is_neighbour(&hits[current], &hits[index_of[key]]))
                .collect();
            for key in adjacent {
                remaining.remove(&key);
                group.push(index_of[&key]);
            }
        }
    }

    fn is_neighbour(&self, a: &CalorimeterHit, b: &CalorimeterHit) -> bool {
        let cfg = &self.config;
        if a.sector != b.sector {
            return (a.position - b.position).magnitude() <= cfg.sector_dist;
        }
        let ldiff = (a.layer - b.layer).abs();
        let (mode, dist) = if ldiff == 0 {
            (cfg.same_layer_mode, cfg.same_layer_dist)
        } else if ldiff <= cfg.neighbour_layers_range {
            (cfg.diff_layer_mode, cfg.diff_layer_dist)
        } else {
            return false;
        };
        let [u, v] = mode.separation(a, b);
        u <= dist[0] && v <= dist[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calreco_core::Point3;

    fn config() -> TopoClusterConfig {
        TopoClusterConfig {
            same_layer_dist: [1.0, 1.0],
            diff_layer_mode: LayerMode::GlobalXY,
            diff_layer_dist: [1.0, 1.0],
            min_cluster_edep: 0.0,
            min_cluster_nhits: 1,
            ..Default::default()
        }
    }

    fn hit(id: u64, x: f64, y: f64, layer: i32, energy: f64) -> CalorimeterHit {
        CalorimeterHit {
            cell_id: id,
            energy,
            layer,
            local: Point3::new(x, y, 0.0),
            position: Point3::new(x, y, 10.0 * layer as f64),
            ..Default::default()
        }
    }

    #[test]
    fn test_same_layer_grouping() {
        let algo = TopoCluster::new(config()).unwrap();
        let hits = vec![
            hit(1, 0.0, 0.0, 0, 0.1),
            hit(2, 0.9, 0.0, 0, 0.1),
            hit(3, 5.0, 0.0, 0, 0.1),
        ];
        let pcs = algo.process(&hits);
        assert_eq!(pcs.len(), 2);
        let mut sizes: Vec<usize> = pcs.iter().map(|p| p.hits.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 2]);
    }

    #[test]
    fn test_layer_bridge() {
        // hits on adjacent layers connect through the cross-layer mode even
        // when their same-layer separation would be too large
        let algo = TopoCluster::new(config()).unwrap();
        let hits = vec![
            hit(1, 0.0, 0.0, 0, 0.1),
            hit(2, 0.5, 0.0, 1, 0.1),
            hit(3, 1.0, 0.0, 2, 0.1),
        ];
        let pcs = algo.process(&hits);
        assert_eq!(pcs.len(), 1);
        assert_eq!(pcs[0].hits.len(), 3);
    }

    #[test]
    fn test_layers_out_of_range_do_not_connect() {
        let algo = TopoCluster::new(config()).unwrap();
        let hits = vec![hit(1, 0.0, 0.0, 0, 0.1), hit(2, 0.0, 0.0, 3, 0.1)];
        let pcs = algo.process(&hits);
        assert_eq!(pcs.len(), 2);
    }

    #[test]
    fn test_seed_needs_center_energy() {
        let cfg = TopoClusterConfig {
            min_cluster_hit_edep: 0.01,
            min_cluster_center_edep: 0.05,
            ..config()
        };
        let algo = TopoCluster::new(cfg).unwrap();
        // only the first hit can seed; the second joins as a member
        let hits = vec![hit(1, 0.0, 0.0, 0, 0.1), hit(2, 0.9, 0.0, 0, 0.02)];
        let pcs = algo.process(&hits);
        assert_eq!(pcs.len(), 1);
        assert_eq!(pcs[0].hits.len(), 2);

        // no hit passes the center threshold: nothing is emitted
        let hits = vec![hit(1, 0.0, 0.0, 0, 0.02), hit(2, 0.9, 0.0, 0, 0.02)];
        assert!(algo.process(&hits).is_empty());
    }

    #[test]
    fn test_group_filters() {
        let cfg = TopoClusterConfig { min_cluster_nhits: 2, ..config() };
        let algo = TopoCluster::new(cfg).unwrap();
        let hits = vec![
            hit(1, 0.0, 0.0, 0, 0.1),
            hit(2, 0.9, 0.0, 0, 0.1),
            hit(3, 5.0, 0.0, 0, 0.1),
        ];
        let pcs = algo.process(&hits);
        // the singleton group is filtered away
        assert_eq!(pcs.len(), 1);
        assert_eq!(pcs[0].hits.len(), 2);

        let cfg = TopoClusterConfig { min_cluster_edep: 0.5, ..config() };
        let algo = TopoCluster::new(cfg).unwrap();
        assert!(algo.process(&hits).is_empty());
    }

    #[test]
    fn test_equivalent_hits_collapse() {
        let algo = TopoCluster::new(config()).unwrap();
        let hits = vec![hit(1, 0.0, 0.0, 0, 0.1), hit(1, 0.0, 0.0, 0, 0.1)];
        let pcs = algo.process(&hits);
        assert_eq!(pcs.len(), 1);
        assert_eq!(pcs[0].hits.len(), 1);
    }

    #[test]
    fn test_inverted_thresholds_fail_init() {
        let cfg = TopoClusterConfig {
            min_cluster_hit_edep: 0.1,
            min_cluster_center_edep: 0.05,
            ..Default::default()
        };
        assert!(TopoCluster::new(cfg).is_err());
    }

    #[test]
    fn test_layer_mode_names() {
        let m: LayerMode = serde_json::from_str("\"etaPhi\"").unwrap();
        assert_eq!(m, LayerMode::GlobalEtaPhi);
        assert!(serde_json::from_str::<LayerMode>("\"spiral\"").is_err());
    }
}
