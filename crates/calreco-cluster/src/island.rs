//! Island clustering: group adjacent hits, find local energy maxima, and
//! split multi-maximum groups into weighted proto-clusters.

use serde::{Serialize, Deserialize};

use calreco_core::units;
use calreco_core::{CalorimeterHit, CellIdSpec, ProtoCluster, RecoError, Result};

use crate::expr::AdjacencyExpr;
use crate::neighbor::{Adjacency, DistanceMetric};

/// Fraction below which a normalized split weight is zeroed
const SPLIT_WEIGHT_CUTOFF: f64 = 0.02;
/// Final weights below this never join a proto-cluster
const SPLIT_WEIGHT_EMIT: f64 = 1e-6;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IslandClusterConfig {
    /// Cross-sector adjacency threshold on the 3D global distance, mm
    pub sector_dist: f64,
    /// Per-axis thresholds for each distance metric; the first configured one
    /// wins, in declaration order, with the dimension-scaled default last
    #[serde(rename = "localDistXY")]
    pub local_dist_xy: Option<[f64; 2]>,
    #[serde(rename = "localDistXZ")]
    pub local_dist_xz: Option<[f64; 2]>,
    #[serde(rename = "localDistYZ")]
    pub local_dist_yz: Option<[f64; 2]>,
    #[serde(rename = "globalDistRPhi")]
    pub global_dist_r_phi: Option<[f64; 2]>,
    #[serde(rename = "globalDistEtaPhi")]
    pub global_dist_eta_phi: Option<[f64; 2]>,
    #[serde(rename = "dimScaledLocalDistXY")]
    pub dim_scaled_local_dist_xy: [f64; 2],
    /// Cell-ID field expression; takes precedence over the distance metrics
    pub adjacency_matrix: Option<String>,
    /// Optional looser predicate used only when scanning for local maxima
    pub peak_neighbourhood_matrix: Option<String>,
    pub split_cluster: bool,
    /// Hits below this never join a group
    pub min_cluster_hit_edep: f64,
    /// Minimum energy for a hit to seed a cluster
    pub min_cluster_center_edep: f64,
    pub transverse_energy_profile_metric: DistanceMetric,
    pub transverse_energy_profile_scale: f64,
}

impl IslandClusterConfig {
    /// Thresholds configured for a metric; the dimension-scaled pair is
    /// always set, so it acts as the fallback at the end of the priority order
    fn thresholds_for(&self, metric: DistanceMetric) -> Option<[f64; 2]> {
        match metric {
            DistanceMetric::LocalDistXY => self.local_dist_xy,
            DistanceMetric::LocalDistXZ => self.local_dist_xz,
            DistanceMetric::LocalDistYZ => self.local_dist_yz,
            DistanceMetric::GlobalDistRPhi => self.global_dist_r_phi,
            DistanceMetric::GlobalDistEtaPhi => self.global_dist_eta_phi,
            DistanceMetric::DimScaledLocalDistXY => Some(self.dim_scaled_local_dist_xy),
        }
    }
}

impl Default for IslandClusterConfig {
    fn default() -> Self {
        Self {
            sector_dist: 5.0 * units::CM,
            local_dist_xy: None,
            local_dist_xz: None,
            local_dist_yz: None,
            global_dist_r_phi: None,
            global_dist_eta_phi: None,
            dim_scaled_local_dist_xy: [1.8, 1.8],
            adjacency_matrix: None,
            peak_neighbourhood_matrix: None,
            split_cluster: true,
            min_cluster_hit_edep: 0.0,
            min_cluster_center_edep: 50.0 * units::MEV,
            transverse_energy_profile_metric: DistanceMetric::LocalDistXY,
            // exp(-d/scale) degenerates to 1, so weights follow seed energies
            transverse_energy_profile_scale: f64::INFINITY,
        }
    }
}

/// Island clustering over one calorimeter hit collection
#[derive(Clone, Debug)]
pub struct IslandCluster {
    adjacency: Adjacency,
    peak_adjacency: Option<AdjacencyExpr>,
    id_spec: CellIdSpec,
    split_cluster: bool,
    min_cluster_hit_edep: f64,
    min_cluster_center_edep: f64,
    profile_metric: DistanceMetric,
    profile_scale: f64,
}

impl IslandCluster {
    pub fn new(config: IslandClusterConfig, id_spec: &CellIdSpec) -> Result<Self> {
        let adjacency = if let Some(source) = &config.adjacency_matrix {
            let expr = AdjacencyExpr::parse(source, id_spec)?;
            tracing::info!(expression = expr.source(), "island clustering adjacency expression");
            Adjacency::Expression(expr)
        } else {
            let (metric, thresholds) = DistanceMetric::PRIORITY
                .into_iter()
                .find_map(|m| config.thresholds_for(m).map(|t| (m, t)))
                .ok_or_else(|| RecoError::config("cannot determine the clustering coordinates"))?;
            tracing::info!(?metric, ?thresholds, "island clustering distance method");
            Adjacency::Metric { metric, thresholds, sector_dist: config.sector_dist }
        };

        let peak_adjacency = config
            .peak_neighbourhood_matrix
            .as_deref()
            .map(|source| AdjacencyExpr::parse(source, id_spec))
            .transpose()?;

        if config.min_cluster_center_edep < config.min_cluster_hit_edep {
            return Err(RecoError::config(
                "minClusterCenterEdep must not be below minClusterHitEdep",
            ));
        }

        if config.split_cluster && !config.transverse_energy_profile_metric.uniform_units() {
            return Err(RecoError::config(format!(
                "transverse energy profile metric {:?} has incompatible dimension units",
                config.transverse_energy_profile_metric
            )));
        }

        Ok(Self {
            adjacency,
            peak_adjacency,
            id_spec: id_spec.clone(),
            split_cluster: config.split_cluster,
            min_cluster_hit_edep: config.min_cluster_hit_edep,
            min_cluster_center_edep: config.min_cluster_center_edep,
            profile_metric: config.transverse_energy_profile_metric,
            profile_scale: config.transverse_energy_profile_scale,
        })
    }

    pub fn process(&self, hits: &[CalorimeterHit]) -> Vec<ProtoCluster> {
        let fields = self.decode_fields(hits);
        let groups = self.group_hits(hits, &fields);

        let mut proto_clusters = Vec::new();
        for group in &groups {
            let maxima = self.find_maxima(hits, &fields, group, !self.split_cluster);
            tracing::debug!(
                hits = group.len(),
                maxima = maxima.len(),
                "island group resolved"
            );
            self.split_group(hits, group, &maxima, &mut proto_clusters);
        }
        proto_clusters
    }

    fn needs_fields(&self) -> bool {
        self.adjacency.needs_fields() || self.peak_adjacency.is_some()
    }

    fn decode_fields(&self, hits: &[CalorimeterHit]) -> Vec<Vec<i64>> {
        if !self.needs_fields() {
            return Vec::new();
        }
        hits.iter().map(|h| self.id_spec.decode_all(h.cell_id)).collect()
    }

    /// Breadth-first grouping over the adjacency predicate. Hits below the
    /// hit-energy floor are marked visited up front and never join a group.
    fn group_hits(&self, hits: &[CalorimeterHit], fields: &[Vec<i64>]) -> Vec<Vec<usize>> {
        let mut visited = vec![false; hits.len()];
        let mut groups = Vec::new();

        for (i, hit) in hits.iter().enumerate() {
            if hit.energy < self.min_cluster_hit_edep {
                visited[i] = true;
            }
        }

        for start in 0..hits.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let mut group = vec![start];
            let mut cursor = 0;
            while cursor < group.len() {
                let current = group[cursor];
                cursor += 1;
                for candidate in 0..hits.len() {
                    if visited[candidate] {
                        continue;
                    }
                    if self.adjacency.matches(hits, fields, current, candidate) {
                        visited[candidate] = true;
                        group.push(candidate);
                    }
                }
            }
            groups.push(group);
        }
        groups
    }

    /// Seeds of a group. In global mode the single highest-energy hit is the
    /// only candidate; otherwise a hit is a seed when no neighbour carries
    /// strictly more energy (equal-energy neighbours may both qualify).
    fn find_maxima(
        &self,
        hits: &[CalorimeterHit],
        fields: &[Vec<i64>],
        group: &[usize],
        global: bool,
    ) -> Vec<usize> {
        let mut maxima = Vec::new();
        if group.is_empty() {
            return maxima;
        }

        if global {
            let mut best = group[0];
            for &i in &group[1..] {
                if hits[i].energy > hits[best].energy {
                    best = i;
                }
            }
            if hits[best].energy >= self.min_cluster_center_edep {
                maxima.push(best);
            }
            return maxima;
        }

        for &i in group {
            if hits[i].energy < self.min_cluster_center_edep {
                continue;
            }
            let beaten = group.iter().any(|&j| {
                j != i
                    && hits[j].energy > hits[i].energy
                    && self.peak_matches(hits, fields, i, j)
            });
            if !beaten {
                maxima.push(i);
            }
        }
        maxima
    }

    fn peak_matches(
        &self,
        hits: &[CalorimeterHit],
        fields: &[Vec<i64>],
        i: usize,
        j: usize,
    ) -> bool {
        match &self.peak_adjacency {
            Some(expr) => expr.matches(&fields[i], &fields[j]),
            None => self.adjacency.matches(hits, fields, i, j),
        }
    }

    /// Distribute a group's hits over its maxima.
    ///
    /// Weights follow exp(-d/scale) * E_seed, normalized per hit, with
    /// sub-2% contributions zeroed and the rest renormalized. Hits left with
    /// no contribution above the emission floor are dropped and counted.
    fn split_group(
        &self,
        hits: &[CalorimeterHit],
        group: &[usize],
        maxima: &[usize],
        out: &mut Vec<ProtoCluster>,
    ) {
        match maxima.len() {
            0 => {
                tracing::debug!("no seed above threshold, dropping group");
            }
            1 => {
                let mut pc = ProtoCluster::with_capacity(group.len());
                for &i in group {
                    pc.push(i, 1.0);
                }
                out.push(pc);
            }
            n => {
                let first = out.len();
                out.extend((0..n).map(|_| ProtoCluster::with_capacity(group.len())));

                let mut dropped = 0usize;
                let mut weights = vec![0.0; n];
                for &i in group {
                    for (w, &m) in weights.iter_mut().zip(maxima) {
                        let dist = self.profile_metric.magnitude(&hits[i], &hits[m]);
                        *w = (-dist / self.profile_scale).exp() * hits[m].energy;
                    }
                    normalize(&mut weights);
                    for w in weights.iter_mut() {
                        if *w < SPLIT_WEIGHT_CUTOFF {
                            *w = 0.0;
                        }
                    }
                    if weights.iter().sum::<f64>() <= 0.0 {
                        dropped += 1;
                        continue;
                    }
                    normalize(&mut weights);

                    let mut kept = false;
                    for (k, &w) in weights.iter().enumerate() {
                        if w > SPLIT_WEIGHT_EMIT {
                            out[first + k].push(i, w);
                            kept = true;
                        }
                    }
                    if !kept {
                        dropped += 1;
                    }
                }
                if dropped > 0 {
                    tracing::debug!(dropped, "hits below split weight cutoff for all seeds");
                }
            }
        }
    }
}

fn normalize(weights: &mut [f64]) {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
}
