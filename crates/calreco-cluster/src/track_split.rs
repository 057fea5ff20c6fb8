//! Track-driven cluster merging and re-splitting.
//!
//! Calorimeter clusters whose energy is low compared to the momentum of a
//! matched track get nearby clusters merged in, on the assumption that the
//! shower was split across cluster boundaries. When several tracks point
//! into one merged region its hits are redistributed per track instead.

use serde::{Serialize, Deserialize};

use calreco_core::{
    phi_mpi_pi, CalorimeterHit, ProtoCluster, Point3, RecoError, Result, TrackPoint,
    TrackProjection,
};

/// Pairing of a calorimeter cluster with a track, produced upstream
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TrackClusterMatch {
    pub cluster: usize,
    pub track: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackSplitterConfig {
    /// Reference surface whose projected track state is compared to clusters
    pub surface: String,
    /// Clusters with E/p significance above this are left alone
    pub min_sig_cut: f64,
    /// Expected mean of E/p for the calorimeter
    pub avg_e_over_p: f64,
    /// Expected width of E/p
    pub sigma_e_over_p: f64,
    /// Eta-phi cone radius inside which clusters merge onto a seed
    pub dr_add: f64,
    /// Scale of the exp(-dr/scale) hit weight when re-splitting
    pub transverse_energy_profile_scale: f64,
    /// With no track matches at all, copy the input clusters through instead
    /// of returning nothing
    pub copy_unmatched_on_empty_input: bool,
}

impl Default for TrackSplitterConfig {
    fn default() -> Self {
        Self {
            surface: String::new(),
            min_sig_cut: -2.0,
            avg_e_over_p: 1.0,
            sigma_e_over_p: 0.1,
            dr_add: 0.4,
            transverse_energy_profile_scale: 1.0,
            copy_unmatched_on_empty_input: false,
        }
    }
}

/// Track-based cluster merge/split over one event
#[derive(Clone, Debug)]
pub struct TrackSplitter {
    config: TrackSplitterConfig,
}

impl TrackSplitter {
    pub fn new(config: TrackSplitterConfig) -> Result<Self> {
        if config.surface.is_empty() {
            return Err(RecoError::config("reference surface must be set"));
        }
        if config.sigma_e_over_p <= 0.0 {
            return Err(RecoError::config("sigmaEoverP must be positive"));
        }
        Ok(Self { config })
    }

    pub fn process(
        &self,
        clusters: &[ProtoCluster],
        hits: &[CalorimeterHit],
        projections: &[TrackProjection],
        matches: &[TrackClusterMatch],
    ) -> Vec<ProtoCluster> {
        let cfg = &self.config;
        let mut out = Vec::new();
        if clusters.is_empty() {
            return out;
        }
        if matches.is_empty() {
            tracing::debug!("no track-cluster matches in input");
            if cfg.copy_unmatched_on_empty_input {
                for pc in clusters {
                    out.push(copy_cluster(pc));
                }
            }
            return out;
        }

        // projected state per matched cluster, where the track reached the
        // reference surface
        let mut projection_of: Vec<Option<TrackPoint>> = vec![None; clusters.len()];
        for m in matches {
            if m.cluster >= clusters.len() || m.track >= projections.len() {
                tracing::debug!(cluster = m.cluster, track = m.track, "match out of range");
                continue;
            }
            match projections[m.track].at_surface(&cfg.surface) {
                Some(point) => projection_of[m.cluster] = Some(point.clone()),
                None => {
                    tracing::debug!(
                        track = m.track,
                        surface = %cfg.surface,
                        "projection missing reference surface, skipping track"
                    );
                }
            }
        }

        let mut used = vec![false; clusters.len()];
        let mut standalone = vec![false; clusters.len()];

        for m in matches {
            if m.cluster >= clusters.len() || used[m.cluster] {
                continue;
            }
            let Some(seed_proj) = projection_of[m.cluster].clone() else {
                continue;
            };
            let seed = m.cluster;
            let momentum = seed_proj.momentum.magnitude();
            let energy = clusters[seed].energy(hits);
            let sig = (energy - cfg.avg_e_over_p * momentum) / cfg.sigma_e_over_p;
            tracing::debug!(cluster = seed, sig, "seed significance");

            if sig > cfg.min_sig_cut {
                // energy already accounts for the track: leave the cluster as is
                used[seed] = true;
                standalone[seed] = true;
                continue;
            }

            used[seed] = true;
            let mut members = vec![seed];
            let mut region_projections = vec![seed_proj];
            let seed_pos = cluster_position(&clusters[seed], hits);
            for (other, pc) in clusters.iter().enumerate() {
                if used[other] {
                    continue;
                }
                let pos = cluster_position(pc, hits);
                let dr = angular_distance(&seed_pos, &pos);
                if dr <= cfg.dr_add {
                    used[other] = true;
                    members.push(other);
                    if let Some(proj) = projection_of[other].clone() {
                        region_projections.push(proj);
                    }
                }
            }
            self.resolve_region(clusters, hits, &members, &region_projections, &mut out);
        }

        // leftover pass: anything untouched or deliberately left standalone
        for (i, pc) in clusters.iter().enumerate() {
            if !used[i] || standalone[i] {
                out.push(copy_cluster(pc));
            }
        }
        out
    }

    /// One projection keeps the merged region whole; several projections
    /// redistribute its hits with momentum-scaled exponential weights.
    fn resolve_region(
        &self,
        clusters: &[ProtoCluster],
        hits: &[CalorimeterHit],
        members: &[usize],
        region_projections: &[TrackPoint],
        out: &mut Vec<ProtoCluster>,
    ) {
        if region_projections.len() < 2 {
            let mut merged = ProtoCluster::default();
            for &c in members {
                for &h in &clusters[c].hits {
                    merged.push(h, 1.0);
                }
            }
            out.push(merged);
            return;
        }

        let first = out.len();
        out.extend((0..region_projections.len()).map(|_| ProtoCluster::default()));
        let scale = self.config.transverse_energy_profile_scale;
        let mut weights = vec![0.0; region_projections.len()];
        for &c in members {
            for &h in &clusters[c].hits {
                for (w, proj) in weights.iter_mut().zip(region_projections) {
                    let dr = angular_distance(&hits[h].position, &proj.position);
                    *w = (-dr / scale).exp() * proj.momentum.magnitude();
                }
                let total: f64 = weights.iter().sum();
                if total <= 0.0 {
                    continue;
                }
                for (k, &w) in weights.iter().enumerate() {
                    out[first + k].push(h, w / total);
                }
            }
        }
    }
}

fn copy_cluster(pc: &ProtoCluster) -> ProtoCluster {
    let mut copy = ProtoCluster::with_capacity(pc.hits.len());
    for &h in &pc.hits {
        copy.push(h, 1.0);
    }
    copy
}

/// Energy-weighted centroid of a proto-cluster
fn cluster_position(pc: &ProtoCluster, hits: &[CalorimeterHit]) -> Point3 {
    let mut total = 0.0;
    let mut sum = Point3::default();
    for (&h, &w) in pc.hits.iter().zip(&pc.weights) {
        let e = hits[h].energy * w;
        sum = sum + hits[h].position * e;
        total += e;
    }
    if total > 0.0 {
        sum * (1.0 / total)
    } else {
        sum
    }
}

fn angular_distance(a: &Point3, b: &Point3) -> f64 {
    let deta = a.eta() - b.eta();
    let dphi = phi_mpi_pi(a.phi() - b.phi());
    deta.hypot(dphi)
}
