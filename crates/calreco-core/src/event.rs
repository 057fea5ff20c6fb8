//! Event-scoped record types exchanged between reconstruction stages.
//!
//! All of these are plain value data: produced once per event, passed by
//! reference into the algorithms, and dropped at end of event. Nothing here
//! carries cross-event state.

use serde::{Serialize, Deserialize};

use crate::coordinates::Point3;

/// A single calorimeter cell readout after digitization
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CalorimeterHit {
    /// Packed geometry address, decodable through a `CellIdSpec`
    pub cell_id: u64,
    pub energy: f64, // GeV
    pub energy_error: f64,
    pub time: f64, // ns
    pub time_error: f64,
    /// Global position of the cell center
    pub position: Point3,
    /// Cell extent along each local axis
    pub dimension: Point3,
    pub sector: i32,
    pub layer: i32,
    /// Position in the sector-local frame
    pub local: Point3,
}

/// A weighted hit list, prior to energy/position reconstruction.
///
/// `hits` holds indices into the event hit slice; `weights` is parallel to
/// it. Weights assigned to one hit across all proto-clusters emitted by a
/// single split sum to 1.
#[derive(Clone, Debug, Default)]
pub struct ProtoCluster {
    pub hits: Vec<usize>,
    pub weights: Vec<f64>,
}

impl ProtoCluster {
    pub fn with_capacity(n: usize) -> Self {
        Self { hits: Vec::with_capacity(n), weights: Vec::with_capacity(n) }
    }

    pub fn push(&mut self, hit: usize, weight: f64) {
        self.hits.push(hit);
        self.weights.push(weight);
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Sum of the hit energies weighted by their share
    pub fn energy(&self, hits: &[CalorimeterHit]) -> f64 {
        self.hits
            .iter()
            .zip(&self.weights)
            .map(|(&i, &w)| hits[i].energy * w)
            .sum()
    }
}

/// A fully reconstructed cluster, input to the matching stages
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cluster {
    pub energy: f64,
    pub energy_error: f64,
    pub time: f64,
    pub nhits: u32,
    pub position: Point3,
    pub position_error: Point3,
    /// Indices of the source clusters this one was merged from
    pub constituents: Vec<usize>,
}

impl Cluster {
    pub fn eta(&self) -> f64 {
        self.position.eta()
    }

    pub fn phi(&self) -> f64 {
        self.position.phi()
    }
}

/// One projected state of a track on a named detector surface
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackPoint {
    pub surface: String,
    pub position: Point3,
    pub momentum: Point3,
}

/// All projected points of one track
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackProjection {
    /// Index of the track in the event track collection
    pub track: usize,
    pub points: Vec<TrackPoint>,
}

impl TrackProjection {
    /// Projected point at a given surface, if the track reached it
    pub fn at_surface(&self, surface: &str) -> Option<&TrackPoint> {
        self.points.iter().find(|p| p.surface == surface)
    }
}

/// Link from a reconstructed cluster to a truth particle
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClusterAssociation {
    pub rec_id: usize,
    pub sim_id: usize,
    pub weight: f64,
}
