pub mod cellid;
pub mod coordinates;
pub mod error;
pub mod event;
pub mod units;

#[cfg(test)]
mod tests;

pub use cellid::{BitField, CellIdSpec};
pub use coordinates::{phi_mpi_pi, Point3};
pub use error::{RecoError, Result};
pub use event::{
    CalorimeterHit, Cluster, ClusterAssociation, ProtoCluster, TrackPoint, TrackProjection,
};
