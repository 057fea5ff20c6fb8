pub mod combine;
pub mod expr;
pub mod island;
pub mod matcher;
pub mod neighbor;
pub mod topo;
pub mod track_split;

pub use combine::{ClusterCombiner, ClusterCombinerConfig, CombinedCandidate};
pub use expr::AdjacencyExpr;
pub use island::{IslandCluster, IslandClusterConfig};
pub use matcher::{ClusterMatcher, ClusterMatcherConfig};
pub use neighbor::{Adjacency, DistanceMetric};
pub use topo::{LayerMode, TopoCluster, TopoClusterConfig};
pub use track_split::{TrackClusterMatch, TrackSplitter, TrackSplitterConfig};
