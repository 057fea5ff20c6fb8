//! Hit adjacency predicates.
//!
//! The grouping stages test pairs of hits for adjacency through one strategy
//! chosen at construction time: a two-axis distance metric with per-axis
//! thresholds, or a parsed cell-ID field expression. Metric-based adjacency
//! only applies within a sector; across sectors the test falls back to the
//! 3D Euclidean distance between the global positions.

use serde::{Serialize, Deserialize};

use calreco_core::{phi_mpi_pi, CalorimeterHit};

use crate::expr::AdjacencyExpr;

/// Two-component separation measure between hits.
///
/// `LocalXY`/`LocalXZ`/`LocalYZ` compare sector-local coordinates in mm.
/// `DimScaledLocalXY` divides each local offset by the mean cell extent on
/// that axis, so thresholds are in units of cell pitch. The global metrics
/// compare derived cylinder coordinates of the global position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceMetric {
    LocalDistXY,
    LocalDistXZ,
    LocalDistYZ,
    DimScaledLocalDistXY,
    GlobalDistRPhi,
    GlobalDistEtaPhi,
}

impl DistanceMetric {
    /// Absolute two-axis separation between a hit pair
    pub fn separation(&self, a: &CalorimeterHit, b: &CalorimeterHit) -> [f64; 2] {
        match self {
            DistanceMetric::LocalDistXY => {
                [(a.local.x - b.local.x).abs(), (a.local.y - b.local.y).abs()]
            }
            DistanceMetric::LocalDistXZ => {
                [(a.local.x - b.local.x).abs(), (a.local.z - b.local.z).abs()]
            }
            DistanceMetric::LocalDistYZ => {
                [(a.local.y - b.local.y).abs(), (a.local.z - b.local.z).abs()]
            }
            DistanceMetric::DimScaledLocalDistXY => [
                (a.local.x - b.local.x).abs() / (0.5 * (a.dimension.x + b.dimension.x)),
                (a.local.y - b.local.y).abs() / (0.5 * (a.dimension.y + b.dimension.y)),
            ],
            DistanceMetric::GlobalDistRPhi => [
                (a.position.rho() - b.position.rho()).abs(),
                phi_mpi_pi(a.position.phi() - b.position.phi()).abs(),
            ],
            DistanceMetric::GlobalDistEtaPhi => [
                (a.position.eta() - b.position.eta()).abs(),
                phi_mpi_pi(a.position.phi() - b.position.phi()).abs(),
            ],
        }
    }

    /// Euclidean magnitude of the two-axis separation
    pub fn magnitude(&self, a: &CalorimeterHit, b: &CalorimeterHit) -> f64 {
        let [u, v] = self.separation(a, b);
        u.hypot(v)
    }

    /// True when both axes carry the same unit, so their quadrature sum is
    /// meaningful as a single distance. R-phi mixes a length with an angle.
    pub fn uniform_units(&self) -> bool {
        !matches!(self, DistanceMetric::GlobalDistRPhi)
    }

    /// Configuration priority order when several threshold pairs are set
    pub const PRIORITY: [DistanceMetric; 6] = [
        DistanceMetric::LocalDistXY,
        DistanceMetric::LocalDistXZ,
        DistanceMetric::LocalDistYZ,
        DistanceMetric::GlobalDistRPhi,
        DistanceMetric::GlobalDistEtaPhi,
        DistanceMetric::DimScaledLocalDistXY,
    ];
}

/// An adjacency predicate fixed at construction
#[derive(Clone, Debug)]
pub enum Adjacency {
    /// Same-sector hits compared with `metric` against per-axis `thresholds`;
    /// cross-sector hits compared by global Euclidean distance vs `sector_dist`
    Metric {
        metric: DistanceMetric,
        thresholds: [f64; 2],
        sector_dist: f64,
    },
    /// Boolean expression over the pair's decoded cell-ID fields
    Expression(AdjacencyExpr),
}

impl Adjacency {
    /// Whether evaluation needs pre-decoded cell-ID fields
    pub fn needs_fields(&self) -> bool {
        matches!(self, Adjacency::Expression(_))
    }

    /// Test hits `i` and `j` for adjacency. `fields` holds each hit's decoded
    /// cell-ID values and may be empty for metric-based predicates.
    pub fn matches(
        &self,
        hits: &[CalorimeterHit],
        fields: &[Vec<i64>],
        i: usize,
        j: usize,
    ) -> bool {
        let (a, b) = (&hits[i], &hits[j]);
        match self {
            Adjacency::Metric { metric, thresholds, sector_dist } => {
                if a.sector == b.sector {
                    let [u, v] = metric.separation(a, b);
                    u <= thresholds[0] && v <= thresholds[1]
                } else {
                    (a.position - b.position).magnitude() <= *sector_dist
                }
            }
            Adjacency::Expression(expr) => expr.matches(&fields[i], &fields[j]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calreco_core::Point3;

    fn hit_at(local: Point3, sector: i32) -> CalorimeterHit {
        CalorimeterHit {
            local,
            position: local,
            dimension: Point3::new(1.0, 1.0, 1.0),
            sector,
            energy: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_local_xy_thresholds() {
        let adj = Adjacency::Metric {
            metric: DistanceMetric::LocalDistXY,
            thresholds: [1.0, 1.0],
            sector_dist: 0.0,
        };
        let hits = vec![
            hit_at(Point3::new(0.0, 0.0, 0.0), 0),
            hit_at(Point3::new(0.9, 0.9, 0.0), 0),
            hit_at(Point3::new(2.5, 0.0, 0.0), 0),
        ];
        assert!(adj.matches(&hits, &[], 0, 1));
        assert!(!adj.matches(&hits, &[], 0, 2));
        assert!(!adj.matches(&hits, &[], 1, 2));
    }

    #[test]
    fn test_cross_sector_fallback() {
        let adj = Adjacency::Metric {
            metric: DistanceMetric::LocalDistXY,
            thresholds: [1.0, 1.0],
            sector_dist: 50.0,
        };
        let mut near = hit_at(Point3::new(0.0, 0.0, 0.0), 0);
        near.position = Point3::new(100.0, 0.0, 0.0);
        let mut other = hit_at(Point3::new(500.0, 500.0, 0.0), 1);
        other.position = Point3::new(130.0, 0.0, 0.0);
        let mut far = hit_at(Point3::new(0.1, 0.1, 0.0), 2);
        far.position = Point3::new(400.0, 0.0, 0.0);

        let hits = vec![near, other, far];
        // local coordinates are ignored across sectors
        assert!(adj.matches(&hits, &[], 0, 1));
        assert!(!adj.matches(&hits, &[], 0, 2));
    }

    #[test]
    fn test_dim_scaled_metric() {
        let metric = DistanceMetric::DimScaledLocalDistXY;
        let mut a = hit_at(Point3::new(0.0, 0.0, 0.0), 0);
        let mut b = hit_at(Point3::new(15.0, 0.0, 0.0), 0);
        a.dimension = Point3::new(10.0, 10.0, 0.0);
        b.dimension = Point3::new(10.0, 10.0, 0.0);
        let [u, v] = metric.separation(&a, &b);
        assert!((u - 1.5).abs() < 1e-12);
        assert!(v.abs() < 1e-12);
    }

    #[test]
    fn test_eta_phi_wraps_azimuth() {
        let metric = DistanceMetric::GlobalDistEtaPhi;
        let mut a = hit_at(Point3::default(), 0);
        let mut b = hit_at(Point3::default(), 0);
        a.position = Point3::new(-100.0, -0.1, 0.0); // phi just past -pi
        b.position = Point3::new(-100.0, 0.0, 0.0); // phi = pi
        let [_, dphi] = metric.separation(&a, &b);
        assert!(dphi < 0.01, "wrapped phi difference should be small, got {}", dphi);
    }

    #[test]
    fn test_rphi_mixes_units() {
        assert!(!DistanceMetric::GlobalDistRPhi.uniform_units());
        assert!(DistanceMetric::GlobalDistEtaPhi.uniform_units());
        assert!(DistanceMetric::LocalDistXY.uniform_units());
    }

    #[test]
    fn test_metric_names_round_trip_serde() {
        let m: DistanceMetric = serde_json::from_str("\"localDistXY\"").unwrap();
        assert_eq!(m, DistanceMetric::LocalDistXY);
        let m: DistanceMetric = serde_json::from_str("\"dimScaledLocalDistXY\"").unwrap();
        assert_eq!(m, DistanceMetric::DimScaledLocalDistXY);
        assert!(serde_json::from_str::<DistanceMetric>("\"noSuchMetric\"").is_err());
    }
}
