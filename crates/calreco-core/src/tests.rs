use std::f64::consts::PI;

use crate::cellid::CellIdSpec;
use crate::coordinates::{phi_mpi_pi, Point3};

#[test]
fn test_eta_phi_basic_directions() {
    let forward = Point3::new(0.0, 0.0, 100.0);
    assert!(forward.eta().is_infinite(), "on-axis eta should be infinite");

    let transverse = Point3::new(100.0, 0.0, 0.0);
    assert!(transverse.eta().abs() < 1e-12, "transverse eta should be 0");
    assert!(transverse.phi().abs() < 1e-12, "x-axis phi should be 0");

    let neg_y = Point3::new(0.0, -100.0, 0.0);
    assert!((neg_y.phi() + PI / 2.0).abs() < 1e-12);
}

#[test]
fn test_eta_matches_theta_formula() {
    // eta = -ln(tan(theta/2)) for a few polar angles
    for theta in [0.3f64, 0.9, 1.5707963, 2.4] {
        let p = Point3::new(theta.sin(), 0.0, theta.cos());
        let expected = -((theta / 2.0).tan()).ln();
        assert!(
            (p.eta() - expected).abs() < 1e-10,
            "eta mismatch at theta={}: {} vs {}",
            theta,
            p.eta(),
            expected
        );
    }
}

#[test]
fn test_phi_wrap() {
    assert!((phi_mpi_pi(0.1) - 0.1).abs() < 1e-12);
    assert!((phi_mpi_pi(PI + 0.1) - (-PI + 0.1)).abs() < 1e-12);
    assert!((phi_mpi_pi(-PI - 0.1) - (PI - 0.1)).abs() < 1e-12);
    assert!((phi_mpi_pi(3.0 * PI) - PI).abs() < 1e-12);
}

#[test]
fn test_point_ops() {
    let a = Point3::new(1.0, 2.0, 3.0);
    let b = Point3::new(0.5, -1.0, 2.0);
    let d = a - b;
    assert_eq!(d, Point3::new(0.5, 3.0, 1.0));
    let s = b * 2.0;
    assert_eq!(s, Point3::new(1.0, -2.0, 4.0));
    assert!((Point3::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < 1e-12);
    assert!((Point3::new(3.0, 4.0, 12.0).rho() - 5.0).abs() < 1e-12);
}

#[test]
fn test_cellid_descriptor_roundtrip() {
    let spec = CellIdSpec::parse("system:8,sector:4,x:-12,y:-12").unwrap();
    let id = spec
        .encode(&[("system", 42), ("sector", 3), ("x", -100), ("y", 77)])
        .unwrap();

    assert_eq!(spec.decode_by_name(id, "system").unwrap(), 42);
    assert_eq!(spec.decode_by_name(id, "sector").unwrap(), 3);
    assert_eq!(spec.decode_by_name(id, "x").unwrap(), -100);
    assert_eq!(spec.decode_by_name(id, "y").unwrap(), 77);
}

#[test]
fn test_cellid_parsed_layout() {
    let spec = CellIdSpec::parse("system:8,x:-12,y:-12").unwrap();
    let fields = spec.fields();
    assert_eq!(fields.len(), 3);
    let offsets: Vec<u32> = fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, vec![0, 8, 20]);
    assert!(!fields[0].signed);
    assert!(fields[1].signed && fields[1].width == 12);
    assert!(fields[2].signed && fields[2].width == 12);
}

#[test]
fn test_cellid_sign_extension() {
    let spec = CellIdSpec::parse("v:-8").unwrap();
    let field = spec.field("v").unwrap();
    assert_eq!(spec.decode(0xFF, field), -1);
    assert_eq!(spec.decode(0x80, field), -128);
    assert_eq!(spec.decode(0x7F, field), 127);
}

#[test]
fn test_cellid_explicit_offsets() {
    let spec = CellIdSpec::parse("a:0:4,b:8:4").unwrap();
    let id = spec.encode(&[("a", 5), ("b", 9)]).unwrap();
    assert_eq!(id, 5 | (9 << 8));
    assert_eq!(spec.decode_by_name(id, "b").unwrap(), 9);
}

#[test]
fn test_cellid_bad_descriptors() {
    assert!(CellIdSpec::parse("x:0").is_err());
    assert!(CellIdSpec::parse("x:40,y:40").is_err());
    assert!(CellIdSpec::parse("x:4:junk").is_err());
    assert!(CellIdSpec::parse("justaname").is_err());

    let spec = CellIdSpec::parse("x:8").unwrap();
    assert!(spec.decode_by_name(0, "missing").is_err());
}
