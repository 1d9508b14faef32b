//! Extraction on a synthetic corner: two perpendicular walls meeting straight
//! ahead of the sensor.

use scan_slam_algo::prelude::*;

const CORNER: [f64; 2] = [100.0, 0.0];

/// Sensor at the origin facing +x; walls x + y = 100 (left) and x - y = 100
/// (right) meet at (100, 0) on the centre beam.
fn corner_scan(geometry: &LaserGeometry) -> RawScan {
    let distances = (0..geometry.count)
        .map(|i| {
            let phi = geometry.beam_angle(i);
            100.0 / (phi.cos() + phi.abs().sin())
        })
        .collect();
    RawScan::new(distances, 0)
}

fn extract(kind: ExtractorKind) -> Extraction {
    let geometry = LaserGeometry::default();
    let scan = corner_scan(&geometry);
    let points = scan.project(&geometry, &Point::zeros(), 0.0);
    assert_eq!(points.len(), 181);

    let mut config = ExtractionConfig {
        kind,
        ..Default::default()
    };
    config.ransac.seed = Some(42);
    LineFeatureExtractor::new(config, geometry)
        .extract(&points, &scan.distances)
        .unwrap()
}

#[test]
fn ransac_finds_both_walls_and_the_corner() {
    let extraction = extract(ExtractorKind::Ransac {
        least_squares: true,
    });
    assert_eq!(extraction.partitions, 1);
    assert_eq!(extraction.lines.len(), 2);

    let corner = Point::from(CORNER);
    assert!(!extraction.landmarks.is_empty());
    assert!(extraction
        .landmarks
        .iter()
        .any(|l| (l - corner).norm() < 5.0));
}

#[test]
fn iep_ransac_splits_at_the_corner() {
    let extraction = extract(ExtractorKind::default());
    assert_eq!(extraction.lines.len(), 2);

    let corner = Point::from(CORNER);
    assert!(extraction.landmarks.len() >= 2);
    for landmark in &extraction.landmarks {
        assert!((landmark - corner).norm() < 5.0, "stray landmark {landmark:?}");
    }
}

#[test]
fn iep_chords_meet_at_the_corner() {
    let extraction = extract(ExtractorKind::Iep);
    assert_eq!(extraction.partitions, 1);
    assert_eq!(extraction.lines.len(), 2);

    // Noise-free walls: the single split lands on the centre beam.
    let corner = Point::from(CORNER);
    let (right, left) = (&extraction.lines[0], &extraction.lines[1]);
    assert!((right.start - Point::new(0.0, -100.0)).norm() < 1e-6);
    assert!((right.end - corner).norm() < 1e-6);
    assert!((left.start - corner).norm() < 1e-6);
    assert!((left.end - Point::new(0.0, 100.0)).norm() < 1e-6);

    assert!(!extraction.landmarks.is_empty());
    for landmark in &extraction.landmarks {
        assert!((landmark - corner).norm() < 5.0, "stray landmark {landmark:?}");
    }
}

#[test]
fn iep_is_deterministic() {
    assert_eq!(extract(ExtractorKind::Iep), extract(ExtractorKind::Iep));
}

#[test]
fn same_seed_gives_same_lines() {
    let kind = ExtractorKind::Ransac {
        least_squares: false,
    };
    assert_eq!(extract(kind), extract(kind));
}
