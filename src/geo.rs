//! Geographic helpers: great-circle distance and nearest-vertex lookup.

use rstar::{primitives::GeomWithData, RTree};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two (lat, lon) coordinates in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Spatial point: [lon, lat] with the vertex id as payload
pub type VertexPoint = GeomWithData<[f64; 2], i64>;

/// Fast nearest vertex search using R-tree - O(log n)
pub fn nearest_vertex_spatial(target: (f64, f64), rtree: &RTree<VertexPoint>) -> Option<i64> {
    rtree
        .nearest_neighbor(&[target.1, target.0]) // [lon, lat]
        .map(|point| point.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_distance() {
        assert_eq!(haversine_distance(43.73, 7.42, 43.73, 7.42), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_longitude_at_equator() {
        // One degree of longitude at the equator is ~111.2 km
        let d = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_haversine_symmetric() {
        let d1 = haversine_distance(43.7384, 7.4246, 43.7403, 7.4268);
        let d2 = haversine_distance(43.7403, 7.4268, 43.7384, 7.4246);
        assert!((d1 - d2).abs() < 1e-9);
        assert!(d1 > 0.0);
    }

    #[test]
    fn test_nearest_vertex_spatial() {
        let points = vec![
            VertexPoint::new([7.42, 43.73], 1),
            VertexPoint::new([7.43, 43.74], 2),
            VertexPoint::new([7.50, 43.80], 3),
        ];
        let tree = RTree::bulk_load(points);
        assert_eq!(nearest_vertex_spatial((43.731, 7.421), &tree), Some(1));
        assert_eq!(nearest_vertex_spatial((43.79, 7.49), &tree), Some(3));
    }
}
