//! Polygon overlap measures used by tessellation and the spatial join.

use geo::{Area, BooleanOps, BoundingRect, Polygon};
use hri_common::BoundingBox;

/// Area of `subject` that lies inside `cell`. Holes on either side are
/// honoured; disjoint or edge-touching polygons give 0.
pub fn overlap_area(subject: &Polygon<f64>, cell: &Polygon<f64>) -> f64 {
    match (polygon_bounds(subject), polygon_bounds(cell)) {
        (Some(a), Some(b)) if a.intersects(&b) => subject.intersection(cell).unsigned_area(),
        _ => 0.0,
    }
}

/// Bounding box of a polygon, `None` for an empty one.
pub fn polygon_bounds(polygon: &Polygon<f64>) -> Option<BoundingBox> {
    polygon
        .bounding_rect()
        .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )
    }

    #[test]
    fn test_partial_overlap() {
        let cell = rect(0.0, 0.0, 10.0, 10.0);
        let subject = rect(5.0, 5.0, 15.0, 20.0);
        assert!((overlap_area(&subject, &cell) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_contained_and_disjoint() {
        let cell = rect(0.0, 0.0, 10.0, 10.0);
        assert!((overlap_area(&rect(2.0, 2.0, 4.0, 4.0), &cell) - 4.0).abs() < 1e-6);
        assert_eq!(overlap_area(&rect(20.0, 20.0, 30.0, 30.0), &cell), 0.0);
        assert!(overlap_area(&rect(10.0, 0.0, 12.0, 2.0), &cell).abs() < 1e-9);
    }

    #[test]
    fn test_clockwise_cell_and_hole() {
        let mut cell = rect(0.0, 0.0, 10.0, 10.0);
        cell.exterior_mut(|ring| ring.0.reverse());

        let subject = Polygon::new(
            LineString::from(vec![(-5.0, -5.0), (15.0, -5.0), (15.0, 15.0), (-5.0, 15.0), (-5.0, -5.0)]),
            vec![LineString::from(vec![(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0), (1.0, 1.0)])],
        );
        let expected = cell.unsigned_area() - 4.0;
        assert!((overlap_area(&subject, &cell) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_concave_cell() {
        // L-shaped cell: the 10x10 square minus its upper-right 5x5 quadrant
        let cell = Polygon::new(
            LineString::from(vec![
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 5.0),
                (5.0, 5.0),
                (5.0, 10.0),
                (0.0, 10.0),
                (0.0, 0.0),
            ]),
            vec![],
        );
        let subject = rect(2.0, 2.0, 8.0, 8.0);
        // 36 minus the 3x3 notch
        assert!((overlap_area(&subject, &cell) - 27.0).abs() < 1e-6);
    }

    #[test]
    fn test_polygon_bounds() {
        let b = polygon_bounds(&rect(1.0, 2.0, 3.0, 5.0)).unwrap();
        assert_eq!(b, BoundingBox::new(1.0, 2.0, 3.0, 5.0));
    }
}
