//! Bounding boxes in projected coordinates.

use serde::{Deserialize, Serialize};

use crate::error::ProjectionError;
use crate::MapProjection;

/// An axis-aligned box in the units of a projection's plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Projected envelope of a geographic extent `[lon_min, lon_max, lat_min, lat_max]`.
    ///
    /// The extent's boundary is sampled densely, since its edges are curves
    /// in most projections, and the envelope of the projected samples is
    /// returned.
    pub fn from_geo_extent(
        projection: &dyn MapProjection,
        extent: [f64; 4],
    ) -> Result<Self, ProjectionError> {
        let [lon_min, lon_max, lat_min, lat_max] = extent;
        const SAMPLES: usize = 100;

        let mut bbox: Option<BoundingBox> = None;
        for t in 0..=SAMPLES {
            let frac = t as f64 / SAMPLES as f64;
            let lon = lon_min + frac * (lon_max - lon_min);
            let lat = lat_min + frac * (lat_max - lat_min);
            let edge_points = [
                (lon, lat_min),
                (lon, lat_max),
                (lon_min, lat),
                (lon_max, lat),
            ];
            for (x, y) in edge_points
                .iter()
                .filter_map(|&(lon, lat)| project_edge(projection, lon, lat, lon_min, lon_max))
            {
                bbox = Some(match bbox {
                    Some(b) => b.including(x, y),
                    None => BoundingBox::new(x, y, x, y),
                });
            }
        }

        match bbox {
            Some(b) if b.width() > 0.0 && b.height() > 0.0 => Ok(b),
            _ => Err(ProjectionError::EmptyExtent {
                lon_min,
                lon_max,
                lat_min,
                lat_max,
            }),
        }
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width() / self.height()
    }

    /// Grow the box to cover a point.
    pub fn including(self, x: f64, y: f64) -> Self {
        Self {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
        }
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Project an extent boundary point. On a wrapping projection the eastern
/// edge of a full-globe extent lands on the western seam, so it is pinned
/// to the positive side.
fn project_edge(
    projection: &dyn MapProjection,
    lon: f64,
    lat: f64,
    lon_min: f64,
    lon_max: f64,
) -> Option<(f64, f64)> {
    let (x, y) = projection.project(lon, lat)?;
    match projection.wrap_width() {
        Some(width) if lon_max - lon_min >= width - 1e-9 && lon == lon_max => {
            Some((x.abs().max(width / 2.0), y))
        }
        _ => Some((x, y)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LambertConformal, PlateCarree};

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, BoundingBox::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_plate_carree_extent_is_identity() {
        let bbox =
            BoundingBox::from_geo_extent(&PlateCarree::default(), [120.0, 150.0, 20.0, 50.0])
                .unwrap();
        assert_eq!(bbox, BoundingBox::new(120.0, 20.0, 150.0, 50.0));
    }

    #[test]
    fn test_global_extent_spans_seam() {
        let bbox =
            BoundingBox::from_geo_extent(&PlateCarree::default(), [-180.0, 180.0, -90.0, 90.0])
                .unwrap();
        assert_eq!(bbox, BoundingBox::new(-180.0, -90.0, 180.0, 90.0));
    }

    #[test]
    fn test_lambert_extent_covers_corners() {
        let proj = LambertConformal::conventional();
        let bbox = BoundingBox::from_geo_extent(&proj, [120.0, 150.0, 20.0, 50.0]).unwrap();
        for &(lon, lat) in &[(120.0, 20.0), (150.0, 20.0), (120.0, 50.0), (150.0, 50.0)] {
            let (x, y) = proj.project(lon, lat).unwrap();
            assert!(bbox.contains_point(x, y));
        }
        assert!(bbox.width() > 0.0 && bbox.height() > 0.0);
    }

    #[test]
    fn test_unprojectable_extent() {
        let proj = LambertConformal::conventional();
        assert!(matches!(
            BoundingBox::from_geo_extent(&proj, [0.0, 10.0, -80.0, -60.0]),
            Err(ProjectionError::EmptyExtent { .. })
        ));
    }
}
