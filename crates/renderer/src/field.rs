//! Scalar fields on a longitude/latitude mesh.

use crate::error::{RenderError, RenderResult};

/// One 2-D slice with its coordinate grids, row-major, row 0 southernmost.
#[derive(Debug, Clone)]
pub struct ScalarField {
    pub nx: usize,
    pub ny: usize,
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    pub values: Vec<f32>,
}

impl ScalarField {
    /// Build a field, checking that all three grids hold `nx * ny` points.
    pub fn new(
        nx: usize,
        ny: usize,
        lons: Vec<f64>,
        lats: Vec<f64>,
        values: Vec<f32>,
    ) -> RenderResult<Self> {
        let expected = nx * ny;
        for (what, actual) in [
            ("longitudes", lons.len()),
            ("latitudes", lats.len()),
            ("values", values.len()),
        ] {
            if actual != expected {
                return Err(RenderError::ShapeMismatch {
                    what,
                    expected,
                    actual,
                });
            }
        }
        if nx < 2 || ny < 2 {
            return Err(RenderError::ShapeMismatch {
                what: "grid (at least 2x2 points)",
                expected: 4,
                actual: expected,
            });
        }
        Ok(Self {
            nx,
            ny,
            lons,
            lats,
            values,
        })
    }

    /// Minimum and maximum of the non-missing values.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    fn lon_step(&self) -> f64 {
        self.lons[1] - self.lons[0]
    }

    fn lat_step(&self) -> f64 {
        self.lats[self.nx] - self.lats[0]
    }

    /// True when the columns go all the way round the globe, so the last
    /// column neighbours the first.
    pub fn wraps_longitude(&self) -> bool {
        let step = self.lon_step().abs();
        step > 0.0 && (step * self.nx as f64 - 360.0).abs() < step * 1e-3
    }

    /// Geographic position at fractional grid indices.
    pub fn geo_at(&self, i: f64, j: f64) -> (f64, f64) {
        (
            bilinear(&self.lons, self.nx, self.ny, i, j),
            bilinear(&self.lats, self.nx, self.ny, i, j),
        )
    }

    /// Fractional grid indices of a geographic position, or `None` when it
    /// falls outside the mesh.
    pub fn locate(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let dlon = self.lon_step();
        let dlat = self.lat_step();
        if dlon == 0.0 || dlat == 0.0 {
            return None;
        }

        let rel = if dlon > 0.0 {
            (lon - self.lons[0]).rem_euclid(360.0)
        } else {
            -(self.lons[0] - lon).rem_euclid(360.0)
        };
        let i = rel / dlon;
        let j = (lat - self.lats[0]) / dlat;

        let max_i = if self.wraps_longitude() {
            self.nx as f64
        } else {
            (self.nx - 1) as f64
        };
        if !(0.0..=max_i).contains(&i) || !(0.0..=(self.ny - 1) as f64).contains(&j) {
            return None;
        }
        Some((i, j))
    }

    /// Bilinear value at a geographic position; NaN when any surrounding
    /// point is missing or the position is off the mesh.
    pub fn sample(&self, lon: f64, lat: f64) -> f32 {
        let Some((i, j)) = self.locate(lon, lat) else {
            return f32::NAN;
        };
        let i0 = i.floor() as usize;
        let j0 = (j.floor() as usize).min(self.ny - 2);
        let fi = (i - i0 as f64) as f32;
        let fj = (j - j0 as f64) as f32;

        let col = |c: usize| {
            if self.wraps_longitude() {
                c % self.nx
            } else {
                c.min(self.nx - 1)
            }
        };
        let (c0, c1) = (col(i0), col(i0 + 1));
        let at = |c: usize, r: usize| self.values[r * self.nx + c];

        let v00 = at(c0, j0);
        let v10 = at(c1, j0);
        let v01 = at(c0, j0 + 1);
        let v11 = at(c1, j0 + 1);

        let bottom = v00 + (v10 - v00) * fi;
        let top = v01 + (v11 - v01) * fi;
        bottom + (top - bottom) * fj
    }
}

fn bilinear(grid: &[f64], nx: usize, ny: usize, i: f64, j: f64) -> f64 {
    let i0 = (i.floor().max(0.0) as usize).min(nx - 2);
    let j0 = (j.floor().max(0.0) as usize).min(ny - 2);
    let fi = i - i0 as f64;
    let fj = j - j0 as f64;
    let at = |c: usize, r: usize| grid[r * nx + c];
    let bottom = at(i0, j0) + (at(i0 + 1, j0) - at(i0, j0)) * fi;
    let top = at(i0, j0 + 1) + (at(i0 + 1, j0 + 1) - at(i0, j0 + 1)) * fi;
    bottom + (top - bottom) * fj
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular(nx: usize, ny: usize, lon0: f64, lat0: f64, step: f64) -> (Vec<f64>, Vec<f64>) {
        let mut lons = Vec::with_capacity(nx * ny);
        let mut lats = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                lons.push(lon0 + step * i as f64);
                lats.push(lat0 + step * j as f64);
            }
        }
        (lons, lats)
    }

    #[test]
    fn test_shape_mismatch() {
        let (lons, lats) = regular(3, 2, 0.0, 0.0, 1.0);
        let err = ScalarField::new(3, 2, lons, lats, vec![0.0; 5]).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShapeMismatch {
                what: "values",
                expected: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_sample_interpolates() {
        let (lons, lats) = regular(2, 2, 120.0, 20.0, 10.0);
        let field = ScalarField::new(2, 2, lons, lats, vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        assert!((field.sample(125.0, 25.0) - 15.0).abs() < 1e-5);
        assert!(field.sample(135.0, 25.0).is_nan());
    }

    #[test]
    fn test_global_grid_wraps_across_seam() {
        let (lons, lats) = regular(4, 2, 0.0, 0.0, 90.0);
        let values = vec![0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.0, 10.0];
        let field = ScalarField::new(4, 2, lons, lats, values).unwrap();
        assert!(field.wraps_longitude());
        // Halfway between 270E and 360E
        assert!((field.sample(-45.0, 45.0) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_geo_at_and_value_range() {
        let (lons, lats) = regular(3, 3, 100.0, -10.0, 5.0);
        let field =
            ScalarField::new(3, 3, lons, lats, vec![1.0, 2.0, f32::NAN, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0])
                .unwrap();
        let (lon, lat) = field.geo_at(1.5, 0.5);
        assert!((lon - 107.5).abs() < 1e-9);
        assert!((lat + 7.5).abs() < 1e-9);
        assert_eq!(field.value_range(), Some((1.0, 9.0)));
    }
}
