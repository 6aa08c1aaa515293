//! Coastline outlines and land polygons loaded from GeoJSON.

use std::path::Path;

use serde_json::Value;

use crate::error::{RenderError, RenderResult};

type Ring = Vec<(f64, f64)>;

/// Geographic outlines (lon, lat in degrees). Every polygon ring is also
/// an outline; polygons are kept whole in `land` for filling.
#[derive(Debug, Clone, Default)]
pub struct Coastlines {
    pub lines: Vec<Ring>,
    /// Polygons as rings, exterior first then holes
    pub land: Vec<Vec<Ring>>,
}

impl Coastlines {
    pub fn load(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let coastlines = Self::from_geojson(&text)?;
        tracing::debug!(
            path = %path.display(),
            lines = coastlines.lines.len(),
            polygons = coastlines.land.len(),
            "Loaded coastlines"
        );
        Ok(coastlines)
    }

    /// Parse a FeatureCollection, Feature, GeometryCollection or bare
    /// geometry. Polygon rings become closed lines; points are ignored.
    pub fn from_geojson(text: &str) -> RenderResult<Self> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| RenderError::Coastline(e.to_string()))?;
        let mut coastlines = Self::default();
        collect(&root, &mut coastlines)?;
        Ok(coastlines)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn polygon(rings: &Value, out: &mut Coastlines) -> RenderResult<()> {
    let rings = as_array(rings)?
        .iter()
        .map(positions)
        .collect::<RenderResult<Vec<_>>>()?;
    out.lines.extend(rings.iter().cloned());
    if rings.first().map_or(false, |exterior| exterior.len() >= 3) {
        out.land.push(rings);
    }
    Ok(())
}

fn collect(node: &Value, out: &mut Coastlines) -> RenderResult<()> {
    let kind = node
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Coastline("object without a \"type\"".to_string()))?;

    match kind {
        "FeatureCollection" => {
            for feature in array(node, "features")? {
                collect(feature, out)?;
            }
        }
        "Feature" => match node.get("geometry") {
            Some(Value::Null) | None => {}
            Some(geometry) => collect(geometry, out)?,
        },
        "GeometryCollection" => {
            for geometry in array(node, "geometries")? {
                collect(geometry, out)?;
            }
        }
        "LineString" => out.lines.push(positions(coordinates(node)?)?),
        "MultiLineString" => {
            for line in as_array(coordinates(node)?)? {
                out.lines.push(positions(line)?);
            }
        }
        "Polygon" => polygon(coordinates(node)?, out)?,
        "MultiPolygon" => {
            for rings in as_array(coordinates(node)?)? {
                polygon(rings, out)?;
            }
        }
        "Point" | "MultiPoint" => {}
        other => {
            return Err(RenderError::Coastline(format!(
                "unsupported GeoJSON type {}",
                other
            )))
        }
    }
    Ok(())
}

fn coordinates(node: &Value) -> RenderResult<&Value> {
    node.get("coordinates")
        .ok_or_else(|| RenderError::Coastline("geometry without coordinates".to_string()))
}

fn array<'a>(node: &'a Value, key: &str) -> RenderResult<&'a Vec<Value>> {
    node.get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| RenderError::Coastline(format!("missing array \"{}\"", key)))
}

fn as_array(value: &Value) -> RenderResult<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| RenderError::Coastline("expected an array of coordinates".to_string()))
}

fn positions(value: &Value) -> RenderResult<Vec<(f64, f64)>> {
    as_array(value)?
        .iter()
        .map(|position| {
            let pair = as_array(position)?;
            match (pair.first().and_then(Value::as_f64), pair.get(1).and_then(Value::as_f64)) {
                (Some(lon), Some(lat)) => Ok((lon, lat)),
                _ => Err(RenderError::Coastline(format!(
                    "invalid position {}",
                    position
                ))),
            }
        })
        .collect()
}
