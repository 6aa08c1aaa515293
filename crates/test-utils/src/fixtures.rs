//! Common test fixtures for reanalysis-maps tests.
//!
//! Text fixtures mirror the real inputs: the station page's first table
//! and the Shift_JIS cluster table.

/// Display extents used across the maps, as (lon_min, lon_max, lat_min, lat_max).
pub mod extent {
    /// Japan and surroundings, the extent of every regional map
    pub const JAPAN: [f64; 4] = [120.0, 150.0, 20.0, 50.0];

    /// Whole globe
    pub const GLOBAL: [f64; 4] = [-180.0, 180.0, -90.0, 90.0];
}

/// JRA-55 `anl_p125` grid parameters.
pub mod jra55 {
    pub const NI: usize = 288;
    pub const NJ: usize = 145;
    pub const RESOLUTION: f64 = 1.25;
    /// Default filled-contour boundaries (start, stop, step); stop is excluded
    pub const CONTOURF_LEVELS: (f64, f64, f64) = (1200.0, 1600.0, 50.0);
}

/// Station page excerpt. The first table holds the stations; the second
/// table must be ignored. The Hokkaido region cell spans three rows, and
/// one row has an empty latitude and is dropped.
pub const STATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>地点一覧</title></head>
<body>
<table border="1">
  <tr><th>地域</th><th>地点</th><th>緯度(lat)</th><th>経度(lng)</th></tr>
  <tr><td rowspan="3">北海道</td><td>稚内</td><td>45.415</td><td>141.673</td></tr>
  <tr><td>旭川</td><td>43.771</td><td>142.365</td></tr>
  <tr><td>札幌</td><td>43.064</td><td>141.347</td></tr>
  <tr><td>東京都</td><td>東京</td><td>35.690</td><td>139.692</td></tr>
  <tr><td>大阪府</td><td>大阪</td><td></td><td>135.520</td></tr>
  <tr><td>福岡県</td><td>福岡</td><td>33.607</td><td>130.418</td></tr>
  <tr><td>沖縄本島</td><td>那覇</td><td>26.212</td><td>127.681</td></tr>
</table>
<table>
  <tr><th>other</th></tr>
  <tr><td>ignored</td></tr>
</table>
</body>
</html>
"#;

/// Number of complete rows in [`STATION_HTML`].
pub const STATION_COMPLETE_ROWS: usize = 6;

/// Cluster table header: a name column, coordinates, external cluster id,
/// flag, then the twelve monthly features.
pub const CLUSTER_HEADER: &str = "地点,lon,lat,cluster_NO,frag,1,2,3,4,5,6,7,8,9,10,11,12";

/// Cluster table in UTF-8. Encode with [`shift_jis`] before handing it to
/// a reader that expects the real file.
pub fn cluster_csv() -> String {
    let rows = [
        "稚内,141.67,45.41,0,0,-4.7,-5.0,-1.4,4.0,8.6,12.2,16.5,19.3,16.8,11.1,3.8,-1.6",
        "札幌,141.35,43.06,0,0,-3.6,-3.1,0.6,7.1,12.4,16.7,20.5,22.3,18.1,11.8,4.9,-0.9",
        "仙台,140.87,38.27,1,0,1.6,2.0,4.9,10.3,15.0,18.5,22.2,24.2,20.7,15.2,9.4,4.5",
        "東京,139.69,35.69,2,1,5.2,5.7,8.7,13.9,18.2,21.4,25.0,26.4,22.8,17.5,12.1,7.6",
        "名古屋,136.91,35.18,2,0,4.5,5.2,8.7,14.4,18.9,22.7,26.4,27.8,24.1,18.1,12.2,6.9",
        "大阪,135.52,34.69,2,1,6.0,6.3,9.4,15.1,19.7,23.5,27.4,28.8,25.0,19.0,13.6,8.6",
        "広島,132.46,34.40,3,0,5.2,6.0,9.1,14.7,19.3,23.0,27.1,28.2,24.4,18.3,12.5,7.5",
        "福岡,130.42,33.61,3,1,6.9,7.8,10.8,15.4,19.9,23.3,27.4,28.4,24.7,19.6,14.2,9.1",
        "鹿児島,130.55,31.56,4,0,8.7,9.9,12.8,17.1,21.0,24.2,28.1,29.0,26.5,21.5,16.0,10.6",
        "那覇,127.68,26.21,5,1,17.3,17.5,18.9,21.4,24.0,26.8,28.9,28.7,27.6,25.2,22.1,18.7",
        "新潟,139.02,37.90,1,0,2.8,2.9,5.8,11.1,16.3,20.5,24.5,26.6,22.8,16.9,10.8,5.5",
        "高知,133.53,33.56,3,1,6.7,7.8,11.2,15.8,19.9,23.1,27.0,27.9,25.1,19.9,14.2,8.9",
    ];
    let mut csv = String::from(CLUSTER_HEADER);
    csv.push('\n');
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    csv
}

/// Encode text as Shift_JIS, as the cluster table is distributed.
pub fn shift_jis(text: &str) -> Vec<u8> {
    let (bytes, _, had_errors) = encoding_rs::SHIFT_JIS.encode(text);
    assert!(!had_errors, "fixture text is not representable in Shift_JIS");
    bytes.into_owned()
}

/// Four rows whose features are all zero except one distinguishing value
/// in the last row.
pub fn four_row_csv() -> String {
    let mut csv = String::from("lon,lat,cluster_NO,frag,1,2,3,4,5,6,7,8,9,10,11,12\n");
    for _ in 0..3 {
        csv.push_str("135.0,35.0,0,0,0,0,0,0,0,0,0,0,0,0,0,0\n");
    }
    csv.push_str("140.0,40.0,1,1,0,0,0,0,0,0,0,0,0,0,0,9\n");
    csv
}

/// Minimal coastline GeoJSON: one LineString and one Polygon near Japan.
pub const COASTLINE_GEOJSON: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {},
      "geometry": {
        "type": "LineString",
        "coordinates": [[130.0, 31.0], [132.0, 33.5], [135.0, 34.5], [140.0, 35.5]]
      }
    },
    {
      "type": "Feature",
      "properties": {},
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[140.0, 42.0], [145.0, 43.0], [143.0, 45.0], [140.0, 42.0]]]
      }
    }
  ]
}"#;
