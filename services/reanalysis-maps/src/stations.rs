//! Station table scraping and synthetic weather labels.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::StationConfig;
use crate::error::{PipelineError, PipelineResult};

/// A station with its drawn label.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub label: String,
}

/// Cell text of an HTML table; the first row supplies the headers.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// Rows with a value in every column.
    pub fn complete_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        let width = self.headers.len();
        self.rows
            .iter()
            .filter(move |row| row.len() >= width && row.iter().take(width).all(|c| !c.is_empty()))
    }

    pub fn column_index(&self, name: &str) -> PipelineResult<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| {
                PipelineError::Station(format!(
                    "column '{}' not found, headers are {:?}",
                    name, self.headers
                ))
            })
    }
}

fn selector(css: &str) -> PipelineResult<Selector> {
    Selector::parse(css)
        .map_err(|e| PipelineError::Station(format!("bad selector '{}': {:?}", css, e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Upper bounds browsers apply to `colspan` and `rowspan`.
const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

fn span(cell: ElementRef<'_>, attr: &str, max: usize) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map_or(1, |n| n.min(max))
}

/// Cell text of each row with spanning cells repeated into every position
/// they cover.
fn expand_spans<'a>(rows: impl Iterator<Item = Vec<ElementRef<'a>>>) -> Vec<Vec<String>> {
    // Per column: text and number of rows it still covers
    let mut carried: Vec<Option<(String, usize)>> = Vec::new();
    let mut grid = Vec::new();

    for cells in rows {
        let mut row: Vec<String> = Vec::new();
        let mut cells = cells.into_iter();
        loop {
            let col = row.len();
            if let Some(slot) = carried.get_mut(col) {
                if let Some((text, remaining)) = slot {
                    row.push(text.clone());
                    *remaining -= 1;
                    if *remaining == 0 {
                        *slot = None;
                    }
                    continue;
                }
            }

            let Some(cell) = cells.next() else {
                break;
            };
            let text = cell_text(cell);
            let rowspan = span(cell, "rowspan", MAX_ROWSPAN);
            for _ in 0..span(cell, "colspan", MAX_COLSPAN) {
                let col = row.len();
                if carried.len() <= col {
                    carried.resize(col + 1, None);
                }
                carried[col] = (rowspan > 1).then(|| (text.clone(), rowspan - 1));
                row.push(text.clone());
            }
        }
        grid.push(row);
    }
    grid
}

/// Parse the first `<table>` of a page. Row and column spans are expanded
/// before rows are returned.
pub fn parse_first_table(html: &str) -> PipelineResult<HtmlTable> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| PipelineError::Station("page has no <table>".to_string()))?;

    let rows = table
        .select(&row_sel)
        .map(|tr| tr.select(&cell_sel).collect::<Vec<_>>());
    let mut rows = expand_spans(rows).into_iter().filter(|cells| !cells.is_empty());

    let headers = rows
        .next()
        .ok_or_else(|| PipelineError::Station("table has no rows".to_string()))?;
    let rows: Vec<Vec<String>> = rows.collect();

    debug!(columns = headers.len(), rows = rows.len(), "Parsed station table");
    Ok(HtmlTable { headers, rows })
}

/// Coordinates (and names) of the complete rows.
pub fn station_coordinates(
    table: &HtmlTable,
    config: &StationConfig,
) -> PipelineResult<Vec<(Option<String>, f64, f64)>> {
    let lon_idx = table.column_index(&config.lon_column)?;
    let lat_idx = table.column_index(&config.lat_column)?;
    let name_idx = match &config.name_column {
        Some(name) => table.headers.iter().position(|h| h == name),
        None => None,
    };

    table
        .complete_rows()
        .map(|row| {
            let parse = |idx: usize, column: &str| {
                row[idx].parse::<f64>().map_err(|_| {
                    PipelineError::Station(format!(
                        "'{}' in column '{}' is not a number",
                        row[idx], column
                    ))
                })
            };
            let lon = parse(lon_idx, &config.lon_column)?;
            let lat = parse(lat_idx, &config.lat_column)?;
            Ok((name_idx.map(|i| row[i].clone()), lon, lat))
        })
        .collect()
}

/// One label per station, drawn independently and uniformly.
pub fn assign_labels<R: Rng>(count: usize, labels: &[String], rng: &mut R) -> Vec<String> {
    (0..count)
        .filter_map(|_| labels.choose(rng).cloned())
        .collect()
}

/// Generator for the label draw: seeded when configured, otherwise from
/// OS entropy.
pub fn label_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Parse a station page and label its complete rows.
pub fn stations_from_html<R: Rng>(
    html: &str,
    config: &StationConfig,
    rng: &mut R,
) -> PipelineResult<Vec<Station>> {
    if config.labels.is_empty() {
        return Err(PipelineError::Config(
            "stations.labels must not be empty".to_string(),
        ));
    }
    let table = parse_first_table(html)?;
    let coordinates = station_coordinates(&table, config)?;
    let labels = assign_labels(coordinates.len(), &config.labels, rng);

    Ok(coordinates
        .into_iter()
        .zip(labels)
        .map(|((name, lon, lat), label)| Station {
            name,
            lon,
            lat,
            label,
        })
        .collect())
}

/// GET the station page.
pub async fn fetch_page(config: &StationConfig) -> PipelineResult<String> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(30)))
        .build()?;

    let response = client.get(&config.url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PipelineError::Network(format!(
            "GET {} returned {}",
            config.url, status
        )));
    }
    let body = response.text().await?;
    info!(url = %config.url, bytes = body.len(), "Fetched station page");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{STATION_COMPLETE_ROWS, STATION_HTML};

    #[test]
    fn test_first_table_only() {
        let table = parse_first_table(STATION_HTML).unwrap();
        assert_eq!(table.headers, vec!["地域", "地点", "緯度(lat)", "経度(lng)"]);
        assert_eq!(table.rows.len(), 7);
        assert_eq!(table.complete_rows().count(), STATION_COMPLETE_ROWS);
    }

    #[test]
    fn test_rowspan_cells_fill_the_rows_they_cover() {
        let table = parse_first_table(STATION_HTML).unwrap();
        let regions: Vec<&str> = table.rows[..4].iter().map(|r| r[0].as_str()).collect();
        assert_eq!(regions, vec!["北海道", "北海道", "北海道", "東京都"]);
        assert_eq!(table.rows[1], vec!["北海道", "旭川", "43.771", "142.365"]);
    }

    #[test]
    fn test_colspan_and_trailing_rowspan() {
        let html = "<table>\
                    <tr><th colspan=\"2\">place</th><th>緯度(lat)</th><th>経度(lng)</th></tr>\
                    <tr><td>a</td><td>b</td><td>40.0</td><td rowspan=\"2\">140.0</td></tr>\
                    <tr><td>c</td><td>d</td><td>41.0</td></tr>\
                    </table>";
        let table = parse_first_table(html).unwrap();
        assert_eq!(table.headers, vec!["place", "place", "緯度(lat)", "経度(lng)"]);
        assert_eq!(table.rows[1], vec!["c", "d", "41.0", "140.0"]);
        assert_eq!(table.complete_rows().count(), 2);
    }

    #[test]
    fn test_span_attributes_are_bounded() {
        let html = "<table><tr><th colspan=\"0\">x</th><th colspan=\"bad\">y</th></tr>\
                    <tr><td colspan=\"99999999\">z</td></tr></table>";
        let table = parse_first_table(html).unwrap();
        assert_eq!(table.headers, vec!["x", "y"]);
        assert_eq!(table.rows[0].len(), MAX_COLSPAN);
    }

    #[test]
    fn test_no_table() {
        assert!(matches!(
            parse_first_table("<html><body><p>moved</p></body></html>"),
            Err(PipelineError::Station(_))
        ));
    }

    #[test]
    fn test_coordinates_and_names() {
        let table = parse_first_table(STATION_HTML).unwrap();
        let coords = station_coordinates(&table, &StationConfig::default()).unwrap();
        assert_eq!(coords.len(), STATION_COMPLETE_ROWS);
        assert_eq!(coords[1].0.as_deref(), Some("旭川"));
        assert_eq!(coords[3].0.as_deref(), Some("東京"));
        assert!((coords[3].1 - 139.692).abs() < 1e-9);
        assert!((coords[3].2 - 35.690).abs() < 1e-9);
        // The row with an empty latitude is gone
        assert!(coords.iter().all(|(name, _, _)| name.as_deref() != Some("大阪")));
    }

    #[test]
    fn test_renamed_column_is_a_station_error() {
        let table = parse_first_table(STATION_HTML).unwrap();
        let config = StationConfig {
            lon_column: "longitude".to_string(),
            ..StationConfig::default()
        };
        assert!(matches!(
            station_coordinates(&table, &config),
            Err(PipelineError::Station(_))
        ));
    }

    #[test]
    fn test_non_numeric_coordinate() {
        let html = "<table><tr><th>緯度(lat)</th><th>経度(lng)</th></tr>\
                    <tr><td>north</td><td>140</td></tr></table>";
        let table = parse_first_table(html).unwrap();
        assert!(station_coordinates(&table, &StationConfig::default()).is_err());
    }

    #[test]
    fn test_labels_come_from_the_configured_set() {
        let labels: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut rng = label_rng(Some(1));
        let drawn = assign_labels(300, &labels, &mut rng);
        assert_eq!(drawn.len(), 300);
        for label in &labels {
            assert!(drawn.contains(label), "label {} never drawn", label);
        }
    }

    #[test]
    fn test_seeded_labels_repeat() {
        let config = StationConfig {
            label_seed: Some(7),
            ..StationConfig::default()
        };
        let first =
            stations_from_html(STATION_HTML, &config, &mut label_rng(config.label_seed)).unwrap();
        let second =
            stations_from_html(STATION_HTML, &config, &mut label_rng(config.label_seed)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), STATION_COMPLETE_ROWS);
    }
}
