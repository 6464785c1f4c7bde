use crate::write_output_file;
use anyhow::{Context, Result};
use csv::Writer;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use stock_screen::model::View;
use stock_screen::state::{DashboardState, RankedView, Resource};
use tracing::info;

#[derive(Debug, Serialize)]
struct CsvRecord<'a> {
    view: View,
    position: usize,
    ts_code: &'a str,
    name: &'a str,
    current_price: Option<f64>,
    reference_price: Option<f64>,
    deviation: Option<f64>,
    deviation_percent: Option<f64>,
}

/// Write every ready view to `path`, gzip-compressed when `archive` is set.
/// Returns the path actually written.
pub async fn save_screening_csv(
    path: &Path,
    state: &DashboardState,
    archive: bool,
) -> Result<PathBuf> {
    let ranked: Vec<&RankedView> = state
        .views()
        .filter_map(|(_, view)| match view.list.resource() {
            Resource::Ready(ranked) => Some(ranked),
            _ => None,
        })
        .collect();
    let serialized = serialize_ranked(&ranked)?;
    let (target, bytes) = if archive {
        (archive_path(path), gzip(&serialized)?)
    } else {
        (path.to_path_buf(), serialized)
    };
    write_output_file(&target, &bytes).await?;
    info!(path = %target.display(), rows = ranked.iter().map(|view| view.len()).sum::<usize>(), "saved screening csv");
    Ok(target)
}

fn serialize_ranked(views: &[&RankedView]) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    for ranked in views {
        for (idx, derived) in ranked.records.iter().enumerate() {
            let record = &derived.record;
            writer
                .serialize(CsvRecord {
                    view: ranked.view,
                    position: idx + 1,
                    ts_code: record.ts_code(),
                    name: record.name(),
                    current_price: record.current_price(),
                    reference_price: record.reference_price(),
                    deviation: derived.deviation,
                    deviation_percent: derived.deviation_percent,
                })
                .context("failed to serialize screening record")?;
        }
    }
    finalize_writer(writer, "screening CSV writer")
}

fn finalize_writer(mut writer: Writer<Vec<u8>>, label: &str) -> Result<Vec<u8>> {
    writer
        .flush()
        .with_context(|| format!("failed to flush {label}"))?;
    writer
        .into_inner()
        .with_context(|| format!("failed to finalize {label}"))
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .context("failed to compress CSV output")?;
    encoder.finish().context("failed to finish CSV archive")
}

fn archive_path(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz")) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(".gz");
    PathBuf::from(name)
}
