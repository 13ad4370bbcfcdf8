//! # Sighting Conversion
//!
//! Offline preparation of seed data from the geocoded BFRO report export.
//!
//! ## Views
//!
//! Every CSV row is coerced once into a canonical [`models::Sighting`], then
//! written out three times, one file per view:
//!
//! - **index** (`index/*.index.json`): identity, text, tags and the composite
//!   `"lon,lat"` location. For stores that index flat, manually declared fields.
//! - **json** (`json/*.json`): everything, weather included. `location` uses
//!   whatever [`models::LocationFormat`] the deployment picked.
//! - **point** (`point/*.point.json`): same as json but `location` is always a
//!   `{ longitude, latitude }` object, for native point/radius queries.
//!
//! ## Coercion
//!
//! - Empty cells never reach a file. No `null`, no `""`, no zero.
//! - Floats are rounded to 5 decimal places, integers use leading digits.
//! - Unparsable dates and numbers become absent instead of failing the row.
//! - `temperature` is always written, possibly as `{}`.
//!
//! ## Failures
//!
//! Each row and each view is independent. A failed write is logged and counted,
//! the batch keeps going. Only an unreadable input or an uncreatable output
//! directory stops the run.
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod models;
pub mod utils;

use models::{LocationFormat, RawRow, Sighting, View};
use utils::to_sighting;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to open {path}: {source}")]
    Input { path: PathBuf, source: csv::Error },

    #[error("Failed to create {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize sighting {id}: {source}")]
    Serialize {
        id: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub rows: usize,
    pub skipped: usize,
    pub written: usize,
    pub failed: usize,
}

pub fn convert(
    input: &Path,
    output: &Path,
    format: LocationFormat,
) -> Result<Summary, ConvertError> {
    let mut reader = csv::Reader::from_path(input).map_err(|source| ConvertError::Input {
        path: input.to_path_buf(),
        source,
    })?;

    create_directories(output)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} rows {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut summary = Summary::default();

    for (line, result) in reader.deserialize::<RawRow>().enumerate() {
        summary.rows += 1;
        pb.inc(1);

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(line, error = %e, "Skipping unreadable row");
                summary.skipped += 1;
                continue;
            }
        };

        let Some(sighting) = to_sighting(&row) else {
            warn!(line, number = %row.number, "Skipping row without a report number");
            summary.skipped += 1;
            continue;
        };

        pb.set_message(format!("report {}", sighting.id));

        for (view, result) in write_views(&sighting, output, format) {
            match result {
                Ok(()) => summary.written += 1,
                Err(e) => {
                    error!(id = %sighting.id, ?view, error = %e, "Failed to write view");
                    summary.failed += 1;
                }
            }
        }
    }

    pb.finish_with_message("Done");

    info!(
        rows = summary.rows,
        written = summary.written,
        skipped = summary.skipped,
        failed = summary.failed,
        "Conversion finished"
    );

    Ok(summary)
}

fn create_directories(output: &Path) -> Result<(), ConvertError> {
    for view in View::ALL {
        let path = output.join(view.directory());

        fs::create_dir_all(&path).map_err(|source| ConvertError::Output { path, source })?;
    }

    Ok(())
}

/// One write per view. A failure in one view does not stop the others.
pub fn write_views(
    sighting: &Sighting,
    output: &Path,
    format: LocationFormat,
) -> Vec<(View, Result<(), ConvertError>)> {
    View::ALL
        .into_iter()
        .map(|view| {
            let path = output
                .join(view.directory())
                .join(view.file_name(&sighting.id));

            let result = match view {
                View::Index => write_json(&path, &sighting.id, &sighting.index_view()),
                View::Full => write_json(&path, &sighting.id, &sighting.document_view(format)),
                View::Point => write_json(
                    &path,
                    &sighting.id,
                    &sighting.document_view(LocationFormat::Point),
                ),
            };

            (view, result)
        })
        .collect()
}

fn write_json<T: Serialize>(path: &Path, id: &str, value: &T) -> Result<(), ConvertError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ConvertError::Serialize {
        id: id.to_string(),
        source,
    })?;

    #[cfg(feature = "verbose")]
    println!("Writing {}", path.display());

    fs::write(path, json).map_err(|source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    })
}
