//! Durable run artifacts.
//!
//! A run produces four files under the dataset root:
//!
//! - `metadata/list.txt`: one `imageId,heading,lat,lon` row per metadata
//!   response, written even when the response could not be used (id `0`)
//! - `metadataGeo.txt`: one `imageId.jpg,lat,lon,alt,time` row per newly
//!   discovered image, after an `image,lat,long,alt,time` header
//! - `missingTiles.txt`: one directory per image found incomplete
//! - `errors.txt`: free-text, timestamped error lines
//!
//! The metadata index and geolocation log of a previous run are moved under
//! `metadata/old/` (named after their modification time) before new ones are
//! started. The missing-tiles report is truncated; the errors log is
//! appended to.
//!
//! Every writer sits behind its own mutex and is flushed after each row, so
//! rows from concurrent tasks never interleave and survive an interrupt.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{info, warn};

use crate::crawler::{GridCell, MetadataRecord};
use crate::layout::DatasetLayout;

/// Header row of the geolocation log.
pub const GEOLOCATION_HEADER: [&str; 5] = ["image", "lat", "long", "alt", "time"];

const INDEX_ARCHIVE_FORMAT: &str = "%Y-%m-%d %H-%M";
const GEOLOCATION_ARCHIVE_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Errors opening or rotating run artifacts.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to archive {path}: {source}")]
    Rotate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

struct MissingTilesReport {
    writer: BufWriter<File>,
    listed: HashSet<PathBuf>,
}

/// Writers for every run artifact.
pub struct RunReports {
    layout: DatasetLayout,
    metadata_index: Option<Mutex<csv::Writer<File>>>,
    geolocation: Option<Mutex<csv::Writer<File>>>,
    missing_tiles: Mutex<MissingTilesReport>,
    errors: Mutex<BufWriter<File>>,
}

impl RunReports {
    /// Opens every artifact for a crawling run, rotating previous ones.
    pub fn open(layout: &DatasetLayout) -> Result<Self, ReportError> {
        archive_previous(
            &layout.metadata_index_path(),
            &layout.metadata_index_archive_dir(),
            INDEX_ARCHIVE_FORMAT,
        )?;
        archive_previous(
            &layout.geolocation_log_path(),
            &layout.geolocation_archive_dir(),
            GEOLOCATION_ARCHIVE_FORMAT,
        )?;

        let index_path = layout.metadata_index_path();
        let metadata_index = csv_writer(create(&index_path)?);

        let geo_path = layout.geolocation_log_path();
        let mut geolocation = csv_writer(create(&geo_path)?);
        geolocation
            .write_record(GEOLOCATION_HEADER)
            .and_then(|_| geolocation.flush().map_err(csv::Error::from))
            .map_err(|e| ReportError::Write {
                path: geo_path,
                source: io::Error::other(e),
            })?;

        let mut reports = Self::open_sweep_only(layout)?;
        reports.metadata_index = Some(Mutex::new(metadata_index));
        reports.geolocation = Some(Mutex::new(geolocation));
        Ok(reports)
    }

    /// Opens only the missing-tiles report and errors log.
    ///
    /// Used when no metadata is crawled, so the previous run's metadata index
    /// and geolocation log are left where they are.
    pub fn open_sweep_only(layout: &DatasetLayout) -> Result<Self, ReportError> {
        let missing = create(&layout.missing_tiles_path())?;

        let errors_path = layout.errors_log_path();
        let errors = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&errors_path)
            .map_err(|source| ReportError::Open {
                path: errors_path,
                source,
            })?;

        Ok(Self {
            layout: layout.clone(),
            metadata_index: None,
            geolocation: None,
            missing_tiles: Mutex::new(MissingTilesReport {
                writer: BufWriter::new(missing),
                listed: HashSet::new(),
            }),
            errors: Mutex::new(BufWriter::new(errors)),
        })
    }

    /// Appends one row to the metadata index.
    ///
    /// `image_id` is `0` when the response could not be used.
    pub fn record_metadata(&self, image_id: u64, cell: &GridCell) {
        let Some(index) = &self.metadata_index else {
            return;
        };
        let mut writer = index.lock().unwrap_or_else(|e| e.into_inner());
        let row = [
            image_id.to_string(),
            cell.heading.to_string(),
            format!("{:.6}", cell.lat),
            format!("{:.6}", cell.lon),
        ];
        if let Err(e) = writer.write_record(&row).and_then(|_| Ok(writer.flush()?)) {
            warn!(error = %e, "Failed to append to metadata index");
        }
    }

    /// Appends one row to the geolocation log.
    pub fn record_geolocation(&self, record: &MetadataRecord) {
        let Some(log) = &self.geolocation else {
            return;
        };
        let mut writer = log.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer
            .write_record(record.geolocation_row())
            .and_then(|_| Ok(writer.flush()?))
        {
            warn!(image_id = record.image_id, error = %e, "Failed to append to geolocation log");
        }
    }

    /// Lists an incomplete image directory. Returns `false` if it was
    /// already listed during this run.
    pub fn record_missing_tiles(&self, dir: &Path) -> bool {
        let mut report = self.missing_tiles.lock().unwrap_or_else(|e| e.into_inner());
        if !report.listed.insert(dir.to_path_buf()) {
            return false;
        }
        let line = format!("{}\n", dir.display());
        if let Err(e) = report
            .writer
            .write_all(line.as_bytes())
            .and_then(|_| report.writer.flush())
        {
            warn!(dir = %dir.display(), error = %e, "Failed to append to missing-tiles report");
        }
        true
    }

    /// Appends a timestamped line to the errors log.
    pub fn record_error(&self, context: &str, error: &dyn std::fmt::Display) {
        let line = format!(
            "{} {}: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            context,
            error
        );
        let mut writer = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.write_all(line.as_bytes()).and_then(|_| writer.flush()) {
            warn!(error = %e, "Failed to append to errors log");
        }
    }

    /// The dataset layout these reports live in.
    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }
}

impl std::fmt::Debug for RunReports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunReports")
            .field("root", &self.layout.root())
            .field("crawling", &self.metadata_index.is_some())
            .finish()
    }
}

fn csv_writer(file: File) -> csv::Writer<File> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(file)
}

fn create(path: &Path) -> Result<File, ReportError> {
    File::create(path).map_err(|source| ReportError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Moves `path` into `archive_dir`, named after its modification time.
fn archive_previous(path: &Path, archive_dir: &Path, format: &str) -> Result<(), ReportError> {
    let modified = match std::fs::metadata(path) {
        Ok(meta) => meta.modified().unwrap_or_else(|_| std::time::SystemTime::now()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ReportError::Rotate {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let stamp = DateTime::<Local>::from(modified).format(format).to_string();
    let rotate_err = |source| ReportError::Rotate {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(archive_dir).map_err(rotate_err)?;

    let mut target = archive_dir.join(format!("{}.txt", stamp));
    let mut suffix = 1;
    while target.exists() {
        target = archive_dir.join(format!("{} ({}).txt", stamp, suffix));
        suffix += 1;
    }

    std::fs::rename(path, &target).map_err(rotate_err)?;
    info!(from = %path.display(), to = %target.display(), "Archived previous run artifact");
    Ok(())
}
