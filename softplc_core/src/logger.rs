//! Snapshot log: one CSV row per control cycle.
//!
//! A write failure is returned to the control loop, which ends the run with
//! it; rows are flushed as they are written so a crash loses at most the row
//! in flight.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use eyre::WrapErr;
use softplc_traits::Tunings;

use crate::error::{PlcError, Result};
use crate::snapshot::OutputSnapshot;

/// Destination for the per-cycle snapshot record.
pub trait SnapshotSink {
    fn record(&mut self, snap: &OutputSnapshot) -> std::result::Result<(), PlcError>;
}

impl<T: SnapshotSink + ?Sized> SnapshotSink for Box<T> {
    fn record(&mut self, snap: &OutputSnapshot) -> std::result::Result<(), PlcError> {
        (**self).record(snap)
    }
}

/// `data_log_<unix>_P<kp>_I<ki>_D<kd>.csv`, gains in the regulator's sign.
pub fn log_file_name(unix_secs: u64, tunings: Tunings) -> String {
    format!(
        "data_log_{}_P{:.3}_I{:.3}_D{:.3}.csv",
        unix_secs, tunings.kp, tunings.ki, tunings.kd
    )
}

pub struct CsvSnapshotLog<W: Write> {
    writer: csv::Writer<W>,
    path: Option<PathBuf>,
    rows: u64,
}

impl<W: Write> core::fmt::Debug for CsvSnapshotLog<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CsvSnapshotLog")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}

impl CsvSnapshotLog<File> {
    /// Create a new log file in `dir` (created if missing), named after the
    /// current time and `tunings`.
    pub fn create_in(dir: &Path, tunings: Tunings) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("create log directory {}", dir.display()))?;
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::open(&dir.join(log_file_name(unix, tunings)), false)
    }

    /// Open `path` for writing. A continued run appends to the file and
    /// writes the header only if the file is empty; otherwise the file is
    /// truncated and starts with a header.
    pub fn open(path: &Path, continue_run: bool) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.create(true);
        if continue_run {
            opts.append(true);
        } else {
            opts.write(true).truncate(true);
        }
        let file = opts
            .open(path)
            .wrap_err_with(|| format!("open snapshot log {}", path.display()))?;
        let existing = file
            .metadata()
            .wrap_err_with(|| format!("stat snapshot log {}", path.display()))?
            .len();
        let write_header = existing == 0;
        tracing::info!(path = %path.display(), continue_run, existing_bytes = existing, "snapshot log opened");
        let mut log = Self::from_writer(file, write_header);
        log.path = Some(path.to_path_buf());
        Ok(log)
    }
}

impl<W: Write> CsvSnapshotLog<W> {
    pub fn from_writer(writer: W, write_header: bool) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(write_header)
                .from_writer(writer),
            path: None,
            rows: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> std::result::Result<W, PlcError> {
        self.writer
            .into_inner()
            .map_err(|e| PlcError::Log(e.error().to_string()))
    }
}

impl<W: Write> SnapshotSink for CsvSnapshotLog<W> {
    fn record(&mut self, snap: &OutputSnapshot) -> std::result::Result<(), PlcError> {
        self.writer
            .serialize(snap)
            .map_err(|e| PlcError::Log(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| PlcError::Log(e.to_string()))?;
        self.rows += 1;
        Ok(())
    }
}
