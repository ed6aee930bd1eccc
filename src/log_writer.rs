//! Module for appending records to date rotated log files.
//!
//! The active file is derived from the local calendar date on every append, so a long running
//! process moves to a new file after midnight without any timer or restart.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Header row written as the first line of every log file.
pub static DEFAULT_HEADER: &str =
    "timestamp,timestamp,Uid,Uid_data,G_pin,G_pin_data,SDA_pin,SDA_pin_data,\
     SCL_pin,SCL_pin_data,CO2_ppm,temperature_c,RelativeHumid,Pressure_hpa,rtc_time";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Struct modeling the parameters of the log files.
pub struct LogWriterParameters
{
    /// Directory containing all log files.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Filename that is prefixed with the date of each log file.
    #[serde(default = "default_basename")]
    pub basename: String,
    /// Header row of each new log file.
    #[serde(default = "default_header")]
    pub header: String,
    /// Flag to sync the file data to disk after each append.
    #[serde(default = "default_sync_on_append")]
    pub sync_on_append: bool,
}

fn default_directory() -> PathBuf {
    PathBuf::from("methane_data_arduino")
}

fn default_basename() -> String {
    String::from("methane_data_log.csv")
}

fn default_header() -> String {
    String::from(DEFAULT_HEADER)
}

fn default_sync_on_append() -> bool {
    true
}

impl Default for LogWriterParameters {
    fn default() -> Self {
        LogWriterParameters {
            directory: default_directory(),
            basename: default_basename(),
            header: default_header(),
            sync_on_append: default_sync_on_append(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogWriterError {
    #[error("could not create log directory '{}': {}", .path.display(), .source)]
    CreateDirectory { path: PathBuf, source: io::Error },
    #[error("could not open log file '{}': {}", .path.display(), .source)]
    OpenFile { path: PathBuf, source: io::Error },
    #[error("could not write header to '{}': {}", .path.display(), .source)]
    WriteHeader { path: PathBuf, source: io::Error },
    #[error("could not append record to '{}': {}", .path.display(), .source)]
    WriteRecord { path: PathBuf, source: io::Error },
}

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Log file that a failed write can be rolled back on.
trait LogFile: Write {
    fn len(&mut self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes `bytes` to the end of `file` completely or not at all.
///
/// On failure the file is cut back to its previous length, so a later write never continues a
/// partial line.
fn write_whole<F: LogFile>(file: &mut F, bytes: &[u8], sync: bool) -> io::Result<()> {
    let start = file.len()?;

    let written = file
        .write_all(bytes)
        .and_then(|_| file.flush())
        .and_then(|_| if sync { file.sync() } else { Ok(()) });

    if let Err(err) = written {
        if let Err(rollback) = file.truncate(start) {
            log::error!(
                target: "sensorlogd::writer",
                "Could not roll back a failed write: \'{}\'",
                rollback
            );
        }
        return Err(err);
    }
    Ok(())
}

/// Writes the header row into a file that was just created at `path`.
///
/// A file whose header could not be written is removed again so the next append recreates it.
fn create_with_header<F: LogFile>(
    path: &Path,
    mut file: F,
    header: &str,
) -> Result<F, LogWriterError> {
    let header = format!("{}\n", header);
    if let Err(source) = write_whole(&mut file, header.as_bytes(), false) {
        drop(file);
        if let Err(err) = fs::remove_file(path) {
            log::error!(
                target: "sensorlogd::writer",
                "Could not remove log file without header \'{}\': \'{}\'",
                path.display(),
                err
            );
        }
        return Err(LogWriterError::WriteHeader { path: path.to_path_buf(), source });
    }

    log::info!(target: "sensorlogd::writer", "Created new log file: \'{}\'", path.display());
    Ok(file)
}

/// Returns the filename of the log file covering `date`, e.g. `2024-03-07_methane_data_log.csv`.
pub fn date_prefixed_name(date: NaiveDate, basename: &str) -> String {
    format!("{}_{}", date.format("%Y-%m-%d"), basename)
}

/// Writer that appends records to the log file of the current day.
///
/// All appends of one writer are serialized, which keeps the existence check, the header write
/// and the record write of a single append together.
pub struct RotatingLogWriter {
    params: LogWriterParameters,
    clock: Box<dyn Clock>,
    lock: Mutex<()>,
}

impl RotatingLogWriter {
    /// Creates a writer that rotates on the system clock.
    pub fn new(params: LogWriterParameters) -> Self {
        RotatingLogWriter::with_clock(params, SystemClock)
    }

    pub fn with_clock<C: Clock + 'static>(params: LogWriterParameters, clock: C) -> Self {
        RotatingLogWriter {
            params,
            clock: Box::new(clock),
            lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.params.directory
    }

    /// Current time according to the writer's clock.
    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    /// Creates the log directory and its parents if they are missing.
    ///
    /// Calling this repeatedly is harmless; existing files are never touched. Log files themselves
    /// are created by the first append of their day.
    pub fn ensure_initialized(&self) -> Result<(), LogWriterError> {
        let directory = &self.params.directory;
        fs::create_dir_all(directory).map_err(|source| LogWriterError::CreateDirectory {
            path: directory.clone(),
            source,
        })?;
        log::debug!(
            target: "sensorlogd::writer",
            "Log directory ready: \'{}\'",
            directory.display()
        );
        Ok(())
    }

    /// Path of the log file that an append issued now would write to.
    pub fn active_file(&self) -> PathBuf {
        self.file_for(self.clock.now().date_naive())
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.params.directory.join(date_prefixed_name(date, &self.params.basename))
    }

    /// Appends one record to the log file of the current day.
    ///
    /// A file that does not exist yet is created with the header row before the record is written.
    ///
    /// # Returns
    ///
    /// * `Ok(path)` - The file the record was written to.
    ///
    /// * `Err(...)` - The file could not be opened or written. The record is lost, a partial record
    ///     line is never left behind.
    pub fn append(&self, record: &Record) -> Result<PathBuf, LogWriterError> {
        let line = format!("{}\n", record);

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.active_file();
        let mut file = self.open_or_create(&path)?;

        write_whole(&mut file, line.as_bytes(), self.params.sync_on_append)
            .map_err(|source| LogWriterError::WriteRecord { path: path.clone(), source })?;

        log::trace!(target: "sensorlogd::writer", "Appended record to \'{}\'", path.display());
        Ok(path)
    }

    fn open_or_create(&self, path: &Path) -> Result<File, LogWriterError> {
        match OpenOptions::new().append(true).create_new(true).open(path) {
            Ok(file) => create_with_header(path, file, &self.params.header),
            Err(ref err) if err.kind() == io::ErrorKind::AlreadyExists => OpenOptions::new()
                .append(true)
                .open(path)
                .map_err(|source| LogWriterError::OpenFile { path: path.to_path_buf(), source }),
            Err(source) => Err(LogWriterError::OpenFile { path: path.to_path_buf(), source }),
        }
    }
}
