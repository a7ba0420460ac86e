//! File logging
//!
//! A size-capped log file for the JSON tracing layer. When the active file
//! would grow past its cap it is shifted to `<name>.1`, older backups move
//! up one index, and the oldest beyond the retention count is removed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Size at which the active file is rotated (10MB)
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated backups kept next to the active file
pub const DEFAULT_BACKUPS: usize = 5;

/// Shared handle to a rotating log file
///
/// Clones write to the same file, so one handle can serve as a
/// `MakeWriter` for the whole subscriber.
#[derive(Debug, Clone)]
pub struct RotatingLogFile {
    inner: Arc<Mutex<LogFileState>>,
}

#[derive(Debug)]
struct LogFileState {
    path: PathBuf,
    file_name: String,
    file: File,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl RotatingLogFile {
    /// Open (or create) `path`, rotating once it would exceed `max_bytes`
    /// and keeping at most `backups` rotated files
    pub fn open(path: impl AsRef<Path>, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("log path has no file name: {}", path.display()),
                )
            })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let file = open_append(&path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(LogFileState {
                path,
                file_name,
                file,
                written,
                max_bytes,
                backups,
            })),
        })
    }

    /// Open with the default 10MB cap and five backups
    pub fn with_defaults(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::open(path, DEFAULT_MAX_BYTES, DEFAULT_BACKUPS)
    }

    fn state(&self) -> MutexGuard<'_, LogFileState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogFileState {
    fn backup_path(&self, index: usize) -> PathBuf {
        self.path.with_file_name(format!("{}.{}", self.file_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backups);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_append(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();

        if state.written > 0 && state.written + buf.len() as u64 > state.max_bytes {
            state.rotate()?;
        }

        let written = state.file.write(buf)?;
        state.written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state().file.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RotatingLogFile {
    type Writer = RotatingLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
