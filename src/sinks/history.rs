//! Append-only CSV history log.
//!
//! One row per completed smoothing cycle: `time,ppm,temp,humidity`, with only the
//! column for the recorded metric filled. The header is written when the file is
//! created; restarts append to the existing file.

use std::{
    fs::{create_dir_all, File, OpenOptions},
    path::{Path, PathBuf},
};

use csv::{Writer, WriterBuilder};
use log::info;

use crate::error::SinkError;
use crate::sinks::{HistoryEntry, HistorySink};

pub struct CsvHistory {
    path: PathBuf,
    writer: Writer<File>,
}

impl CsvHistory {
    /// Open (or create) `<dir>/<name>_history.csv`.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self, SinkError> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        let path = dir.join(history_file_name(name));
        Self::open_path(path)
    }

    pub fn open_path(path: PathBuf) -> Result<Self, SinkError> {
        let file_exists = path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        info!("[History] logging to {:?}", path);
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySink for CsvHistory {
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError> {
        self.writer.serialize(entry)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn history_file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{}_history.csv", stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_once_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut h = CsvHistory::open(dir.path(), "Living Room").unwrap();
            h.add_entry(&HistoryEntry {
                time: 100,
                ppm: Some(470.0),
                ..HistoryEntry::default()
            })
            .unwrap();
        }
        {
            let mut h = CsvHistory::open(dir.path(), "Living Room").unwrap();
            h.add_entry(&HistoryEntry {
                time: 130,
                temp: Some(18.5),
                ..HistoryEntry::default()
            })
            .unwrap();
        }

        let content =
            std::fs::read_to_string(dir.path().join("living_room_history.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["time,ppm,temp,humidity", "100,470.0,,", "130,,18.5,"]);
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let h = CsvHistory::open(&nested, "PMS7003").unwrap();
        assert!(h.path().starts_with(&nested));
        assert!(h.path().exists());
    }
}
