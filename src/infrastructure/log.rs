//! Session capture log: a byte-level record of everything the session
//! printed, plus timestamp prefixes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::error::{TermLinkError, TermLinkResult};

#[derive(Debug)]
pub struct SessionLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl SessionLog {
    pub fn create(path: &Path) -> TermLinkResult<Self> {
        let file = File::create(path).map_err(|err| {
            TermLinkError::Log(format!("could not open log file {}: {err}", path.display()))
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn putc(&mut self, byte: u8) {
        let _ = self.writer.write_all(&[byte]);
    }

    pub fn puts(&mut self, text: &str) {
        let _ = self.writer.write_all(text.as_bytes());
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
