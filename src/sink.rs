//! The append-only document sink behind `--record_doc_path`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Appends received document bodies to a file, one write per body.
///
/// Write failures are logged and swallowed: the printer acknowledges the
/// transfer either way, the same as real hardware that ran out of paper
/// would keep talking USB.
#[derive(Debug, Clone)]
pub struct DocumentSink {
    path: PathBuf,
}

impl DocumentSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, data: &[u8]) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(data));
        match result {
            Ok(()) => log::info!("recorded {} document bytes", data.len()),
            Err(e) => log::error!("failed to record document to {:?}: {}", self.path, e),
        }
    }
}
