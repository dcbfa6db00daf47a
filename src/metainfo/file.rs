use std::ops::Range;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilePriority {
    /// Never written; bytes destined for it are dropped.
    Skip,
    #[default]
    Normal,
}

/// One file of a torrent, positioned in the torrent's logical byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub index: usize,
    /// Path segments relative to the torrent's storage root.
    pub path: Vec<String>,
    pub length: u64,
    /// Absolute offset of the file's first byte in the torrent.
    pub offset: u64,
}

impl FileEntry {
    pub fn start(&self) -> u64 {
        self.offset
    }

    /// One past the file's last absolute byte.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn byte_range(&self) -> Range<u64> {
        self.start()..self.end()
    }

    pub fn relative_path(&self) -> PathBuf {
        self.path.iter().collect()
    }
}
