use std::ops::Range;

use parking_lot::RwLock;
use sha1::{Digest, Sha1};

use super::error::MetainfoError;
use super::file::{FileEntry, FilePriority};
use super::info_hash::InfoHash;
use super::piece::Piece;
use crate::bencode::{decode, raw_dict_entry, Value};
use crate::mapper::spanning_pieces_for_file;
use crate::peer::Bitfield;

/// A torrent whose metadata is known.
///
/// # Examples
///
/// ```
/// use btcore::metainfo::{InfoHash, Torrent};
///
/// let torrent = Torrent::new(
///     InfoHash([7; 20]),
///     "album".into(),
///     16384,
///     vec![
///         (vec!["album".into(), "a.flac".into()], 20000),
///         (vec!["album".into(), "b.flac".into()], 12768),
///     ],
///     vec![[0; 20]; 2],
/// )
/// .unwrap();
///
/// assert_eq!(torrent.piece_count(), 2);
/// assert_eq!(torrent.files()[1].offset, 20000);
/// ```
#[derive(Debug)]
pub struct Torrent {
    info_hash: InfoHash,
    name: String,
    piece_length: u64,
    total_length: u64,
    files: Vec<FileEntry>,
    piece_hashes: Vec<[u8; 20]>,
    trackers: Vec<String>,
    bitfield: RwLock<Bitfield>,
    priorities: RwLock<Vec<FilePriority>>,
}

impl Torrent {
    /// Builds a torrent from its parts; file offsets are assigned in order.
    pub fn new(
        info_hash: InfoHash,
        name: String,
        piece_length: u64,
        files: Vec<(Vec<String>, u64)>,
        piece_hashes: Vec<[u8; 20]>,
    ) -> Result<Self, MetainfoError> {
        if piece_length == 0 {
            return Err(MetainfoError::InvalidField("piece length"));
        }

        let mut offset = 0u64;
        let mut entries = Vec::with_capacity(files.len());
        for (index, (path, length)) in files.into_iter().enumerate() {
            validate_path(&path)?;
            entries.push(FileEntry {
                index,
                path,
                length,
                offset,
            });
            offset += length;
        }

        let expected = offset.div_ceil(piece_length) as usize;
        if piece_hashes.len() != expected {
            return Err(MetainfoError::PieceCountMismatch {
                expected,
                found: piece_hashes.len(),
            });
        }

        let file_count = entries.len();
        Ok(Self {
            info_hash,
            name,
            piece_length,
            total_length: offset,
            files: entries,
            bitfield: RwLock::new(Bitfield::new(expected)),
            piece_hashes,
            trackers: Vec::new(),
            priorities: RwLock::new(vec![FilePriority::Normal; file_count]),
        })
    }

    pub fn with_trackers(mut self, trackers: Vec<String>) -> Self {
        self.trackers = trackers;
        self
    }

    /// Parses a v1 `.torrent` file.
    ///
    /// The info hash is the SHA-1 of the `info` value exactly as it appears
    /// in `data`.
    pub fn from_metainfo(data: &[u8]) -> Result<Self, MetainfoError> {
        let root = decode(data)?;
        let raw_info = raw_dict_entry(data, b"info")?.ok_or(MetainfoError::MissingField("info"))?;
        let info_hash = InfoHash::from_bytes(&Sha1::digest(raw_info))?;

        let info = root.get(b"info").ok_or(MetainfoError::MissingField("info"))?;
        let name = info
            .get(b"name")
            .and_then(Value::as_str)
            .ok_or(MetainfoError::MissingField("name"))?
            .to_string();

        let piece_length = info
            .get(b"piece length")
            .and_then(Value::as_integer)
            .filter(|&len| len > 0)
            .ok_or(MetainfoError::InvalidField("piece length"))? as u64;

        let pieces = info
            .get(b"pieces")
            .and_then(Value::as_bytes)
            .ok_or(MetainfoError::MissingField("pieces"))?;
        if pieces.len() % 20 != 0 {
            return Err(MetainfoError::InvalidField("pieces"));
        }
        let piece_hashes = pieces
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let files = match info.get(b"length").and_then(Value::as_integer) {
            Some(length) if length >= 0 => vec![(vec![name.clone()], length as u64)],
            Some(_) => return Err(MetainfoError::InvalidField("length")),
            None => parse_file_list(&name, info)?,
        };

        let trackers = parse_trackers(&root);
        Ok(Self::new(info_hash, name, piece_length, files, piece_hashes)?.with_trackers(trackers))
    }

    pub fn info_hash(&self) -> &InfoHash {
        &self.info_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn file(&self, index: usize) -> Result<&FileEntry, MetainfoError> {
        self.files.get(index).ok_or(MetainfoError::FileOutOfRange {
            index,
            count: self.files.len(),
        })
    }

    pub fn trackers(&self) -> &[String] {
        &self.trackers
    }

    pub fn piece_count(&self) -> usize {
        self.piece_hashes.len()
    }

    fn check_piece(&self, index: u32) -> Result<(), MetainfoError> {
        if (index as usize) < self.piece_count() {
            Ok(())
        } else {
            Err(MetainfoError::PieceOutOfRange {
                index,
                count: self.piece_count(),
            })
        }
    }

    /// Absolute byte range of a piece; the last piece may be short.
    pub fn piece_range(&self, index: u32) -> Result<Range<u64>, MetainfoError> {
        self.check_piece(index)?;
        let start = index as u64 * self.piece_length;
        let end = (start + self.piece_length).min(self.total_length);
        Ok(start..end)
    }

    pub fn piece_size(&self, index: u32) -> Result<u64, MetainfoError> {
        self.piece_range(index).map(|r| r.end - r.start)
    }

    /// The piece at `index`, `OnDiskVerified` if the bitfield has it and
    /// `Missing` otherwise.
    pub fn piece(&self, index: u32) -> Result<Piece, MetainfoError> {
        let range = self.piece_range(index)?;
        let piece = Piece::new(index, range.start, range.end - range.start);
        Ok(if self.has_piece(index) {
            piece.on_disk()
        } else {
            piece
        })
    }

    pub fn piece_hash(&self, index: u32) -> Result<&[u8; 20], MetainfoError> {
        self.check_piece(index)?;
        Ok(&self.piece_hashes[index as usize])
    }

    pub fn file_priority(&self, index: usize) -> FilePriority {
        self.priorities
            .read()
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_file_priority(&self, index: usize, priority: FilePriority) -> Result<(), MetainfoError> {
        let mut priorities = self.priorities.write();
        let count = priorities.len();
        let slot = priorities
            .get_mut(index)
            .ok_or(MetainfoError::FileOutOfRange { index, count })?;
        *slot = priority;
        Ok(())
    }

    pub fn bitfield(&self) -> Bitfield {
        self.bitfield.read().clone()
    }

    pub fn has_piece(&self, index: u32) -> bool {
        self.bitfield.read().has_piece(index as usize)
    }

    pub fn mark_verified(&self, index: u32) -> Result<(), MetainfoError> {
        self.check_piece(index)?;
        self.bitfield.write().set_piece(index as usize);
        Ok(())
    }

    pub fn clear_verified(&self, index: u32) {
        self.bitfield.write().clear_piece(index as usize);
    }

    /// Fraction of pieces verified on disk, in `0.0..=1.0`.
    pub fn piece_progress(&self) -> f64 {
        if self.piece_count() == 0 {
            return 1.0;
        }
        self.bitfield.read().count() as f64 / self.piece_count() as f64
    }

    /// Fraction of a file's bytes that lie in verified pieces.
    pub fn file_progress(&self, index: usize) -> Result<f64, MetainfoError> {
        let file = self.file(index)?;
        if file.length == 0 {
            return Ok(1.0);
        }
        let bitfield = self.bitfield.read();
        let done: u64 = spanning_pieces_for_file(self, index, 0..file.length)?
            .iter()
            .filter(|entry| bitfield.has_piece(entry.piece as usize))
            .map(|entry| entry.length)
            .sum();
        Ok(done as f64 / file.length as f64)
    }
}

fn validate_path(path: &[String]) -> Result<(), MetainfoError> {
    let unsafe_segment = |s: &String| {
        s.is_empty() || s == "." || s == ".." || s.contains('/') || s.contains('\\') || s.contains(':')
    };
    if path.is_empty() || path.iter().any(unsafe_segment) {
        return Err(MetainfoError::UnsafePath(path.join("/")));
    }
    Ok(())
}

fn parse_file_list(name: &str, info: &Value) -> Result<Vec<(Vec<String>, u64)>, MetainfoError> {
    let list = info
        .get(b"files")
        .and_then(Value::as_list)
        .ok_or(MetainfoError::MissingField("files"))?;

    list.iter()
        .map(|file| {
            let length = file
                .get(b"length")
                .and_then(Value::as_integer)
                .filter(|&len| len >= 0)
                .ok_or(MetainfoError::InvalidField("files.length"))?;
            let segments = file
                .get(b"path")
                .and_then(Value::as_list)
                .ok_or(MetainfoError::MissingField("files.path"))?;

            let mut path = vec![name.to_string()];
            for segment in segments {
                let segment = segment
                    .as_str()
                    .ok_or(MetainfoError::InvalidField("files.path"))?;
                path.push(segment.to_string());
            }
            Ok((path, length as u64))
        })
        .collect()
}

fn parse_trackers(root: &Value) -> Vec<String> {
    let mut trackers: Vec<String> = Vec::new();
    let announce = root.get(b"announce").and_then(Value::as_str);
    let tiers = root
        .get(b"announce-list")
        .and_then(Value::as_list)
        .unwrap_or_default();

    let tiered = tiers
        .iter()
        .filter_map(Value::as_list)
        .flatten()
        .filter_map(Value::as_str);

    for url in announce.into_iter().chain(tiered) {
        if !trackers.iter().any(|t| t == url) {
            trackers.push(url.to_string());
        }
    }
    trackers
}
