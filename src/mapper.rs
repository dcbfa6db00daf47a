//! Piece ↔ file spanning calculations.
//!
//! A piece is a slice of the torrent's logical byte stream, and that stream
//! is the concatenation of its files, so one piece can cover several files
//! and one file several pieces. A [`SpanningEntry`] describes one contiguous
//! overlap. Results are ascending, non-overlapping and cover the requested
//! range exactly; zero-length files never produce entries.

use std::ops::Range;

use crate::metainfo::{MetainfoError, Torrent};

/// One contiguous overlap between a piece and a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanningEntry {
    pub piece: u32,
    pub file: usize,
    /// Offset of the overlap within the file.
    pub file_offset: u64,
    /// Offset of the overlap within the piece.
    pub piece_offset: u64,
    pub length: u64,
}

/// Files covered by `length` bytes of `piece` starting at `offset`.
pub fn spanning_files_for_piece(
    torrent: &Torrent,
    piece: u32,
    offset: u64,
    length: u64,
) -> Result<Vec<SpanningEntry>, MetainfoError> {
    let range = torrent.piece_range(piece)?;
    let piece_size = range.end - range.start;
    let end = offset.checked_add(length).filter(|&end| end <= piece_size).ok_or(
        MetainfoError::RangeOutOfBounds {
            start: offset,
            end: offset.saturating_add(length),
            limit: piece_size,
        },
    )?;

    let abs_start = range.start + offset;
    let abs_end = range.start + end;
    let files = torrent.files();
    let first = files.partition_point(|f| f.end() <= abs_start);

    let mut entries = Vec::new();
    let mut cursor = abs_start;
    for file in &files[first..] {
        if cursor >= abs_end {
            break;
        }
        if file.length == 0 {
            continue;
        }
        let take = file.end().min(abs_end) - cursor;
        entries.push(SpanningEntry {
            piece,
            file: file.index,
            file_offset: cursor - file.offset,
            piece_offset: cursor - range.start,
            length: take,
        });
        cursor += take;
    }
    Ok(entries)
}

/// Files covered by an entire piece.
pub fn piece_spans(torrent: &Torrent, piece: u32) -> Result<Vec<SpanningEntry>, MetainfoError> {
    let size = torrent.piece_size(piece)?;
    spanning_files_for_piece(torrent, piece, 0, size)
}

/// Pieces covering `range` (file-relative) of file `file`.
pub fn spanning_pieces_for_file(
    torrent: &Torrent,
    file: usize,
    range: Range<u64>,
) -> Result<Vec<SpanningEntry>, MetainfoError> {
    let entry = torrent.file(file)?;
    if range.start > range.end || range.end > entry.length {
        return Err(MetainfoError::RangeOutOfBounds {
            start: range.start,
            end: range.end,
            limit: entry.length,
        });
    }
    if range.is_empty() {
        return Ok(Vec::new());
    }

    let piece_length = torrent.piece_length();
    let abs_start = entry.offset + range.start;
    let abs_end = entry.offset + range.end;
    let first = (abs_start / piece_length) as u32;
    let last = ((abs_end - 1) / piece_length) as u32;

    let mut entries = Vec::with_capacity((last - first + 1) as usize);
    for piece in first..=last {
        let piece_range = torrent.piece_range(piece)?;
        let start = abs_start.max(piece_range.start);
        let end = abs_end.min(piece_range.end);
        entries.push(SpanningEntry {
            piece,
            file,
            file_offset: start - entry.offset,
            piece_offset: start - piece_range.start,
            length: end - start,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::InfoHash;

    fn torrent(piece_length: u64, sizes: &[u64]) -> Torrent {
        let total: u64 = sizes.iter().sum();
        let files = sizes
            .iter()
            .enumerate()
            .map(|(i, &len)| (vec![format!("f{i}")], len))
            .collect();
        let pieces = total.div_ceil(piece_length) as usize;
        Torrent::new(InfoHash([0; 20]), "t".into(), piece_length, files, vec![[0; 20]; pieces])
            .unwrap()
    }

    /// Logical byte `i` of the torrent, stored per file.
    fn file_bytes(t: &Torrent) -> Vec<Vec<u8>> {
        t.files()
            .iter()
            .map(|f| (f.offset..f.end()).map(|i| (i % 251) as u8).collect())
            .collect()
    }

    #[test]
    fn test_single_file_piece() {
        let t = torrent(16, &[40]);
        let spans = piece_spans(&t, 2).unwrap();
        assert_eq!(
            spans,
            vec![SpanningEntry {
                piece: 2,
                file: 0,
                file_offset: 32,
                piece_offset: 0,
                length: 8
            }]
        );
    }

    #[test]
    fn test_piece_crossing_files() {
        let t = torrent(16, &[10, 3, 20]);
        let spans = piece_spans(&t, 0).unwrap();
        let shape: Vec<_> = spans
            .iter()
            .map(|s| (s.file, s.file_offset, s.piece_offset, s.length))
            .collect();
        assert_eq!(shape, vec![(0, 0, 0, 10), (1, 0, 10, 3), (2, 0, 13, 3)]);
    }

    #[test]
    fn test_zero_length_files_skipped() {
        let t = torrent(8, &[4, 0, 0, 4]);
        let spans = piece_spans(&t, 0).unwrap();
        assert_eq!(spans.iter().map(|s| s.file).collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_sub_range_of_piece() {
        let t = torrent(16, &[10, 30]);
        let spans = spanning_files_for_piece(&t, 0, 8, 4).unwrap();
        let shape: Vec<_> = spans.iter().map(|s| (s.file, s.file_offset, s.length)).collect();
        assert_eq!(shape, vec![(0, 8, 2), (1, 0, 2)]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let t = torrent(16, &[40]);
        assert!(matches!(
            piece_spans(&t, 3),
            Err(MetainfoError::PieceOutOfRange { .. })
        ));
        assert!(matches!(
            spanning_files_for_piece(&t, 2, 4, 5),
            Err(MetainfoError::RangeOutOfBounds { .. })
        ));
        assert!(spanning_pieces_for_file(&t, 1, 0..1).is_err());
    }

    #[test]
    fn test_spans_cover_every_sub_range() {
        let t = torrent(7, &[5, 0, 9, 1, 12]);
        let data = file_bytes(&t);

        for piece in 0..t.piece_count() as u32 {
            let range = t.piece_range(piece).unwrap();
            let size = range.end - range.start;
            for offset in 0..=size {
                for length in 0..=(size - offset) {
                    let spans = spanning_files_for_piece(&t, piece, offset, length).unwrap();
                    assert_eq!(spans.iter().map(|s| s.length).sum::<u64>(), length);

                    let mut expected_piece_offset = offset;
                    let mut rebuilt = Vec::new();
                    for s in &spans {
                        assert!(s.length > 0);
                        assert_eq!(s.piece_offset, expected_piece_offset);
                        expected_piece_offset += s.length;
                        let file = &data[s.file];
                        rebuilt.extend_from_slice(
                            &file[s.file_offset as usize..(s.file_offset + s.length) as usize],
                        );
                    }
                    let start = range.start + offset;
                    let original: Vec<u8> =
                        (start..start + length).map(|i| (i % 251) as u8).collect();
                    assert_eq!(rebuilt, original);
                }
            }
        }
    }

    #[test]
    fn test_pieces_for_file_inverse() {
        let t = torrent(8, &[5, 20, 3]);
        let spans = spanning_pieces_for_file(&t, 1, 0..20).unwrap();
        let shape: Vec<_> = spans
            .iter()
            .map(|s| (s.piece, s.file_offset, s.piece_offset, s.length))
            .collect();
        assert_eq!(shape, vec![(0, 0, 5, 3), (1, 3, 0, 8), (2, 11, 0, 8), (3, 19, 0, 1)]);

        for s in &spans {
            let forward = spanning_files_for_piece(&t, s.piece, s.piece_offset, s.length).unwrap();
            assert_eq!(forward, vec![*s]);
        }
    }

    #[test]
    fn test_empty_file_range() {
        let t = torrent(8, &[5, 20]);
        assert!(spanning_pieces_for_file(&t, 1, 4..4).unwrap().is_empty());
    }
}
