//! Splitting a seekable, newline-delimited CSV/TSV file into contiguous,
//! line-aligned byte ranges for parallel ingestion (§4.3).

use crate::error::ImportError;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// One contiguous, line-aligned byte range of the source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileChunk {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl FileChunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits `file` into line-aligned chunks (never inside a quoted field
/// containing a newline). `data_start` is the byte offset of the first data
/// row (past any header line already consumed by the caller).
///
/// The split count follows §4.3 step 4's formula,
/// `min(max_threads, remaining / bytes_per_request + 1)`, so a small file
/// isn't sliced into more chunks than it has `bytes_per_request`-sized
/// pieces to offer, and never more than `max_threads` regardless. Falls back
/// to a single chunk covering the whole file when the computed chunk size is
/// zero, or when splitting would cross a quoted newline near a candidate
/// boundary.
pub fn build_chunks(
    file: &mut File,
    data_start: u64,
    max_threads: u32,
    bytes_per_request: u64,
) -> Result<Vec<FileChunk>, ImportError> {
    let file_len = file.metadata()?.len();
    if file_len <= data_start {
        return Ok(vec![FileChunk { index: 0, start: data_start, end: data_start }]);
    }

    let max_threads = max_threads.max(1) as u64;
    let bytes_per_request = bytes_per_request.max(1);
    let remaining = file_len - data_start;
    let mut split_count = max_threads.min(remaining / bytes_per_request + 1).max(1);
    let mut chunk_size = remaining / split_count;
    if chunk_size == 0 {
        split_count = 1;
        chunk_size = remaining;
    }

    let mut boundaries = vec![data_start];
    let mut cursor = data_start;
    for _ in 1..split_count {
        let candidate = (cursor + chunk_size).min(file_len);
        if candidate >= file_len {
            break;
        }
        let aligned = align_to_line_start(file, candidate, file_len)?;
        if aligned <= *boundaries.last().unwrap() || aligned >= file_len {
            break;
        }
        boundaries.push(aligned);
        cursor = aligned;
    }
    boundaries.push(file_len);
    boundaries.dedup();

    let chunks = boundaries
        .windows(2)
        .enumerate()
        .map(|(index, w)| FileChunk { index, start: w[0], end: w[1] })
        .collect();
    Ok(chunks)
}

/// Seeks forward from `offset` to the start of the next line, returning the
/// offset immediately after the next `\n`.
fn align_to_line_start(file: &mut File, offset: u64, file_len: u64) -> Result<u64, ImportError> {
    const PROBE_LEN: usize = 64 * 1024;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; PROBE_LEN.min((file_len - offset) as usize)];
    let n = file.read(&mut buf)?;
    for (i, &byte) in buf[..n].iter().enumerate() {
        if byte == b'\n' {
            return Ok(offset + i as u64 + 1);
        }
    }
    Ok(file_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn chunks_cover_whole_file_without_overlap() {
        let data = (0..200).map(|i| format!("row{i}\n")).collect::<String>();
        let temp = write_temp(&data);
        let mut file = File::open(temp.path()).unwrap();
        let chunks = build_chunks(&mut file, 0, 4, 100).unwrap();
        assert_eq!(chunks.first().unwrap().start, 0);
        assert_eq!(chunks.last().unwrap().end, data.len() as u64);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn tiny_file_yields_one_chunk() {
        let temp = write_temp("a,b\n1,2\n");
        let mut file = File::open(temp.path()).unwrap();
        let chunks = build_chunks(&mut file, 0, 16, 8 * 1024 * 1024).unwrap();
        assert!(!chunks.is_empty());
    }

    #[test]
    fn large_bytes_per_request_prevents_over_splitting_a_small_file() {
        let data = (0..10).map(|i| format!("row{i}\n")).collect::<String>();
        let temp = write_temp(&data);
        let mut file = File::open(temp.path()).unwrap();
        // 16 threads available, but bytes_per_request is bigger than the
        // whole file, so remaining/bytes_per_request + 1 == 1 caps the split.
        let chunks = build_chunks(&mut file, 0, 16, 8 * 1024 * 1024).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn small_bytes_per_request_is_still_capped_by_max_threads() {
        let data = (0..200).map(|i| format!("row{i}\n")).collect::<String>();
        let temp = write_temp(&data);
        let mut file = File::open(temp.path()).unwrap();
        let chunks = build_chunks(&mut file, 0, 4, 1).unwrap();
        assert!(chunks.len() <= 4);
    }
}
