//! Upload candidates: an untrusted filename plus a seekable byte stream.

use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// An upload offered for validation, not yet persisted.
///
/// The stream is read at most twice (sniff/inspect, then the full write) and is
/// rewound between reads; every helper here restores the caller's read position.
/// Transports that cannot seek must buffer first, e.g. with [`UploadCandidate::from_bytes`].
#[derive(Debug)]
pub struct UploadCandidate<R> {
    filename: String,
    declared_size: u64,
    reader: R,
}

impl<R: Read + Seek> UploadCandidate<R> {
    /// Wrap a reader, measuring its size by seeking to the end and back.
    pub fn new(filename: impl Into<String>, mut reader: R) -> io::Result<Self> {
        let declared_size = stream_len(&mut reader)?;
        Ok(Self {
            filename: filename.into(),
            declared_size,
            reader,
        })
    }

    /// Wrap a reader whose size was announced by the transport (e.g. a
    /// multipart part length). Size ceilings are checked against this value.
    pub fn with_declared_size(filename: impl Into<String>, declared_size: u64, reader: R) -> Self {
        Self {
            filename: filename.into(),
            declared_size,
            reader,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Actual length of the underlying stream
    pub fn stream_len(&mut self) -> io::Result<u64> {
        stream_len(&mut self.reader)
    }

    /// Up to `limit` bytes from the start of the stream
    pub fn peek_head(&mut self, limit: usize) -> io::Result<Vec<u8>> {
        self.read_from_start(limit as u64)
    }

    /// Up to `limit` bytes from the start of the stream. Reading stops at `limit`
    /// so callers can detect an oversized stream by asking for one byte more
    /// than they accept.
    pub fn read_from_start(&mut self, limit: u64) -> io::Result<Vec<u8>> {
        restoring_position(&mut self.reader, |reader| {
            reader.seek(SeekFrom::Start(0))?;
            let mut buf = Vec::new();
            reader.by_ref().take(limit).read_to_end(&mut buf)?;
            Ok(buf)
        })
    }
}

impl UploadCandidate<Cursor<Vec<u8>>> {
    /// Candidate over an in-memory buffer
    pub fn from_bytes(filename: impl Into<String>, data: Vec<u8>) -> Self {
        let declared_size = data.len() as u64;
        Self {
            filename: filename.into(),
            declared_size,
            reader: Cursor::new(data),
        }
    }
}

fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
    restoring_position(stream, |s| s.seek(SeekFrom::End(0)))
}

/// Run `f` and seek back to the position the stream had before, whether `f`
/// succeeded or not.
fn restoring_position<S, T, F>(stream: &mut S, f: F) -> io::Result<T>
where
    S: Seek,
    F: FnOnce(&mut S) -> io::Result<T>,
{
    let position = stream.stream_position()?;
    let result = f(stream);
    stream.seek(SeekFrom::Start(position))?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_measures_size_without_moving() {
        let mut cursor = Cursor::new(b"hello world".to_vec());
        cursor.seek(SeekFrom::Start(3)).unwrap();

        let mut candidate = UploadCandidate::new("a.txt", cursor).unwrap();
        assert_eq!(candidate.declared_size(), 11);
        assert_eq!(candidate.reader_mut().stream_position().unwrap(), 3);
    }

    #[test]
    fn test_peek_head_restores_position() {
        let mut candidate = UploadCandidate::from_bytes("a.bin", (0u8..=255).collect());
        candidate.reader_mut().seek(SeekFrom::Start(10)).unwrap();

        let head = candidate.peek_head(4).unwrap();
        assert_eq!(head, vec![0, 1, 2, 3]);
        assert_eq!(candidate.reader_mut().stream_position().unwrap(), 10);
    }

    #[test]
    fn test_read_from_start_honours_limit() {
        let mut candidate = UploadCandidate::from_bytes("a.bin", vec![1u8; 100]);
        assert_eq!(candidate.read_from_start(40).unwrap().len(), 40);
        assert_eq!(candidate.read_from_start(1000).unwrap().len(), 100);
    }

    #[test]
    fn test_declared_size_is_independent_of_stream() {
        let mut candidate =
            UploadCandidate::with_declared_size("a.bin", 5, Cursor::new(vec![0u8; 8]));
        assert_eq!(candidate.declared_size(), 5);
        assert_eq!(candidate.stream_len().unwrap(), 8);
    }
}
