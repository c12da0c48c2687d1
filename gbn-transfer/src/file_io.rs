//! Local file collaborators: read the input, append the output, compare.
//!
//! None of this is protocol logic.  The engine reads the whole input before
//! any network activity starts and appends one payload per accepted Sink
//! segment through [`AppendBytes`].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TransferError};

/// Output name used when neither the caller nor the peer picked one.
pub const DEFAULT_OUTPUT_NAME: &str = "received.bin";

fn file_error(path: &Path, source: io::Error) -> TransferError {
    if source.kind() == io::ErrorKind::NotFound {
        TransferError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        TransferError::FileIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read the whole file at `path` into memory.
pub fn read_all_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| file_error(path, e))
}

/// Destination for in-order payloads on the Sink side.
pub trait AppendBytes {
    /// Append one accepted segment's payload.
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flush whatever is buffered; called once when the FIN arrives.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl AppendBytes for Vec<u8> {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// A buffered output file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    out: BufWriter<File>,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| file_error(&path, e))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AppendBytes for FileSink {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| file_error(&self.path, e))
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| file_error(&self.path, e))?;
        self.out
            .get_ref()
            .sync_all()
            .map_err(|e| file_error(&self.path, e))
    }
}

/// `true` when the two files hold exactly the same bytes.
pub fn contents_equal(a: &Path, b: &Path) -> Result<bool> {
    let fa = File::open(a).map_err(|e| file_error(a, e))?;
    let fb = File::open(b).map_err(|e| file_error(b, e))?;

    let len_a = fa.metadata().map_err(|e| file_error(a, e))?.len();
    let len_b = fb.metadata().map_err(|e| file_error(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut ra = BufReader::new(fa);
    let mut rb = BufReader::new(fb);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = read_full(&mut ra, &mut buf_a).map_err(|e| file_error(a, e))?;
        let m = read_full(&mut rb, &mut buf_b).map_err(|e| file_error(b, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of file.
fn read_full(r: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reduce a peer-supplied name to a bare file name.
///
/// Directory components are stripped so an announcement can never write
/// outside the output directory.  Returns `None` when nothing usable is
/// left.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        None
    } else {
        Some(base.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_all_bytes(&dir.path().join("nope.bin")).unwrap_err();
        assert!(matches!(err, TransferError::FileNotFound { .. }), "{err:?}");
    }

    #[test]
    fn file_sink_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut sink = FileSink::create(&path).unwrap();
        sink.append_bytes(b"hello ").unwrap();
        sink.append_bytes(b"world").unwrap();
        sink.finish().unwrap();
        assert_eq!(read_all_bytes(&path).unwrap(), b"hello world");
    }

    #[test]
    fn compare_equal_and_different() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        let big: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
        std::fs::write(&a, &big).unwrap();
        std::fs::write(&b, &big).unwrap();
        let mut other = big.clone();
        other[19_999] ^= 1;
        std::fs::write(&c, &other).unwrap();

        assert!(contents_equal(&a, &b).unwrap());
        assert!(!contents_equal(&a, &c).unwrap());
    }

    #[test]
    fn compare_different_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"abc").unwrap();
        std::fs::write(&b, b"abcd").unwrap();
        assert!(!contents_equal(&a, &b).unwrap());
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("OutputApple.jpg").as_deref(), Some("OutputApple.jpg"));
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("C:\\x\\y.txt").as_deref(), Some("y.txt"));
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(""), None);
    }
}
