//! Append-only log file
//!
//! The broadcaster is the only writer. Readers open the file independently
//! and see a consistent prefix bounded by a [`Snapshot`].

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Take};

/// Append handle for the durable log file
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    file: File,
    /// Bytes known to be in the file
    len: u64,
}

impl LogStore {
    /// Open the log file for appending
    ///
    /// Creates the file if it does not exist. Existing content is kept.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let len = file.metadata().await?.len();

        tracing::debug!(path = %path.display(), len = len, "Log store opened");

        Ok(Self { path, file, len })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes in the file
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one serialized line
    ///
    /// A failed write leaves the file ending on a line boundary: any partial
    /// fragment is truncated away, or newline-terminated if truncation is not
    /// possible.
    pub async fn append(&mut self, line: &[u8]) -> io::Result<()> {
        let prev_len = self.len;
        match self.write_line(line).await {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.discard_partial(prev_len).await;
                Err(e)
            }
        }
    }

    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line).await?;
        self.file.flush().await
    }

    /// Restore the file to `prev_len` bytes after a failed write
    async fn discard_partial(&mut self, prev_len: u64) {
        let err = match self.file.set_len(prev_len).await {
            Ok(()) => {
                self.len = prev_len;
                return;
            }
            Err(e) => e,
        };

        let actual = match self.file.metadata().await {
            Ok(meta) => meta.len(),
            Err(_) => return,
        };
        if actual <= prev_len {
            self.len = actual;
            return;
        }

        tracing::warn!(
            path = %self.path.display(),
            error = %err,
            fragment = actual - prev_len,
            "Could not truncate partial line, terminating it"
        );
        self.len = match self.write_line(b"\n").await {
            Ok(()) => actual + 1,
            Err(_) => actual,
        };
    }

    /// Capture the current end of the file as a readable prefix
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::full(&self.path).up_to(self.len)
    }

    /// Read the whole file as it is right now
    pub async fn read_all(&self) -> io::Result<Backfill> {
        Snapshot::full(&self.path).open().await
    }
}

/// A bounded view of the log file that can be opened later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: PathBuf,
    limit: Option<u64>,
}

impl Snapshot {
    /// Unbounded view: everything present when opened
    pub fn full(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            limit: None,
        }
    }

    /// Bound the view to the first `limit` bytes
    pub fn up_to(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Byte limit of the view, `None` if unbounded
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Open a fresh reader over the view
    ///
    /// A missing file is not an error and yields an empty backfill.
    pub async fn open(self) -> io::Result<Backfill> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Backfill::empty()),
            Err(e) => return Err(e),
        };

        let limit = self.limit.unwrap_or(u64::MAX);
        Ok(Backfill {
            reader: Some(BufReader::new(file.take(limit))),
            lines: 0,
        })
    }
}

/// Lazy line reader over a snapshot of the log file
#[derive(Debug)]
pub struct Backfill {
    reader: Option<BufReader<Take<File>>>,
    lines: u64,
}

impl Backfill {
    /// A backfill with no content
    pub fn empty() -> Self {
        Self {
            reader: None,
            lines: 0,
        }
    }

    /// Lines yielded so far
    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    /// Next line including its trailing newline, `None` at the end
    ///
    /// An unterminated final fragment is returned with a newline appended.
    pub async fn next_line(&mut self) -> io::Result<Option<Bytes>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut buf = Vec::new();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            self.reader = None;
            return Ok(None);
        }

        if buf.last() != Some(&b'\n') {
            buf.push(b'\n');
        }
        self.lines += 1;

        Ok(Some(Bytes::from(buf)))
    }

    /// Drain the remaining lines into memory
    pub async fn collect(mut self) -> io::Result<Vec<Bytes>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");

        let store = LogStore::open(&path).await.unwrap();

        assert!(path.exists());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_open_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        std::fs::write(&path, b"old line\n").unwrap();

        let mut store = LogStore::open(&path).await.unwrap();
        assert_eq!(store.len(), 9);

        store.append(b"new line\n").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"old line\nnew line\n");
        assert_eq!(store.len(), 18);
    }

    #[tokio::test]
    async fn test_read_all_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LogStore::open(dir.path().join("logs.txt")).await.unwrap();

        store.append(b"a\n").await.unwrap();
        let first = store.read_all().await.unwrap().collect().await.unwrap();

        store.append(b"b\n").await.unwrap();
        let second = store.read_all().await.unwrap().collect().await.unwrap();

        assert_eq!(first, vec![Bytes::from_static(b"a\n")]);
        assert_eq!(
            second,
            vec![Bytes::from_static(b"a\n"), Bytes::from_static(b"b\n")]
        );
    }

    #[tokio::test]
    async fn test_snapshot_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LogStore::open(dir.path().join("logs.txt")).await.unwrap();

        store.append(b"before\n").await.unwrap();
        let snapshot = store.snapshot();
        store.append(b"after\n").await.unwrap();

        assert_eq!(snapshot.limit(), Some(7));
        let lines = snapshot.open().await.unwrap().collect().await.unwrap();
        assert_eq!(lines, vec![Bytes::from_static(b"before\n")]);

        let all = store.read_all().await.unwrap().collect().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_append_drops_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        let mut store = LogStore::open(&path).await.unwrap();
        store.append(b"first\n").await.unwrap();

        // A write that stopped partway through a line
        {
            use std::io::Write;
            let mut raw = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            raw.write_all(b"2024-05-01T10:00:01.").unwrap();
        }
        store.discard_partial(6).await;

        assert_eq!(store.len(), 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"first\n");

        store.append(b"second\n").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first\nsecond\n");
        let lines = store.read_all().await.unwrap().collect().await.unwrap();
        assert_eq!(
            lines,
            vec![Bytes::from_static(b"first\n"), Bytes::from_static(b"second\n")]
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_append_keeps_store_usable() {
        // /dev/full rejects every write and cannot be truncated
        let mut store = LogStore::open("/dev/full").await.unwrap();

        let err = store.append(b"lost\n").await.unwrap_err();

        assert_eq!(err.raw_os_error(), Some(28));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let mut backfill = Snapshot::full(dir.path().join("absent.txt"))
            .open()
            .await
            .unwrap();

        assert!(backfill.next_line().await.unwrap().is_none());
        assert_eq!(backfill.lines_read(), 0);
    }

    #[tokio::test]
    async fn test_unterminated_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs.txt");
        std::fs::write(&path, b"one\npartial").unwrap();

        let lines = Snapshot::full(&path).open().await.unwrap().collect().await.unwrap();

        assert_eq!(
            lines,
            vec![Bytes::from_static(b"one\n"), Bytes::from_static(b"partial\n")]
        );
    }
}
