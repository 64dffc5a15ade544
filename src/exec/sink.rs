// src/exec/sink.rs

//! Destinations for a child's stdout/stderr.
//!
//! A sink is either a file opened in append mode (so several runs can share
//! one log) or an in-memory buffer filled from a pipe. After the child has
//! exited the sink is turned into a plain reader over whatever was captured,
//! including partial output from a killed process.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::ExecError;

/// Permission bits for output files created by the executor.
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o600;

/// Reader handed back to callers once a run is finished.
pub type OutputReader = Box<dyn Read + Send>;

#[derive(Debug)]
pub enum OutputSink {
    /// Append-mode file. `file` is our handle until it is given to the child.
    File { path: PathBuf, file: Option<File> },
    /// Pipe drained into memory by a background task.
    Memory { drain: Option<JoinHandle<Vec<u8>>> },
    /// Output discarded.
    Null,
}

impl OutputSink {
    /// File sink when a path is given, memory sink otherwise.
    pub fn open(path: Option<&Path>) -> Result<Self, ExecError> {
        match path {
            Some(path) => Self::open_file(path),
            None => Ok(OutputSink::Memory { drain: None }),
        }
    }

    /// File sink when a path is given, null sink otherwise. Used for detached
    /// processes where nobody is around to collect an in-memory buffer.
    pub fn open_detached(path: Option<&Path>) -> Result<Self, ExecError> {
        match path {
            Some(path) => Self::open_file(path),
            None => Ok(OutputSink::Null),
        }
    }

    fn open_file(path: &Path) -> Result<Self, ExecError> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(OUTPUT_FILE_MODE);
        }

        let file = options.open(path).map_err(|source| ExecError::SinkSetup {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = ?path, "opened output file in append mode");
        Ok(OutputSink::File {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    /// The `Stdio` to give the child.
    ///
    /// For file sinks this moves our handle into the command; it is closed as
    /// soon as the command is dropped, the child keeps its own copy.
    pub fn stdio(&mut self) -> Stdio {
        match self {
            OutputSink::File { file, .. } => match file.take() {
                Some(file) => Stdio::from(file),
                None => Stdio::null(),
            },
            OutputSink::Memory { .. } => Stdio::piped(),
            OutputSink::Null => Stdio::null(),
        }
    }

    /// Start draining the child's pipe into memory. No-op for other sinks.
    pub fn capture<R>(&mut self, pipe: Option<R>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        if let OutputSink::Memory { drain } = self {
            if let Some(pipe) = pipe {
                *drain = Some(tokio::spawn(drain_pipe(pipe)));
            }
        }
    }

    /// Turn the sink into a reader over the captured bytes.
    ///
    /// File sinks re-open the path from the start, so the reader covers every
    /// run that appended to it. Memory sinks wait for the drain task, which
    /// ends once the child side of the pipe is closed.
    pub async fn into_reader(self) -> Result<OutputReader, ExecError> {
        match self {
            OutputSink::File { path, file } => {
                drop(file);
                let file = File::open(&path).map_err(|source| ExecError::ReadBack {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(file))
            }
            OutputSink::Memory { drain: Some(handle) } => {
                let bytes = match handle.await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(error = %e, "output drain task failed; returning empty output");
                        Vec::new()
                    }
                };
                Ok(Box::new(Cursor::new(bytes)))
            }
            OutputSink::Memory { drain: None } | OutputSink::Null => Ok(empty_reader()),
        }
    }
}

/// A reader with no bytes, used when nothing was captured.
pub fn empty_reader() -> OutputReader {
    Box::new(io::empty())
}

/// Read a pipe to EOF, keeping what was read even if the pipe errors.
async fn drain_pipe<R>(mut pipe: R) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, captured = out.len(), "error reading child output; keeping partial output");
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn read_all(mut reader: OutputReader) -> String {
        let mut s = String::new();
        reader.read_to_string(&mut s).expect("read");
        s
    }

    #[tokio::test]
    async fn memory_sink_collects_pipe_bytes() {
        let mut sink = OutputSink::open(None).expect("memory sink");
        sink.capture(Some(Cursor::new(b"hello world".to_vec())));
        assert_eq!(read_all(sink.into_reader().await.expect("reader")), "hello world");
    }

    #[tokio::test]
    async fn memory_sink_without_pipe_is_empty() {
        let sink = OutputSink::open(None).expect("memory sink");
        assert_eq!(read_all(sink.into_reader().await.expect("reader")), "");
    }

    #[tokio::test]
    async fn file_sink_appends_to_existing_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.log");
        std::fs::write(&path, "first\n").expect("seed");

        let mut sink = OutputSink::open(Some(&path)).expect("file sink");
        if let OutputSink::File { file: Some(f), .. } = &mut sink {
            f.write_all(b"second\n").expect("append");
        }
        assert_eq!(read_all(sink.into_reader().await.expect("reader")), "first\nsecond\n");
    }

    #[cfg(unix)]
    #[test]
    fn file_sink_uses_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("perm.log");
        let _sink = OutputSink::open(Some(&path)).expect("file sink");
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o077, 0, "group/other bits must be clear");
        assert_eq!(mode & 0o600, 0o600);
    }

    #[test]
    fn unopenable_path_is_a_setup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("out.log");
        match OutputSink::open(Some(&path)) {
            Err(ExecError::SinkSetup { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected SinkSetup, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deleted_file_is_a_read_back_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gone.log");
        let sink = OutputSink::open(Some(&path)).expect("file sink");
        std::fs::remove_file(&path).expect("remove");
        assert!(matches!(
            sink.into_reader().await,
            Err(ExecError::ReadBack { .. })
        ));
    }
}
