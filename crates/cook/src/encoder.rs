//! External encoder process.
//!
//! The encoder is an executable invoked as `<script> <id> <format> <container>`
//! from a fixed working directory. Whatever it writes to standard output is the
//! cooked file; standard error is diagnostics only.

use crate::error::{ErrorKind, Result};
use crate::options::CookingOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};
use tokio::process::{ChildStdout, Command};
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct Encoder {
    script: PathBuf,
    working_dir: PathBuf,
}

impl Encoder {
    pub fn new(script: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Locate the encoder executable.
    ///
    /// Absolute paths are taken as-is. Relative paths are resolved against
    /// `working_dir` first; a bare name that isn't there is looked up on
    /// `PATH`. Without a `working_dir` the encoder runs from the directory
    /// containing it.
    pub fn discover(script: impl AsRef<Path>, working_dir: Option<PathBuf>) -> Result<Self> {
        let script = script.as_ref();
        let resolved = if script.is_absolute() {
            script.is_file().then(|| script.to_path_buf())
        } else {
            working_dir
                .as_deref()
                .map(|dir| dir.join(script))
                .filter(|candidate| candidate.is_file())
                .or_else(|| match script.components().count() {
                    1 => which::which(script).ok(),
                    _ => None,
                })
        };
        let Some(script) = resolved else {
            exn::bail!(ErrorKind::EncoderNotFound(script.display().to_string()));
        };
        let working_dir = match working_dir {
            Some(dir) => dir,
            None => script.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Ok(Self::new(script, working_dir))
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Start cooking record `id`.
    ///
    /// Options are validated before anything is spawned. Must be called from
    /// within a Tokio runtime: the process is supervised by background tasks.
    #[tracing::instrument(skip(self, options), fields(format = %options.format, container = %options.container))]
    pub fn cook(&self, id: u64, options: &CookingOptions) -> Result<CookedStream> {
        options.validate()?;
        let mut child = Command::new(&self.script)
            .arg(id.to_string())
            .arg(options.format.as_str())
            .arg(options.container.as_str())
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ErrorKind::Spawn)?;
        debug!(record = id, dynaudnorm = options.dynaudnorm, "Encoder started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| exn::Exn::from(ErrorKind::Spawn(io::Error::other("encoder stdout not captured"))))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(record = id, "encoder: {line}");
                }
            });
        }

        let (status_tx, status_rx) = oneshot::channel();
        tokio::spawn(async move {
            let mut status_tx = status_tx;
            // The receiver goes away when the consumer drops the stream early.
            let status = tokio::select! {
                status = child.wait() => Some(status),
                () = status_tx.closed() => None,
            };
            match status {
                Some(status) => {
                    _ = status_tx.send(status);
                },
                None => match child.kill().await {
                    Ok(()) => debug!(record = id, "Stream dropped, encoder killed"),
                    Err(e) => warn!(record = id, error = %e, "Could not kill abandoned encoder"),
                },
            }
        });

        Ok(CookedStream {
            id,
            stdout,
            stdout_done: false,
            status: Some(status_rx),
            guard: None,
        })
    }
}

/// Standard output of a running encoder.
///
/// Reaching the end of the stream waits for the encoder to exit; an
/// unsuccessful exit is reported as an I/O error instead of a clean EOF.
/// Dropping the stream before that kills the encoder.
pub struct CookedStream {
    id: u64,
    stdout: ChildStdout,
    stdout_done: bool,
    status: Option<oneshot::Receiver<io::Result<ExitStatus>>>,
    guard: Option<Box<dyn Send + Sync>>,
}

impl CookedStream {
    /// Keep `guard` alive until the stream ends, fails or is dropped.
    #[must_use]
    pub fn with_guard(mut self, guard: impl Send + Sync + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    fn finish(&mut self) {
        self.status = None;
        self.guard = None;
    }
}

impl std::fmt::Debug for CookedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookedStream")
            .field("id", &self.id)
            .field("finished", &self.status.is_none())
            .finish_non_exhaustive()
    }
}

impl AsyncRead for CookedStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        if !this.stdout_done {
            let before = buf.filled().len();
            if let Err(e) = ready!(Pin::new(&mut this.stdout).poll_read(cx, buf)) {
                this.finish();
                return Poll::Ready(Err(e));
            }
            if buf.filled().len() > before {
                return Poll::Ready(Ok(()));
            }
            this.stdout_done = true;
        }
        let Some(status) = this.status.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let status = ready!(Pin::new(status).poll(cx));
        this.finish();
        match status {
            Ok(Ok(status)) if status.success() => Poll::Ready(Ok(())),
            Ok(Ok(status)) => Poll::Ready(Err(io::Error::other(format!("encoder exited with {status}")))),
            Ok(Err(e)) => Poll::Ready(Err(e)),
            Err(_) => Poll::Ready(Err(io::Error::other("encoder supervisor went away"))),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::options::{Container, Format};
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("cook.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_arguments_and_output() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), r#"echo "$1 $2 $3 $(pwd)"; echo diagnostics >&2"#);
        let encoder = Encoder::discover("cook.sh", Some(dir.path().to_path_buf())).unwrap();
        let mut stream = encoder.cook(42, &CookingOptions::new(Format::Flac, Container::Matroska)).unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        let cwd = dir.path().canonicalize().unwrap();
        assert_eq!(out.trim_end(), format!("42 flac matroska {}", cwd.display()));
    }

    #[tokio::test]
    async fn test_invalid_options_spawn_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("spawned");
        script(dir.path(), &format!("touch {}", marker.display()));
        let encoder = Encoder::discover("cook.sh", Some(dir.path().to_path_buf())).unwrap();
        let err = encoder.cook(1, &CookingOptions::new(Format::Copy, Container::Mix)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::OptionsInvalid(_)));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_failed_exit_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "printf partial; exit 3");
        let encoder = Encoder::discover("cook.sh", Some(dir.path().to_path_buf())).unwrap();
        let mut stream = encoder.cook(1, &CookingOptions::default()).unwrap();
        let mut out = Vec::new();
        let err = stream.read_to_end(&mut out).await.unwrap_err();
        assert!(err.to_string().contains("exit"));
    }

    #[tokio::test]
    async fn test_guard_released_at_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "echo done");
        let encoder = Encoder::discover("cook.sh", Some(dir.path().to_path_buf())).unwrap();
        let guard = Arc::new(());
        let mut stream = encoder.cook(1, &CookingOptions::default()).unwrap().with_guard(guard.clone());
        assert_eq!(Arc::strong_count(&guard), 2);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(Arc::strong_count(&guard), 1);
    }

    #[tokio::test]
    async fn test_guard_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        script(dir.path(), "sleep 30");
        let encoder = Encoder::discover("cook.sh", Some(dir.path().to_path_buf())).unwrap();
        let guard = Arc::new(());
        let stream = encoder.cook(1, &CookingOptions::default()).unwrap().with_guard(guard.clone());
        drop(stream);
        assert_eq!(Arc::strong_count(&guard), 1);
    }

    #[test]
    fn test_discover_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Encoder::discover("definitely-not-an-encoder.sh", Some(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::EncoderNotFound(_)));
        assert!(Encoder::discover(dir.path().join("absent.sh"), None).is_err());
    }

    #[test]
    fn test_discover_defaults_working_dir_to_script_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(dir.path(), "true");
        let encoder = Encoder::discover(&path, None).unwrap();
        assert_eq!(encoder.working_dir(), dir.path());
        assert_eq!(encoder.script(), path);
    }
}
