//! One pseudo-terminal pair and the child process on its slave side
//!
//! The master descriptor is duplicated, switched to non-blocking mode and
//! registered with the tokio reactor, so pane output is read by the runtime
//! rather than by a thread per pane.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{FromRawFd, RawFd};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{debug, trace};
use weft_utils::{Result, WeftError};

use super::PtyConfig;

/// How long to keep polling for an exit status once output has ended
const EXIT_POLL_ATTEMPTS: u32 = 100;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

type SharedChild = Arc<Mutex<Box<dyn Child + Send + Sync>>>;

/// A running pane process and its terminal
pub struct PtyChannel {
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: SharedChild,
    fd: Arc<AsyncFd<File>>,
    size: Mutex<(u16, u16)>,
    pid: Option<u32>,
}

impl PtyChannel {
    /// Allocate a pty and spawn `config.command` on it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open(config: &PtyConfig) -> Result<Self> {
        let (cols, rows) = config.size;
        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| WeftError::pty(format!("Failed to open PTY: {}", e)))?;

        let mut cmd = CommandBuilder::new(&config.command);
        cmd.args(&config.args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        for key in &config.env_remove {
            cmd.env_remove(key);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| WeftError::ProcessSpawn(format!("{}: {}", config.command, e)))?;
        // The slave must be closed here, or reads never see EOF
        drop(pair.slave);

        let raw = pair
            .master
            .as_raw_fd()
            .ok_or_else(|| WeftError::pty("PTY master has no file descriptor"))?;
        let file = nonblocking_dup(raw)?;
        let fd = AsyncFd::new(file)?;

        let pid = child.process_id();
        debug!(command = %config.command, ?pid, cols, rows, "spawned pane process");

        Ok(Self {
            master: Mutex::new(pair.master),
            child: Arc::new(Mutex::new(child)),
            fd: Arc::new(fd),
            size: Mutex::new((cols, rows)),
            pid,
        })
    }

    /// Output stream of the child. Ends when the child closes the terminal.
    pub fn reader(&self) -> PtyReader {
        PtyReader {
            fd: Arc::clone(&self.fd),
        }
    }

    /// Input stream of the child
    pub fn writer(&self) -> PtyWriter {
        PtyWriter {
            fd: Arc::clone(&self.fd),
        }
    }

    /// Waits for the exit status after the output stream has ended.
    pub fn exit_watcher(&self) -> ExitWatcher {
        ExitWatcher {
            child: Arc::clone(&self.child),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn size(&self) -> (u16, u16) {
        *self.size.lock()
    }

    /// Resize the terminal, delivering SIGWINCH. Unchanged dimensions are
    /// not passed to the kernel.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let mut size = self.size.lock();
        if *size == (cols, rows) {
            return Ok(());
        }
        self.master
            .lock()
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| WeftError::pty(format!("Resize failed: {}", e)))?;
        *size = (cols, rows);
        trace!(cols, rows, "pty resized");
        Ok(())
    }

    pub fn kill(&self) -> Result<()> {
        self.child
            .lock()
            .kill()
            .map_err(|e| WeftError::pty(format!("Kill failed: {}", e)))
    }
}

impl std::fmt::Debug for PtyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyChannel")
            .field("pid", &self.pid)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

fn try_wait(child: &SharedChild) -> Result<Option<i32>> {
    match child.lock().try_wait() {
        Ok(Some(status)) => Ok(Some(status.exit_code() as i32)),
        Ok(None) => Ok(None),
        Err(e) => Err(WeftError::pty(format!("Wait failed: {}", e))),
    }
}

/// Duplicate `fd` (close-on-exec) and make the copy non-blocking.
fn nonblocking_dup(fd: RawFd) -> Result<File> {
    // SAFETY: plain fcntl calls on a descriptor owned by the pty master,
    // which outlives this function; the duplicate is owned by the File.
    unsafe {
        let dup = libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0);
        if dup < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let file = File::from_raw_fd(dup);
        let flags = libc::fcntl(dup, libc::F_GETFL);
        if flags < 0 || libc::fcntl(dup, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(file)
    }
}

/// Non-blocking read half of a pty master
#[derive(Debug, Clone)]
pub struct PtyReader {
    fd: Arc<AsyncFd<File>>,
}

impl AsyncRead for PtyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                // Linux reports a hung-up master as EIO
                Ok(Err(e)) if e.raw_os_error() == Some(libc::EIO) => return Poll::Ready(Ok(())),
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

/// Non-blocking write half of a pty master
#[derive(Debug, Clone)]
pub struct PtyWriter {
    fd: Arc<AsyncFd<File>>,
}

impl AsyncWrite for PtyWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.write(buf)
            }) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Collects a child's exit status
#[derive(Clone)]
pub struct ExitWatcher {
    child: SharedChild,
}

impl ExitWatcher {
    /// Poll for the exit status. The terminal closing usually means the
    /// child is exiting, but the status may lag behind; `None` means it never
    /// arrived.
    pub async fn wait(&self) -> Option<i32> {
        for _ in 0..EXIT_POLL_ATTEMPTS {
            match try_wait(&self.child) {
                Ok(Some(status)) => return Some(status),
                Ok(None) => tokio::time::sleep(EXIT_POLL_INTERVAL).await,
                Err(e) => {
                    debug!(error = %e, "exit status unavailable");
                    return None;
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for ExitWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitWatcher").finish_non_exhaustive()
    }
}
