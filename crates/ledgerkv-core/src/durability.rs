//! Forcing written bytes to stable storage
//!
//! Only used when `StoreConfig::sync_writes` is set. Without it, writes
//! land in the OS page cache and the last completed write wins.

use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Sync `file` with the strongest primitive the platform offers.
pub fn sync_file(file: &File, path: &Path) -> StoreResult<()> {
    platform_sync(file).map_err(|e| StoreError::io(path, "Failed to sync to stable storage", e))
}

/// - Linux: fdatasync(), data without metadata
/// - macOS/iOS: fcntl(F_FULLFSYNC), plain fsync stops at the drive cache
/// - Windows: FlushFileBuffers()
/// - Other: File::sync_data()
fn platform_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File` borrow.
        let result = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File` borrow.
        let result = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if result != -1 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File` borrow.
        let result = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if result != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows"
    )))]
    {
        file.sync_data()
    }
}
