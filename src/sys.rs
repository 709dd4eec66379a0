//! Safe wrappers for platform-specific unsafe operations.
//!
//! Every `unsafe` block outside of tests lives here.

/// Run a closure with stderr temporarily redirected to `/dev/null`.
///
/// ALSA and JACK print probe noise on stderr whenever CPAL enumerates
/// backends; microphone discovery wraps its host queries in this.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2.
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: no other thread touches fd 2 while a device probe runs.
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_stderr_returns_closure_value() {
        let value = with_suppressed_stderr(|| {
            eprintln!("swallowed");
            42
        });
        assert_eq!(value, 42);
    }
}
