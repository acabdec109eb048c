use std::io::{self, Write};

use log::warn;

use crate::Result;

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::fs::OpenOptions;
        use std::os::fd::AsRawFd;
        use std::os::raw::c_int;

        use anyhow::bail;

        const NULL_DEVICE: &str = "/dev/null";
        const STREAMS: [c_int; 2] = [libc::STDOUT_FILENO, libc::STDERR_FILENO];

        /// Points stdout and stderr at the null device for the lifetime of the
        /// guard, so the engine's console log stays out of the host's output.
        /// The original descriptors come back on drop.
        pub(crate) struct SilencedOutput {
            saved: Vec<(c_int, c_int)>,
        }

        fn checked(ret: c_int, action: &str) -> Result<c_int> {
            if ret < 0 {
                bail!("Unable to {}: {}", action, io::Error::last_os_error());
            }
            Ok(ret)
        }

        impl SilencedOutput {
            pub(crate) fn enter() -> Result<Self> {
                flush_std_streams();
                let null = OpenOptions::new().write(true).open(NULL_DEVICE)?;
                let mut silenced = Self {
                    saved: Vec::with_capacity(STREAMS.len()),
                };
                for fd in STREAMS {
                    let saved = checked(unsafe { libc::dup(fd) }, "save output stream")?;
                    silenced.saved.push((fd, saved));
                    checked(
                        unsafe { libc::dup2(null.as_raw_fd(), fd) },
                        "redirect output stream",
                    )?;
                }
                Ok(silenced)
            }
        }

        impl Drop for SilencedOutput {
            fn drop(&mut self) {
                flush_std_streams();
                for (fd, saved) in self.saved.drain(..).rev() {
                    unsafe {
                        if libc::dup2(saved, fd) < 0 {
                            warn!(
                                "Could not restore output stream {}: {}",
                                fd,
                                io::Error::last_os_error()
                            );
                        }
                        libc::close(saved);
                    }
                }
            }
        }
    } else {
        /// Output redirection needs unix descriptors, elsewhere the engine
        /// writes to the console.
        pub(crate) struct SilencedOutput;

        impl SilencedOutput {
            pub(crate) fn enter() -> Result<Self> {
                flush_std_streams();
                warn!("Engine console output cannot be silenced on this platform");
                Ok(Self)
            }
        }
    }
}
