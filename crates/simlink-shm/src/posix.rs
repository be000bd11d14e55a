//! POSIX shared memory and named semaphores.
//!
//! Thin wrappers around `shm_open`/`ftruncate`/`mmap` and
//! `sem_open`/`sem_post`/`sem_timedwait`. This is the backend used to
//! talk to a real engine process.

#![allow(unsafe_code)]

use std::ffi::CString;
use std::io;
use std::ptr::{self, NonNull};
use std::time::Duration;

use log::debug;

use crate::backend::{IpcBackend, Semaphore};
use crate::error::{ShmError, SignalError};
use crate::mapping::Mapping;
use crate::naming::validate_os_name;

/// IPC backend over the host's POSIX shared memory and semaphores.
#[derive(Clone, Copy, Debug, Default)]
pub struct PosixIpc;

impl PosixIpc {
    /// Create the backend. Stateless: every call goes to the OS.
    pub fn new() -> Self {
        Self
    }
}

fn c_name(name: &str) -> Result<CString, ShmError> {
    if !validate_os_name(name) {
        return Err(ShmError::InvalidName(name.to_string()));
    }
    CString::new(name).map_err(|_| ShmError::InvalidName(name.to_string()))
}

fn os_error(op: &'static str, name: &str) -> ShmError {
    let source = io::Error::last_os_error();
    match source.kind() {
        io::ErrorKind::NotFound => ShmError::NotFound(name.to_string()),
        io::ErrorKind::AlreadyExists => ShmError::AlreadyExists(name.to_string()),
        _ => ShmError::Os {
            op,
            name: name.to_string(),
            source,
        },
    }
}

/// Map `len` bytes of `fd` and close the descriptor either way.
fn map_fd(fd: libc::c_int, len: usize, name: &str) -> Result<Mapping, ShmError> {
    // SAFETY:
    // - null address lets the kernel choose placement
    // - fd is a valid descriptor owned by the caller, sized to at least len
    // - MAP_SHARED makes writes visible to the other process
    // - the result is checked against MAP_FAILED below
    let raw = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    let mmap_err = (raw == libc::MAP_FAILED).then(|| os_error("mmap", name));

    // SAFETY:
    // - fd is valid and not used again; the mapping holds its own reference
    unsafe { libc::close(fd) };

    if let Some(err) = mmap_err {
        return Err(err);
    }
    let ptr = NonNull::new(raw.cast::<u8>()).ok_or_else(|| ShmError::Os {
        op: "mmap",
        name: name.to_string(),
        source: io::Error::from(io::ErrorKind::InvalidData),
    })?;
    // SAFETY: ptr came from a successful mmap of len read/write bytes and is
    // owned solely by the returned Mapping.
    Ok(unsafe { Mapping::from_mmap(ptr, len) })
}

impl IpcBackend for PosixIpc {
    fn create_region(&self, name: &str, len: usize) -> Result<Mapping, ShmError> {
        let c = c_name(name)?;
        let off_len = libc::off_t::try_from(len).map_err(|_| ShmError::Os {
            op: "ftruncate",
            name: name.to_string(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

        // SAFETY:
        // - c is a valid NUL-terminated string
        // - shm_unlink of a missing name just fails with ENOENT (ignored)
        // - O_CREAT|O_EXCL|O_RDWR with mode 0o600 creates a fresh object
        let fd = unsafe {
            libc::shm_unlink(c.as_ptr());
            libc::shm_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(os_error("shm_open", name));
        }

        // SAFETY: fd is valid from shm_open; a fresh object has size 0 and
        // ftruncate zero-fills the extension.
        if unsafe { libc::ftruncate(fd, off_len) } < 0 {
            let err = os_error("ftruncate", name);
            // SAFETY: fd is valid and not used after this error path.
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c.as_ptr());
            }
            return Err(err);
        }

        let mapping = map_fd(fd, len, name)?;
        debug!("created shm region {name} ({len} bytes)");
        Ok(mapping)
    }

    fn open_region(&self, name: &str) -> Result<Mapping, ShmError> {
        let c = c_name(name)?;
        // SAFETY: c is a valid NUL-terminated string; mode is ignored
        // without O_CREAT.
        let fd = unsafe { libc::shm_open(c.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(os_error("shm_open", name));
        }

        // SAFETY: zeroed stat is a valid out-parameter for fstat.
        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        // SAFETY: fd is valid; st is a writable stat struct.
        if unsafe { libc::fstat(fd, &mut st) } < 0 {
            let err = os_error("fstat", name);
            // SAFETY: fd is valid and not used after this error path.
            unsafe { libc::close(fd) };
            return Err(err);
        }
        let len = usize::try_from(st.st_size).unwrap_or(0);
        if len == 0 {
            // SAFETY: fd is valid and not used after this error path.
            unsafe { libc::close(fd) };
            return Err(ShmError::Os {
                op: "fstat",
                name: name.to_string(),
                source: io::Error::from(io::ErrorKind::UnexpectedEof),
            });
        }
        map_fd(fd, len, name)
    }

    fn unlink_region(&self, name: &str) -> Result<(), ShmError> {
        let c = c_name(name)?;
        // SAFETY: c is a valid NUL-terminated string; only the namespace
        // entry is affected.
        if unsafe { libc::shm_unlink(c.as_ptr()) } < 0 {
            match os_error("shm_unlink", name) {
                ShmError::NotFound(_) => {}
                err => return Err(err),
            }
        }
        Ok(())
    }

    fn create_semaphore(&self, name: &str, initial: u32) -> Result<Box<dyn Semaphore>, ShmError> {
        let c = c_name(name)?;
        // SAFETY:
        // - c is a valid NUL-terminated string
        // - sem_unlink of a missing name fails with ENOENT (ignored)
        // - with O_CREAT, sem_open reads exactly two variadic args: mode and value
        let sem = unsafe {
            libc::sem_unlink(c.as_ptr());
            libc::sem_open(
                c.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o600 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            return Err(os_error("sem_open", name));
        }
        debug!("created semaphore {name} (initial {initial})");
        Ok(Box::new(PosixSemaphore {
            sem,
            name: name.to_string(),
        }))
    }

    fn open_semaphore(&self, name: &str) -> Result<Box<dyn Semaphore>, ShmError> {
        let c = c_name(name)?;
        // SAFETY: c is a valid NUL-terminated string; without O_CREAT no
        // variadic args are read.
        let sem = unsafe { libc::sem_open(c.as_ptr(), 0) };
        if sem == libc::SEM_FAILED {
            return Err(os_error("sem_open", name));
        }
        Ok(Box::new(PosixSemaphore {
            sem,
            name: name.to_string(),
        }))
    }

    fn unlink_semaphore(&self, name: &str) -> Result<(), ShmError> {
        let c = c_name(name)?;
        // SAFETY: c is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c.as_ptr()) } < 0 {
            match os_error("sem_unlink", name) {
                ShmError::NotFound(_) => {}
                err => return Err(err),
            }
        }
        Ok(())
    }
}

struct PosixSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

// SAFETY: POSIX semaphores are designed for concurrent use from multiple
// threads and processes; the handle is only closed in Drop.
unsafe impl Send for PosixSemaphore {}
unsafe impl Sync for PosixSemaphore {}

fn deadline(timeout: Duration) -> Result<libc::timespec, SignalError> {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: now is a valid, writable timespec.
    if unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) } < 0 {
        return Err(SignalError::Os {
            op: "clock_gettime",
            source: io::Error::last_os_error(),
        });
    }
    let nanos = now.tv_nsec as i64 + i64::from(timeout.subsec_nanos());
    let secs = now.tv_sec as i64
        + i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX / 2)
        + nanos / 1_000_000_000;
    Ok(libc::timespec {
        tv_sec: secs as libc::time_t,
        tv_nsec: (nanos % 1_000_000_000) as _,
    })
}

impl Semaphore for PosixSemaphore {
    fn post(&self) -> Result<(), SignalError> {
        // SAFETY: sem is a live handle from sem_open.
        if unsafe { libc::sem_post(self.sem) } < 0 {
            return Err(SignalError::Os {
                op: "sem_post",
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<bool, SignalError> {
        let abs = timeout.map(deadline).transpose()?;
        loop {
            // SAFETY: sem is a live handle; abs (if any) is a valid timespec.
            let rc = unsafe {
                match &abs {
                    Some(ts) => libc::sem_timedwait(self.sem, ts),
                    None => libc::sem_wait(self.sem),
                }
            };
            if rc == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::ETIMEDOUT) => return Ok(false),
                _ => {
                    return Err(SignalError::Os {
                        op: if abs.is_some() {
                            "sem_timedwait"
                        } else {
                            "sem_wait"
                        },
                        source: err,
                    })
                }
            }
        }
    }
}

impl Drop for PosixSemaphore {
    fn drop(&mut self) {
        // SAFETY: sem is a live handle and Drop runs once.
        if unsafe { libc::sem_close(self.sem) } < 0 {
            debug!("sem_close({}) failed: {}", self.name, io::Error::last_os_error());
        }
    }
}
