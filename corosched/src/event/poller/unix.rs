use libc::{
    AF_UNIX, MSG_NOSIGNAL, SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_STREAM, c_int, close, read, send,
    socketpair, write,
};
use std::io;
use std::os::fd::RawFd;

/// Reads from a file descriptor into the given buffer.
///
/// Returns the number of bytes read, or a negative value on error.
/// The file descriptor **must** be non-blocking.
pub(crate) fn sys_read(fd: RawFd, buffer: &mut [u8]) -> isize {
    unsafe { read(fd, buffer.as_mut_ptr() as *mut _, buffer.len()) }
}

/// Writes the buffer to a file descriptor.
///
/// Returns the number of bytes written, or a negative value on error.
pub(crate) fn sys_write(fd: RawFd, buffer: &[u8]) -> isize {
    unsafe { write(fd, buffer.as_ptr() as *const _, buffer.len()) }
}

/// Sends the buffer on a socket without raising `SIGPIPE` if the peer
/// is gone.
///
/// Returns the number of bytes sent, or a negative value on error.
pub(crate) fn sys_send(fd: RawFd, buffer: &[u8]) -> isize {
    unsafe { send(fd, buffer.as_ptr() as *const _, buffer.len(), MSG_NOSIGNAL) }
}

/// Closes a file descriptor.
pub(crate) fn sys_close(fd: RawFd) {
    unsafe { close(fd) };
}

/// Creates a connected pair of non-blocking, close-on-exec stream sockets.
///
/// Returns `(read_end, write_end)`; the pair is symmetric, the names only
/// reflect how the schedule-back channel uses it.
pub(crate) fn sys_socketpair() -> io::Result<(RawFd, RawFd)> {
    let mut fds: [c_int; 2] = [-1; 2];

    let rc = unsafe {
        socketpair(
            AF_UNIX,
            SOCK_STREAM | SOCK_NONBLOCK | SOCK_CLOEXEC,
            0,
            fds.as_mut_ptr(),
        )
    };

    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok((fds[0], fds[1]))
}
