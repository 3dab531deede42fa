//! Host file-descriptor plumbing for `runtime.wasmWrite` and `fs.write`.

use crate::error::Result;

/// Writes `buf` to the file descriptor the guest named, positionally
/// when `pos` is given.
#[cfg(unix)]
pub(crate) fn write_fd(fd: i64, buf: &[u8], pos: Option<u64>) -> Result<usize> {
	let n = unsafe {
		match pos {
			Some(off) => libc::pwrite(
				fd as libc::c_int,
				buf.as_ptr().cast(),
				buf.len(),
				off as libc::off_t,
			),
			None => libc::write(fd as libc::c_int, buf.as_ptr().cast(), buf.len()),
		}
	};
	if n < 0 {
		return Err(std::io::Error::last_os_error().into());
	}
	Ok(n as usize)
}

#[cfg(not(unix))]
pub(crate) fn write_fd(fd: i64, buf: &[u8], pos: Option<u64>) -> Result<usize> {
	use std::io::Write;

	match (fd, pos) {
		(1, None) => {
			std::io::stdout().write_all(buf)?;
			Ok(buf.len())
		}
		(2, None) => {
			std::io::stderr().write_all(buf)?;
			Ok(buf.len())
		}
		_ => Err(crate::error::Error::Unsupported("writes to arbitrary file descriptors")),
	}
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	#[test]
	fn writes_to_the_null_device() {
		use std::os::unix::io::AsRawFd;

		let dev_null = std::fs::OpenOptions::new().write(true).open("/dev/null").unwrap();
		let fd = dev_null.as_raw_fd() as i64;
		assert_eq!(write_fd(fd, b"abc", None).unwrap(), 3);
		assert_eq!(write_fd(fd, b"abc", Some(10)).unwrap(), 3);
	}

	#[test]
	fn bad_descriptor_is_an_error() {
		assert!(write_fd(-1, b"abc", None).is_err());
	}
}
