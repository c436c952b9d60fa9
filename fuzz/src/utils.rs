//! Small helpers shared by every `msg_targets` fuzz target.

use std::io;

/// A `Write` sink that just accumulates bytes, used to exercise a decoded
/// message's re-encoding path without touching any real I/O.
pub struct VecWriter(pub Vec<u8>);

impl io::Write for VecWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.extend_from_slice(buf);
		Ok(buf.len())
	}
	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}
