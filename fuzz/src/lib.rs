//! Fuzz harness for `openingd`'s wire decoders, adapted from the upstream
//! `msg_targets` convention (one file per BOLT-2 message, each exposing a
//! `_test`/`_run` pair so the same target compiles for libfuzzer, afl, and
//! honggfuzz depending on which `*_fuzz` feature is enabled).

pub mod msg_targets;
pub mod utils;

/// Decodes `$data` as `$MsgType`, then re-encodes whatever decoded
/// successfully. Fuzzing only cares that neither step panics or overflows;
/// a `DecodeError` on malformed input is the expected, correct outcome.
#[macro_export]
macro_rules! test_msg {
	($MsgType: path, $data: expr) => {{
		use openingd::ser::{Readable, Writeable};
		let mut reader = ::std::io::Cursor::new($data);
		if let Ok(msg) = <$MsgType as Readable>::read(&mut reader) {
			let mut w = $crate::utils::VecWriter(Vec::new());
			let _ = Writeable::write(&msg, &mut w);
		}
	}};
}
