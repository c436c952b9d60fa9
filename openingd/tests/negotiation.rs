//! End-to-end negotiation scenarios: a real `Funder` and a real `Fundee`
//! talking over an in-memory duplex pipe, with a minimal stand-in supervisor
//! on each side, enough to exercise the actual state machines without a
//! real process boundary.

use std::io;
use std::io::{Cursor, Read, Write};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread;

use openingd::config::ChannelConfig;
use openingd::error::{ChannelFailure, EngineFatal};
use openingd::fundee;
use openingd::funder;
use openingd::keys::KeyMaterial;
use openingd::peer::PeerStream;
use openingd::ser::{Readable, Writeable};
use openingd::supervisor::{ctrl_type, AcceptMsg, ControlChannel, OpenFundingMsg, OpenMsg};
use openingd::validate::PolicyBounds;

/// One end of an in-memory, blocking, bidirectional byte pipe standing in
/// for the encrypted peer stream (fd 3) in tests.
struct PipeEnd {
	tx: SyncSender<Vec<u8>>,
	rx: Receiver<Vec<u8>>,
	buf: Vec<u8>,
}

impl Read for PipeEnd {
	fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
		while self.buf.is_empty() {
			match self.rx.recv() {
				Ok(chunk) => self.buf = chunk,
				Err(_) => return Ok(0),
			}
		}
		let n = out.len().min(self.buf.len());
		out[..n].copy_from_slice(&self.buf[..n]);
		self.buf.drain(..n);
		Ok(n)
	}
}
impl Write for PipeEnd {
	fn write(&mut self, data: &[u8]) -> io::Result<usize> {
		self.tx
			.send(data.to_vec())
			.map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer end gone"))?;
		Ok(data.len())
	}
	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

fn duplex_pair() -> (PipeEnd, PipeEnd) {
	let (tx_a, rx_a) = sync_channel(64);
	let (tx_b, rx_b) = sync_channel(64);
	(PipeEnd { tx: tx_a, rx: rx_b, buf: Vec::new() }, PipeEnd { tx: tx_b, rx: rx_a, buf: Vec::new() })
}

fn localconf(reserve_placeholder: u64) -> ChannelConfig {
	ChannelConfig {
		dust_limit_satoshis: 546,
		max_htlc_value_in_flight_msat: 5_000_000_000,
		channel_reserve_satoshis: reserve_placeholder,
		htlc_minimum_msat: 1,
		to_self_delay: 144,
		max_accepted_htlcs: 30,
		minimum_depth: 3,
	}
}

fn policy() -> PolicyBounds {
	PolicyBounds { max_to_self_delay: 2016, min_effective_htlc_capacity_msat: 1 }
}

fn fabricate_open_funding_control(funding_txid: [u8; 32], funding_txout: u16) -> Cursor<Vec<u8>> {
	let mut body = Vec::new();
	ctrl_type::OPEN_FUNDING.write(&mut body).unwrap();
	OpenFundingMsg { funding_txid, funding_txout }.write(&mut body).unwrap();
	let mut framed = Vec::new();
	(body.len() as u32).write(&mut framed).unwrap();
	framed.extend_from_slice(&body);
	Cursor::new(framed)
}

/// Reads exactly one peer-wire frame off `end` by hand (bypassing
/// `PeerStream`) the way a supervisor relaying a freshly-received
/// `open_channel` to a not-yet-spawned fundee engine would: strip the 2-byte
/// BOLT-1 type tag and hand the rest on as `open_channel_bytes`.
fn intercept_open_channel(end: &mut PipeEnd) -> Vec<u8> {
	let len: u16 = Readable::read(end).unwrap();
	let mut buf = vec![0u8; len as usize];
	end.read_exact(&mut buf).unwrap();
	assert_eq!(u16::from_be_bytes([buf[0], buf[1]]), openingd::msgs::msg_type::OPEN_CHANNEL);
	buf[2..].to_vec()
}

#[test]
fn happy_path_funder_and_fundee_agree() {
	let funder_seed = [0x11u8; 32];
	let funder_keys = KeyMaterial::derive(&funder_seed).unwrap();
	let fundee_keys = KeyMaterial::derive(&[0x22; 32]).unwrap();

	let (funder_end, mut fundee_end) = duplex_pair();

	let funding_txid = [0x77u8; 32];
	let funding_txout = 0u16;
	let open = OpenMsg { funding_satoshis: 1_000_000, push_msat: 0, feerate_per_kw: 15_000, max_minimum_depth: 10 };

	let funder_thread = thread::spawn(move || {
		let mut peer = PeerStream::new(funder_end);
		let mut ctrl = ControlChannel::new(fabricate_open_funding_control(funding_txid, funding_txout), Vec::new());
		funder::run_funder(&funder_keys, localconf(0), policy(), open, &mut peer, &mut ctrl)
	});

	// Simulate the supervisor relaying the just-sent open_channel to a
	// freshly spawned fundee engine.
	let open_channel_bytes = intercept_open_channel(&mut fundee_end);
	let accept = AcceptMsg { min_feerate: 1_000, max_feerate: 50_000, open_channel_bytes };
	let mut fundee_peer = PeerStream::new(fundee_end);
	let fundee_result =
		fundee::run_fundee(&fundee_keys, localconf(0), policy(), accept, &mut fundee_peer).expect("fundee succeeds");

	let funder_result = funder_thread.join().unwrap().expect("funder succeeds");

	assert_eq!(funder_result.channel_id, fundee_result.channel_id);
	assert_eq!(funder_result.channel_id, [0xffu8; 32]);
	assert_eq!(funder_result.remoteconf.dust_limit_satoshis, 546);
	assert_eq!(fundee_result.remoteconf.dust_limit_satoshis, 546);

	// accept_channel's first_per_commitment_point is the funder's own point
	// echoed back rather than the fundee's, so the funder ends up with its
	// own point as "next_per_commit[REMOTE]".
	let funder_keys_again = KeyMaterial::derive(&funder_seed).unwrap();
	assert_eq!(funder_result.next_per_commit_remote, funder_keys_again.next_per_commit_local);
}

/// With `push_msat = 0` (as in `happy_path_funder_and_fundee_agree`), the
/// fundee's `to_local` output is below the dust limit and dropped from both
/// sides' commitment transaction entirely, so the mismatched
/// `first_per_commitment_point` in `accept_channel` never shows up in either
/// side's transaction bytes. Raising `push_msat` so the fundee's `to_local`
/// output clears dust puts that per-commitment point back into the
/// transaction the funder signs and the fundee verifies against, built from
/// two different points on the two sides, so the signature no longer
/// verifies.
#[test]
fn nonzero_push_exposes_the_accept_channel_point_mismatch() {
	let fundee_keys = KeyMaterial::derive(&[0x66; 32]).unwrap();
	let funder_keys = KeyMaterial::derive(&[0x77; 32]).unwrap();

	let (funder_end, mut fundee_end) = duplex_pair();

	let funding_txid = [0x88u8; 32];
	let funding_txout = 0u16;
	let open = OpenMsg {
		funding_satoshis: 1_000_000,
		push_msat: 100_000_000,
		feerate_per_kw: 15_000,
		max_minimum_depth: 10,
	};

	let funder_thread = thread::spawn(move || {
		let mut peer = PeerStream::new(funder_end);
		let mut ctrl = ControlChannel::new(fabricate_open_funding_control(funding_txid, funding_txout), Vec::new());
		funder::run_funder(&funder_keys, localconf(0), policy(), open, &mut peer, &mut ctrl)
	});

	let open_channel_bytes = intercept_open_channel(&mut fundee_end);
	let accept = AcceptMsg { min_feerate: 1_000, max_feerate: 50_000, open_channel_bytes };
	let mut fundee_peer = PeerStream::new(fundee_end);
	let fundee_result = fundee::run_fundee(&fundee_keys, localconf(0), policy(), accept, &mut fundee_peer);

	assert!(matches!(fundee_result, Err(EngineFatal::Channel(ChannelFailure::PeerReadFailed(_)))));

	// The fundee never reaches funding_signed, so drop its end of the pipe
	// to unblock the funder thread's read instead of leaving it waiting.
	drop(fundee_peer);
	let _ = funder_thread.join();
}

#[test]
fn bad_push_rejected_before_any_peer_io() {
	let funder_keys = KeyMaterial::derive(&[0x33; 32]).unwrap();
	let (funder_end, _fundee_end) = duplex_pair();
	let mut peer = PeerStream::new(funder_end);
	let mut ctrl = ControlChannel::new(Cursor::new(Vec::new()), Vec::new());

	let open = OpenMsg { funding_satoshis: 1000, push_msat: 1_000_001, feerate_per_kw: 15_000, max_minimum_depth: 10 };
	let result = funder::run_funder(&funder_keys, localconf(0), policy(), open, &mut peer, &mut ctrl);

	match result {
		Err(EngineFatal::Channel(ChannelFailure::BadParam(_))) => {}
		other => panic!("expected BadParam, got {:?}", other.map(|_| ()).err().map(|e| e.to_string())),
	}
}

#[test]
fn to_self_delay_too_large_is_rejected_by_the_fundee() {
	let fundee_keys = KeyMaterial::derive(&[0x44; 32]).unwrap();
	let funder_keys = KeyMaterial::derive(&[0x55; 32]).unwrap();

	let (mut funder_end, mut fundee_end) = duplex_pair();
	let funding_txid = [0x01u8; 32];

	let open = OpenMsg { funding_satoshis: 500_000, push_msat: 0, feerate_per_kw: 15_000, max_minimum_depth: 10 };
	let funder_thread = thread::spawn(move || {
		let mut peer = PeerStream::new(funder_end);
		let mut ctrl = ControlChannel::new(fabricate_open_funding_control(funding_txid, 0), Vec::new());
		// A too-large to_self_delay on our own localconf is what the peer
		// will see and reject; the funder side itself doesn't validate its
		// own to_self_delay against the fundee's policy (it has no way to
		// know it), so this thread's result is discarded; we only care that
		// the fundee fails the channel instead of hanging.
		let mut hostile_localconf = localconf(0);
		hostile_localconf.to_self_delay = 1009;
		let _ = funder::run_funder(&funder_keys, hostile_localconf, policy(), open, &mut peer, &mut ctrl);
	});

	let open_channel_bytes = intercept_open_channel(&mut fundee_end);
	let accept = AcceptMsg { min_feerate: 1_000, max_feerate: 50_000, open_channel_bytes };
	let mut fundee_peer = PeerStream::new(fundee_end);
	let mut restrictive_policy = policy();
	restrictive_policy.max_to_self_delay = 1008;
	let result = fundee::run_fundee(&fundee_keys, localconf(0), restrictive_policy, accept, &mut fundee_peer);

	assert!(matches!(result, Err(EngineFatal::Channel(ChannelFailure::PeerBadConfig(_)))));
	let _ = funder_thread.join();
}
