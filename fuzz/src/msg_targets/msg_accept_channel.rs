use openingd::msgs;

use crate::test_msg;

#[inline]
pub fn msg_accept_channel_test(data: &[u8]) {
	test_msg!(msgs::AcceptChannel, data);
}

#[no_mangle]
pub extern "C" fn msg_accept_channel_run(data: *const u8, datalen: usize) {
	let data = unsafe { std::slice::from_raw_parts(data, datalen) };
	test_msg!(msgs::AcceptChannel, data);
}
