use openingd::msgs;

use crate::test_msg;

#[inline]
pub fn msg_funding_created_test(data: &[u8]) {
	test_msg!(msgs::FundingCreated, data);
}

#[no_mangle]
pub extern "C" fn msg_funding_created_run(data: *const u8, datalen: usize) {
	let data = unsafe { std::slice::from_raw_parts(data, datalen) };
	test_msg!(msgs::FundingCreated, data);
}
