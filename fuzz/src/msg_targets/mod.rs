pub mod msg_accept_channel;
pub mod msg_funding_created;
pub mod msg_funding_signed;
pub mod msg_open_channel;
