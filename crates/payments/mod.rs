pub mod tbank_client;
pub mod tbank_signing;
