pub mod mac;
pub mod protocol;
pub mod types;
