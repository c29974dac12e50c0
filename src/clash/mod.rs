mod client;
mod types;

pub use client::{auto_detect, format_api_url, test_connection, ClashClient, DEFAULT_TEST_URL};
pub use types::*;
