#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod manifest;
pub mod packer;
pub mod sink;
pub mod stream;
pub mod types;
