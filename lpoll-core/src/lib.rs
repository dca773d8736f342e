#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod events;
pub mod fanout;
pub mod feed;
pub mod processors;
pub mod upstream;
pub mod utils;
