pub mod poll;

pub use poll::{poll, poll_until, settle, DEFAULT_POLL_INTERVAL};
