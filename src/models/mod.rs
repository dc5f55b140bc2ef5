//! Data models for the message store

mod message;

pub use message::*;
