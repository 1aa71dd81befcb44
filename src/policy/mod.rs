//! Decision policies subscribed to the event bus.

pub mod offset;
pub mod seek_back;
