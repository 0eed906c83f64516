//! Timetable desk: keeps a timetable request consistent while it is being
//! edited, sends it to the external generator and interprets the result.

pub mod client;
pub mod config;
pub mod data;
pub mod editor;
pub mod error;
pub mod grid;
pub mod payload;
pub mod server;
pub mod slots;
pub mod store;
pub mod validate;
