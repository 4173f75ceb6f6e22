#![forbid(unsafe_code)]

//! Library half of tubegrab: a download front-end that hands URL resolution
//! to an external yt-dlp compatible program and keeps a crash-recoverable
//! record of the one download in progress.
//!
//! The binary wires these pieces to a terminal; everything here is usable on
//! its own.

pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod i18n;
pub mod preferences;
pub mod presenter;
pub mod resolver;
pub mod session;
pub mod store;
