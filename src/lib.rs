//! Capture a video page URL, ask the TakeVid server for its formats, and
//! hand the chosen one to a download manager through a background worker.

pub mod api;
pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod logging;
pub mod platform;
pub mod ui;
pub mod utils;
