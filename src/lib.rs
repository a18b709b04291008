//! HTML to PDF conversion service backed by headless Chromium.
pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
