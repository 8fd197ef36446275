//! Data models

pub mod upload;
