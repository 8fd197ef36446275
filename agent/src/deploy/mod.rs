//! Docker image upload module

pub mod command;
pub mod docker;
pub mod fsm;
pub mod memory;
pub mod retry;
pub mod uploader;
