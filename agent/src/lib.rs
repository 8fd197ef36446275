//! Pushagent Library
//!
//! Uploads a deployment's docker image to the registry issued by the control
//! plane and reports the result back.

pub mod deploy;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod storage;
pub mod utils;
