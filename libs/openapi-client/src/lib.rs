//! Wire models for the deployment control plane API

pub mod models;
