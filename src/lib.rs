// src/lib.rs

//! hncrawl: a self-feeding priority work queue and the Hacker News graph
//! crawler built on it.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
