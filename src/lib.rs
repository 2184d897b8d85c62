// src/lib.rs

//! feedwatch: listing feed watcher with chat notifications

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
