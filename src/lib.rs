// src/lib.rs

//! gradewatch library
//!
//! Checks the WebSinu grade portal for each configured user and notifies
//! about grades that appeared or changed since the last run.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
