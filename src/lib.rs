//! Combination search and minimum-tax settlement for tax refund claims.
//!
//! This crate decides which of a claim's eligible tax credits and exemptions
//! should be applied together to maximise the net refund, subject to legal
//! exclusion pairs and the minimum-tax floor.

#![warn(missing_docs)]

pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
