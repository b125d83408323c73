//! Batch collector for pull request review metrics.
//!
//! Discovers popular GitHub repositories, scans each one's closed pull
//! requests for the largest change set that saw a real review cycle, and
//! writes one CSV row of metrics per qualifying repository.

pub mod config;
pub mod discovery;
pub mod evaluate;
pub mod github;
pub mod harvest;
pub mod output;
pub mod throttle;
