//! Core library for the daily-report command line application.
//!
//! The library fills a spreadsheet template from time-stamped measurement
//! exports. IO adapters live under [`report::io`], the matching engine is
//! split into [`report::resolve`], [`report::aggregate`] and
//! [`report::rank`], merged-region aware cell addressing is in
//! [`report::grid`], and the per-run orchestration is in [`report::fill`].

pub mod report;

pub use report::{
    Result, ReportError, aggregate, config, error, fill, grid, io, model, rank, resolve, template,
};
