//! # plasmoscan-analysis
//!
//! Analysis service client and image quality assessment backends.
//!
//! The pipeline depends only on the [`AnalysisBackend`] and
//! [`QualityAssessor`] traits from `plasmoscan-core`; this crate provides
//! the HTTP client used in the field, the on-device quality heuristics, and
//! instrumented mocks for tests.
//!
//! [`AnalysisBackend`]: plasmoscan_core::AnalysisBackend
//! [`QualityAssessor`]: plasmoscan_core::QualityAssessor

pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod quality;

pub use http::HttpAnalysisBackend;
pub use quality::LocalQualityAssessor;
