//! Common type definitions for vt-checker.
//!
//! # Overview
//!
//! - [`HashType`]: Digest algorithm used to identify files to the backend
//! - [`KeyStorage`]: How the API key is kept in the settings file
//! - [`Severity`]: Level attached to messages sent through a [`crate::sink::LogSink`]
//! - [`Report`]: Normalized backend answer for one resource
//! - [`Verdict`]: User-facing classification of a [`Report`]

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::config::ALERT_RATIO;

/// Digest algorithm applied to local files and downloaded resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HashType {
    Md5,
    Sha1,
    #[default]
    Sha256,
}

/// Storage mode of the API key inside the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyStorage {
    /// The key is stored as-is.
    Plain,

    /// The key is stored as a password-protected envelope.
    #[default]
    Encrypted,
}

/// Severity of a message emitted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Normalized result of a backend query.
///
/// When `available` is false the counters carry no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    /// Whether the backend knows the resource.
    pub available: bool,

    /// Engines flagging the resource.
    pub positive_count: u32,

    /// Engines that produced a verdict.
    pub total_count: u32,

    /// Date of the last analysis, as reported by the backend.
    pub scan_date: String,

    /// Link to the full analysis.
    pub permalink: String,
}

impl Report {
    /// A report for a resource the backend has never seen.
    #[inline]
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// How a report is presented to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not present in the backend database.
    Unavailable,

    /// Known and not flagged by any engine.
    Clean,

    /// Flagged by less than [`ALERT_RATIO`] of the engines.
    Suspicious,

    /// Flagged by at least [`ALERT_RATIO`] of the engines.
    Malicious,
}

impl Verdict {
    pub fn from_report(report: &Report) -> Self {
        if !report.available {
            return Self::Unavailable;
        }

        if report.positive_count == 0 {
            return Self::Clean;
        }

        let ratio = f64::from(report.positive_count) / f64::from(report.total_count.max(1));
        if ratio < ALERT_RATIO { Self::Suspicious } else { Self::Malicious }
    }

    /// Whether the verdict warrants a distinct alert.
    #[inline]
    pub fn is_alert(self) -> bool {
        matches!(self, Self::Suspicious | Self::Malicious)
    }
}
