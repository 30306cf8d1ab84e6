// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::types::Href;

/// `CalDAV` client errors.
///
/// The planner distinguishes three terminal classes: [`Consistency`] errors
/// are raised before any network call and never retried, [`Report`] errors
/// may trigger an automatic downgrade before being propagated, and
/// [`NotFound`] is terminal for the specific resource (the sync engine
/// reinterprets it as a deletion).
///
/// [`Consistency`]: CalDavError::Consistency
/// [`Report`]: CalDavError::Report
/// [`NotFound`]: CalDavError::NotFound
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CalDavError {
    /// The request contradicts itself; rejected before any network call.
    #[error("inconsistent request: {0}")]
    Consistency(String),

    /// The server rejected or mishandled a REPORT.
    #[error("REPORT failed with status {status}: {message}")]
    Report {
        /// HTTP status returned by the server.
        status: u16,
        /// Response body or a short diagnostic.
        message: String,
    },

    /// Resource not found.
    #[error("resource not found: {0}")]
    NotFound(Href),

    /// HTTP layer error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// XML parsing/writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// iCalendar decoding or reshaping error.
    #[error("iCalendar error: {0}")]
    Ical(String),

    /// Response that cannot be interpreted (e.g. sync REPORT without token).
    #[error("invalid server response: {0}")]
    InvalidResponse(String),

    /// The server lacks a capability the caller asked for.
    #[error("server doesn't support required capability: {0}")]
    UnsupportedCapability(String),
}

impl From<reqwest::Error> for CalDavError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<quick_xml::Error> for CalDavError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for CalDavError {
    fn from(e: quick_xml::encoding::EncodingError) -> Self {
        Self::Xml(e.to_string())
    }
}

impl From<quirkdav_ical::ParseError> for CalDavError {
    fn from(e: quirkdav_ical::ParseError) -> Self {
        Self::Ical(e.to_string())
    }
}

impl From<std::io::Error> for CalDavError {
    fn from(e: std::io::Error) -> Self {
        Self::Xml(format!("IO error: {e}"))
    }
}
