// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// iCalendar parsing errors.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// A content line carried no property name.
    #[error("content line {0} has no property name")]
    MissingName(usize),

    /// An `END:` line did not match the open component.
    #[error("END:{found} does not close BEGIN:{expected}")]
    MismatchedEnd {
        /// Name of the component that is currently open.
        expected: String,
        /// Name found on the `END:` line.
        found: String,
    },

    /// An `END:` line appeared with no component open.
    #[error("END:{0} without a matching BEGIN")]
    UnexpectedEnd(String),

    /// Input ended while components were still open.
    #[error("unterminated component: BEGIN:{0} was never closed")]
    UnterminatedComponent(String),

    /// No component was found in the input at all.
    #[error("no calendar component found")]
    Empty,
}
