// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Compact iCalendar (RFC 5545) component model with a fold-aware parser
//! and a CRLF emitter.
//!
//! Property values are kept in their wire form: the model preserves property
//! order and unknown properties so that objects fetched from a server can be
//! reshaped and written back without loss.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(clippy::similar_names, clippy::single_match_else, clippy::match_bool)]

mod component;
mod error;
mod formatter;
mod parser;

pub use crate::component::{Component, ComponentKind, Property};
pub use crate::error::ParseError;
pub use crate::formatter::format;
pub use crate::parser::parse;
