// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML utilities for WebDAV/CalDAV processing.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::BytesText;

use crate::error::CalDavError;

/// XML namespaces used in `CalDAV`.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";
}

/// Writer used by all request builders: two-space indent over a byte buffer.
pub(crate) fn request_writer() -> Writer<Cursor<Vec<u8>>> {
    Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
}

/// Writes a leaf element with text content: `<name>text</name>`.
pub(crate) fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    name: &str,
    text: &str,
) -> Result<(), CalDavError> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Finishes a request body, converting the written bytes to a `String`.
pub(crate) fn finish_request(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, CalDavError> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| CalDavError::Xml(format!("request body is not UTF-8: {e}")))
}
