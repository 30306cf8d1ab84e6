// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Multistatus response parsing.

use quick_xml::events::{BytesRef, Event};

use crate::error::CalDavError;
use crate::types::{CalendarObject, ETag, Href};

/// Accumulates the text content of a leaf element up to its end tag.
///
/// quick-xml delivers predefined entity references as separate
/// [`Event::GeneralRef`] events, so `Standup &amp; coffee` arrives in three
/// pieces that are stitched back together here. Whitespace around the
/// content is XML formatting, not content, and is trimmed.
fn read_element_text(reader: &mut quick_xml::Reader<&[u8]>) -> Result<String, CalDavError> {
    let mut out = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(text) => out.push_str(text.decode()?.as_ref()),
            Event::CData(cdata) => out.push_str(&String::from_utf8_lossy(cdata.as_ref())),
            Event::GeneralRef(r) => match resolve_reference(&r)? {
                Some(c) => out.push(c),
                None => {
                    return Err(CalDavError::Xml(format!(
                        "unresolvable entity reference: &{};",
                        r.decode()?
                    )));
                }
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(CalDavError::Xml(
                    "unexpected end of multistatus".to_string(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim().to_string())
}

/// Resolves the predefined XML entities and numeric character references.
fn resolve_reference(r: &BytesRef) -> Result<Option<char>, CalDavError> {
    let name = r.decode()?;
    Ok(match name.as_ref() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => numeric_reference(&name),
    })
}

fn numeric_reference(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

/// `WebDAV` multistatus response (REPORT and sync-collection).
#[derive(Debug, Clone)]
pub struct MultiStatus {
    /// Top-level sync token, present on sync-collection responses.
    pub sync_token: Option<String>,
    /// The response items.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// Resource href.
    pub href: Href,
    /// Response-level status line, e.g. `HTTP/1.1 404 Not Found`.
    ///
    /// Sync-collection responses carry deletions this way.
    pub status: Option<String>,
    /// `getetag` value from a successful propstat.
    pub etag: Option<ETag>,
    /// Inline `calendar-data` from a successful propstat.
    pub calendar_data: Option<String>,
}

impl ResponseItem {
    /// Whether the response-level status (if any) marks the resource gone.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s.contains("404"))
    }

    /// Whether the item is usable (no response-level failure status).
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status
            .as_deref()
            .is_none_or(|s| s.contains("200") || s.contains("207"))
    }
}

impl MultiStatus {
    /// Parses a multistatus response from XML.
    ///
    /// Matches on local names only; servers prefix elements arbitrarily.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    pub fn from_xml(xml: &str) -> Result<Self, CalDavError> {
        let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
        reader.config_mut().check_end_names = true;

        let mut sync_token = None;
        let mut responses = Vec::new();
        let mut current: Option<ResponseItem> = None;
        let mut in_propstat = false;
        let mut propstat_ok = true;
        // Properties staged from the current propstat; committed only once
        // its status turns out successful.
        let mut ps_etag: Option<ETag> = None;
        let mut ps_data: Option<String> = None;

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::End(ref e) if e.name().local_name().into_inner() == b"multistatus" => break,
                Event::Eof => break,

                Event::Start(ref e) => match e.name().local_name().into_inner() {
                    b"response" => {
                        current = Some(ResponseItem {
                            href: Href::new(String::new()),
                            status: None,
                            etag: None,
                            calendar_data: None,
                        });
                        in_propstat = false;
                    }
                    b"href" if current.is_some() => {
                        let href = read_element_text(&mut reader)?;
                        if let Some(ref mut item) = current {
                            if item.href.is_empty() {
                                item.href = Href::new(href);
                            }
                        }
                    }
                    b"propstat" if current.is_some() => {
                        in_propstat = true;
                        propstat_ok = true;
                        ps_etag = None;
                        ps_data = None;
                    }
                    b"status" => {
                        let status = read_element_text(&mut reader)?;
                        if in_propstat {
                            propstat_ok = status.contains("200") || status.contains("207");
                        } else if let Some(ref mut item) = current {
                            item.status = Some(status);
                        }
                    }
                    b"getetag" if in_propstat => {
                        ps_etag = Some(ETag::new(read_element_text(&mut reader)?));
                    }
                    b"calendar-data" if in_propstat => {
                        // Arrives escaped or as CDATA; both collapse to the
                        // raw iCalendar text.
                        ps_data = Some(read_element_text(&mut reader)?);
                    }
                    b"sync-token" if current.is_none() => {
                        sync_token = Some(read_element_text(&mut reader)?);
                    }
                    _ => {}
                },
                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"response" => {
                        if let Some(item) = current.take() {
                            responses.push(item);
                        }
                        in_propstat = false;
                    }
                    b"propstat" => {
                        // Only a successful propstat contributes properties.
                        // A 404 propstat (calendar-data withheld, say) must
                        // not wipe what an earlier 200 propstat of the same
                        // response already provided.
                        if propstat_ok {
                            if let Some(ref mut item) = current {
                                if ps_etag.is_some() {
                                    item.etag = ps_etag.take();
                                }
                                if ps_data.is_some() {
                                    item.calendar_data = ps_data.take();
                                }
                            }
                        }
                        ps_etag = None;
                        ps_data = None;
                        in_propstat = false;
                    }
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            sync_token,
            responses,
        })
    }

    /// Converts REPORT responses to calendar objects, skipping items whose
    /// response-level status is a failure.
    #[must_use]
    pub fn into_objects(self) -> Vec<CalendarObject> {
        self.responses
            .into_iter()
            .filter(ResponseItem::is_ok)
            .map(|item| CalendarObject::new(item.href, item.etag, item.calendar_data))
            .collect()
    }
}
