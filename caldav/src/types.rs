// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

use quirkdav_ical::{Component, ComponentKind, parse};

use crate::error::CalDavError;

/// Calendar resource href (path).
///
/// A `Href` represents the path to a calendar resource on a `CalDAV` server,
/// such as `/calendars/user/event1.ics`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Href(String);

impl Href {
    /// Creates a new `Href` from a string.
    #[must_use]
    pub const fn new(href: String) -> Self {
        Self(href)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the canonical form used for de-duplication.
    ///
    /// Servers are inconsistent about trailing slashes when the same href
    /// shows up in different REPORTs, so union results are keyed on this
    /// form rather than the literal string.
    #[must_use]
    pub fn canonical(&self) -> String {
        let trimmed = self.0.trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl Deref for Href {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Href {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Href {
    fn from(href: String) -> Self {
        Self(href)
    }
}

impl From<&str> for Href {
    fn from(href: &str) -> Self {
        Self(href.to_string())
    }
}

/// Entity tag for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ETag(String);

impl ETag {
    /// Creates a new `ETag` from a string.
    #[must_use]
    pub const fn new(etag: String) -> Self {
        Self(etag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ETag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ETag {
    fn from(etag: String) -> Self {
        Self(etag)
    }
}

impl From<&str> for ETag {
    fn from(etag: &str) -> Self {
        Self(etag.to_string())
    }
}

/// Closed set of component classes a search can resolve to.
///
/// Inferred either from the search specification or by sniffing decoded
/// calendar data, never by string comparison at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompClass {
    /// VEVENT.
    Event,
    /// VTODO.
    Todo,
    /// VJOURNAL.
    Journal,
    /// VFREEBUSY.
    FreeBusy,
    /// Anything else, or nothing decodable.
    Unknown,
}

impl CompClass {
    /// Returns the component name used in comp-filters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Event => "VEVENT",
            Self::Todo => "VTODO",
            Self::Journal => "VJOURNAL",
            Self::FreeBusy => "VFREEBUSY",
            Self::Unknown => "VCALENDAR",
        }
    }

    /// Classifies a decoded calendar by its first schedulable component.
    #[must_use]
    pub fn classify(calendar: &Component) -> Self {
        match calendar.first_schedulable().map(|c| c.kind) {
            Some(ComponentKind::Event) => Self::Event,
            Some(ComponentKind::Todo) => Self::Todo,
            Some(ComponentKind::Journal) => Self::Journal,
            _ if !calendar.children_of_kind(ComponentKind::FreeBusy).is_empty() => Self::FreeBusy,
            _ => Self::Unknown,
        }
    }
}

/// A calendar object resource as seen by the planner.
///
/// Holds the raw iCalendar text exactly as the server sent it plus the
/// decoded component tree once [`decode`](Self::decode) has run. The planner
/// only ever filters and splits copies; it never mutates an object that came
/// back from the wire.
#[derive(Debug, Clone)]
pub struct CalendarObject {
    /// The href of the resource.
    pub url: Href,
    /// The entity tag of the resource, when the server provided one.
    pub etag: Option<ETag>,
    /// Raw iCalendar data.
    pub data: Option<String>,
    /// Decoded calendar, populated by [`decode`](Self::decode).
    pub calendar: Option<Component>,
    /// Whether the object body has been transferred.
    pub loaded: bool,
}

impl CalendarObject {
    /// Creates an object from a REPORT response entry.
    #[must_use]
    pub fn new(url: Href, etag: Option<ETag>, data: Option<String>) -> Self {
        let loaded = data.as_deref().is_some_and(|d| !d.trim().is_empty());
        Self {
            url,
            etag,
            data,
            calendar: None,
            loaded,
        }
    }

    /// Decodes the raw calendar data, caching the component tree.
    ///
    /// # Errors
    ///
    /// Returns an error when no data is present or it is not parseable
    /// iCalendar text.
    pub fn decode(&mut self) -> Result<&Component, CalDavError> {
        if self.calendar.is_none() {
            let data = self
                .data
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .ok_or_else(|| CalDavError::Ical(format!("no calendar data for {}", self.url)))?;
            let mut roots = parse(data)?;
            let root = roots
                .drain(..)
                .next()
                .ok_or_else(|| CalDavError::Ical(format!("empty calendar for {}", self.url)))?;
            self.calendar = Some(root);
        }
        self.calendar
            .as_ref()
            .ok_or_else(|| CalDavError::Ical("decode failed".to_string()))
    }

    /// Returns the component class of the decoded calendar.
    #[must_use]
    pub fn comp_class(&self) -> CompClass {
        self.calendar
            .as_ref()
            .map_or(CompClass::Unknown, CompClass::classify)
    }
}
