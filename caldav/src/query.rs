// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Query compiler: lowers a [`SearchSpec`] to REPORT request bodies.
//!
//! Compilation is pure. The planner decides *which* spec to compile (after
//! rewrites and fan-outs); this module only translates the surviving spec
//! into the RFC 4791 filter grammar, plus the multiget and sync-collection
//! bodies (RFC 4791 §9, RFC 6578 §3.2).

use jiff::Timestamp;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::CalDavError;
use crate::search::{Collation, MatchOp, PendingFragment, SearchSpec};
use crate::types::{CompClass, Href};
use crate::xml::{finish_request, ns, request_writer, write_text_element};

/// Adjustments the capability model feeds into compilation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileHints {
    /// The server chokes on any comp-filter below VCALENDAR; fetch the
    /// whole collection and let the planner filter client-side.
    pub no_comp_filter: bool,
}

/// One lowered prop-filter (exactly one condition, per the RFC grammar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPropFilter {
    /// iCalendar property name.
    pub name: String,
    /// The condition inside the prop-filter element.
    pub condition: CompiledCondition,
}

/// Condition inside a prop-filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledCondition {
    /// `<C:text-match>`.
    TextMatch {
        /// Text to match.
        value: String,
        /// RFC 4790 collation identifier.
        collation: &'static str,
        /// `negate-condition="yes"`.
        negate: bool,
    },
    /// `<C:is-not-defined/>`.
    NotDefined,
}

/// A compiled calendar-query, ready for serialization.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// Resolved component class, when the query pins one.
    pub comp_class: Option<CompClass>,
    /// Inner comp-filter name; `None` means VCALENDAR only.
    pub comp_name: Option<&'static str>,
    /// Formatted time-range attributes.
    pub time_range: Option<(String, String)>,
    /// Lowered prop-filters.
    pub prop_filters: Vec<CompiledPropFilter>,
    /// VALARM time-range nested inside the component filter.
    pub alarm_range: Option<(String, String)>,
    /// `<C:expand start end/>` attributes on calendar-data.
    pub expand: Option<(String, String)>,
    /// Whether the wire query is weaker than the spec and results must be
    /// re-checked client-side.
    pub requires_post_filter: bool,
}

/// Maps a requested collation to the RFC 4790 identifier sent on the wire.
///
/// `Locale` has no interoperable equivalent and degrades to ASCII casemap.
#[must_use]
pub const fn collation_id(collation: Collation, case_sensitive: bool) -> &'static str {
    match (collation, case_sensitive) {
        (Collation::Simple | Collation::Unicode, true) => "i;octet",
        (Collation::Simple, false) | (Collation::Locale, _) => "i;ascii-casemap",
        (Collation::Unicode, false) => "i;unicode-casemap",
    }
}

/// Formats a timestamp as a `CalDAV` basic-format UTC date-time.
#[must_use]
pub fn format_caldav_time(ts: Timestamp) -> String {
    ts.strftime("%Y%m%dT%H%M%SZ").to_string()
}

fn pending_fragment_filters(fragment: PendingFragment) -> Vec<CompiledPropFilter> {
    let casemap = "i;ascii-casemap";
    match fragment {
        PendingFragment::A => vec![
            CompiledPropFilter {
                name: "COMPLETED".to_string(),
                condition: CompiledCondition::NotDefined,
            },
            CompiledPropFilter {
                name: "STATUS".to_string(),
                condition: CompiledCondition::TextMatch {
                    value: "COMPLETED".to_string(),
                    collation: casemap,
                    negate: true,
                },
            },
            CompiledPropFilter {
                name: "STATUS".to_string(),
                condition: CompiledCondition::TextMatch {
                    value: "CANCELLED".to_string(),
                    collation: casemap,
                    negate: true,
                },
            },
        ],
        PendingFragment::B => vec![
            CompiledPropFilter {
                name: "COMPLETED".to_string(),
                condition: CompiledCondition::NotDefined,
            },
            CompiledPropFilter {
                name: "STATUS".to_string(),
                condition: CompiledCondition::NotDefined,
            },
        ],
        PendingFragment::C => vec![CompiledPropFilter {
            name: "STATUS".to_string(),
            condition: CompiledCondition::TextMatch {
                value: "NEEDS-ACTION".to_string(),
                collation: casemap,
                negate: false,
            },
        }],
    }
}

/// Lowers a search spec to a calendar-query.
///
/// Pure: no network, no capability lookups — the hints carry everything the
/// capability model decided.
#[must_use]
pub fn compile(spec: &SearchSpec, hints: CompileHints) -> CompiledQuery {
    let comp_name = if hints.no_comp_filter {
        None
    } else {
        spec.comp_class.map(CompClass::name)
    };

    // Without an inner comp-filter there is nowhere in the grammar to hang
    // conditions, so the wire query degrades to a full fetch.
    let filterable = comp_name.is_some();

    let time_range = if filterable {
        spec.start
            .zip(spec.end)
            .map(|(s, e)| (format_caldav_time(s), format_caldav_time(e)))
    } else {
        None
    };

    let mut prop_filters = Vec::new();
    if filterable {
        if let Some(fragment) = spec.pending_fragment {
            prop_filters.extend(pending_fragment_filters(fragment));
        }
        for f in &spec.filters {
            let condition = match f.op {
                MatchOp::Undefined => CompiledCondition::NotDefined,
                MatchOp::Contains | MatchOp::Equals => CompiledCondition::TextMatch {
                    value: f.value.clone(),
                    collation: collation_id(f.collation, f.case_sensitive),
                    negate: f.negate,
                },
            };
            prop_filters.push(CompiledPropFilter {
                name: f.effective_name(),
                condition,
            });
        }
    }

    let alarm_range = if filterable {
        spec.alarm_range
            .map(|(s, e)| (format_caldav_time(s), format_caldav_time(e)))
    } else {
        None
    };

    let expand = if spec.server_expand {
        spec.start
            .zip(spec.end)
            .map(|(s, e)| (format_caldav_time(s), format_caldav_time(e)))
    } else {
        None
    };

    // text-match is substring semantics on the wire; Equals and per-item
    // category matching always need a client-side re-check. A degraded
    // full fetch re-checks everything.
    let degraded = !filterable
        && (spec.comp_class.is_some() || !spec.filters.is_empty() || spec.start.is_some());
    let requires_post_filter = degraded
        || spec
            .filters
            .iter()
            .any(|f| f.op == MatchOp::Equals || f.is_category());

    CompiledQuery {
        comp_class: spec.comp_class,
        comp_name,
        time_range,
        prop_filters,
        alarm_range,
        expand,
        requires_post_filter,
    }
}

impl CompiledQuery {
    /// Serializes the calendar-query REPORT body.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn to_xml(&self) -> Result<String, CalDavError> {
        let mut writer = request_writer();

        // <C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
        let mut root = BytesStart::new("C:calendar-query");
        root.push_attribute(("xmlns:D", ns::DAV));
        root.push_attribute(("xmlns:C", ns::CALDAV));
        writer.write_event(Event::Start(root))?;

        // <D:prop>
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Empty(BytesStart::new("D:getetag")))?;
        if let Some((start, end)) = &self.expand {
            writer.write_event(Event::Start(BytesStart::new("C:calendar-data")))?;
            let mut expand = BytesStart::new("C:expand");
            expand.push_attribute(("start", start.as_str()));
            expand.push_attribute(("end", end.as_str()));
            writer.write_event(Event::Empty(expand))?;
            writer.write_event(Event::End(BytesEnd::new("C:calendar-data")))?;
        } else {
            writer.write_event(Event::Empty(BytesStart::new("C:calendar-data")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        // <C:filter><C:comp-filter name="VCALENDAR">
        writer.write_event(Event::Start(BytesStart::new("C:filter")))?;
        let mut vcal = BytesStart::new("C:comp-filter");
        vcal.push_attribute(("name", "VCALENDAR"));

        if let Some(comp_name) = self.comp_name {
            writer.write_event(Event::Start(vcal))?;

            let mut comp = BytesStart::new("C:comp-filter");
            comp.push_attribute(("name", comp_name));
            let empty_comp = self.time_range.is_none()
                && self.prop_filters.is_empty()
                && self.alarm_range.is_none();
            if empty_comp {
                writer.write_event(Event::Empty(comp))?;
            } else {
                writer.write_event(Event::Start(comp))?;

                if let Some((start, end)) = &self.time_range {
                    let mut tr = BytesStart::new("C:time-range");
                    tr.push_attribute(("start", start.as_str()));
                    tr.push_attribute(("end", end.as_str()));
                    writer.write_event(Event::Empty(tr))?;
                }

                for pf in &self.prop_filters {
                    let mut prop_filter = BytesStart::new("C:prop-filter");
                    prop_filter.push_attribute(("name", pf.name.as_str()));
                    writer.write_event(Event::Start(prop_filter))?;
                    match &pf.condition {
                        CompiledCondition::NotDefined => {
                            writer.write_event(Event::Empty(BytesStart::new(
                                "C:is-not-defined",
                            )))?;
                        }
                        CompiledCondition::TextMatch {
                            value,
                            collation,
                            negate,
                        } => {
                            let mut tm = BytesStart::new("C:text-match");
                            tm.push_attribute(("collation", *collation));
                            if *negate {
                                tm.push_attribute(("negate-condition", "yes"));
                            }
                            writer.write_event(Event::Start(tm))?;
                            writer.write_event(Event::Text(BytesText::new(value)))?;
                            writer.write_event(Event::End(BytesEnd::new("C:text-match")))?;
                        }
                    }
                    writer.write_event(Event::End(BytesEnd::new("C:prop-filter")))?;
                }

                if let Some((start, end)) = &self.alarm_range {
                    let mut alarm = BytesStart::new("C:comp-filter");
                    alarm.push_attribute(("name", "VALARM"));
                    writer.write_event(Event::Start(alarm))?;
                    let mut tr = BytesStart::new("C:time-range");
                    tr.push_attribute(("start", start.as_str()));
                    tr.push_attribute(("end", end.as_str()));
                    writer.write_event(Event::Empty(tr))?;
                    writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
                }

                writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
        } else {
            writer.write_event(Event::Empty(vcal))?;
        }

        writer.write_event(Event::End(BytesEnd::new("C:filter")))?;
        writer.write_event(Event::End(BytesEnd::new("C:calendar-query")))?;

        finish_request(writer)
    }
}

/// Builds a calendar-multiget REPORT body for the given hrefs.
///
/// # Errors
///
/// Returns an error if XML building fails.
pub fn multiget_xml(hrefs: &[Href]) -> Result<String, CalDavError> {
    let mut writer = request_writer();

    let mut root = BytesStart::new("C:calendar-multiget");
    root.push_attribute(("xmlns:D", ns::DAV));
    root.push_attribute(("xmlns:C", ns::CALDAV));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
    writer.write_event(Event::Empty(BytesStart::new("D:getetag")))?;
    writer.write_event(Event::Empty(BytesStart::new("C:calendar-data")))?;
    writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

    for href in hrefs {
        write_text_element(&mut writer, "D:href", href)?;
    }

    writer.write_event(Event::End(BytesEnd::new("C:calendar-multiget")))?;
    finish_request(writer)
}

/// Builds a sync-collection REPORT body (RFC 6578 §3.2).
///
/// An absent token asks for the initial sync; the element is still sent,
/// empty, as the RFC requires. `sync-level` is always 1 and only etags are
/// requested — bodies are fetched separately so a huge change set doesn't
/// come back in one response.
///
/// # Errors
///
/// Returns an error if XML building fails.
pub fn sync_collection_xml(token: Option<&str>) -> Result<String, CalDavError> {
    let mut writer = request_writer();

    let mut root = BytesStart::new("D:sync-collection");
    root.push_attribute(("xmlns:D", ns::DAV));
    writer.write_event(Event::Start(root))?;

    if let Some(token) = token {
        write_text_element(&mut writer, "D:sync-token", token)?;
    } else {
        // Initial sync: the token element is required but empty.
        writer.write_event(Event::Empty(BytesStart::new("D:sync-token")))?;
    }

    write_text_element(&mut writer, "D:sync-level", "1")?;

    writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
    writer.write_event(Event::Empty(BytesStart::new("D:getetag")))?;
    writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

    writer.write_event(Event::End(BytesEnd::new("D:sync-collection")))?;
    finish_request(writer)
}
