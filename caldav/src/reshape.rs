// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Result reshaping: recurrence expansion, occurrence splitting, the
//! client-side filter mirror, and sorting.
//!
//! Everything here is stateless and operates on decoded calendars. The
//! planner calls in after hydration, both for requested expansion and to
//! re-check results that a downgraded wire query may have over-fetched.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use jiff::Timestamp;
use quirkdav_ical::{Component, ComponentKind, Property, format};
use rrule::{RRule, RRuleSet, Tz, Unvalidated};

use crate::error::CalDavError;
use crate::search::{MatchOp, PropFilter, SearchSpec};
use crate::types::{CalendarObject, CompClass};

const RECURRENCE_PROPS: &[&str] = &["RRULE", "RDATE", "EXDATE", "EXRULE"];

/// Recurrence expansion seam.
///
/// Takes a decoded VCALENDAR whose master component recurs and returns one
/// schedulable component per occurrence in `[start, end)`. Tests substitute
/// deterministic doubles; production uses [`RruleExpander`].
pub trait RecurrenceExpand {
    /// Expands the recurring components of `calendar` over the window.
    ///
    /// # Errors
    ///
    /// Returns an error when the recurrence rule or its anchor date-times
    /// cannot be interpreted.
    fn expand(
        &self,
        calendar: &Component,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Component>, CalDavError>;
}

/// Production expander backed by the `rrule` crate.
///
/// Zoned local times are interpreted as UTC; the window comparison happens
/// on that same axis, so occurrences stay self-consistent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RruleExpander;

/// Whether a decoded calendar contains a recurring component.
#[must_use]
pub fn has_recurrence(calendar: &Component) -> bool {
    calendar
        .schedulables()
        .iter()
        .any(|c| c.has_any_property(&["RRULE", "RDATE"]))
}

fn timestamp_to_chrono(ts: Timestamp) -> Result<DateTime<Utc>, CalDavError> {
    DateTime::<Utc>::from_timestamp(ts.as_second(), 0)
        .ok_or_else(|| CalDavError::Ical(format!("timestamp out of range: {ts}")))
}

fn parse_ical_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    if let Some((d, t)) = raw.split_once('T') {
        let date = NaiveDate::parse_from_str(d, "%Y%m%d").ok()?;
        let time = NaiveTime::parse_from_str(t, "%H%M%S").ok()?;
        Some(DateTime::from_naive_utc_and_offset(
            NaiveDateTime::new(date, time),
            Utc,
        ))
    } else {
        let date = NaiveDate::parse_from_str(raw, "%Y%m%d").ok()?;
        Some(DateTime::from_naive_utc_and_offset(
            date.and_time(NaiveTime::MIN),
            Utc,
        ))
    }
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// The anchor property carrying a component's start: DTSTART, or DUE for
/// todos without one.
fn anchor_datetime(comp: &Component) -> Option<DateTime<Utc>> {
    comp.property_value("DTSTART")
        .or_else(|| comp.property_value("DUE"))
        .and_then(parse_ical_datetime)
}

fn end_datetime(comp: &Component, start: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    comp.property_value("DTEND")
        .or_else(|| comp.property_value("DUE"))
        .and_then(parse_ical_datetime)
        .or(start)
}

fn build_rrule_set(master: &Component, dtstart: DateTime<Utc>) -> Result<RRuleSet, CalDavError> {
    let dt_start = dtstart.with_timezone(&Tz::UTC);

    let mut set = if let Some(text) = master.property_value("RRULE") {
        let rrule = text
            .parse::<RRule<Unvalidated>>()
            .map_err(|e| CalDavError::Ical(format!("invalid RRULE: {e}")))?;
        rrule
            .build(dt_start)
            .map_err(|e| CalDavError::Ical(format!("invalid RRULE: {e}")))?
    } else {
        RRuleSet::new(dt_start)
    };

    let rdates: Vec<DateTime<Tz>> = master
        .properties_named("RDATE")
        .iter()
        .flat_map(|p| p.value.split(','))
        .filter_map(parse_ical_datetime)
        .map(|dt| dt.with_timezone(&Tz::UTC))
        .collect();
    if !rdates.is_empty() {
        set = set.set_rdates(rdates);
    }

    let exdates: Vec<DateTime<Tz>> = master
        .properties_named("EXDATE")
        .iter()
        .flat_map(|p| p.value.split(','))
        .filter_map(parse_ical_datetime)
        .map(|dt| dt.with_timezone(&Tz::UTC))
        .collect();
    if !exdates.is_empty() {
        set = set.set_exdates(exdates);
    }

    Ok(set)
}

fn occurrence_from_master(
    master: &Component,
    dtstart: DateTime<Utc>,
    occurrence: DateTime<Utc>,
) -> Component {
    let mut occ = master.clone();
    occ.remove_properties(RECURRENCE_PROPS);

    let delta = occurrence - dtstart;
    shift_date_property(&mut occ, "DTSTART", delta);
    shift_date_property(&mut occ, "DTEND", delta);
    shift_date_property(&mut occ, "DUE", delta);

    occ.set_property(Property::new("RECURRENCE-ID", format_utc(occurrence)));
    occ
}

fn shift_date_property(comp: &mut Component, name: &str, delta: TimeDelta) {
    if let Some(dt) = comp.property_value(name).and_then(parse_ical_datetime) {
        comp.set_property(Property::new(name, format_utc(dt + delta)));
    }
}

impl RecurrenceExpand for RruleExpander {
    fn expand(
        &self,
        calendar: &Component,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Component>, CalDavError> {
        let window_start = timestamp_to_chrono(start)?;
        let window_end = timestamp_to_chrono(end)?;

        let schedulables = calendar.schedulables();
        let masters: Vec<&&Component> = schedulables
            .iter()
            .filter(|c| !c.has_property("RECURRENCE-ID"))
            .collect();
        let overrides: Vec<&&Component> = schedulables
            .iter()
            .filter(|c| c.has_property("RECURRENCE-ID"))
            .collect();

        let override_key = |c: &Component| {
            c.property_value("RECURRENCE-ID")
                .and_then(parse_ical_datetime)
                .map(format_utc)
        };

        let mut occurrences = Vec::new();
        let mut used_overrides = Vec::new();

        for master in masters {
            if !master.has_any_property(&["RRULE", "RDATE"]) {
                continue;
            }
            let Some(dtstart) = anchor_datetime(master) else {
                return Err(CalDavError::Ical(format!(
                    "recurring component {} has no usable DTSTART",
                    master.uid().unwrap_or("<no uid>")
                )));
            };

            let set = build_rrule_set(master, dtstart)?
                .after(window_start.with_timezone(&Tz::UTC))
                .before(window_end.with_timezone(&Tz::UTC));

            for date in set.all(u16::MAX).dates {
                let occurrence = date.with_timezone(&Utc);
                // after()/before() are inclusive; the window end is not.
                if occurrence >= window_end {
                    continue;
                }
                let key = format_utc(occurrence);
                if let Some(ov) = overrides
                    .iter()
                    .find(|c| override_key(c).as_deref() == Some(key.as_str()))
                {
                    let mut replaced = (***ov).clone();
                    replaced.remove_properties(RECURRENCE_PROPS);
                    used_overrides.push(key);
                    occurrences.push(replaced);
                } else {
                    occurrences.push(occurrence_from_master(master, dtstart, occurrence));
                }
            }
        }

        // Overrides moved into the window from outside it still count.
        for ov in overrides {
            let Some(key) = override_key(ov) else { continue };
            if used_overrides.contains(&key) {
                continue;
            }
            if let Some(start_dt) = anchor_datetime(ov) {
                if start_dt >= window_start && start_dt < window_end {
                    let mut moved = (**ov).clone();
                    moved.remove_properties(RECURRENCE_PROPS);
                    occurrences.push(moved);
                }
            }
        }

        Ok(occurrences)
    }
}

/// Checks the output of an expansion: every occurrence carries a
/// `RECURRENCE-ID` and no recurrence rule properties survive.
///
/// # Errors
///
/// Returns an error describing the first violating occurrence.
pub fn validate_expansion(occurrences: &[Component]) -> Result<(), CalDavError> {
    for occ in occurrences {
        if !occ.has_property("RECURRENCE-ID") {
            return Err(CalDavError::Ical(format!(
                "expanded occurrence of {} lacks RECURRENCE-ID",
                occ.uid().unwrap_or("<no uid>")
            )));
        }
        if occ.has_any_property(RECURRENCE_PROPS) {
            return Err(CalDavError::Ical(format!(
                "expanded occurrence of {} still carries recurrence rules",
                occ.uid().unwrap_or("<no uid>")
            )));
        }
    }
    Ok(())
}

/// Rebuilds an object's calendar around the given schedulable components,
/// keeping root properties and VTIMEZONE children.
#[must_use]
pub fn rebuild_calendar(calendar: &Component, schedulables: Vec<Component>) -> Component {
    let mut rebuilt = calendar.clone();
    rebuilt.children = calendar
        .timezones()
        .into_iter()
        .cloned()
        .chain(schedulables)
        .collect();
    rebuilt
}

/// Splits a multi-occurrence object into one object per schedulable.
///
/// Each split object shares the parent's URL and etag, carries the root
/// properties and timezone definitions, and re-serializes its own data.
#[must_use]
pub fn split_occurrences(obj: &CalendarObject) -> Vec<CalendarObject> {
    let Some(calendar) = obj.calendar.as_ref() else {
        return vec![obj.clone()];
    };
    let schedulables = calendar.schedulables();
    if schedulables.len() <= 1 {
        return vec![obj.clone()];
    }

    schedulables
        .into_iter()
        .map(|sched| {
            let single = rebuild_calendar(calendar, vec![sched.clone()]);
            CalendarObject {
                url: obj.url.clone(),
                etag: obj.etag.clone(),
                data: Some(format(&single)),
                calendar: Some(single),
                loaded: true,
            }
        })
        .collect()
}

fn fold_case(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

fn filter_matches(filter: &PropFilter, comp: &Component) -> bool {
    let name = filter.effective_name();
    let hit = match filter.op {
        MatchOp::Undefined => !comp.has_property(&name),
        MatchOp::Contains | MatchOp::Equals => {
            let needle = fold_case(&filter.value, filter.case_sensitive);
            if filter.is_category() {
                // Category matching is per list item, not over the joined
                // value.
                comp.properties_named("CATEGORIES")
                    .iter()
                    .flat_map(|p| p.value.split(','))
                    .map(|item| fold_case(item.trim(), filter.case_sensitive))
                    .any(|item| match filter.op {
                        MatchOp::Contains => item.contains(&needle),
                        _ => item == needle,
                    })
            } else {
                comp.properties_named(&name)
                    .iter()
                    .map(|p| fold_case(&p.value, filter.case_sensitive))
                    .any(|hay| match filter.op {
                        MatchOp::Contains => hay.contains(&needle),
                        _ => hay == needle,
                    })
            }
        }
    };
    if filter.negate { !hit } else { hit }
}

/// Pending means neither completed nor cancelled, with no COMPLETED stamp.
fn is_pending(comp: &Component) -> bool {
    if comp.has_property("COMPLETED") {
        return false;
    }
    comp.property_value("STATUS").is_none_or(|s| {
        let s = s.to_ascii_uppercase();
        s != "COMPLETED" && s != "CANCELLED"
    })
}

fn overlaps_window(comp: &Component, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let Some(comp_start) = anchor_datetime(comp) else {
        // Undated components cannot be excluded by a window.
        return true;
    };
    let comp_end = end_datetime(comp, Some(comp_start)).unwrap_or(comp_start);
    comp_start < end && comp_end >= start
}

fn component_matches(spec: &SearchSpec, comp: &Component) -> bool {
    if let Some(class) = spec.comp_class {
        let wanted = match class {
            CompClass::Event => ComponentKind::Event,
            CompClass::Todo => ComponentKind::Todo,
            CompClass::Journal => ComponentKind::Journal,
            CompClass::FreeBusy => ComponentKind::FreeBusy,
            CompClass::Unknown => ComponentKind::Unknown,
        };
        if comp.kind != wanted {
            return false;
        }
    }

    if comp.kind == ComponentKind::Todo && !spec.include_completed && !is_pending(comp) {
        return false;
    }

    // A recurring master anchored before the window can still produce
    // occurrences inside it; expansion decides, not the anchor date.
    if !comp.has_any_property(&["RRULE", "RDATE"]) {
        if let (Some(start), Some(end)) = (spec.start, spec.end) {
            match (timestamp_to_chrono(start), timestamp_to_chrono(end)) {
                (Ok(s), Ok(e)) => {
                    if !overlaps_window(comp, s, e) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    spec.filters.iter().all(|f| filter_matches(f, comp))
}

/// Client-side mirror of the search predicate.
///
/// Applied against the *original* spec after any downgrade weakened the
/// wire query; a calendar matches when any of its schedulables does.
#[must_use]
pub fn matches_spec(spec: &SearchSpec, calendar: &Component) -> bool {
    calendar
        .schedulables()
        .iter()
        .any(|comp| component_matches(spec, comp))
}

/// Drops objects whose decoded calendar does not satisfy the spec.
pub fn retain_matching(spec: &SearchSpec, objects: &mut Vec<CalendarObject>) {
    objects.retain(|obj| obj.calendar.as_ref().is_some_and(|cal| matches_spec(spec, cal)));
}

fn default_sort_value(key: &str, kind: ComponentKind) -> &'static str {
    match key {
        // Undated todos sort after every dated one.
        "DUE" => "20500101T000000",
        "DTSTART" => "19700101T000000",
        "STATUS" => match kind {
            ComponentKind::Todo => "NEEDS-ACTION",
            ComponentKind::Journal => "FINAL",
            _ => "TENTATIVE",
        },
        _ => "",
    }
}

fn normalize_sort_value(value: &str) -> String {
    let v = value.trim().trim_end_matches('Z');
    if v.len() == 8 && v.bytes().all(|b| b.is_ascii_digit()) {
        format!("{v}T000000")
    } else {
        v.to_string()
    }
}

fn sort_key(obj: &CalendarObject, keys: &[String]) -> Vec<String> {
    let comp = obj.calendar.as_ref().and_then(Component::first_schedulable);
    keys.iter()
        .map(|key| {
            let key = key.to_ascii_uppercase();
            comp.map_or_else(String::new, |c| {
                c.property_value(&key).map_or_else(
                    || default_sort_value(&key, c.kind).to_string(),
                    normalize_sort_value,
                )
            })
        })
        .collect()
}

/// Sorts objects by the given property keys, with per-property defaults for
/// absent values so undated objects land in a deterministic place.
pub fn sort_objects(objects: &mut [CalendarObject], sort_keys: &[String]) {
    if sort_keys.is_empty() {
        return;
    }
    objects.sort_by_cached_key(|obj| sort_key(obj, sort_keys));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Href;
    use quirkdav_ical::parse;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    fn yearly_event() -> Component {
        let data = "BEGIN:VCALENDAR\r\n\
            VERSION:2.0\r\n\
            PRODID:-//t//EN\r\n\
            BEGIN:VEVENT\r\n\
            UID:yearly-1\r\n\
            DTSTART:20240104T090000Z\r\n\
            DTEND:20240104T100000Z\r\n\
            RRULE:FREQ=YEARLY\r\n\
            SUMMARY:Annual review\r\n\
            END:VEVENT\r\n\
            END:VCALENDAR\r\n";
        parse(data).unwrap().remove(0)
    }

    #[test]
    fn yearly_rule_expands_once_per_year() {
        let cal = yearly_event();
        let occurrences = RruleExpander
            .expand(&cal, ts("2024-01-01T00:00:00Z"), ts("2027-01-01T00:00:00Z"))
            .expect("expand");

        assert_eq!(occurrences.len(), 3);
        let starts: Vec<_> = occurrences
            .iter()
            .map(|o| o.property_value("DTSTART").unwrap().to_string())
            .collect();
        assert_eq!(
            starts,
            ["20240104T090000Z", "20250104T090000Z", "20260104T090000Z"]
        );
        for occ in &occurrences {
            assert!(occ.has_property("RECURRENCE-ID"));
            assert!(!occ.has_property("RRULE"));
            // DTEND shifted in lockstep.
            let s = parse_ical_datetime(occ.property_value("DTSTART").unwrap()).unwrap();
            let e = parse_ical_datetime(occ.property_value("DTEND").unwrap()).unwrap();
            assert_eq!(e - s, TimeDelta::hours(1));
        }
        validate_expansion(&occurrences).expect("valid");
    }

    #[test]
    fn window_end_is_exclusive() {
        let cal = yearly_event();
        let occurrences = RruleExpander
            .expand(&cal, ts("2024-01-01T00:00:00Z"), ts("2025-01-04T09:00:00Z"))
            .expect("expand");
        assert_eq!(occurrences.len(), 1);
    }

    #[test]
    fn exdate_removes_occurrence() {
        let data = "BEGIN:VCALENDAR\r\n\
            BEGIN:VEVENT\r\n\
            UID:d1\r\n\
            DTSTART:20260101T080000Z\r\n\
            RRULE:FREQ=DAILY;COUNT=3\r\n\
            EXDATE:20260102T080000Z\r\n\
            END:VEVENT\r\n\
            END:VCALENDAR\r\n";
        let cal = parse(data).unwrap().remove(0);
        let occurrences = RruleExpander
            .expand(&cal, ts("2026-01-01T00:00:00Z"), ts("2026-02-01T00:00:00Z"))
            .expect("expand");
        assert_eq!(occurrences.len(), 2);
    }

    #[test]
    fn override_replaces_generated_occurrence() {
        let data = "BEGIN:VCALENDAR\r\n\
            BEGIN:VEVENT\r\n\
            UID:d1\r\n\
            DTSTART:20260101T080000Z\r\n\
            RRULE:FREQ=DAILY;COUNT=2\r\n\
            SUMMARY:Plain\r\n\
            END:VEVENT\r\n\
            BEGIN:VEVENT\r\n\
            UID:d1\r\n\
            RECURRENCE-ID:20260102T080000Z\r\n\
            DTSTART:20260102T100000Z\r\n\
            SUMMARY:Moved\r\n\
            END:VEVENT\r\n\
            END:VCALENDAR\r\n";
        let cal = parse(data).unwrap().remove(0);
        let occurrences = RruleExpander
            .expand(&cal, ts("2026-01-01T00:00:00Z"), ts("2026-02-01T00:00:00Z"))
            .expect("expand");

        assert_eq!(occurrences.len(), 2);
        let moved = occurrences
            .iter()
            .find(|o| o.property_value("SUMMARY") == Some("Moved"))
            .expect("override kept");
        assert_eq!(moved.property_value("DTSTART"), Some("20260102T100000Z"));
    }

    #[test]
    fn validate_expansion_rejects_untagged() {
        let mut occ = Component::new(ComponentKind::Event);
        occ.add_property(Property::new("UID", "x"));
        assert!(validate_expansion(&[occ]).is_err());
    }

    #[test]
    fn split_produces_independent_objects() {
        let cal = yearly_event();
        let occurrences = RruleExpander
            .expand(&cal, ts("2024-01-01T00:00:00Z"), ts("2027-01-01T00:00:00Z"))
            .expect("expand");
        let expanded = rebuild_calendar(&cal, occurrences);
        let obj = CalendarObject {
            url: Href::from("/cal/yearly.ics"),
            etag: None,
            data: None,
            calendar: Some(expanded),
            loaded: true,
        };

        let split = split_occurrences(&obj);
        assert_eq!(split.len(), 3);
        for piece in &split {
            assert_eq!(piece.url, obj.url);
            let cal = piece.calendar.as_ref().unwrap();
            assert_eq!(cal.schedulables().len(), 1);
            let text = piece.data.as_deref().unwrap();
            assert!(text.starts_with("BEGIN:VCALENDAR\r\n"));
            assert!(text.contains("RECURRENCE-ID:"));
        }
    }

    #[test]
    fn matches_spec_mirrors_filters() {
        let data = "BEGIN:VCALENDAR\r\n\
            BEGIN:VTODO\r\n\
            UID:t1\r\n\
            SUMMARY:Water the plants\r\n\
            CATEGORIES:home,garden\r\n\
            END:VTODO\r\n\
            END:VCALENDAR\r\n";
        let cal = parse(data).unwrap().remove(0);

        let spec = SearchSpec::todos().with_filter(PropFilter::contains("SUMMARY", "plants"));
        assert!(matches_spec(&spec, &cal));

        let spec = SearchSpec::todos().with_filter(PropFilter::contains("SUMMARY", "PLANTS"));
        assert!(matches_spec(&spec, &cal), "insensitive by default");

        let spec = SearchSpec::todos()
            .with_filter(PropFilter::contains("SUMMARY", "PLANTS").case_sensitive());
        assert!(!matches_spec(&spec, &cal));

        let spec = SearchSpec::todos().with_filter(PropFilter::equals("category", "garden"));
        assert!(matches_spec(&spec, &cal));

        let spec = SearchSpec::todos().with_filter(PropFilter::equals("category", "gard"));
        assert!(!matches_spec(&spec, &cal), "item equality, not substring");

        let spec = SearchSpec::todos().with_filter(PropFilter::undefined("DUE"));
        assert!(matches_spec(&spec, &cal));

        let spec = SearchSpec::todos().with_filter(PropFilter::contains("SUMMARY", "tax").negated());
        assert!(matches_spec(&spec, &cal));
    }

    #[test]
    fn recurring_master_anchored_before_window_still_matches() {
        let cal = yearly_event();
        let spec = SearchSpec::events()
            .with_range(ts("2026-01-01T00:00:00Z"), ts("2027-01-01T00:00:00Z"));
        assert!(matches_spec(&spec, &cal));
    }

    #[test]
    fn matches_spec_excludes_completed_todos() {
        let data = "BEGIN:VCALENDAR\r\n\
            BEGIN:VTODO\r\n\
            UID:t2\r\n\
            STATUS:COMPLETED\r\n\
            END:VTODO\r\n\
            END:VCALENDAR\r\n";
        let cal = parse(data).unwrap().remove(0);
        assert!(!matches_spec(&SearchSpec::todos(), &cal));
        assert!(matches_spec(&SearchSpec::todos().with_completed(), &cal));
    }

    #[test]
    fn sort_missing_due_lands_last() {
        let make = |uid: &str, due: Option<&str>| {
            let mut todo = Component::new(ComponentKind::Todo);
            todo.add_property(Property::new("UID", uid));
            if let Some(due) = due {
                todo.add_property(Property::new("DUE", due));
            }
            let mut cal = Component::calendar("-//t//EN");
            cal.add_child(todo);
            CalendarObject {
                url: Href::from(format!("/cal/{uid}.ics")),
                etag: None,
                data: None,
                calendar: Some(cal),
                loaded: true,
            }
        };

        let mut objects = vec![
            make("undated", None),
            make("later", Some("20260301T120000Z")),
            make("soon", Some("20260101")),
        ];
        sort_objects(&mut objects, &["DUE".to_string()]);

        let order: Vec<_> = objects
            .iter()
            .map(|o| o.calendar.as_ref().unwrap().first_schedulable().unwrap().uid().unwrap())
            .collect();
        assert_eq!(order, ["soon", "later", "undated"]);
    }
}
