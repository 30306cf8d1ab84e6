// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Fold-aware iCalendar content-line parser.

use crate::component::{Component, Property};
use crate::error::ParseError;

/// Parses iCalendar text into its top-level components.
///
/// Accepts both CRLF and bare LF line endings. Folded lines (continuation
/// lines starting with a space or tab, RFC 5545 §3.1) are joined before
/// content lines are split into name, parameters and value. Stray content
/// lines outside any component are ignored; some servers emit them.
///
/// # Errors
///
/// Returns an error on mismatched or missing `BEGIN`/`END` pairs, on a
/// content line without a property name, or when the input contains no
/// component at all.
pub fn parse(input: &str) -> Result<Vec<Component>, ParseError> {
    let mut roots = Vec::new();
    let mut stack: Vec<Component> = Vec::new();

    for (lineno, line) in unfold(input).iter().enumerate() {
        if line.is_empty() {
            continue;
        }

        let prop = parse_content_line(line, lineno + 1)?;

        if prop.name == "BEGIN" {
            stack.push(Component::custom(prop.value));
        } else if prop.name == "END" {
            let closing = prop.value.to_ascii_uppercase();
            let Some(open) = stack.pop() else {
                return Err(ParseError::UnexpectedEnd(closing));
            };
            if open.name != closing {
                return Err(ParseError::MismatchedEnd {
                    expected: open.name,
                    found: closing,
                });
            }
            match stack.last_mut() {
                Some(parent) => parent.add_child(open),
                None => roots.push(open),
            }
        } else if let Some(open) = stack.last_mut() {
            open.add_property(prop);
        }
        // Content line outside any component: tolerated, dropped.
    }

    if let Some(open) = stack.pop() {
        return Err(ParseError::UnterminatedComponent(open.name));
    }
    if roots.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(roots)
}

/// Joins folded lines into logical content lines.
fn unfold(input: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in input.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(cont) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(cont);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

/// Splits one logical content line into a [`Property`].
fn parse_content_line(line: &str, lineno: usize) -> Result<Property, ParseError> {
    // Find the first ':' outside of quoted parameter values.
    let mut in_quotes = false;
    let mut split_at = None;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                split_at = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (head, value) = match split_at {
        Some(i) => {
            let head = line.get(..i).unwrap_or_default();
            let value = line.get(i + 1..).unwrap_or_default();
            (head, value)
        }
        // Lines without ':' are malformed; treat the whole line as the name
        // so the error below fires only when the name is empty too.
        None => (line, ""),
    };

    let mut segments = split_unquoted(head, ';');
    let name = segments
        .next()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingName(lineno))?;

    let mut prop = Property::new(name, value);
    for segment in segments {
        if let Some((pname, pvalue)) = segment.split_once('=') {
            let pvalue = pvalue.trim_matches('"');
            prop = prop.with_param(pname, pvalue);
        }
    }
    Ok(prop)
}

/// Splits on a separator, ignoring separators inside double quotes.
fn split_unquoted(input: &str, sep: char) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == sep && !in_quotes {
            parts.push(input.get(start..i).unwrap_or_default());
            start = i + sep.len_utf8();
        }
    }
    parts.push(input.get(start..).unwrap_or_default());
    parts.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentKind;

    #[test]
    fn parse_minimal_event() {
        let text = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//t//EN\r\n\
                    BEGIN:VEVENT\r\nUID:1@example.com\r\nSUMMARY:Lunch\r\n\
                    END:VEVENT\r\nEND:VCALENDAR\r\n";
        let roots = parse(text).expect("parse");
        assert_eq!(roots.len(), 1);
        let cal = roots.first().expect("root");
        assert_eq!(cal.kind, ComponentKind::Calendar);
        assert_eq!(cal.children.len(), 1);
        let event = cal.first_schedulable().expect("event");
        assert_eq!(event.uid(), Some("1@example.com"));
        assert_eq!(event.property_value("SUMMARY"), Some("Lunch"));
    }

    #[test]
    fn parse_unfolds_continuation_lines() {
        let text = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nSUMMARY:A very lo\r\n ng summary\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let roots = parse(text).expect("parse");
        let event = roots
            .first()
            .and_then(Component::first_schedulable)
            .expect("event");
        assert_eq!(event.property_value("SUMMARY"), Some("A very long summary"));
    }

    #[test]
    fn parse_keeps_parameters_and_quoted_values() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nDTSTART;TZID=\"Europe/Oslo\":20260104T090000\nATTENDEE;CN=\"Doe; John\":mailto:john@example.com\nEND:VEVENT\nEND:VCALENDAR\n";
        let roots = parse(text).expect("parse");
        let event = roots
            .first()
            .and_then(Component::first_schedulable)
            .expect("event");

        let dtstart = event.get_property("DTSTART").expect("dtstart");
        assert_eq!(dtstart.param("TZID"), Some("Europe/Oslo"));
        assert_eq!(dtstart.value, "20260104T090000");

        let attendee = event.get_property("ATTENDEE").expect("attendee");
        assert_eq!(attendee.param("CN"), Some("Doe; John"));
        assert_eq!(attendee.value, "mailto:john@example.com");
    }

    #[test]
    fn parse_rejects_mismatched_end() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nEND:VTODO\nEND:VCALENDAR\n";
        assert!(matches!(
            parse(text),
            Err(ParseError::MismatchedEnd { .. })
        ));
    }

    #[test]
    fn parse_rejects_unterminated_component() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:1\nEND:VEVENT\n";
        assert!(matches!(
            parse(text),
            Err(ParseError::UnterminatedComponent(_))
        ));
    }

    #[test]
    fn parse_rejects_empty_input() {
        assert!(matches!(parse("\r\n\r\n"), Err(ParseError::Empty)));
    }

    #[test]
    fn parse_nested_alarm_and_timezone() {
        let text = "BEGIN:VCALENDAR\nBEGIN:VTIMEZONE\nTZID:Europe/Oslo\nBEGIN:STANDARD\nTZOFFSETTO:+0100\nEND:STANDARD\nEND:VTIMEZONE\nBEGIN:VTODO\nUID:t1\nBEGIN:VALARM\nACTION:DISPLAY\nEND:VALARM\nEND:VTODO\nEND:VCALENDAR\n";
        let roots = parse(text).expect("parse");
        let cal = roots.first().expect("root");
        assert_eq!(cal.timezones().len(), 1);
        let todo = cal.first_schedulable().expect("todo");
        assert_eq!(todo.children_of_kind(ComponentKind::Alarm).len(), 1);
    }
}
