// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! iCalendar emitter: CRLF line endings, folding at 75 octets.

use crate::component::{Component, Property};

const FOLD_LIMIT: usize = 75;

/// Serializes a component (and its children, recursively) to iCalendar text.
#[must_use]
pub fn format(component: &Component) -> String {
    let mut out = String::new();
    write_component(&mut out, component);
    out
}

fn write_component(out: &mut String, component: &Component) {
    write_line(out, &format!("BEGIN:{}", component.name));
    for prop in &component.properties {
        write_line(out, &content_line(prop));
    }
    for child in &component.children {
        write_component(out, child);
    }
    write_line(out, &format!("END:{}", component.name));
}

fn content_line(prop: &Property) -> String {
    let mut line = prop.name.clone();
    for (name, value) in &prop.params {
        line.push(';');
        line.push_str(name);
        line.push('=');
        if value.contains([';', ':', ',']) {
            line.push('"');
            line.push_str(value);
            line.push('"');
        } else {
            line.push_str(value);
        }
    }
    line.push(':');
    line.push_str(&prop.value);
    line
}

/// Writes one logical line, folded at 75 octets per RFC 5545 §3.1.
fn write_line(out: &mut String, line: &str) {
    let mut budget = FOLD_LIMIT;
    let mut used = 0;
    for c in line.chars() {
        let width = c.len_utf8();
        if used + width > budget {
            out.push_str("\r\n ");
            used = 0;
            // Continuation lines start with one space, leave room for it.
            budget = FOLD_LIMIT - 1;
        }
        out.push(c);
        used += width;
    }
    out.push_str("\r\n");
}
