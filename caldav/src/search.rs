// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Search specification: what the caller wants, independent of how the
//! planner gets it from the server.

use jiff::Timestamp;

use crate::error::CalDavError;
use crate::types::CompClass;

/// How a property value is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    /// Substring match.
    Contains,
    /// Whole-value match.
    Equals,
    /// The property must be absent.
    Undefined,
}

/// Text collation requested for a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Collation {
    /// ASCII-only semantics.
    #[default]
    Simple,
    /// Unicode-aware semantics.
    Unicode,
    /// Locale-dependent semantics; lowered to the closest RFC 4790
    /// collation the server is guaranteed to know.
    Locale,
}

/// One property condition of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropFilter {
    /// Property name; `category` is a virtual alias for `CATEGORIES`.
    pub name: String,
    /// Value to match. Empty for [`MatchOp::Undefined`].
    pub value: String,
    /// Match operation.
    pub op: MatchOp,
    /// Whether the caller asked for substring semantics explicitly, as
    /// opposed to getting them as the default. Only explicitly-requested
    /// substring matches participate in the substring downgrade.
    pub(crate) explicit_op: bool,
    /// Case-sensitive matching.
    pub case_sensitive: bool,
    /// Requested collation.
    pub collation: Collation,
    /// Invert the match (`negate-condition`).
    pub negate: bool,
}

impl PropFilter {
    /// Matches when the property value contains `value` (explicit request).
    #[must_use]
    pub fn contains(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            op: MatchOp::Contains,
            explicit_op: true,
            case_sensitive: false,
            collation: Collation::default(),
            negate: false,
        }
    }

    /// Matches with the default operation (substring, implicitly).
    #[must_use]
    pub fn matching(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            explicit_op: false,
            ..Self::contains(name, value)
        }
    }

    /// Matches when the property value equals `value`.
    #[must_use]
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: MatchOp::Equals,
            explicit_op: true,
            ..Self::contains(name, value)
        }
    }

    /// Matches when the property is absent.
    #[must_use]
    pub fn undefined(name: impl Into<String>) -> Self {
        Self {
            op: MatchOp::Undefined,
            explicit_op: true,
            ..Self::contains(name, "")
        }
    }

    /// Requests case-sensitive matching.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Requests a specific collation.
    #[must_use]
    pub const fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Inverts the match.
    #[must_use]
    pub const fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// The effective iCalendar property name (resolving virtual aliases).
    #[must_use]
    pub fn effective_name(&self) -> String {
        let upper = self.name.to_ascii_uppercase();
        if upper == "CATEGORY" { "CATEGORIES".to_string() } else { upper }
    }

    /// Whether this is a category filter (matched per list item, not over
    /// the raw joined value).
    #[must_use]
    pub fn is_category(&self) -> bool {
        self.effective_name() == "CATEGORIES"
    }
}

/// The three sub-queries a pending-incomplete-todo search decomposes into.
///
/// A: COMPLETED absent and STATUS neither COMPLETED nor CANCELLED,
/// B: COMPLETED absent and STATUS absent,
/// C: STATUS equals NEEDS-ACTION.
/// Their union is exactly the pending set; individually each stays inside
/// the filter grammar every server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PendingFragment {
    A,
    B,
    C,
}

/// A search over a calendar collection.
///
/// Value semantics: the planner rewrites searches by building modified
/// copies via the `with_*` builders, never by mutating in place, so the
/// original spec stays available for client-side re-checking.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    /// Component class to search, when known. `None` searches all classes.
    pub comp_class: Option<CompClass>,
    /// Window start (inclusive).
    pub start: Option<Timestamp>,
    /// Window end (exclusive).
    pub end: Option<Timestamp>,
    /// Expand recurrences client-side.
    pub expand: bool,
    /// Ask the server to expand recurrences.
    pub server_expand: bool,
    /// For todo searches: include completed and cancelled todos.
    pub include_completed: bool,
    /// Split expanded recurrence sets into one object per occurrence.
    pub split_expanded: bool,
    /// Property conditions, all of which must hold.
    pub filters: Vec<PropFilter>,
    /// Property names to sort by, in priority order.
    pub sort_keys: Vec<String>,
    /// Restrict to objects with an alarm in this range.
    pub alarm_range: Option<(Timestamp, Timestamp)>,
    /// Set on the cloned sub-specs of a pending-todo decomposition.
    pub(crate) pending_fragment: Option<PendingFragment>,
    /// Set once a downgrade stripped server-side conditions; the planner
    /// then re-applies the original spec client-side.
    pub(crate) needs_post_filter: bool,
}

impl SearchSpec {
    fn for_class(comp_class: Option<CompClass>) -> Self {
        Self {
            comp_class,
            start: None,
            end: None,
            expand: false,
            server_expand: false,
            include_completed: false,
            split_expanded: true,
            filters: Vec::new(),
            sort_keys: Vec::new(),
            alarm_range: None,
            pending_fragment: None,
            needs_post_filter: false,
        }
    }

    /// A search over events.
    #[must_use]
    pub fn events() -> Self {
        Self::for_class(Some(CompClass::Event))
    }

    /// A search over todos. Completed and cancelled todos are excluded
    /// unless [`with_completed`](Self::with_completed) is set.
    #[must_use]
    pub fn todos() -> Self {
        Self::for_class(Some(CompClass::Todo))
    }

    /// A search over journal entries.
    #[must_use]
    pub fn journals() -> Self {
        Self::for_class(Some(CompClass::Journal))
    }

    /// A search over all component classes.
    #[must_use]
    pub fn any() -> Self {
        Self::for_class(None)
    }

    /// Restricts the search to a time window.
    #[must_use]
    pub const fn with_range(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    /// Requests client-side recurrence expansion.
    #[must_use]
    pub const fn with_expand(mut self) -> Self {
        self.expand = true;
        self
    }

    /// Requests server-side recurrence expansion.
    #[must_use]
    pub const fn with_server_expand(mut self) -> Self {
        self.server_expand = true;
        self
    }

    /// Includes completed and cancelled todos.
    #[must_use]
    pub const fn with_completed(mut self) -> Self {
        self.include_completed = true;
        self
    }

    /// Keeps expanded recurrence sets as single multi-occurrence objects.
    #[must_use]
    pub const fn without_split(mut self) -> Self {
        self.split_expanded = false;
        self
    }

    /// Adds a property condition.
    #[must_use]
    pub fn with_filter(mut self, filter: PropFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds a sort key.
    #[must_use]
    pub fn sorted_by(mut self, key: impl Into<String>) -> Self {
        self.sort_keys.push(key.into());
        self
    }

    /// Restricts to objects with an alarm in the given range.
    #[must_use]
    pub const fn with_alarm_range(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.alarm_range = Some((start, end));
        self
    }

    /// Rejects internally contradictory specs before any network traffic.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Consistency`] when recurrence expansion is
    /// requested without a complete time window.
    pub fn validate(&self) -> Result<(), CalDavError> {
        if (self.expand || self.server_expand) && (self.start.is_none() || self.end.is_none()) {
            return Err(CalDavError::Consistency(
                "recurrence expansion requires both start and end of a time range".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether this is a pending-incomplete-todo search, the one shape
    /// that needs decomposition.
    #[must_use]
    pub(crate) fn is_pending_todo(&self) -> bool {
        self.comp_class == Some(CompClass::Todo)
            && !self.include_completed
            && self.pending_fragment.is_none()
    }

    /// Copy with one pending-todo fragment selected. The fragment encodes
    /// the completion condition itself, so the copy stops excluding
    /// completed todos at the spec level.
    #[must_use]
    pub(crate) fn with_fragment(&self, fragment: PendingFragment) -> Self {
        let mut spec = self.clone();
        spec.pending_fragment = Some(fragment);
        spec.include_completed = true;
        spec
    }

    /// Copy with the given filters and the post-filter marker set.
    #[must_use]
    pub(crate) fn with_downgraded_filters(&self, filters: Vec<PropFilter>) -> Self {
        let mut spec = self.clone();
        spec.filters = filters;
        spec.needs_post_filter = true;
        spec
    }

    /// Copy pinned to one component class (fan-out step).
    #[must_use]
    pub(crate) fn with_class(&self, comp_class: CompClass) -> Self {
        let mut spec = self.clone();
        spec.comp_class = Some(comp_class);
        spec
    }
}
