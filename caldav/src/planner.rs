// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Search planner: turns one search spec into however many REPORTs the
//! server actually handles, then reshapes the union into what was asked.
//!
//! Planning runs as a worklist of spec copies. Each copy is either rewritten
//! into simpler copies (downgrades, fan-outs, the pending-todo
//! decomposition) or executed; executed copies may re-enter the worklist
//! after a capability self-correction. Termination is structural: every
//! rewrite removes the condition that triggered it.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::capability::{CapabilityModel, Support};
use crate::error::CalDavError;
use crate::http::Transport;
use crate::query::{CompileHints, compile};
use crate::reshape::{
    self, RecurrenceExpand, has_recurrence, rebuild_calendar, split_occurrences,
    validate_expansion,
};
use crate::response::MultiStatus;
use crate::search::{PendingFragment, SearchSpec};
use crate::types::{CalendarObject, CompClass, Href};

enum Step {
    Rewrite(Vec<SearchSpec>),
    Execute(SearchSpec),
}

enum Outcome {
    Done {
        objects: Vec<CalendarObject>,
        post_filter: bool,
    },
    Retry(SearchSpec),
}

const fn needs_downgrade(support: Support) -> bool {
    matches!(support, Support::Unsupported | Support::Fragile)
}

/// Adaptive search executor over one calendar collection.
#[derive(Debug)]
pub struct SearchPlanner<'a, T: Transport, E: RecurrenceExpand> {
    transport: &'a T,
    capabilities: &'a mut CapabilityModel,
    expander: E,
    base_url: &'a str,
    collection: &'a str,
}

impl<'a, T: Transport, E: RecurrenceExpand> SearchPlanner<'a, T, E> {
    /// Creates a planner for one collection.
    ///
    /// `collection` is the collection path on the server; `base_url` is the
    /// server origin used to absolutize hrefs.
    pub fn new(
        transport: &'a T,
        capabilities: &'a mut CapabilityModel,
        expander: E,
        base_url: &'a str,
        collection: &'a str,
    ) -> Self {
        Self {
            transport,
            capabilities,
            expander,
            base_url,
            collection,
        }
    }

    fn full_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        }
    }

    /// Runs one search end to end.
    ///
    /// # Errors
    ///
    /// `Consistency` for contradictory specs (before any network call),
    /// `NotFound` when the collection itself is missing, `Report` when the
    /// server rejects a query that has no downgrade left. Per-object load
    /// and decode failures are logged and dropped, never propagated.
    pub async fn search(&mut self, spec: &SearchSpec) -> Result<Vec<CalendarObject>, CalDavError> {
        spec.validate()?;

        let mut results: Vec<CalendarObject> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut post_filter = false;

        let mut queue = VecDeque::from([spec.clone()]);
        while let Some(current) = queue.pop_front() {
            match self.plan(&current) {
                Step::Rewrite(specs) => {
                    post_filter |= specs.iter().any(|s| s.needs_post_filter);
                    queue.extend(specs);
                }
                Step::Execute(exec) => match self.execute(&exec).await? {
                    Outcome::Retry(again) => queue.push_back(again),
                    Outcome::Done {
                        objects,
                        post_filter: query_weakened,
                    } => {
                        post_filter |= query_weakened || exec.needs_post_filter;
                        for obj in objects {
                            if seen.insert(obj.url.canonical()) {
                                results.push(obj);
                            }
                        }
                    }
                },
            }
        }

        let mut results = self.hydrate(results).await;

        if post_filter {
            debug!(before = results.len(), "re-checking results against the original spec");
            reshape::retain_matching(spec, &mut results);
        }

        if spec.expand || spec.server_expand {
            results = self.expand_results(spec, results);
        }

        reshape::sort_objects(&mut results, &spec.sort_keys);
        Ok(results)
    }

    /// One planning decision for one spec copy.
    fn plan(&mut self, spec: &SearchSpec) -> Step {
        // Pending-incomplete todos cannot be asked for in one query unless
        // negated text-matches are reliable and expanded recurrences carry
        // pending occurrences.
        if spec.is_pending_todo() {
            let negated = self.capabilities.support_for("search.filters.negated");
            let pending = self
                .capabilities
                .support_for("search.recurrences.includes-pending");
            if negated == Support::Full && pending == Support::Full {
                debug!("pending-todo fast path: single negated-status query");
                return Step::Rewrite(vec![spec.with_fragment(PendingFragment::A)]);
            }
            debug!("pending-todo decomposition into three status fragments");
            return Step::Rewrite(vec![
                spec.with_fragment(PendingFragment::A),
                spec.with_fragment(PendingFragment::B),
                spec.with_fragment(PendingFragment::C),
            ]);
        }

        if needs_downgrade(self.capabilities.support_for("search.text.category"))
            && spec.filters.iter().any(crate::search::PropFilter::is_category)
        {
            debug!("category filter downgraded to client-side matching");
            let kept = spec
                .filters
                .iter()
                .filter(|f| !f.is_category())
                .cloned()
                .collect();
            return Step::Rewrite(vec![spec.with_downgraded_filters(kept)]);
        }

        if needs_downgrade(self.capabilities.support_for("search.text.substring"))
            && spec
                .filters
                .iter()
                .any(|f| f.op == crate::search::MatchOp::Contains && f.explicit_op)
        {
            debug!("explicit substring filters downgraded to client-side matching");
            let kept = spec
                .filters
                .iter()
                .filter(|f| !(f.op == crate::search::MatchOp::Contains && f.explicit_op))
                .cloned()
                .collect();
            return Step::Rewrite(vec![spec.with_downgraded_filters(kept)]);
        }

        if needs_downgrade(self.capabilities.support_for("search.filters.combined"))
            && spec.start.is_some()
            && !spec.filters.is_empty()
        {
            debug!("combined time-range + property query downgraded to time-range only");
            return Step::Rewrite(vec![spec.with_downgraded_filters(Vec::new())]);
        }

        if spec.comp_class.is_none()
            && self.capabilities.support_for("search.comp-type.optional")
                == Support::Unsupported
        {
            debug!("component-type fan-out: server requires an explicit comp-filter");
            return Step::Rewrite(vec![
                spec.with_class(CompClass::Event),
                spec.with_class(CompClass::Todo),
                spec.with_class(CompClass::Journal),
            ]);
        }

        Step::Execute(spec.clone())
    }

    async fn execute(&mut self, spec: &SearchSpec) -> Result<Outcome, CalDavError> {
        let hints = CompileHints {
            no_comp_filter: self.capabilities.support_for("search.comp-filter")
                == Support::Unsupported,
        };

        let mut wire_spec = spec.clone();
        if wire_spec.server_expand
            && self
                .capabilities
                .support_for("search.recurrences.expanded")
                == Support::Unsupported
        {
            // Already learnt better; expansion happens client-side.
            wire_spec.server_expand = false;
        }

        let query = compile(&wire_spec, hints);
        let body = query.to_xml()?;
        let url = self.full_url(self.collection);
        let resp = self
            .transport
            .send("REPORT", &url, Some("1"), Some(body))
            .await?;

        if resp.is_not_found() {
            return Err(CalDavError::NotFound(Href::from(self.collection)));
        }

        if !resp.is_success() {
            if query.expand.is_some() {
                debug!(
                    status = resp.status,
                    "server-side expansion rejected; retrying client-side"
                );
                self.capabilities
                    .set_feature("search.recurrences.expanded", Support::Unsupported);
                return Ok(Outcome::Retry(spec.clone()));
            }
            if spec.comp_class.is_none()
                && resp.status != 400
                && self.capabilities.support_for("server.backward-compat") == Support::Full
            {
                debug!(
                    status = resp.status,
                    "classless query rejected by a backward-compat server; fanning out"
                );
                self.capabilities
                    .set_feature("search.comp-type.optional", Support::Unsupported);
                return Ok(Outcome::Retry(spec.clone()));
            }
            return Err(CalDavError::Report {
                status: resp.status,
                message: resp.body.trim().to_string(),
            });
        }

        let objects = MultiStatus::from_xml(&resp.body)?.into_objects();
        Ok(Outcome::Done {
            objects,
            post_filter: query.requires_post_filter,
        })
    }

    /// Reloads objects that came back without calendar data and decodes
    /// everything. Individual failures are logged and dropped.
    async fn hydrate(&self, objects: Vec<CalendarObject>) -> Vec<CalendarObject> {
        let mut hydrated = Vec::with_capacity(objects.len());
        for mut obj in objects {
            if !obj.loaded {
                let url = self.full_url(&obj.url);
                match self.transport.send("GET", &url, None, None).await {
                    Ok(resp) if resp.is_success() && !resp.body.trim().is_empty() => {
                        obj.etag = resp.etag.or(obj.etag);
                        obj.data = Some(resp.body);
                        obj.loaded = true;
                    }
                    Ok(resp) => {
                        warn!(url = %obj.url, status = resp.status, "dropping unloadable object");
                        continue;
                    }
                    Err(e) => {
                        warn!(url = %obj.url, error = %e, "dropping object after load failure");
                        continue;
                    }
                }
            }
            match obj.decode() {
                Ok(_) => hydrated.push(obj),
                Err(e) => {
                    warn!(url = %obj.url, error = %e, "dropping undecodable object");
                }
            }
        }
        hydrated
    }

    /// Expands whatever still carries recurrence rules (the server may have
    /// expanded already) and splits when asked to.
    fn expand_results(
        &self,
        spec: &SearchSpec,
        objects: Vec<CalendarObject>,
    ) -> Vec<CalendarObject> {
        // validate() guaranteed the window.
        let (Some(start), Some(end)) = (spec.start, spec.end) else {
            return objects;
        };

        let mut expanded = Vec::with_capacity(objects.len());
        for mut obj in objects {
            let Some(calendar) = obj.calendar.as_ref() else {
                expanded.push(obj);
                continue;
            };
            if has_recurrence(calendar) {
                let occurrences = match self.expander.expand(calendar, start, end) {
                    Ok(occ) => occ,
                    Err(e) => {
                        warn!(url = %obj.url, error = %e, "dropping object after expansion failure");
                        continue;
                    }
                };
                if let Err(e) = validate_expansion(&occurrences) {
                    warn!(url = %obj.url, error = %e, "dropping object with invalid expansion");
                    continue;
                }
                if occurrences.is_empty() {
                    // Recurring, but nothing falls inside the window.
                    continue;
                }
                let rebuilt = rebuild_calendar(calendar, occurrences);
                obj.data = Some(quirkdav_ical::format(&rebuilt));
                obj.calendar = Some(rebuilt);
            }
            expanded.push(obj);
        }

        if spec.split_expanded {
            expanded.iter().flat_map(split_occurrences).collect()
        } else {
            expanded
        }
    }
}
