// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Incremental synchronization via sync-collection REPORTs (RFC 6578).

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::CalDavError;
use crate::http::Transport;
use crate::query::sync_collection_xml;
use crate::response::MultiStatus;
use crate::types::{CalendarObject, Href};

/// Client-side replica state for one collection.
///
/// Objects are keyed by canonical href. The token is opaque; only the
/// server interprets it.
#[derive(Debug, Clone, Default)]
pub struct SyncCollectionState {
    /// Token identifying the last synchronized state.
    pub sync_token: String,
    /// Known objects, keyed by [`Href::canonical`].
    pub objects: HashMap<String, CalendarObject>,
}

/// Result of one sync round.
///
/// The same href may be reported updated across consecutive rounds; applying
/// an update twice is idempotent for callers keeping a keyed store.
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Objects created or changed since the previous token.
    pub updated: Vec<Href>,
    /// Objects removed since the previous token.
    pub deleted: Vec<Href>,
}

/// Token-based sync driver for one collection.
#[derive(Debug)]
pub struct SyncEngine<'a, T: Transport> {
    transport: &'a T,
    base_url: &'a str,
    collection: &'a str,
}

impl<'a, T: Transport> SyncEngine<'a, T> {
    /// Creates a sync engine for one collection.
    pub fn new(transport: &'a T, base_url: &'a str, collection: &'a str) -> Self {
        Self {
            transport,
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

    async fn report(&self, token: Option<&str>) -> Result<MultiStatus, CalDavError> {
        let body = sync_collection_xml(token)?;
        let url = self.full_url(self.collection);
        let resp = self
            .transport
            .send("REPORT", &url, Some("1"), Some(body))
            .await?;

        if resp.is_not_found() {
            return Err(CalDavError::NotFound(Href::from(self.collection)));
        }
        if !resp.is_success() {
            return Err(CalDavError::Report {
                status: resp.status,
                message: resp.body.trim().to_string(),
            });
        }

        let multi = MultiStatus::from_xml(&resp.body)?;
        if multi.sync_token.is_none() {
            return Err(CalDavError::InvalidResponse(
                "sync-collection response without a sync-token".to_string(),
            ));
        }
        Ok(multi)
    }

    /// Performs the initial enumeration of the collection.
    ///
    /// The returned state holds etag-only objects; bodies are fetched lazily
    /// by the first [`sync`](Self::sync) that sees them change, or by the
    /// caller via multiget.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a missing collection, or a response
    /// without a sync token.
    pub async fn initial(&self) -> Result<SyncCollectionState, CalDavError> {
        let multi = self.report(None).await?;
        let sync_token = multi.sync_token.clone().unwrap_or_default();

        let mut objects = HashMap::new();
        for obj in multi.into_objects() {
            objects.insert(obj.url.canonical(), obj);
        }
        debug!(count = objects.len(), "initial sync enumerated collection");

        Ok(SyncCollectionState {
            sync_token,
            objects,
        })
    }

    /// Advances the state by one round and reports what changed.
    ///
    /// Changed objects are reloaded so the state always holds current
    /// bodies; a 404 on reload means the object vanished between the REPORT
    /// and the GET and lands in the deleted partition. The token advances
    /// even when nothing changed.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, a missing collection, or a response
    /// without a sync token. Reload failures other than 404 are logged and
    /// skipped; the object will reappear in a later round.
    pub async fn sync(
        &self,
        state: &mut SyncCollectionState,
    ) -> Result<SyncOutcome, CalDavError> {
        let multi = self.report(Some(&state.sync_token)).await?;
        let next_token = multi.sync_token.clone().unwrap_or_default();

        let mut outcome = SyncOutcome::default();
        for item in multi.responses {
            let key = item.href.canonical();

            if item.is_not_found() {
                state.objects.remove(&key);
                outcome.deleted.push(item.href);
                continue;
            }
            if !item.is_ok() {
                warn!(href = %item.href, status = ?item.status, "skipping undecodable sync entry");
                continue;
            }

            let unchanged = state
                .objects
                .get(&key)
                .and_then(|known| known.etag.as_ref())
                .zip(item.etag.as_ref())
                .is_some_and(|(a, b)| a == b);
            if unchanged {
                continue;
            }

            let url = self.full_url(&item.href);
            match self.transport.send("GET", &url, None, None).await {
                Ok(resp) if resp.is_success() => {
                    let etag = resp.etag.or(item.etag);
                    let obj = CalendarObject::new(item.href.clone(), etag, Some(resp.body));
                    state.objects.insert(key, obj);
                    outcome.updated.push(item.href);
                }
                Ok(resp) if resp.is_not_found() => {
                    state.objects.remove(&key);
                    outcome.deleted.push(item.href);
                }
                Ok(resp) => {
                    warn!(href = %item.href, status = resp.status, "skipping object after reload failure");
                }
                Err(e) => {
                    warn!(href = %item.href, error = %e, "skipping object after reload failure");
                }
            }
        }

        state.sync_token = next_token;
        debug!(
            updated = outcome.updated.len(),
            deleted = outcome.deleted.len(),
            "sync round complete"
        );
        Ok(outcome)
    }
}
