// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client facade.

use crate::capability::{CapabilityModel, Support};
use crate::config::CalDavConfig;
use crate::error::CalDavError;
use crate::http::{HttpClient, Transport};
use crate::planner::SearchPlanner;
use crate::query::multiget_xml;
use crate::reshape::RruleExpander;
use crate::response::MultiStatus;
use crate::search::SearchSpec;
use crate::sync::{SyncCollectionState, SyncEngine, SyncOutcome};
use crate::types::{CalendarObject, Href};

/// Adaptive `CalDAV` client for one calendar collection.
///
/// The client owns the capability model and refines it across calls: a
/// search that trips over a server quirk teaches later searches to route
/// around it.
///
/// # Example
///
/// ```ignore
/// use quirkdav_caldav::{CalDavClient, CalDavConfig, AuthMethod, SearchSpec};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalDavConfig {
///     base_url: "https://caldav.example.com".to_string(),
///     calendar_home: "/dav/calendars/user/personal/".to_string(),
///     auth: AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     ..Default::default()
/// };
///
/// let mut client = CalDavClient::new(config)?;
/// let pending = client.search(&SearchSpec::todos()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CalDavClient {
    http: HttpClient,
    config: CalDavConfig,
    capabilities: CapabilityModel,
}

impl CalDavClient {
    /// Creates a new client, seeding the capability model from the
    /// configured server flavor.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client initialization fails.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        let capabilities = CapabilityModel::for_flavor(config.flavor);
        let http = HttpClient::new(config.clone())?;
        Ok(Self {
            http,
            config,
            capabilities,
        })
    }

    /// Read access to the learnt capability table.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilityModel {
        &self.capabilities
    }

    fn full_url(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), href)
        }
    }

    /// Runs an adaptive search against the configured collection.
    ///
    /// # Errors
    ///
    /// See [`SearchPlanner::search`](crate::SearchPlanner::search).
    pub async fn search(
        &mut self,
        spec: &SearchSpec,
    ) -> Result<Vec<CalendarObject>, CalDavError> {
        let mut planner = SearchPlanner::new(
            &self.http,
            &mut self.capabilities,
            RruleExpander,
            &self.config.base_url,
            &self.config.calendar_home,
        );
        planner.search(spec).await
    }

    fn check_sync_supported(&self) -> Result<(), CalDavError> {
        if self.capabilities.support_for("sync.collection") == Support::Unsupported {
            return Err(CalDavError::UnsupportedCapability(
                "sync.collection".to_string(),
            ));
        }
        Ok(())
    }

    /// Enumerates the collection and returns a fresh sync state.
    ///
    /// # Errors
    ///
    /// `UnsupportedCapability` when the server is known to lack
    /// sync-collection; otherwise see [`SyncEngine::initial`].
    pub async fn initial_sync(&self) -> Result<SyncCollectionState, CalDavError> {
        self.check_sync_supported()?;
        let engine = SyncEngine::new(
            &self.http,
            &self.config.base_url,
            &self.config.calendar_home,
        );
        engine.initial().await
    }

    /// Advances a sync state by one round.
    ///
    /// # Errors
    ///
    /// `UnsupportedCapability` when the server is known to lack
    /// sync-collection; otherwise see [`SyncEngine::sync`].
    pub async fn sync(
        &self,
        state: &mut SyncCollectionState,
    ) -> Result<SyncOutcome, CalDavError> {
        self.check_sync_supported()?;
        let engine = SyncEngine::new(
            &self.http,
            &self.config.base_url,
            &self.config.calendar_home,
        );
        engine.sync(state).await
    }

    /// Fetches and decodes a single object by href.
    ///
    /// # Errors
    ///
    /// `NotFound` when the server reports the object missing, transport or
    /// decode errors otherwise.
    pub async fn get_object(&self, href: &Href) -> Result<CalendarObject, CalDavError> {
        let url = self.full_url(href);
        let resp = self.http.send("GET", &url, None, None).await?;
        if resp.is_not_found() {
            return Err(CalDavError::NotFound(href.clone()));
        }
        if !resp.is_success() {
            return Err(CalDavError::Http(format!(
                "{}: {}",
                resp.status,
                resp.body.trim()
            )));
        }
        let mut obj = CalendarObject::new(href.clone(), resp.etag, Some(resp.body));
        obj.decode()?;
        Ok(obj)
    }

    /// Fetches multiple objects in one calendar-multiget REPORT.
    ///
    /// Objects the server omits from the response are simply absent from
    /// the result.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a failed REPORT.
    pub async fn multiget(&self, hrefs: &[Href]) -> Result<Vec<CalendarObject>, CalDavError> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }
        let body = multiget_xml(hrefs)?;
        let url = self.full_url(&self.config.calendar_home);
        let resp = self.http.send("REPORT", &url, Some("1"), Some(body)).await?;
        if !resp.is_success() {
            return Err(CalDavError::Report {
                status: resp.status,
                message: resp.body.trim().to_string(),
            });
        }
        Ok(MultiStatus::from_xml(&resp.body)?.into_objects())
    }
}
