// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

/// `CalDAV` authentication method.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(tag = "type")]
pub enum AuthMethod {
    /// No authentication.
    #[serde(rename = "none")]
    #[default]
    None,
    /// Basic authentication (username/password).
    #[serde(rename = "basic")]
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    #[serde(rename = "bearer")]
    Bearer {
        /// Bearer token.
        token: String,
    },
}

/// Known server implementations, used to seed the capability model.
///
/// Flavors only choose a starting point; everything learnt at runtime is
/// recorded per capability, so a wrong flavor costs extra round-trips rather
/// than wrong results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerFlavor {
    /// Assume full RFC 4791 support; learn deviations as they surface.
    #[default]
    Generic,
    /// Nextcloud (sabre/dav).
    Nextcloud,
    /// Radicale.
    Radicale,
    /// Baïkal (sabre/dav).
    Baikal,
    /// Xandikos.
    Xandikos,
    /// Google Calendar's `CalDAV` endpoint.
    #[serde(rename = "google")]
    GoogleCalendar,
    /// Zimbra.
    Zimbra,
}

/// `CalDAV` server configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CalDavConfig {
    /// Base URL of the `CalDAV` server.
    pub base_url: String,
    /// Calendar collection path (e.g., /dav/calendars/user/personal/).
    pub calendar_home: String,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Server implementation hint.
    #[serde(default)]
    pub flavor: ServerFlavor,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("quirkdav-caldav/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for CalDavConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            calendar_home: String::new(),
            auth: AuthMethod::default(),
            flavor: ServerFlavor::default(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}
