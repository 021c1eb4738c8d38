use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_DASHBOARD_TTL_MINUTES: u32 = 45;
pub const DEFAULT_SITE_TTL_MINUTES: u32 = 15;
pub const DEFAULT_POLL_INTERVAL_MINUTES: u32 = 15;
pub const DEFAULT_MAX_REPOLLS: u32 = 3;
pub const DEFAULT_INACTIVITY_TIMEOUT_MINUTES: u32 = 5;

/// A backend resource that can be fetched, cached and polled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKey {
    DashboardStats,
    Sites,
    Site(String),
    SiteOverview(String),
    SiteDevices(String),
    SiteAlerts(String),
    Alerts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Fleet,
    Site,
}

impl ResourceKey {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceKey::DashboardStats | ResourceKey::Sites | ResourceKey::Alerts => {
                ResourceKind::Fleet
            }
            ResourceKey::Site(_)
            | ResourceKey::SiteOverview(_)
            | ResourceKey::SiteDevices(_)
            | ResourceKey::SiteAlerts(_) => ResourceKind::Site,
        }
    }

    /// Path of the resource relative to the backend base URL.
    pub fn api_path(&self) -> String {
        match self {
            ResourceKey::DashboardStats => "/api/dashboard/stats".to_string(),
            ResourceKey::Sites => "/api/sites".to_string(),
            ResourceKey::Site(id) => format!("/api/sites/{id}"),
            ResourceKey::SiteOverview(id) => format!("/api/sites/{id}/overview"),
            ResourceKey::SiteDevices(id) => format!("/api/sites/{id}/devices"),
            ResourceKey::SiteAlerts(id) => format!("/api/sites/{id}/alerts"),
            ResourceKey::Alerts => "/api/alerts".to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::DashboardStats => write!(f, "dashboard"),
            ResourceKey::Sites => write!(f, "sites"),
            ResourceKey::Site(id) => write!(f, "site:{id}"),
            ResourceKey::SiteOverview(id) => write!(f, "site:{id}:overview"),
            ResourceKey::SiteDevices(id) => write!(f, "site:{id}:devices"),
            ResourceKey::SiteAlerts(id) => write!(f, "site:{id}:alerts"),
            ResourceKey::Alerts => write!(f, "alerts"),
        }
    }
}

/// Polling block of the backend settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub dashboard_ttl_minutes: u32,
    pub site_ttl_minutes: u32,
    pub poll_interval_minutes: u32,
    pub max_repolls: u32,
    pub inactivity_timeout_minutes: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            dashboard_ttl_minutes: DEFAULT_DASHBOARD_TTL_MINUTES,
            site_ttl_minutes: DEFAULT_SITE_TTL_MINUTES,
            poll_interval_minutes: DEFAULT_POLL_INTERVAL_MINUTES,
            max_repolls: DEFAULT_MAX_REPOLLS,
            inactivity_timeout_minutes: DEFAULT_INACTIVITY_TIMEOUT_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    System,
}

/// Settings document served by `GET /api/settings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub polling: PollingConfig,
    pub theme: ThemeMode,
    pub accent_color: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            polling: PollingConfig::default(),
            theme: ThemeMode::System,
            accent_color: "#1890ff".to_string(),
        }
    }
}

/// Partial polling update; `None` fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_ttl_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_ttl_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_repolls: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inactivity_timeout_minutes: Option<u32>,
}

impl PollingOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields set in `other` win over fields set in `self`.
    pub fn merged_with(&self, other: &PollingOverrides) -> PollingOverrides {
        PollingOverrides {
            dashboard_ttl_minutes: other.dashboard_ttl_minutes.or(self.dashboard_ttl_minutes),
            site_ttl_minutes: other.site_ttl_minutes.or(self.site_ttl_minutes),
            poll_interval_minutes: other.poll_interval_minutes.or(self.poll_interval_minutes),
            max_repolls: other.max_repolls.or(self.max_repolls),
            inactivity_timeout_minutes: other
                .inactivity_timeout_minutes
                .or(self.inactivity_timeout_minutes),
        }
    }
}

/// Body of `PATCH /api/settings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polling: Option<PollingOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
}

/// Effective polling parameters after merging overrides, remote config and
/// defaults. Every field is a positive number of minutes (or polls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPollingConfig {
    pub dashboard_ttl_minutes: u32,
    pub site_ttl_minutes: u32,
    pub poll_interval_minutes: u32,
    pub max_repolls: u32,
    pub inactivity_timeout_minutes: u32,
}

impl Default for ResolvedPollingConfig {
    fn default() -> Self {
        let defaults = PollingConfig::default();
        Self {
            dashboard_ttl_minutes: defaults.dashboard_ttl_minutes,
            site_ttl_minutes: defaults.site_ttl_minutes,
            poll_interval_minutes: defaults.poll_interval_minutes,
            max_repolls: defaults.max_repolls,
            inactivity_timeout_minutes: defaults.inactivity_timeout_minutes,
        }
    }
}

impl ResolvedPollingConfig {
    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        let minutes = match kind {
            ResourceKind::Fleet => self.dashboard_ttl_minutes,
            ResourceKind::Site => self.site_ttl_minutes,
        };
        minutes_to_duration(minutes)
    }

    pub fn polling_params(&self) -> PollingParams {
        PollingParams {
            interval: minutes_to_duration(self.poll_interval_minutes),
            max_polls: self.max_repolls,
            inactivity_timeout: minutes_to_duration(self.inactivity_timeout_minutes),
        }
    }
}

/// Parameters a polling controller is started with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingParams {
    pub interval: Duration,
    pub max_polls: u32,
    pub inactivity_timeout: Duration,
}

fn minutes_to_duration(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes) * 60)
}
