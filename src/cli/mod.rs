pub mod config;
pub mod set;
pub mod status;
pub mod watch;

use crate::core::models::ResourceKey;
use crate::core::settings::Settings;
use crate::polling::SettingsResolver;
use crate::sources::BackendClient;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceArg {
    Dashboard,
    Sites,
    Alerts,
    Site,
    SiteOverview,
    SiteDevices,
    SiteAlerts,
}

impl ResourceArg {
    pub fn to_key(self, site: Option<String>) -> Result<ResourceKey> {
        let site_id = || site.clone().context("--site is required for site resources");

        Ok(match self {
            ResourceArg::Dashboard => ResourceKey::DashboardStats,
            ResourceArg::Sites => ResourceKey::Sites,
            ResourceArg::Alerts => ResourceKey::Alerts,
            ResourceArg::Site => ResourceKey::Site(site_id()?),
            ResourceArg::SiteOverview => ResourceKey::SiteOverview(site_id()?),
            ResourceArg::SiteDevices => ResourceKey::SiteDevices(site_id()?),
            ResourceArg::SiteAlerts => ResourceKey::SiteAlerts(site_id()?),
        })
    }
}

/// Backend client plus a resolver that has already loaded remote settings.
pub struct Backend {
    pub settings: Settings,
    pub client: Arc<BackendClient>,
    pub resolver: Arc<SettingsResolver>,
}

impl Backend {
    pub async fn connect(settings: Settings) -> Result<Self> {
        if !settings.polling.is_empty() {
            tracing::info!(overrides = ?settings.polling, "Applying local polling overrides");
        }

        let client = Arc::new(
            BackendClient::new(&settings.backend).context("Failed to build HTTP client")?,
        );
        let resolver = Arc::new(SettingsResolver::new(
            client.clone(),
            settings.polling.clone(),
        ));
        resolver.load().await;

        if let Some(advisory) = resolver.advisory().await {
            tracing::warn!(%advisory, "Backend settings unavailable, polling with defaults");
        }

        Ok(Self {
            settings,
            client,
            resolver,
        })
    }
}

pub fn format_age(fetched_at: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(fetched_at);

    if elapsed.num_seconds() < 60 {
        return "just now".to_string();
    }

    let total_minutes = elapsed.num_minutes();
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h ago", days, hours)
    } else if hours > 0 {
        format!("{}h {:02}m ago", hours, minutes)
    } else {
        format!("{}m ago", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_resources_need_site_id() {
        assert!(ResourceArg::SiteOverview.to_key(None).is_err());
        assert_eq!(
            ResourceArg::SiteOverview.to_key(Some("s7".into())).unwrap(),
            ResourceKey::SiteOverview("s7".into())
        );
        assert_eq!(
            ResourceArg::Dashboard.to_key(None).unwrap(),
            ResourceKey::DashboardStats
        );
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now), "just now");
        assert_eq!(format_age(now - chrono::Duration::minutes(5)), "5m ago");
        assert_eq!(format_age(now - chrono::Duration::minutes(125)), "2h 05m ago");
        assert_eq!(format_age(now - chrono::Duration::hours(50)), "2d 2h ago");
    }
}
