use crate::cli::Backend;
use crate::core::models::{PollingOverrides, SettingsPatch};
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PollingField {
    PollInterval,
    MaxRepolls,
    InactivityTimeout,
    DashboardTtl,
    SiteTtl,
}

impl PollingField {
    fn patch(self, value: u32) -> SettingsPatch {
        let mut polling = PollingOverrides::default();
        match self {
            PollingField::PollInterval => polling.poll_interval_minutes = Some(value),
            PollingField::MaxRepolls => polling.max_repolls = Some(value),
            PollingField::InactivityTimeout => polling.inactivity_timeout_minutes = Some(value),
            PollingField::DashboardTtl => polling.dashboard_ttl_minutes = Some(value),
            PollingField::SiteTtl => polling.site_ttl_minutes = Some(value),
        }

        SettingsPatch {
            polling: Some(polling),
            ..Default::default()
        }
    }
}

pub async fn run(field: PollingField, value: u32) -> Result<()> {
    if value == 0 {
        anyhow::bail!("Polling values must be greater than 0");
    }

    let backend = Backend::connect(Settings::load()?).await?;
    let resolved = backend
        .resolver
        .update(&field.patch(value))
        .await
        .context("Failed to update backend settings")?;

    tracing::info!(?field, value, "Updated polling setting");
    println!(
        "Polling: every {} min, {} repolls, pause after {} min idle",
        resolved.poll_interval_minutes, resolved.max_repolls, resolved.inactivity_timeout_minutes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_sets_single_field() {
        let patch = PollingField::InactivityTimeout.patch(12);
        let polling = patch.polling.unwrap();
        assert_eq!(polling.inactivity_timeout_minutes, Some(12));
        assert_eq!(polling.max_repolls, None);
        assert!(patch.theme.is_none());
    }
}
