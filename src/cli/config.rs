use crate::cli::Backend;
use crate::core::models::{RemoteSettings, ResolvedPollingConfig};
use crate::core::settings::Settings;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct ConfigOutput {
    polling: ResolvedPollingConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<RemoteSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    advisory: Option<String>,
}

pub async fn run(json: bool) -> Result<()> {
    let backend = Backend::connect(Settings::load()?).await?;

    let output = ConfigOutput {
        polling: backend.resolver.current().await,
        remote: backend.resolver.remote_settings().await,
        advisory: backend.resolver.advisory().await,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_text_output(&output);
    }

    Ok(())
}

fn print_text_output(output: &ConfigOutput) {
    let polling = &output.polling;

    println!("Polling");
    println!("  Interval:           {} min", polling.poll_interval_minutes);
    println!("  Max repolls:        {}", polling.max_repolls);
    println!("  Inactivity timeout: {} min", polling.inactivity_timeout_minutes);
    println!("  Dashboard TTL:      {} min", polling.dashboard_ttl_minutes);
    println!("  Site TTL:           {} min", polling.site_ttl_minutes);

    if let Some(remote) = &output.remote {
        println!();
        println!("Display");
        println!("  Theme:  {:?}", remote.theme);
        println!("  Accent: {}", remote.accent_color);
    }

    if let Some(advisory) = &output.advisory {
        println!();
        println!("Warning: backend settings unavailable ({advisory}); using defaults");
    }
}
