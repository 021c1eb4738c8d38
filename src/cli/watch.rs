use crate::cache::{CacheEntry, CacheStore, DataFetchCache};
use crate::cli::{format_age, Backend};
use crate::core::models::ResourceKey;
use crate::core::settings::Settings;
use crate::core::watcher::SettingsWatcher;
use crate::polling::{ActivityPulse, CachedResource, PollingController, PollingState};
use crate::sources::DataSource;
use anyhow::Result;
use chrono::Local;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "Enter = activity, r = refresh now, restart = apply latest config, \
                    clear = drop cached data, q = quit";

/// Polls one resource until stdin closes or `q` is entered. Every input line
/// counts as user activity.
pub async fn run(resource: ResourceKey) -> Result<()> {
    let backend = Backend::connect(Settings::load()?).await?;
    tracing::info!(
        base_url = %backend.settings.backend.base_url,
        %resource,
        "Starting watch"
    );

    let store = CacheStore::<Value>::new();
    let cache = store.get(&resource).await;
    let source: Arc<dyn DataSource<Value>> = backend.client.clone();

    let (_settings_watcher, mut config_file_rx) = match Settings::config_path() {
        Some(path) => {
            let (watcher, rx) = SettingsWatcher::start(path)?;
            (Some(watcher), rx)
        }
        None => (None, mpsc::unbounded_channel().1),
    };
    let mut config_rx = backend.resolver.subscribe();

    let (mut pulse_tx, mut controller) = start(&backend, &cache, &source).await;
    let mut status_rx = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let _ = pulse_tx.send(ActivityPulse);

                match line.trim() {
                    "q" | "quit" => break,
                    "r" | "refresh" => {
                        let state = controller.manual_refresh().await;
                        print_status(&resource, &state, &snapshot(&store, &resource).await);
                    }
                    "restart" => {
                        controller.stop().await;
                        (pulse_tx, controller) = start(&backend, &cache, &source).await;
                        status_rx = controller.subscribe();
                        tracing::info!(
                            interval_secs = controller.params().interval.as_secs(),
                            max_polls = controller.params().max_polls,
                            "Polling restarted"
                        );
                    }
                    "clear" => store.clear_all().await,
                    "?" | "help" => println!("{HELP}"),
                    _ => {}
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = status_rx.borrow_and_update().clone();
                print_status(&resource, &state, &snapshot(&store, &resource).await);
            }
            Some(()) = config_file_rx.recv() => {
                match Settings::load() {
                    Ok(settings) => {
                        backend.resolver.set_overrides(settings.polling).await;
                        backend.resolver.load().await;
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring invalid config file"),
                }
            }
            Ok(()) = config_rx.changed() => {
                let config = *config_rx.borrow_and_update();
                tracing::info!(
                    ?config,
                    "Polling config changed; it applies on the next restart"
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.stop().await;
    Ok(())
}

async fn start(
    backend: &Backend,
    cache: &Arc<DataFetchCache<Value>>,
    source: &Arc<dyn DataSource<Value>>,
) -> (mpsc::UnboundedSender<ActivityPulse>, PollingController) {
    let config = backend.resolver.current().await;
    let resource = Arc::new(CachedResource::new(
        Arc::clone(cache),
        Arc::clone(source),
        config.ttl_for(cache.key().kind()),
    ));

    let (pulse_tx, pulse_rx) = mpsc::unbounded_channel();
    let controller = PollingController::spawn(resource, config.polling_params(), pulse_rx);
    (pulse_tx, controller)
}

async fn snapshot(store: &CacheStore<Value>, resource: &ResourceKey) -> CacheEntry<Value> {
    store.snapshot(resource).await.unwrap_or_default()
}

fn print_status(resource: &ResourceKey, state: &PollingState, entry: &CacheEntry<Value>) {
    let age = entry
        .staleness
        .map(format_age)
        .unwrap_or_else(|| "never".to_string());

    let mut line = format!(
        "[{}] {} {:?} polls {}/{} data {}",
        Local::now().format("%H:%M:%S"),
        resource,
        state.phase,
        state.poll_count,
        state.max_polls,
        age
    );

    if entry.is_in_flight() {
        line.push_str(" (refreshing)");
    }
    if state.is_budget_exhausted() {
        line.push_str(" (poll budget used, press r to resume)");
    }
    if let Some(error) = state.error.as_ref().or(entry.error.as_ref()) {
        line.push_str(&format!(" error: {error}"));
    }

    println!("{line}");
}
