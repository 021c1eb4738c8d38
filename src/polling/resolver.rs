use crate::core::models::{
    PollingConfig, PollingOverrides, RemoteSettings, ResolvedPollingConfig, SettingsPatch,
};
use crate::sources::{ConfigSource, SourceError};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

struct ResolverState {
    base_overrides: PollingOverrides,
    remote: Option<RemoteSettings>,
    advisory: Option<String>,
}

/// Shared, read-mostly source of effective polling parameters.
///
/// Per field the resolver takes the call override, then the last remote
/// config that loaded, then the built-in default. A failed load swaps in the
/// full default set and keeps the failure as an advisory.
pub struct SettingsResolver {
    source: Arc<dyn ConfigSource>,
    state: RwLock<ResolverState>,
    updates: watch::Sender<ResolvedPollingConfig>,
}

impl SettingsResolver {
    pub fn new(source: Arc<dyn ConfigSource>, base_overrides: PollingOverrides) -> Self {
        let initial = resolve_fields(&base_overrides, None);
        let (updates, _) = watch::channel(initial);

        Self {
            source,
            state: RwLock::new(ResolverState {
                base_overrides,
                remote: None,
                advisory: None,
            }),
            updates,
        }
    }

    /// Reloads the remote configuration. Never fails; on error the defaults
    /// are used and the failure is kept as an advisory.
    pub async fn load(&self) -> ResolvedPollingConfig {
        let (remote, advisory) = match self.source.load_config().await {
            Ok(remote) => {
                tracing::info!(polling = ?remote.polling, "Loaded remote polling config");
                (remote, None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load remote config, using defaults");
                (RemoteSettings::default(), Some(e.to_string()))
            }
        };

        {
            let mut state = self.state.write().await;
            state.remote = Some(remote);
            state.advisory = advisory;
        }
        self.publish().await
    }

    /// Pushes a partial update to the configuration source. On failure the
    /// previously loaded config stays in effect.
    pub async fn update(
        &self,
        patch: &SettingsPatch,
    ) -> Result<ResolvedPollingConfig, SourceError> {
        let remote = self.source.update_config(patch).await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to update remote config");
            e
        })?;

        {
            let mut state = self.state.write().await;
            state.remote = Some(remote);
            state.advisory = None;
        }
        Ok(self.publish().await)
    }

    /// Replaces the overrides applied to every resolution, e.g. after the
    /// local config file changed.
    pub async fn set_overrides(&self, overrides: PollingOverrides) -> ResolvedPollingConfig {
        self.state.write().await.base_overrides = overrides;
        self.publish().await
    }

    /// Effective config with the resolver's base overrides.
    pub async fn current(&self) -> ResolvedPollingConfig {
        self.resolve(&PollingOverrides::default()).await
    }

    /// Effective config with `overrides` taking precedence over everything.
    pub async fn resolve(&self, overrides: &PollingOverrides) -> ResolvedPollingConfig {
        let state = self.state.read().await;
        let overrides = state.base_overrides.merged_with(overrides);
        resolve_fields(&overrides, state.remote.as_ref().map(|r| &r.polling))
    }

    pub async fn remote_settings(&self) -> Option<RemoteSettings> {
        self.state.read().await.remote.clone()
    }

    pub async fn advisory(&self) -> Option<String> {
        self.state.read().await.advisory.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ResolvedPollingConfig> {
        self.updates.subscribe()
    }

    async fn publish(&self) -> ResolvedPollingConfig {
        let resolved = self.current().await;
        self.updates.send_if_modified(|current| {
            if *current == resolved {
                return false;
            }
            *current = resolved;
            true
        });
        resolved
    }
}

fn resolve_fields(
    overrides: &PollingOverrides,
    remote: Option<&PollingConfig>,
) -> ResolvedPollingConfig {
    let defaults = PollingConfig::default();
    let pick = |call: Option<u32>, loaded: Option<u32>, default: u32| {
        call.filter(|v| *v > 0)
            .or(loaded.filter(|v| *v > 0))
            .unwrap_or(default)
    };

    ResolvedPollingConfig {
        dashboard_ttl_minutes: pick(
            overrides.dashboard_ttl_minutes,
            remote.map(|r| r.dashboard_ttl_minutes),
            defaults.dashboard_ttl_minutes,
        ),
        site_ttl_minutes: pick(
            overrides.site_ttl_minutes,
            remote.map(|r| r.site_ttl_minutes),
            defaults.site_ttl_minutes,
        ),
        poll_interval_minutes: pick(
            overrides.poll_interval_minutes,
            remote.map(|r| r.poll_interval_minutes),
            defaults.poll_interval_minutes,
        ),
        max_repolls: pick(
            overrides.max_repolls,
            remote.map(|r| r.max_repolls),
            defaults.max_repolls,
        ),
        inactivity_timeout_minutes: pick(
            overrides.inactivity_timeout_minutes,
            remote.map(|r| r.inactivity_timeout_minutes),
            defaults.inactivity_timeout_minutes,
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory backend settings store, optionally unreachable.
    pub(crate) struct FakeConfigSource {
        settings: Mutex<RemoteSettings>,
        reachable: Mutex<bool>,
    }

    impl FakeConfigSource {
        pub(crate) fn new(polling: PollingConfig) -> Arc<Self> {
            Arc::new(Self {
                settings: Mutex::new(RemoteSettings {
                    polling,
                    ..Default::default()
                }),
                reachable: Mutex::new(true),
            })
        }

        pub(crate) fn set_reachable(&self, reachable: bool) {
            *self.reachable.lock().unwrap() = reachable;
        }

        fn check(&self) -> Result<(), SourceError> {
            if *self.reachable.lock().unwrap() {
                Ok(())
            } else {
                Err(SourceError::Unavailable("connection refused".to_string()))
            }
        }
    }

    #[async_trait]
    impl ConfigSource for FakeConfigSource {
        async fn load_config(&self) -> Result<RemoteSettings, SourceError> {
            self.check()?;
            Ok(self.settings.lock().unwrap().clone())
        }

        async fn update_config(
            &self,
            patch: &SettingsPatch,
        ) -> Result<RemoteSettings, SourceError> {
            self.check()?;
            let mut settings = self.settings.lock().unwrap();
            if let Some(polling) = &patch.polling {
                let p = &mut settings.polling;
                if let Some(v) = polling.dashboard_ttl_minutes {
                    p.dashboard_ttl_minutes = v;
                }
                if let Some(v) = polling.site_ttl_minutes {
                    p.site_ttl_minutes = v;
                }
                if let Some(v) = polling.poll_interval_minutes {
                    p.poll_interval_minutes = v;
                }
                if let Some(v) = polling.max_repolls {
                    p.max_repolls = v;
                }
                if let Some(v) = polling.inactivity_timeout_minutes {
                    p.inactivity_timeout_minutes = v;
                }
            }
            if let Some(theme) = &patch.theme {
                settings.theme = theme.clone();
            }
            if let Some(color) = &patch.accent_color {
                settings.accent_color = color.clone();
            }
            Ok(settings.clone())
        }
    }

    fn remote_polling() -> PollingConfig {
        PollingConfig {
            dashboard_ttl_minutes: 60,
            site_ttl_minutes: 20,
            poll_interval_minutes: 10,
            max_repolls: 6,
            inactivity_timeout_minutes: 2,
        }
    }

    #[tokio::test]
    async fn test_defaults_before_load() {
        let resolver = SettingsResolver::new(
            FakeConfigSource::new(remote_polling()),
            PollingOverrides::default(),
        );
        assert_eq!(resolver.current().await, ResolvedPollingConfig::default());
        assert!(resolver.advisory().await.is_none());
    }

    #[tokio::test]
    async fn test_override_beats_remote_beats_default() {
        let mut remote = remote_polling();
        remote.site_ttl_minutes = 0;
        let resolver = SettingsResolver::new(
            FakeConfigSource::new(remote),
            PollingOverrides {
                max_repolls: Some(1),
                ..Default::default()
            },
        );
        resolver.load().await;

        let resolved = resolver
            .resolve(&PollingOverrides {
                poll_interval_minutes: Some(1),
                ..Default::default()
            })
            .await;

        assert_eq!(resolved.poll_interval_minutes, 1);
        assert_eq!(resolved.max_repolls, 1);
        assert_eq!(resolved.dashboard_ttl_minutes, 60);
        assert_eq!(resolved.inactivity_timeout_minutes, 2);
        // Non-positive remote value falls through to the default.
        assert_eq!(resolved.site_ttl_minutes, 15);
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_full_defaults() {
        let source = FakeConfigSource::new(remote_polling());
        let resolver = SettingsResolver::new(source.clone(), PollingOverrides::default());

        resolver.load().await;
        assert_eq!(resolver.current().await.max_repolls, 6);

        source.set_reachable(false);
        let resolved = resolver.load().await;
        assert_eq!(resolved, ResolvedPollingConfig::default());
        assert!(resolver.advisory().await.unwrap().contains("connection refused"));
        assert_eq!(resolver.remote_settings().await, Some(RemoteSettings::default()));

        source.set_reachable(true);
        resolver.load().await;
        assert!(resolver.advisory().await.is_none());
    }

    #[tokio::test]
    async fn test_update_publishes_new_config() {
        let source = FakeConfigSource::new(remote_polling());
        let resolver = SettingsResolver::new(source, PollingOverrides::default());
        let mut rx = resolver.subscribe();
        resolver.load().await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        let resolved = resolver
            .update(&SettingsPatch {
                polling: Some(PollingOverrides {
                    max_repolls: Some(8),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(resolved.max_repolls, 8);
        assert_eq!(resolved.poll_interval_minutes, 10);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().max_repolls, 8);
    }

    #[tokio::test]
    async fn test_set_overrides_republishes() {
        let resolver = SettingsResolver::new(
            FakeConfigSource::new(remote_polling()),
            PollingOverrides::default(),
        );
        resolver.load().await;
        let mut rx = resolver.subscribe();
        rx.borrow_and_update();

        let resolved = resolver
            .set_overrides(PollingOverrides {
                inactivity_timeout_minutes: Some(30),
                ..Default::default()
            })
            .await;
        assert_eq!(resolved.inactivity_timeout_minutes, 30);
        assert_eq!(resolved.max_repolls, 6);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_failed_update_keeps_previous_config() {
        let source = FakeConfigSource::new(remote_polling());
        let resolver = SettingsResolver::new(source.clone(), PollingOverrides::default());
        resolver.load().await;

        source.set_reachable(false);
        let result = resolver
            .update(&SettingsPatch {
                polling: Some(PollingOverrides {
                    max_repolls: Some(8),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(resolver.current().await.max_repolls, 6);
    }
}
