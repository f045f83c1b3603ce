use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::NetworkHints;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_local::*;
use crate::logger::*;
use crate::runtime::*;
use crate::settings::Settings;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct ClientRuntime {
    pub api: Arc<dyn ApiClient>,
    pub pipeline: Arc<ApiPipeline>,
    pub auth_service: Arc<dyn AuthService>,
    pub session: Arc<SessionStore>,
    pub refresher: Arc<RefreshCoordinator>,
    pub probe: Arc<ColdStartProbe>,
    pub network: Arc<ManualNetworkEnvironment>,
    pub channel: Arc<dyn SessionChannel>,
    watcher: Arc<ConnectivityWatcher>,
    sync_handle: Mutex<Option<JoinHandle<()>>>,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
    watcher_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl ClientRuntime {
    pub fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let transport: Arc<dyn Transport> = match settings.api.transport.as_str() {
            "fake" => Arc::new(FakeTransport::with_fallback(FakeReply::json(
                200,
                serde_json::json!({ "ok": true }),
            ))),
            "real" => Arc::new(ReqwestTransport::try_new()?),
            other => return Err(anyhow::anyhow!("Unknown transport backend: {}", other)),
        };
        let durable_store: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::open(&settings.session.durable_path)?);

        Self::assemble(
            settings,
            transport,
            durable_store,
            Arc::new(BroadcastSessionChannel::new()),
            Arc::new(SystemClock),
        )
    }

    /// Wires every component around the given adapters and starts the
    /// background tasks. Must run inside a tokio runtime.
    ///
    /// Runtimes built over the same durable store and channel behave like
    /// tabs of one origin: logins and logouts in one reach the others.
    pub fn assemble(
        settings: &Settings,
        transport: Arc<dyn Transport>,
        durable_store: Arc<dyn KeyValueStore>,
        channel: Arc<dyn SessionChannel>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let base_url = settings.api.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| anyhow::anyhow!("invalid api.base_url {}: {}", base_url, e))?;
        let baseline_timeout = Duration::from_millis(settings.network.baseline_timeout_ms);

        // region local state
        let tab_store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionStore::new(
            SessionStoreConfig {
                clock_skew_secs: settings.session.clock_skew_secs,
                auth_mode: settings.api.auth_mode,
                persist_tier: settings.session.persist_tier,
            },
            tab_store,
            durable_store.clone(),
            channel.clone(),
            clock,
        ));
        let network = Arc::new(ManualNetworkEnvironment::new(
            settings.network.online,
            NetworkHints {
                save_data: settings.network.save_data,
                connection: settings.network.connection,
            },
        ));
        // endregion

        let endpoints: Arc<dyn AuthEndpoints> = Arc::new(HttpAuthEndpoints::new(
            transport.clone(),
            &base_url,
            AuthPaths {
                login: settings.session.login_path.clone(),
                refresh: settings.session.refresh_path.clone(),
                me: settings.session.me_path.clone(),
                logout: settings.session.logout_path.clone(),
            },
            &settings.api.app_version,
            baseline_timeout,
        ));
        let refresher = Arc::new(RefreshCoordinator::new(session.clone(), endpoints.clone()));

        let probe = Arc::new(ColdStartProbe::new(
            transport.clone(),
            ProbeConfig {
                health_url: format!(
                    "{}/{}",
                    base_url,
                    settings.probe.health_path.trim_start_matches('/')
                ),
                timeout: Duration::from_millis(settings.probe.timeout_ms),
                idle_threshold: Duration::from_secs(settings.probe.idle_threshold_secs),
                failure_window: Duration::from_secs(settings.probe.failure_window_secs),
            },
        ));

        let cache = Arc::new(ResponseCache::new(CacheConfig {
            default_ttl: Duration::from_secs(settings.cache.default_ttl_secs),
            max_entries: settings.cache.max_entries,
        }));
        let pipeline = Arc::new(ApiPipeline::new(
            PipelineConfig {
                base_url: base_url.clone(),
                app_version: settings.api.app_version.clone(),
            },
            PipelineComponents {
                transport,
                session: session.clone(),
                refresher: refresher.clone(),
                cache: cache.clone(),
                retry: RetryPolicy::new(RetryConfig {
                    base_delay: Duration::from_millis(settings.retry.base_delay_ms),
                    max_delay: Duration::from_millis(settings.retry.max_delay_ms),
                    read_retries: settings.retry.read_retries,
                    write_retries: settings.retry.write_retries,
                    jitter_ratio: settings.retry.jitter_ratio,
                }),
                queue: Arc::new(OfflineQueue::new(durable_store)),
                network: Arc::new(NetworkQualityEstimator::new(
                    network.clone(),
                    baseline_timeout,
                )),
                probe: probe.clone(),
            },
        ));
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            session.clone(),
            endpoints,
            probe.clone(),
        ));

        // region background tasks
        let cancel = CancellationToken::new();

        let synchronizer =
            SessionSynchronizer::new(session.clone(), channel.clone()).clearing_cache(cache);
        let sync_cancel = cancel.clone();
        let sync_handle = tokio::spawn(async move {
            synchronizer.run(sync_cancel).await;
        });

        let scheduler = refresher.clone();
        let scheduler_cancel = cancel.clone();
        let scheduler_handle = tokio::spawn(async move {
            scheduler.run_scheduler(scheduler_cancel).await;
        });

        let watcher = Arc::new(ConnectivityWatcher::new(
            network.clone(),
            pipeline.clone(),
            refresher.clone(),
            auth_service.clone(),
            session.clone(),
            cancel.clone(),
        ));
        let watching = watcher.clone();
        let watcher_handle = tokio::spawn(async move {
            let _ = watching.run().await;
        });
        // endregion

        info!(
            "client runtime started against {} ({} mode)",
            base_url,
            session.auth_mode()
        );

        Ok(Self {
            api: pipeline.clone(),
            pipeline,
            auth_service,
            session,
            refresher,
            probe,
            network,
            channel,
            watcher,
            sync_handle: Mutex::new(Some(sync_handle)),
            scheduler_handle: Mutex::new(Some(scheduler_handle)),
            watcher_handle: Mutex::new(Some(watcher_handle)),
            cancel,
        })
    }

    /// Call when the client returns to the foreground. Renews a token that
    /// is close to expiry, or refreshes the identity in cookie mode.
    pub async fn on_visible(&self) {
        self.watcher.resume_session().await;
    }

    pub async fn shutdown(&self) {
        info!("client runtime shutting down...");
        self.cancel.cancel();

        for (name, slot) in [
            ("session sync", &self.sync_handle),
            ("refresh scheduler", &self.scheduler_handle),
            ("connectivity watcher", &self.watcher_handle),
        ] {
            let handle = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(handle) = handle {
                let r = handle.await;
                info!("{} handle dropped: {:?}", name, r);
            }
        }
    }
}
