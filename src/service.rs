//! Service assembly
//!
//! Wires the resolver, event manager, policies and notifier together around
//! one bus and one shutdown signal. The host supplies its side of the world
//! as a [`HostPorts`] bundle and drives playback callbacks through
//! [`OffsetService::events`].

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::Settings;
use crate::debounce::DEFAULT_VERIFY_DELAY;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::manager::PlaybackEventManager;
use crate::monitor::MonitorTimings;
use crate::notify::DedupingNotifier;
use crate::policy::offset::OffsetPolicyEngine;
use crate::policy::seek_back::{SeekBackPolicyEngine, SeekBackTimings};
use crate::ports::{ConfigPort, DialogPort, PlayerControlPort, ToastSink, VideoInfoPort};
use crate::resolver::StreamProfileResolver;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;

/// Everything the host must provide.
#[derive(Clone)]
pub struct HostPorts {
    pub control: Arc<dyn PlayerControlPort>,
    pub video: Arc<dyn VideoInfoPort>,
    pub dialogs: Arc<dyn DialogPort>,
    pub config: Arc<dyn ConfigPort>,
    pub toasts: Arc<dyn ToastSink>,
}

/// Timing knobs, defaulted for production and shrunk in tests.
#[derive(Clone)]
pub struct ServiceTunables {
    pub retry: RetryPolicy,
    pub debounce_delay: Duration,
    pub seek_back: SeekBackTimings,
    pub monitor: MonitorTimings,
}

impl Default for ServiceTunables {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            debounce_delay: DEFAULT_VERIFY_DELAY,
            seek_back: SeekBackTimings::default(),
            monitor: MonitorTimings::default(),
        }
    }
}

/// The assembled decision engine.
pub struct OffsetService {
    bus: Arc<EventBus>,
    manager: PlaybackEventManager,
    offset: OffsetPolicyEngine,
    seek_back: SeekBackPolicyEngine,
    shutdown: Shutdown,
    running: bool,
}

impl OffsetService {
    pub fn new(ports: HostPorts) -> Self {
        Self::with_tunables(ports, ServiceTunables::default())
    }

    pub fn with_tunables(ports: HostPorts, tunables: ServiceTunables) -> Self {
        let settings = Settings::new(ports.config);
        let shutdown = Shutdown::new();
        let bus = Arc::new(EventBus::with_runtime_logging(
            settings.debug_logging_enabled(),
        ));
        let resolver = Arc::new(
            StreamProfileResolver::new(
                ports.control.clone(),
                ports.video,
                settings.clone(),
                shutdown.clone(),
            )
            .with_retry_policy(tunables.retry.clone()),
        );
        let notifications = Arc::new(DedupingNotifier::new(ports.toasts, settings.clone()));
        let manager = PlaybackEventManager::new(bus.clone(), resolver.clone(), shutdown.clone())
            .with_debounce_delay(tunables.debounce_delay);
        let offset = OffsetPolicyEngine::new(
            bus.clone(),
            ports.control.clone(),
            ports.dialogs,
            resolver,
            settings.clone(),
            notifications,
            shutdown.clone(),
        )
        .with_monitor_timings(tunables.monitor);
        let seek_back = SeekBackPolicyEngine::new(
            bus.clone(),
            ports.control,
            settings,
            shutdown.clone(),
        )
        .with_timings(tunables.seek_back)
        .with_retry_policy(tunables.retry);
        Self {
            bus,
            manager,
            offset,
            seek_back,
            shutdown,
            running: false,
        }
    }

    /// Subscribe both policy engines. Idempotence is an error here; a
    /// double start points at a host wiring bug.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Err(Error::InvalidState("service already started".into()));
        }
        self.offset.start();
        self.seek_back.start();
        self.running = true;
        info!("audio offset service started");
        Ok(())
    }

    /// Request shutdown and quiesce every worker. The service cannot be
    /// restarted afterwards; the shutdown signal is one-way.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Err(Error::InvalidState("service not running".into()));
        }
        self.shutdown.request();
        self.offset.stop();
        self.seek_back.stop();
        self.running = false;
        info!("audio offset service stopped");
        Ok(())
    }

    /// Entry points for the host's playback callbacks.
    pub fn events(&self) -> &PlaybackEventManager {
        &self.manager
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn is_monitoring(&self) -> bool {
        self.offset.is_monitoring()
    }
}
