//! Discovery service exposing the host framework's lifecycle hooks

use logoscan_core::DiscoveredDevice;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::DiscoveryConfig;
use crate::enumerator::SubnetEnumerator;
use crate::probe::{Probe, TcpProber};
use crate::scheduler::{Interrupter, ProbeScheduler, ScanSummary};
use crate::sink::{BroadcastRegistry, ResultSink};

/// Discovery event for real-time updates
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Scan started
    ScanStarted,
    /// Device answered on the probed port
    DeviceDiscovered(DiscoveredDevice),
    /// Scan completed
    ScanCompleted { candidates: usize, found: usize },
}

/// Discovery service
pub struct DiscoveryService {
    config: DiscoveryConfig,
    scheduler: Mutex<ProbeScheduler>,
    interrupter: Interrupter,
    event_tx: broadcast::Sender<DiscoveryEvent>,
    background: StdMutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    /// Service scanning the host's own interfaces with the TCP prober
    pub fn new(config: DiscoveryConfig) -> Self {
        let prober = Arc::new(TcpProber::from_config(&config));
        Self::with_parts(config, SubnetEnumerator::system(), prober)
    }

    /// Service with a custom candidate source and prober
    pub fn with_parts(
        config: DiscoveryConfig,
        enumerator: SubnetEnumerator,
        prober: Arc<dyn Probe>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let sink = Arc::new(ResultSink::new(Box::new(BroadcastRegistry::new(
            event_tx.clone(),
        ))));
        let scheduler = ProbeScheduler::from_config(&config, enumerator, prober, sink);
        let interrupter = scheduler.interrupter();

        Self {
            config,
            scheduler: Mutex::new(scheduler),
            interrupter,
            event_tx,
            background: StdMutex::new(None),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Subscribe to discovery events
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Run one discovery scan, bounded by the configured scan timeout
    pub async fn start_scan(&self) -> ScanSummary {
        // Read before queueing so a stop requested while waiting also cancels this scan
        let epoch = self.interrupter.generation();
        let mut scheduler = self.scheduler.lock().await;

        let _ = self.event_tx.send(DiscoveryEvent::ScanStarted);
        let summary = scheduler.scan_since(epoch, self.config.scan_timeout()).await;
        let _ = self.event_tx.send(DiscoveryEvent::ScanCompleted {
            candidates: summary.candidates,
            found: summary.found,
        });

        info!(
            "Scan complete: {} devices found among {} candidates",
            summary.found, summary.candidates
        );
        summary
    }

    /// Stop any scan in progress; a no-op when idle
    pub async fn stop_scan(&self) -> Option<ScanSummary> {
        debug!("Stop scan requested");
        // Shortens a grace wait held by another task so the lock frees up promptly
        self.interrupter.interrupt();
        self.scheduler.lock().await.stop().await
    }

    /// Scan periodically in the background, replacing any earlier background task
    pub fn start_background_discovery(self: &Arc<Self>) {
        info!(
            interval_secs = self.config.background_interval().as_secs(),
            "Starting background discovery"
        );

        let service = Arc::downgrade(self);
        let period = self.config.background_interval();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                service.start_scan().await;
            }
        });

        let previous = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop background scanning and any scan it left running
    pub async fn stop_background_discovery(&self) {
        info!("Stopping background discovery");
        let handle = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.stop_scan().await;
    }

    pub fn is_background_running(&self) -> bool {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
