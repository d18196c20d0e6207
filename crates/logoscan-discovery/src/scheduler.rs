//! Scan-cycle scheduler: enumerate, fan out probes, and stop within a bounded wait

use logoscan_core::{grace_period, CandidateSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::enumerator::SubnetEnumerator;
use crate::pool::{Termination, WorkerPool};
use crate::probe::Probe;
use crate::sink::ResultSink;

/// Lifecycle of a scan cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Stopping,
}

/// Outcome of one scan cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Addresses probed this cycle
    pub candidates: usize,
    /// Devices handed to the result sink
    pub found: usize,
    /// Probes aborted by forced shutdown
    pub abandoned: usize,
    /// How the wait for in-flight probes ended
    pub termination: Termination,
}

/// Cuts a pending stop wait short, from any task.
///
/// Each interrupt bumps a generation counter. A cycle remembers the
/// generation it started at and treats any later value as an interrupt.
#[derive(Debug, Clone)]
pub struct Interrupter(Arc<watch::Sender<u64>>);

impl Interrupter {
    pub fn interrupt(&self) {
        self.0.send_modify(|generation| *generation = generation.wrapping_add(1));
    }

    /// Current interrupt generation
    pub fn generation(&self) -> u64 {
        *self.0.borrow()
    }
}

/// Owns one scan cycle at a time.
///
/// `start` and `stop` take `&mut self`; callers sharing a scheduler across
/// tasks serialize it themselves and use an [`Interrupter`] to shorten a
/// stop that another task is waiting on.
pub struct ProbeScheduler {
    enumerator: Arc<SubnetEnumerator>,
    prober: Arc<dyn Probe>,
    sink: Arc<ResultSink>,
    workers: usize,
    connect_timeout: Duration,
    state: ScanState,
    candidates: CandidateSet,
    pool: Option<WorkerPool>,
    interrupt: Arc<watch::Sender<u64>>,
    epoch: u64,
}

impl ProbeScheduler {
    pub fn new(
        enumerator: SubnetEnumerator,
        prober: Arc<dyn Probe>,
        sink: Arc<ResultSink>,
        workers: usize,
        connect_timeout: Duration,
    ) -> Self {
        let (interrupt, _) = watch::channel(0);
        Self {
            enumerator: Arc::new(enumerator),
            prober,
            sink,
            workers: workers.max(1),
            connect_timeout,
            state: ScanState::Idle,
            candidates: CandidateSet::new(),
            pool: None,
            interrupt: Arc::new(interrupt),
            epoch: 0,
        }
    }

    /// Scheduler with pool size and timeouts taken from `config`
    pub fn from_config(
        config: &DiscoveryConfig,
        enumerator: SubnetEnumerator,
        prober: Arc<dyn Probe>,
        sink: Arc<ResultSink>,
    ) -> Self {
        Self::new(
            enumerator,
            prober,
            sink,
            config.workers(),
            config.connect_timeout(),
        )
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Candidates of the current cycle (empty when idle)
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter(Arc::clone(&self.interrupt))
    }

    /// Begin a scan cycle, stopping any cycle still in progress first.
    ///
    /// Returns the number of candidates dispatched.
    pub async fn start(&mut self) -> usize {
        let epoch = *self.interrupt.borrow();
        self.begin(epoch).await
    }

    async fn begin(&mut self, epoch: u64) -> usize {
        if self.state != ScanState::Idle || self.pool.is_some() {
            debug!(state = ?self.state, "Scan already active, stopping it first");
            self.stop().await;
        }

        self.epoch = epoch;
        self.sink.reset();
        self.state = ScanState::Scanning;

        // Interface listing is a blocking system call
        let enumerator = Arc::clone(&self.enumerator);
        self.candidates = match tokio::task::spawn_blocking(move || enumerator.enumerate()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "Interface enumeration task failed, scanning nothing");
                CandidateSet::new()
            }
        };

        let mut pool = WorkerPool::new(self.workers);
        for address in self.candidates.iter() {
            let prober = Arc::clone(&self.prober);
            let sink = Arc::clone(&self.sink);
            let submitted = pool.execute(async move {
                if let Some(device) = prober.probe(address).await {
                    sink.emit(device);
                }
            });
            if let Err(e) = submitted {
                warn!(address = %address, error = %e, "Failed to dispatch probe");
            }
        }

        info!(
            candidates = self.candidates.len(),
            workers = pool.workers(),
            "Scan started"
        );

        self.pool = Some(pool);
        self.candidates.len()
    }

    /// Stop the current cycle.
    ///
    /// Waits for in-flight probes up to the grace period (or until
    /// interrupted), aborts whatever remains, and returns to idle. Returns
    /// `None` when no cycle was active.
    pub async fn stop(&mut self) -> Option<ScanSummary> {
        let grace = grace_period(self.candidates.len(), self.connect_timeout);
        self.finish(grace).await
    }

    async fn finish(&mut self, grace: Duration) -> Option<ScanSummary> {
        let Some(mut pool) = self.pool.take() else {
            self.candidates.clear();
            self.state = ScanState::Idle;
            return None;
        };

        self.state = ScanState::Stopping;
        pool.shutdown();

        debug!(grace_ms = grace.as_millis() as u64, "Stopping scan");

        let mut interrupt = self.interrupt.subscribe();
        let termination = pool.await_termination(grace, &mut interrupt, self.epoch).await;
        match termination {
            Termination::Completed => {}
            Termination::TimedOut => {
                warn!(pending = pool.pending(), "Grace period elapsed with probes still running")
            }
            Termination::Interrupted => debug!("Stop interrupted, forcing shutdown"),
        }

        let abandoned = pool.shutdown_now().await;
        let summary = ScanSummary {
            candidates: self.candidates.len(),
            found: self.sink.emitted(),
            abandoned,
            termination,
        };

        self.candidates.clear();
        self.state = ScanState::Idle;

        info!(
            candidates = summary.candidates,
            found = summary.found,
            abandoned = summary.abandoned,
            "Scan stopped"
        );
        Some(summary)
    }

    /// Run one full cycle, cutting it short once `limit` has elapsed
    pub async fn scan(&mut self, limit: Duration) -> ScanSummary {
        let epoch = *self.interrupt.borrow();
        self.scan_since(epoch, limit).await
    }

    /// Run one full cycle unless an interrupt arrived after generation `epoch`.
    ///
    /// Callers that queue for the scheduler read the generation before
    /// queueing, so a stop requested meanwhile also cancels their scan.
    pub async fn scan_since(&mut self, epoch: u64, limit: Duration) -> ScanSummary {
        if *self.interrupt.borrow() != epoch {
            debug!("Interrupted before starting, skipping scan");
            return self.stop().await.unwrap_or(ScanSummary {
                termination: Termination::Interrupted,
                ..Default::default()
            });
        }

        self.begin(epoch).await;

        let mut grace = None;
        if let Some(pool) = self.pool.as_mut() {
            pool.shutdown();
            let mut interrupt = self.interrupt.subscribe();
            if pool.await_termination(limit, &mut interrupt, epoch).await == Termination::TimedOut {
                info!(limit_secs = limit.as_secs(), "Scan time limit reached");
                grace = Some(Duration::ZERO);
            }
        }

        let summary = match grace {
            Some(grace) => self.finish(grace).await,
            None => self.stop().await,
        };
        summary.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerator::{HostInterface, InterfaceAddress, InterfaceSource};
    use crate::error::DiscoveryError;
    use async_trait::async_trait;
    use logoscan_core::DiscoveredDevice;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Single /29 interface, counting how often it is listed
    struct CountingInterfaces(Arc<AtomicUsize>);

    impl InterfaceSource for CountingInterfaces {
        fn interfaces(&self) -> Result<Vec<HostInterface>, DiscoveryError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![HostInterface {
                name: "eth0".to_string(),
                loopback: false,
                addresses: vec![InterfaceAddress {
                    ip: IpAddr::V4(Ipv4Addr::new(192, 168, 50, 1)),
                    prefix_len: 29,
                }],
            }])
        }
    }

    /// Answers for a fixed set of addresses after an optional delay
    struct StubProbe {
        present: HashSet<Ipv4Addr>,
        delay: Duration,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl Probe for StubProbe {
        async fn probe(&self, address: Ipv4Addr) -> Option<DiscoveredDevice> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            self.present
                .contains(&address)
                .then(|| DiscoveredDevice::unresolved(address, 102))
        }
    }

    fn scheduler(
        probe: Arc<StubProbe>,
        listings: Arc<AtomicUsize>,
        found: Arc<Mutex<Vec<DiscoveredDevice>>>,
    ) -> ProbeScheduler {
        let sink = ResultSink::new(Box::new(move |device: DiscoveredDevice| -> anyhow::Result<()> {
            found.lock().unwrap().push(device);
            Ok(())
        }));
        ProbeScheduler::new(
            SubnetEnumerator::new(Box::new(CountingInterfaces(listings))),
            probe,
            Arc::new(sink),
            2,
            Duration::from_millis(50),
        )
    }

    fn stub(present: &[Ipv4Addr], delay: Duration) -> Arc<StubProbe> {
        Arc::new(StubProbe {
            present: present.iter().copied().collect(),
            delay,
            finished: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut scheduler = scheduler(
            stub(&[], Duration::ZERO),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(Vec::new())),
        );

        assert_eq!(scheduler.stop().await, None);
        assert_eq!(scheduler.state(), ScanState::Idle);
        assert!(scheduler.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_full_cycle_reports_present_devices() {
        let present = [Ipv4Addr::new(192, 168, 50, 3), Ipv4Addr::new(192, 168, 50, 6)];
        let found = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = scheduler(
            stub(&present, Duration::from_millis(5)),
            Arc::new(AtomicUsize::new(0)),
            found.clone(),
        );

        let summary = scheduler.scan(Duration::from_secs(5)).await;

        assert_eq!(summary.candidates, 6);
        assert_eq!(summary.found, 2);
        assert_eq!(summary.abandoned, 0);
        assert_eq!(summary.termination, Termination::Completed);
        assert_eq!(scheduler.state(), ScanState::Idle);
        assert!(scheduler.candidates().is_empty());

        let mut addresses: Vec<_> = found.lock().unwrap().iter().map(|d| d.address).collect();
        addresses.sort();
        assert_eq!(addresses, present.to_vec());
    }

    #[tokio::test]
    async fn test_start_while_scanning_stops_prior_cycle() {
        let listings = Arc::new(AtomicUsize::new(0));
        let probe = stub(&[], Duration::from_secs(60));
        let mut scheduler = scheduler(
            probe.clone(),
            listings.clone(),
            Arc::new(Mutex::new(Vec::new())),
        );

        assert_eq!(scheduler.start().await, 6);
        assert_eq!(scheduler.state(), ScanState::Scanning);

        // Prior cycle's probes never finish, so its stop runs the full grace period and aborts
        assert_eq!(scheduler.start().await, 6);
        assert_eq!(scheduler.state(), ScanState::Scanning);
        assert_eq!(listings.load(Ordering::SeqCst), 2);
        assert_eq!(probe.finished.load(Ordering::SeqCst), 0);

        let summary = scheduler.stop().await.unwrap();
        assert_eq!(summary.termination, Termination::TimedOut);
        assert_eq!(summary.abandoned, 6);
        assert_eq!(scheduler.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_interrupter_forces_immediate_shutdown() {
        let mut scheduler = scheduler(
            stub(&[], Duration::from_secs(60)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(Vec::new())),
        );
        scheduler.start().await;

        let interrupter = scheduler.interrupter();
        interrupter.interrupt();

        let summary = scheduler.stop().await.unwrap();
        assert_eq!(summary.termination, Termination::Interrupted);
        assert_eq!(summary.abandoned, 6);
    }

    #[tokio::test]
    async fn test_scan_limit_cuts_cycle_short() {
        let mut scheduler = scheduler(
            stub(&[], Duration::from_secs(60)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(Vec::new())),
        );

        let summary = scheduler.scan(Duration::from_millis(30)).await;
        assert_eq!(summary.termination, Termination::TimedOut);
        assert_eq!(summary.abandoned, 6);
        assert_eq!(summary.found, 0);
        assert_eq!(scheduler.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_stale_epoch_skips_enumeration() {
        let listings = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(
            stub(&[], Duration::ZERO),
            listings.clone(),
            Arc::new(Mutex::new(Vec::new())),
        );

        let interrupter = scheduler.interrupter();
        let epoch = interrupter.generation();
        interrupter.interrupt();

        let summary = scheduler.scan_since(epoch, Duration::from_secs(5)).await;
        assert_eq!(summary.termination, Termination::Interrupted);
        assert_eq!(summary.candidates, 0);
        assert_eq!(listings.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.state(), ScanState::Idle);
    }

    #[tokio::test]
    async fn test_earlier_interrupt_does_not_cancel_next_scan() {
        let present = [Ipv4Addr::new(192, 168, 50, 2)];
        let mut scheduler = scheduler(
            stub(&present, Duration::ZERO),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(Mutex::new(Vec::new())),
        );

        scheduler.interrupter().interrupt();

        let summary = scheduler.scan(Duration::from_secs(5)).await;
        assert_eq!(summary.termination, Termination::Completed);
        assert_eq!(summary.found, 1);
    }
}
