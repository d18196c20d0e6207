//! Serialized delivery of discovered devices to the host registry

use anyhow::Result;
use logoscan_core::DiscoveredDevice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::service::DiscoveryEvent;

/// Registration callback owned by the host system
pub trait DeviceRegistry: Send + Sync {
    fn register(&self, device: DiscoveredDevice) -> Result<()>;
}

impl<F> DeviceRegistry for F
where
    F: Fn(DiscoveredDevice) -> Result<()> + Send + Sync,
{
    fn register(&self, device: DiscoveredDevice) -> Result<()> {
        self(device)
    }
}

/// Forwards registrations as discovery events
pub struct BroadcastRegistry {
    events: broadcast::Sender<DiscoveryEvent>,
}

impl BroadcastRegistry {
    pub fn new(events: broadcast::Sender<DiscoveryEvent>) -> Self {
        Self { events }
    }
}

impl DeviceRegistry for BroadcastRegistry {
    fn register(&self, device: DiscoveredDevice) -> Result<()> {
        // No subscribers is not a failure; the device is simply unobserved
        let _ = self.events.send(DiscoveryEvent::DeviceDiscovered(device));
        Ok(())
    }
}

/// Fan-in point for probe workers.
///
/// At most one registration is in progress at any instant, so the registry
/// never sees interleaved calls.
pub struct ResultSink {
    registry: Box<dyn DeviceRegistry>,
    lock: Mutex<()>,
    emitted: AtomicUsize,
}

impl ResultSink {
    pub fn new(registry: Box<dyn DeviceRegistry>) -> Self {
        Self {
            registry,
            lock: Mutex::new(()),
            emitted: AtomicUsize::new(0),
        }
    }

    /// Hand a device to the registry; failures are logged and not retried
    pub fn emit(&self, device: DiscoveredDevice) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let id = device.id.clone();
        self.emitted.fetch_add(1, Ordering::Relaxed);
        match self.registry.register(device) {
            Ok(()) => debug!(device = %id, "Device registered"),
            Err(e) => warn!(device = %id, error = %e, "Device registration failed"),
        }
    }

    /// Devices emitted since the last reset
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.emitted.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    /// Registry that fails the test if two registrations overlap
    struct ExclusiveRegistry {
        busy: AtomicBool,
        calls: AtomicUsize,
        overlaps: AtomicUsize,
    }

    struct Shared(Arc<ExclusiveRegistry>);

    impl DeviceRegistry for Shared {
        fn register(&self, _device: DiscoveredDevice) -> Result<()> {
            let this = &self.0;
            if this.busy.swap(true, Ordering::SeqCst) {
                this.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_micros(50));
            this.calls.fetch_add(1, Ordering::SeqCst);
            this.busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_concurrent_emits_never_overlap() {
        const WORKERS: usize = 8;
        const PER_WORKER: usize = 25;

        let registry = Arc::new(ExclusiveRegistry {
            busy: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
        });
        let sink = ResultSink::new(Box::new(Shared(Arc::clone(&registry))));

        std::thread::scope(|scope| {
            for worker in 0..WORKERS {
                let sink = &sink;
                scope.spawn(move || {
                    for n in 0..PER_WORKER {
                        let address = Ipv4Addr::new(10, 0, worker as u8, n as u8 + 1);
                        sink.emit(DiscoveredDevice::unresolved(address, 102));
                    }
                });
            }
        });

        assert_eq!(registry.calls.load(Ordering::SeqCst), WORKERS * PER_WORKER);
        assert_eq!(registry.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(sink.emitted(), WORKERS * PER_WORKER);
    }

    #[test]
    fn test_registration_failure_is_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let sink = ResultSink::new(Box::new(move |_device: DiscoveredDevice| -> Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("registry offline")
        }));

        sink.emit(DiscoveredDevice::unresolved(Ipv4Addr::new(10, 0, 0, 1), 102));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.emitted(), 1);

        sink.reset();
        assert_eq!(sink.emitted(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_registry_forwards_device() {
        let (tx, mut rx) = broadcast::channel(4);
        let sink = ResultSink::new(Box::new(BroadcastRegistry::new(tx)));

        sink.emit(DiscoveredDevice::unresolved(Ipv4Addr::new(10, 0, 0, 1), 102));

        match rx.recv().await.unwrap() {
            DiscoveryEvent::DeviceDiscovered(device) => {
                assert_eq!(device.address, Ipv4Addr::new(10, 0, 0, 1))
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
