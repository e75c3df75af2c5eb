use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::reader::{RawStatus, StatusSource};
use crate::status::{self, BatteryReading, IconBucket};

/// Everything the tray needs from one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub reading: BatteryReading,
    pub bucket: IconBucket,
    pub tooltip: String,
}

impl PollOutcome {
    pub fn from_raw(raw: &RawStatus) -> Self {
        let reading = status::parse(raw);
        Self {
            reading,
            bucket: status::bucket_for(&reading),
            tooltip: status::tooltip_for(&reading),
        }
    }
}

/// Clears the busy flag when a poll finishes, including by unwinding.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs fetch → parse for one cycle. At most one cycle runs at a time.
pub struct Poller<S> {
    source: S,
    busy: AtomicBool,
}

impl<S: StatusSource> Poller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            busy: AtomicBool::new(false),
        }
    }

    /// Run one cycle. Returns `None` without touching the source if another
    /// cycle is still in flight.
    pub fn poll_once(&self) -> Option<PollOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            debug!("poll already in flight, skipping tick");
            return None;
        }
        let _guard = BusyGuard(&self.busy);

        let raw = self.source.fetch_status();
        if let RawStatus::Failed(ref e) = raw {
            debug!(error = %e, "no battery status");
        }
        let outcome = PollOutcome::from_raw(&raw);
        info!(reading = %outcome.reading, bucket = %outcome.bucket, "battery polled");
        Some(outcome)
    }
}

/// Owns the polling thread. Dropping the handle stops the thread.
pub struct PollerHandle {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Wake the worker, ask it to exit, and wait for it. A poll in progress
    /// is allowed to finish.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.stop_tx.try_send(());
        if thread.join().is_err() {
            warn!("poller thread panicked");
        }
        info!("poller stopped");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start the polling worker. The first poll runs immediately; each later one
/// starts `interval` after the previous one finished, so ticks never overlap.
/// `sink` receives every outcome and returns `false` once nobody is
/// listening, which ends the worker.
pub fn spawn<S, F>(source: S, interval: Duration, mut sink: F) -> std::io::Result<PollerHandle>
where
    S: StatusSource + 'static,
    F: FnMut(PollOutcome) -> bool + Send + 'static,
{
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let poller = Poller::new(source);

    let thread = std::thread::Builder::new()
        .name("battery-poller".into())
        .spawn(move || {
            info!(interval_secs = interval.as_secs(), "poller started");
            loop {
                if let Some(outcome) = poller.poll_once() {
                    if !sink(outcome) {
                        info!("presenter gone, stopping poller");
                        break;
                    }
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;

    Ok(PollerHandle {
        stop_tx,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Instant;

    struct FixedSource(&'static str);

    impl StatusSource for FixedSource {
        fn fetch_status(&self) -> RawStatus {
            RawStatus::Output(self.0.to_string())
        }
    }

    /// Blocks inside `fetch_status` until released, counting overlap.
    struct GatedSource {
        entered: Sender<()>,
        release: Receiver<()>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
    }

    impl StatusSource for GatedSource {
        fn fetch_status(&self) -> RawStatus {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.entered.send(());
            let _ = self.release.recv();
            self.active.fetch_sub(1, Ordering::SeqCst);
            RawStatus::Output("Discharging [||] 40%".into())
        }
    }

    impl<S: StatusSource> StatusSource for Arc<S> {
        fn fetch_status(&self) -> RawStatus {
            (**self).fetch_status()
        }
    }

    fn gated() -> (Arc<GatedSource>, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let source = Arc::new(GatedSource {
            entered: entered_tx,
            release: release_rx,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        (source, entered_rx, release_tx)
    }

    #[test]
    fn test_poll_once_builds_outcome() {
        let poller = Poller::new(FixedSource("Charging [||||||||||] 83 %"));
        let outcome = poller.poll_once().unwrap();
        assert_eq!(
            outcome.reading,
            BatteryReading::Level {
                percent: 83,
                charging: true
            }
        );
        assert_eq!(outcome.bucket, IconBucket::High75);
        assert_eq!(outcome.tooltip, "\u{1F5B1}\u{FE0F} Charging: 83%");
    }

    #[test]
    fn test_failed_fetch_is_unavailable() {
        struct Broken;
        impl StatusSource for Broken {
            fn fetch_status(&self) -> RawStatus {
                RawStatus::Failed(crate::error::ReadError::Spawn(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "rivalcfg not found",
                )))
            }
        }
        let outcome = Poller::new(Broken).poll_once().unwrap();
        assert_eq!(outcome.reading, BatteryReading::Unavailable);
        assert_eq!(outcome.bucket, IconBucket::Unavailable);
    }

    #[test]
    fn test_tick_during_poll_is_skipped() {
        let (source, entered, release) = gated();
        let poller = Arc::new(Poller::new(source.clone()));

        let first = {
            let poller = poller.clone();
            std::thread::spawn(move || poller.poll_once())
        };
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        // Second tick while the first is blocked in the command.
        assert!(poller.poll_once().is_none());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        release.send(()).unwrap();
        assert!(first.join().unwrap().is_some());

        // Flag is cleared once the first poll completes.
        release.send(()).unwrap();
        assert!(poller.poll_once().is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_many_ticks_never_overlap() {
        let (source, _entered, release) = gated();
        // Pre-release enough permits for every call that gets through.
        for _ in 0..64 {
            release.send(()).unwrap();
        }
        let poller = Arc::new(Poller::new(source.clone()));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let poller = poller.clone();
                std::thread::spawn(move || {
                    for _ in 0..8 {
                        poller.poll_once();
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert!(source.calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spawn_delivers_and_stops_promptly() {
        let (tx, rx) = unbounded();
        let mut handle = spawn(
            FixedSource("Discharging [|||] 24%"),
            Duration::from_secs(3600),
            move |outcome| tx.send(outcome).is_ok(),
        )
        .unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.bucket, IconBucket::Empty);
        assert_eq!(outcome.tooltip, "\u{1F5B1}\u{FE0F} Discharging: 24%");

        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_spawn_repeats_on_interval() {
        let (tx, rx) = unbounded();
        let _handle = spawn(
            FixedSource("Charging [|] 100%"),
            Duration::from_millis(10),
            move |outcome| tx.send(outcome).is_ok(),
        )
        .unwrap();

        for _ in 0..3 {
            let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(outcome.bucket, IconBucket::Full100);
        }
    }

    #[test]
    fn test_worker_exits_when_sink_closes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut handle = spawn(
            FixedSource("Charging [|] 50%"),
            Duration::from_millis(1),
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                false
            },
        )
        .unwrap();

        handle.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
