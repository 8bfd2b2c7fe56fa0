//! Tag dispatcher - host-facing entry point and runtime loop.
//!
//! The [`DispatcherBuilder`] configures polling and the session to run. The
//! [`TagDispatcher`] manages the lifecycle:
//! 1. Wait until the radio adapter is enabled
//! 2. Start listening for discovered tags
//! 3. Run one session per delivered tag, strictly one at a time
//! 4. Hand each [`SessionReport`] back to the host
//!
//! # Example
//!
//! ```
//! use ulc_session::dispatch::{DispatcherBuilder, TagDispatcher};
//! use ulc_session::transport::EmulatedTag;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dispatcher: TagDispatcher<EmulatedTag> = DispatcherBuilder::new()
//!     .start(|| true)
//!     .await?;
//!
//! let notifier = dispatcher.notifier();
//! let tag = EmulatedTag::new([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
//! notifier.tag_discovered(tag.into_handle()).await?;
//!
//! let report = dispatcher.next_report().await.unwrap();
//! assert_eq!(report.operations.len(), 27);
//!
//! dispatcher.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, UlcError};
use crate::session::{SessionConfig, SessionController, SessionReport};
use crate::transport::{TagHandle, Transceiver};

/// Default interval between radio adapter checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of the tag and report queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Radio state as reported by the host platform.
pub trait RadioAdapter: Send + Sync + 'static {
    /// Check if the NFC radio is switched on.
    fn is_enabled(&self) -> bool;
}

impl<F> RadioAdapter for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn is_enabled(&self) -> bool {
        self()
    }
}

/// Builder for configuring and starting a [`TagDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherBuilder {
    session: SessionConfig,
    poll_interval: Duration,
    enable_timeout: Option<Duration>,
    channel_capacity: usize,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            session: SessionConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            enable_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Session run for each discovered tag.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Set the interval between radio adapter checks.
    ///
    /// Default: 100 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Give up waiting for the radio adapter after `timeout`.
    ///
    /// Default: wait forever
    pub fn enable_timeout(mut self, timeout: Duration) -> Self {
        self.enable_timeout = Some(timeout);
        self
    }

    /// Set the tag and report queue capacity.
    ///
    /// Default: 16
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Wait for the radio, then start listening.
    pub async fn start<T, A>(self, adapter: A) -> Result<TagDispatcher<T>>
    where
        T: Transceiver + Send + 'static,
        A: RadioAdapter,
    {
        TagDispatcher::<T>::start(self, Arc::new(adapter)).await
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle the platform uses to deliver discovered tags.
pub struct TagNotifier<T> {
    tx: mpsc::Sender<TagHandle<T>>,
    listening: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl<T> Clone for TagNotifier<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            listening: self.listening.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T: Transceiver + Send + 'static> TagNotifier<T> {
    /// Deliver a discovered tag.
    ///
    /// Returns `Ok(false)` if the dispatcher is paused and the tag was dropped,
    /// and `DispatcherClosed` once the dispatcher has been shut down.
    pub async fn tag_discovered(&self, handle: TagHandle<T>) -> Result<bool> {
        if self.closed.load(Ordering::Acquire) {
            return Err(UlcError::DispatcherClosed);
        }
        if !self.listening.load(Ordering::Acquire) {
            tracing::debug!("Not listening, dropping tag {}", handle.info().id_hex());
            return Ok(false);
        }

        self.tx
            .send(handle)
            .await
            .map_err(|_| UlcError::DispatcherClosed)?;
        Ok(true)
    }

    /// Check if tags are currently accepted.
    #[inline]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }
}

/// A running dispatcher.
///
/// Use `notifier()` to hand out tag delivery handles.
/// Use `next_report()` to receive finished sessions.
pub struct TagDispatcher<T> {
    /// Platform radio state.
    adapter: Arc<dyn RadioAdapter>,
    /// Delivery side of the tag queue.
    notifier: TagNotifier<T>,
    /// Finished session reports.
    reports: mpsc::Receiver<SessionReport>,
    /// Stops the worker after the in-flight session.
    shutdown_tx: Option<oneshot::Sender<()>>,
    poll_interval: Duration,
    enable_timeout: Option<Duration>,
    worker: JoinHandle<()>,
}

impl<T: Transceiver + Send + 'static> TagDispatcher<T> {
    /// Create a new dispatcher builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    async fn start(builder: DispatcherBuilder, adapter: Arc<dyn RadioAdapter>) -> Result<Self> {
        if builder.channel_capacity == 0 {
            return Err(UlcError::Config("channel capacity must be > 0".to_string()));
        }
        wait_for_adapter(adapter.as_ref(), builder.poll_interval, builder.enable_timeout).await?;

        let (tag_tx, tag_rx) = mpsc::channel(builder.channel_capacity);
        let (report_tx, report_rx) = mpsc::channel(builder.channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = tokio::spawn(Self::session_loop(
            tag_rx,
            report_tx,
            shutdown_rx,
            builder.session,
        ));

        tracing::debug!("Tag dispatcher listening");
        Ok(Self {
            adapter,
            notifier: TagNotifier {
                tx: tag_tx,
                listening: Arc::new(AtomicBool::new(true)),
                closed: Arc::new(AtomicBool::new(false)),
            },
            reports: report_rx,
            shutdown_tx: Some(shutdown_tx),
            poll_interval: builder.poll_interval,
            enable_timeout: builder.enable_timeout,
            worker,
        })
    }

    /// Main loop - runs one session per tag, never two at once.
    async fn session_loop(
        mut tags: mpsc::Receiver<TagHandle<T>>,
        reports: mpsc::Sender<SessionReport>,
        mut shutdown_rx: oneshot::Receiver<()>,
        config: SessionConfig,
    ) {
        loop {
            let handle = tokio::select! {
                biased;

                _ = &mut shutdown_rx => break,
                tag = tags.recv() => match tag {
                    Some(handle) => handle,
                    None => break,
                },
            };

            let config = config.clone();
            let session = tokio::task::spawn_blocking(move || {
                SessionController::new(config).run_session(handle)
            });

            match session.await {
                Ok(report) => {
                    if reports.send(report).await.is_err() {
                        tracing::debug!("Report receiver dropped");
                    }
                }
                Err(e) => {
                    tracing::error!("Session task failed: {}", e);
                }
            }
        }
        tracing::debug!("Tag dispatcher stopped");
    }

    /// Handle for delivering discovered tags.
    pub fn notifier(&self) -> TagNotifier<T> {
        self.notifier.clone()
    }

    /// Stop accepting tags (host went to the background).
    pub fn pause(&self) {
        tracing::debug!("Tag dispatcher paused");
        self.notifier.listening.store(false, Ordering::Release);
    }

    /// Wait for the radio again, then accept tags.
    pub async fn resume(&self) -> Result<()> {
        wait_for_adapter(self.adapter.as_ref(), self.poll_interval, self.enable_timeout).await?;
        self.notifier.listening.store(true, Ordering::Release);
        tracing::debug!("Tag dispatcher resumed");
        Ok(())
    }

    #[inline]
    pub fn is_listening(&self) -> bool {
        self.notifier.is_listening()
    }

    /// Next finished session, in delivery order.
    ///
    /// Returns `None` once the worker has stopped and all reports are drained.
    pub async fn next_report(&mut self) -> Option<SessionReport> {
        self.reports.recv().await
    }

    /// Stop after the in-flight session (if any) and wait for the worker.
    pub async fn shutdown(mut self) -> Result<()> {
        self.notifier.closed.store(true, Ordering::Release);
        self.notifier.listening.store(false, Ordering::Release);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Unblock a worker waiting to hand over a report
        self.reports.close();

        self.worker.await.map_err(|e| {
            tracing::error!("Tag dispatcher worker failed: {}", e);
            UlcError::DispatcherClosed
        })
    }
}

/// Poll the adapter until it is enabled or `timeout` passes.
async fn wait_for_adapter(
    adapter: &dyn RadioAdapter,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();

    while !adapter.is_enabled() {
        tracing::error!("NFC radio not enabled");

        if timeout.is_some_and(|t| start.elapsed() >= t) {
            return Err(UlcError::AdapterDisabled);
        }
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CloseError, ConnectError, TransceiveError};
    use crate::protocol::{CommandFrame, ResponseFrame};
    use crate::transport::EmulatedTag;
    use std::sync::atomic::AtomicUsize;

    fn tag(last: u8) -> TagHandle<EmulatedTag> {
        EmulatedTag::new([0x04, 0, 0, 0, 0, 0, last]).into_handle()
    }

    #[test]
    fn test_builder_configuration() {
        let builder = TagDispatcher::<EmulatedTag>::builder()
            .poll_interval(Duration::from_millis(5))
            .enable_timeout(Duration::from_secs(1))
            .channel_capacity(4);

        assert_eq!(builder.poll_interval, Duration::from_millis(5));
        assert_eq!(builder.enable_timeout, Some(Duration::from_secs(1)));
        assert_eq!(builder.channel_capacity, 4);
        assert_eq!(builder.session, SessionConfig::default());
    }

    #[test]
    fn test_builder_default() {
        let builder = DispatcherBuilder::default();
        assert_eq!(builder.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(builder.enable_timeout, None);
    }

    #[tokio::test]
    async fn test_reports_in_delivery_order() {
        let mut dispatcher: TagDispatcher<EmulatedTag> = DispatcherBuilder::new()
            .start(|| true)
            .await
            .unwrap();
        let notifier = dispatcher.notifier();

        for last in 1..=3 {
            assert!(notifier.tag_discovered(tag(last)).await.unwrap());
        }

        for last in 1..=3 {
            let report = dispatcher.next_report().await.unwrap();
            assert_eq!(report.tag.id[6], last);
            assert_eq!(report.operations.len(), 27);
        }

        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_paused_dispatcher_drops_tags() {
        let mut dispatcher: TagDispatcher<EmulatedTag> = DispatcherBuilder::new()
            .start(|| true)
            .await
            .unwrap();
        let notifier = dispatcher.notifier();

        dispatcher.pause();
        assert!(!dispatcher.is_listening());
        assert!(!notifier.tag_discovered(tag(1)).await.unwrap());

        dispatcher.resume().await.unwrap();
        assert!(notifier.is_listening());
        assert!(notifier.tag_discovered(tag(2)).await.unwrap());

        let report = dispatcher.next_report().await.unwrap();
        assert_eq!(report.tag.id[6], 2);

        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_waits_for_adapter() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        let dispatcher: TagDispatcher<EmulatedTag> = DispatcherBuilder::new()
            .poll_interval(Duration::from_millis(1))
            .start(move || counter.fetch_add(1, Ordering::SeqCst) >= 3)
            .await
            .unwrap();

        assert!(polls.load(Ordering::SeqCst) >= 4);
        dispatcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_adapter_timeout() {
        let result: Result<TagDispatcher<EmulatedTag>> = DispatcherBuilder::new()
            .poll_interval(Duration::from_millis(1))
            .enable_timeout(Duration::from_millis(10))
            .start(|| false)
            .await;

        assert!(matches!(result, Err(UlcError::AdapterDisabled)));
    }

    #[tokio::test]
    async fn test_notifier_after_shutdown() {
        let dispatcher: TagDispatcher<EmulatedTag> = DispatcherBuilder::new()
            .start(|| true)
            .await
            .unwrap();
        let notifier = dispatcher.notifier();
        dispatcher.shutdown().await.unwrap();

        assert!(matches!(
            notifier.tag_discovered(tag(1)).await,
            Err(UlcError::DispatcherClosed)
        ));
    }

    #[tokio::test]
    async fn test_zero_channel_capacity_rejected() {
        let result: Result<TagDispatcher<EmulatedTag>> = DispatcherBuilder::new()
            .channel_capacity(0)
            .start(|| true)
            .await;

        assert!(matches!(result, Err(UlcError::Config(_))));
    }

    /// Tag whose connect blocks long enough to queue others behind it.
    struct SlowTag {
        inner: EmulatedTag,
        connects: Arc<AtomicUsize>,
    }

    impl Transceiver for SlowTag {
        fn connect(&mut self) -> std::result::Result<(), ConnectError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            self.inner.connect()
        }

        fn transceive(
            &mut self,
            frame: &CommandFrame,
        ) -> std::result::Result<ResponseFrame, TransceiveError> {
            self.inner.transceive(frame)
        }

        fn close(&mut self) -> std::result::Result<(), CloseError> {
            self.inner.close()
        }
    }

    #[tokio::test]
    async fn test_shutdown_skips_queued_tags() {
        let connects = Arc::new(AtomicUsize::new(0));
        let dispatcher: TagDispatcher<SlowTag> = DispatcherBuilder::new()
            .start(|| true)
            .await
            .unwrap();
        let notifier = dispatcher.notifier();

        for last in 1..=5 {
            let inner = EmulatedTag::new([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, last]);
            let info = inner.info();
            let slow = SlowTag {
                inner,
                connects: connects.clone(),
            };
            assert!(notifier
                .tag_discovered(TagHandle::new(info, slow))
                .await
                .unwrap());
        }

        tokio::time::sleep(Duration::from_millis(5)).await;
        dispatcher.shutdown().await.unwrap();

        assert!(connects.load(Ordering::SeqCst) <= 1);
    }
}
