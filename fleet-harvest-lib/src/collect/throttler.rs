use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Bounds how many collection tasks run at once.
///
/// Every task calls [`Throttler::acquire`] before touching the remote source and holds the
/// returned permit until it is done, so at most `max_concurrent` tasks are active no matter how
/// many were spawned. Dispatch can be paused for a while with [`Throttler::pause_for`] (e.g. when
/// the remote source starts rate limiting) and shut off for good with [`Throttler::close`].
///
/// When multiple tasks call [`Throttler::pause_for`] concurrently, the longest pause wins.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    paused: AtomicBool,
    resume: Notify,
    resume_at: Mutex<Option<Instant>>,
}

impl Throttler {
    /// Minimum extension required for a new pause to override an active one.
    ///
    /// Tasks that hit the same rate limit at nearly the same moment would otherwise each
    /// re-arm the pause because of tiny `Instant::now()` drift.
    const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

    /// Create a throttler that allows at most `max_concurrent` tasks at a time.
    ///
    /// A limit of zero is raised to one so that work can always make progress.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        let max_concurrent = max_concurrent.max(1);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            paused: AtomicBool::new(false),
            resume: Notify::new(),
            resume_at: Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Wait until unpaused, then acquire a worker slot.
    ///
    /// Returns `None` once the throttler has been closed; the caller must then give up
    /// without doing any work. The permit frees its slot when dropped.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        loop {
            if self.semaphore.is_closed() {
                return None;
            }

            if self.paused.load(Ordering::Acquire) {
                let notified = self.resume.notified();
                tokio::pin!(notified);
                let _ = notified.as_mut().enable();

                // re-check after registering so a resume between the load and the wait isn't lost
                if self.paused.load(Ordering::Acquire) && !self.semaphore.is_closed() {
                    notified.await;
                }
                continue;
            }

            return Arc::clone(&self.semaphore).acquire_owned().await.ok();
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause dispatching for `duration`, then automatically resume.
    ///
    /// Tasks already running are not interrupted. If a pause ending at a similar or later time is
    /// already active, this is a no-op and returns `false`.
    pub fn pause_for(self: &Arc<Self>, duration: Duration) -> bool {
        if self.semaphore.is_closed() {
            return false;
        }

        let duration = duration.min(super::MAX_WAIT);
        let new_resume_at = Instant::now() + duration;

        {
            let mut guard = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
            if guard.is_some_and(|existing| existing + Self::MIN_PAUSE_EXTENSION >= new_resume_at) {
                return false;
            }
            *guard = Some(new_resume_at);
        }

        self.paused.store(true, Ordering::Release);
        let this = Arc::clone(self);
        drop(tokio::spawn(async move {
            tokio::time::sleep(duration).await;

            let should_resume = {
                let mut guard = this.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
                if guard.is_some_and(|t| Instant::now() >= t) {
                    *guard = None;
                    true
                } else {
                    false // a longer pause was scheduled after us
                }
            };

            if should_resume {
                this.paused.store(false, Ordering::Release);
                this.resume.notify_waiters();
            }
        }));

        true
    }

    /// Stop handing out slots. Waiting and future callers of [`acquire`](Self::acquire) get `None`.
    pub fn close(&self) {
        self.semaphore.close();
        self.paused.store(false, Ordering::Release);
        self.resume.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
