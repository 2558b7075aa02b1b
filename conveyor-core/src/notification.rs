//! Notification scheduler
//!
//! Holds at most one visible notification. Showing a new one replaces the
//! current one immediately (no queue). Each notification dismisses itself
//! after a timeout; hovering cancels the timer and leaving starts a fresh
//! full-length timer, so every hover resets the countdown rather than
//! pausing it.
//!
//! The close callback runs exactly once, when the notification it belongs
//! to times out or is closed explicitly. A notification that is replaced
//! never runs its callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default time a notification stays visible
pub const DEFAULT_DURATION: Duration = Duration::from_millis(3500);

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Info,
    Error,
}

/// A message to show to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    /// Overrides the scheduler's default duration
    pub duration: Option<Duration>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            duration: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, message)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationConfig {
    /// How long a notification stays visible without interaction
    pub duration: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
        }
    }
}

type CloseCallback = Box<dyn FnOnce() + Send + 'static>;

/// Identifies one armed timer: the notification and how many times its
/// timer has been cancelled before
type TimerKey = (u64, u64);

struct Visible {
    id: u64,
    notification: Notification,
    on_close: Option<CloseCallback>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every cancel; a timer only closes if it still matches
    generation: u64,
}

impl Visible {
    fn timer_key(&self) -> TimerKey {
        (self.id, self.generation)
    }

    /// Abort the pending timer. A timer task already past its sleep may
    /// still run, so the generation bump is what actually disarms it.
    fn cancel_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    visible: Option<Visible>,
}

/// Single-slot notification state with auto-dismiss
///
/// Cheap to clone; clones share the same slot. Timers need a Tokio runtime:
/// outside one, notifications stay up until closed explicitly.
#[derive(Clone)]
pub struct NotificationScheduler {
    config: NotificationConfig,
    slot: Arc<Mutex<Slot>>,
}

impl Default for NotificationScheduler {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}

impl NotificationScheduler {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        lock_slot(&self.slot)
    }

    /// Show `notification`, replacing whatever is visible
    ///
    /// # Returns
    /// An id for the shown notification
    pub fn display(&self, notification: Notification) -> u64 {
        self.show(notification, None)
    }

    /// Show `notification` and run `on_close` once when it closes
    pub fn display_with_callback<F>(&self, notification: Notification, on_close: F) -> u64
    where
        F: FnOnce() + Send + 'static,
    {
        self.show(notification, Some(Box::new(on_close)))
    }

    fn show(&self, notification: Notification, on_close: Option<CloseCallback>) -> u64 {
        let mut slot = self.lock();

        if let Some(mut previous) = slot.visible.take() {
            previous.cancel_timer();
            debug!("Replacing notification {}", previous.id);
        }

        slot.next_id += 1;
        let id = slot.next_id;
        let timer = self.start_timer((id, 0), self.duration_for(&notification));

        slot.visible = Some(Visible {
            id,
            notification,
            on_close,
            timer,
            generation: 0,
        });
        id
    }

    fn duration_for(&self, notification: &Notification) -> Duration {
        notification.duration.unwrap_or(self.config.duration)
    }

    fn start_timer(&self, key: TimerKey, duration: Duration) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime; notification {} will not auto-dismiss", key.0);
            return None;
        };

        let slot = Arc::downgrade(&self.slot);
        Some(handle.spawn(async move {
            tokio::time::sleep(duration).await;
            close_if(&slot, Some(key));
        }))
    }

    /// Pointer entered the notification: cancel the pending dismissal
    pub fn pointer_enter(&self) {
        if let Some(visible) = self.lock().visible.as_mut() {
            visible.cancel_timer();
        }
    }

    /// Pointer left the notification: restart the full dismissal timer
    pub fn pointer_leave(&self) {
        let mut slot = self.lock();
        if let Some(visible) = slot.visible.as_mut() {
            visible.cancel_timer();
            let duration = self.duration_for(&visible.notification);
            visible.timer = self.start_timer(visible.timer_key(), duration);
        }
    }

    /// Close the visible notification, running its callback
    pub fn close(&self) {
        close_if(&Arc::downgrade(&self.slot), None);
    }

    /// The visible notification, if any
    pub fn current(&self) -> Option<Notification> {
        self.lock()
            .visible
            .as_ref()
            .map(|v| v.notification.clone())
    }

    pub fn is_visible(&self) -> bool {
        self.lock().visible.is_some()
    }
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Close the visible notification if its armed timer is `expected` (or
/// unconditionally, for `None`)
///
/// The callback runs after the lock is released, so it may show another
/// notification.
fn close_if(slot: &Weak<Mutex<Slot>>, expected: Option<TimerKey>) {
    let Some(slot) = slot.upgrade() else {
        return;
    };

    let closed = {
        let mut guard = lock_slot(&slot);
        match &guard.visible {
            Some(v) if expected.is_none_or(|key| key == v.timer_key()) => guard.visible.take(),
            _ => None,
        }
    };

    if let Some(mut visible) = closed {
        visible.cancel_timer();
        debug!("Closed notification {}", visible.id);
        if let Some(on_close) = visible.on_close.take() {
            on_close();
        }
    }
}
