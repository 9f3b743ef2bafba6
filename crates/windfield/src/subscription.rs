// Viewport change notifications between the host map and the engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Arc<AtomicBool>)>,
}

/// Host side of the subscription: call [`ViewportNotifier::notify`] on resize, pan or zoom
#[derive(Debug, Clone, Default)]
pub struct ViewportNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl ViewportNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ViewportSubscription {
        let flag = Arc::new(AtomicBool::new(false));
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, flag.clone()));
        ViewportSubscription {
            id,
            changed: flag,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Flag every live subscription as changed
    pub fn notify(&self) {
        for (_, flag) in &lock(&self.registry).listeners {
            flag.store(true, Ordering::Release);
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Engine side of the subscription, unsubscribes when dropped
#[derive(Debug)]
pub struct ViewportSubscription {
    id: u64,
    changed: Arc<AtomicBool>,
    registry: Weak<Mutex<Registry>>,
}

impl ViewportSubscription {
    /// True once after one or more notifications
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}

impl Drop for ViewportSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_are_coalesced() {
        let notifier = ViewportNotifier::new();
        let subscription = notifier.subscribe();
        assert!(!subscription.take_changed());

        notifier.notify();
        notifier.notify();
        assert!(subscription.take_changed());
        assert!(!subscription.take_changed());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let notifier = ViewportNotifier::new();
        let first = notifier.subscribe();
        let second = notifier.subscribe();
        assert_eq!(notifier.listener_count(), 2);

        drop(first);
        assert_eq!(notifier.listener_count(), 1);
        notifier.notify();
        assert!(second.take_changed());

        drop(second);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_notifier() {
        let notifier = ViewportNotifier::new();
        let subscription = notifier.subscribe();
        drop(notifier);
        assert!(!subscription.take_changed());
        drop(subscription);
    }
}
