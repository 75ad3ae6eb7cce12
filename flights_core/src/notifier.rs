//! Per-entity "will change" signals.
//!
//! Observers are held weakly: the [`Subscription`] returned by
//! [`ChangeNotifier::subscribe`] owns the callback, and dropping it detaches
//! the observer. Dead entries are pruned whenever the map is touched.

use crate::model::{AirlineCode, AirportCode, FlightIdent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Airport(AirportCode),
    Flight(FlightIdent),
    Airline(AirlineCode),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityRef::Airport(code) => write!(f, "airport:{code}"),
            EntityRef::Flight(ident) => write!(f, "flight:{ident}"),
            EntityRef::Airline(code) => write!(f, "airline:{code}"),
        }
    }
}

type Observer = dyn Fn() + Send + Sync;

/// Keeps an observer attached for as long as it is alive.
#[must_use = "the observer is detached as soon as the subscription is dropped"]
pub struct Subscription {
    entity: EntityRef,
    _observer: Arc<Observer>,
}

impl Subscription {
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }
}

#[derive(Default)]
pub struct ChangeNotifier {
    observers: Mutex<HashMap<EntityRef, Vec<Weak<Observer>>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        entity: EntityRef,
        observer: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let observer: Arc<Observer> = Arc::new(observer);
        let mut observers = self.observers.lock();
        observers.retain(|_, list| {
            list.retain(|weak| weak.strong_count() > 0);
            !list.is_empty()
        });
        observers
            .entry(entity.clone())
            .or_default()
            .push(Arc::downgrade(&observer));
        Subscription {
            entity,
            _observer: observer,
        }
    }

    /// Fires every live observer of `entity` on the calling thread.
    ///
    /// The lock is released before the callbacks run, so an observer may
    /// subscribe or fire again without deadlocking. Returns how many
    /// observers were called.
    pub fn will_change(&self, entity: &EntityRef) -> usize {
        let live: Vec<Arc<Observer>> = {
            let mut observers = self.observers.lock();
            let Some(list) = observers.get_mut(entity) else {
                return 0;
            };
            list.retain(|weak| weak.strong_count() > 0);
            let live = list.iter().filter_map(Weak::upgrade).collect::<Vec<_>>();
            if list.is_empty() {
                observers.remove(entity);
            }
            live
        };

        for observer in &live {
            observer();
        }
        trace!(entity = %entity, observers = live.len(), "fired change signal");
        live.len()
    }

    pub fn observer_count(&self, entity: &EntityRef) -> usize {
        self.observers
            .lock()
            .get(entity)
            .map_or(0, |list| list.iter().filter(|w| w.strong_count() > 0).count())
    }

    /// Number of entities that still have at least one registered observer slot.
    pub fn tracked_entities(&self) -> usize {
        self.observers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ksfo() -> EntityRef {
        EntityRef::Airport(AirportCode::parse("KSFO").unwrap())
    }

    #[test]
    fn fires_every_attached_observer() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let first = {
            let hits = Arc::clone(&hits);
            notifier.subscribe(ksfo(), move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let second = {
            let hits = Arc::clone(&hits);
            notifier.subscribe(ksfo(), move || {
                hits.fetch_add(10, Ordering::SeqCst);
            })
        };

        assert_eq!(notifier.will_change(&ksfo()), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 11);
        assert_eq!(first.entity(), second.entity());
    }

    #[test]
    fn dropped_subscription_detaches_observer() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let subscription = {
            let hits = Arc::clone(&hits);
            notifier.subscribe(ksfo(), move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert_eq!(notifier.observer_count(&ksfo()), 1);

        drop(subscription);
        assert_eq!(notifier.will_change(&ksfo()), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.tracked_entities(), 0);
    }

    #[test]
    fn observers_of_other_entities_are_not_fired() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _subscription = {
            let hits = Arc::clone(&hits);
            notifier.subscribe(ksfo(), move || {
                hits.fetch_add(1, Ordering::SeqCst);
            })
        };
        let klas = EntityRef::Airport(AirportCode::parse("KLAS").unwrap());
        assert_eq!(notifier.will_change(&klas), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn observer_may_resubscribe_while_firing() {
        let notifier = Arc::new(ChangeNotifier::new());
        let held = Arc::new(Mutex::new(Vec::new()));
        let _subscription = {
            let notifier = Arc::clone(&notifier);
            let held = Arc::clone(&held);
            notifier.clone().subscribe(ksfo(), move || {
                held.lock().push(notifier.subscribe(ksfo(), || {}));
            })
        };

        assert_eq!(notifier.will_change(&ksfo()), 1);
        assert_eq!(notifier.observer_count(&ksfo()), 2);
    }
}
