use std::fmt;

use crate::prelude::{RdmError, RdmResult};
use crate::wake::{ConsumerHandle, Delivery, WakeContext};

/// Identity assigned to a subscriber for the lifetime of its subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(usize);

impl SubscriberId {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for SubscriberId {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Slot {
    handle: Option<ConsumerHandle>,
    acknowledged: bool,
    /// Set when the waker consumed the current window during delivery.
    consumed: bool,
}

/// Fixed-size table of subscribers. Slot `n` backs id `n + 1`.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    slots: Vec<Slot>,
    active: usize,
}

impl SubscriptionRegistry {
    pub fn with_capacity(max_subscribers: usize) -> Self {
        Self {
            slots: (0..max_subscribers).map(|_| Slot::default()).collect(),
            active: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Registers `handle`, or returns its existing id if already registered.
    pub fn subscribe(&mut self, handle: ConsumerHandle) -> RdmResult<SubscriberId> {
        if handle.name().is_empty() {
            return Err(RdmError::InvalidParam("subscriber name is empty".into()));
        }

        if let Some(idx) = self.slots.iter().position(|slot| {
            slot.handle
                .as_ref()
                .is_some_and(|existing| existing.same_consumer(&handle))
        }) {
            return Ok(SubscriberId(idx + 1));
        }

        let idx = self
            .slots
            .iter()
            .position(|slot| slot.handle.is_none())
            .ok_or(RdmError::CapacityExceeded(self.slots.len()))?;

        let slot = &mut self.slots[idx];
        slot.handle = Some(handle);
        slot.acknowledged = false;
        slot.consumed = false;
        self.active += 1;
        Ok(SubscriberId(idx + 1))
    }

    /// Frees the slot behind `id`. Unknown or empty ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> Option<ConsumerHandle> {
        if self.active == 0 {
            return None;
        }
        let slot = self.slot_mut(id)?;
        let handle = slot.handle.take()?;
        slot.acknowledged = false;
        slot.consumed = false;
        self.active -= 1;
        Some(handle)
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.slot(id).is_some_and(|slot| slot.handle.is_some())
    }

    pub fn name(&self, id: SubscriberId) -> Option<&str> {
        self.slot(id)?.handle.as_ref().map(ConsumerHandle::name)
    }

    pub fn acknowledge(&mut self, id: SubscriberId) -> RdmResult<()> {
        let capacity = self.slots.len();
        let slot = self.slot_mut(id).ok_or_else(|| {
            RdmError::InvalidParam(format!("subscriber {} outside 1..={}", id, capacity))
        })?;
        if slot.handle.is_none() {
            return Err(RdmError::InvalidParam(format!(
                "subscriber {} is not registered",
                id
            )));
        }
        slot.acknowledged = true;
        Ok(())
    }

    pub fn is_acknowledged(&self, id: SubscriberId) -> bool {
        self.slot(id).is_some_and(|slot| slot.acknowledged)
    }

    /// True once every occupied slot has acknowledged. Vacuously true when empty.
    pub fn all_acknowledged(&self) -> bool {
        self.slots
            .iter()
            .filter(|slot| slot.handle.is_some())
            .all(|slot| slot.acknowledged)
    }

    pub fn any_acknowledged(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.handle.is_some() && slot.acknowledged)
    }

    pub fn clear_acknowledgements(&mut self) {
        for slot in &mut self.slots {
            slot.acknowledged = false;
            slot.consumed = false;
        }
    }

    /// Wakes every occupied slot that has not already consumed the current
    /// window. Returns how many were woken.
    pub fn notify_all(&mut self, context: WakeContext, window: &[u8]) -> usize {
        let mut woken = 0;
        for slot in &mut self.slots {
            if slot.consumed {
                continue;
            }
            if let Some(handle) = slot.handle.as_ref() {
                if handle.wake(context, window) == Delivery::Consumed {
                    slot.acknowledged = true;
                    slot.consumed = true;
                }
                woken += 1;
            }
        }
        woken
    }

    fn slot(&self, id: SubscriberId) -> Option<&Slot> {
        id.0.checked_sub(1).and_then(|idx| self.slots.get(idx))
    }

    fn slot_mut(&mut self, id: SubscriberId) -> Option<&mut Slot> {
        id.0.checked_sub(1).and_then(|idx| self.slots.get_mut(idx))
    }
}
