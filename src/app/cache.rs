use std::{
    collections::HashMap,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::util::DecodedImage;

enum Slot {
    Loading,
    Ready(Arc<DecodedImage>),
}

/// Decoded images keyed by source string.
///
/// Entries never expire; the whole cache goes away with its view. At most one
/// computation per key runs at a time: callers asking for a key that is being
/// computed block until it settles and share the result. If the computation fails
/// the slot is released and the next waiter computes instead.
pub struct Cache {
    slots: Mutex<HashMap<String, Slot>>,
    settled: Condvar,
    closed: AtomicBool,
}

impl Cache {
    pub fn new() -> Cache {
        Self {
            slots: Mutex::new(HashMap::new()),
            settled: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Arc<DecodedImage>> {
        match self.lock().get(key) {
            Some(Slot::Ready(image)) => Some(image.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.lock().get(key), Some(Slot::Ready(_)))
    }

    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_or_compute<F, E>(&self, key: &str, compute: F) -> Result<Arc<DecodedImage>, E>
    where
        F: FnOnce() -> Result<DecodedImage, E>,
    {
        {
            let mut guard = self.lock();
            loop {
                match guard.get(key) {
                    Some(Slot::Ready(image)) => {
                        log::debug!("Cache hit for {key}");
                        return Ok(image.clone());
                    }
                    Some(Slot::Loading) => {
                        guard = self
                            .settled
                            .wait(guard)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    None => {
                        guard.insert(key.to_owned(), Slot::Loading);
                        break;
                    }
                }
            }
        }

        let mut claim = Claim {
            cache: self,
            key,
            done: false,
        };

        let image = Arc::new(compute()?);
        claim.fill(image.clone());
        Ok(image)
    }

    /// Drops every entry. In-flight computations still settle their own slot.
    pub fn clear(&self) {
        self.lock().retain(|_, slot| matches!(slot, Slot::Loading));
    }

    /// Clears the cache for good. Computations still in flight hand their result
    /// to their callers but no longer store it.
    pub fn close(&self) {
        let mut slots = self.lock();
        self.closed.store(true, Ordering::SeqCst);
        slots.retain(|_, slot| matches!(slot, Slot::Loading));
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases a `Loading` slot on every exit path, panics included.
struct Claim<'a> {
    cache: &'a Cache,
    key: &'a str,
    done: bool,
}

impl Claim<'_> {
    fn fill(&mut self, image: Arc<DecodedImage>) {
        let mut slots = self.cache.lock();
        if self.cache.closed.load(Ordering::SeqCst) {
            slots.remove(self.key);
        } else {
            slots.insert(self.key.to_owned(), Slot::Ready(image));
        }
        drop(slots);
        self.done = true;
        self.cache.settled.notify_all();
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.cache.lock().remove(self.key);
            self.cache.settled.notify_all();
        }
    }
}
