use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

/// A thread-safe, reference-counted resource container.
///
/// `MtResource` provides synchronized access to a value of type `T` that is shared
/// between the consumer thread and the generation workers. It wraps an
/// `Arc<Mutex<T>>`, so the value only has to be `Send`: queued continuations are
/// boxed `FnOnce + Send` closures that are never shared by reference. Cloning the
/// container clones the handle, not the value.
///
/// A worker that panicked while holding the lock does not make the value
/// unreachable: poisoned guards are recovered, since every value stored here
/// (tile records, completion queues, dispatcher state) stays structurally valid
/// across a panic in pure generation code.
///
/// # Examples
///
/// ```
/// use terrain_streamer::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let counter_clone = counter.clone();
///
/// std::thread::spawn(move || {
///     *counter_clone.lock() += 1;
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(*counter.lock(), 1);
/// ```
///
/// # Performance Considerations
/// - Every access is exclusive; keep guards short-lived
/// - Never hold a guard while running user callbacks that may lock it again
pub struct MtResource<T: Send> {
    resource: Arc<Mutex<T>>,
}

impl<T: Send> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(Mutex::new(resource)),
        }
    }

    /// Returns an exclusive guard over the contained value.
    ///
    /// Blocks while another guard is alive.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.resource.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempts to take the guard without blocking.
    ///
    /// # Returns
    /// - `Some(guard)` if the lock was free
    /// - `None` if another guard is currently alive
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        match self.resource.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Returns `true` when both handles point at the same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T: Send> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
