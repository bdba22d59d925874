//! Fixed-capacity pool of lazily opened connections to one blocking service.
//!
//! Slots are scanned under a single mutex; the first idle slot is opened in
//! place and handed out as a [`Pooled`] guard. An exhausted pool fails fast
//! with [`Error::NoConnectionsAvailable`] instead of queueing, leaving
//! retry policy to the caller. Releasing (explicitly or by dropping the guard)
//! closes the connection and marks the slot idle again, so a slot never holds
//! a live connection while idle.

use parking_lot::Mutex;
use std::{
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Opens and closes connections for one external service.
///
/// Both calls block and run while the pool lock is held.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Connect (and authenticate, when the service needs it).
    ///
    /// # Errors
    /// Returns the service error when the connection cannot be established.
    fn open(&self) -> Result<Self::Connection>;

    /// Tear down a connection that is about to be discarded.
    ///
    /// # Errors
    /// Returns the service error when the close handshake fails.
    fn close(&self, connection: &mut Self::Connection) -> Result<()>;
}

struct Shared<C> {
    name: &'static str,
    connector: C,
    // `true` marks an active slot.
    slots: Mutex<Vec<bool>>,
}

pub struct Pool<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.name)
            .field("capacity", &self.capacity())
            .field("active", &self.active())
            .finish()
    }
}

impl<C: Connector> Pool<C> {
    #[must_use]
    pub fn new(name: &'static str, connector: C, capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                connector,
                slots: Mutex::new(vec![false; capacity]),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.slots.lock().len()
    }

    /// Number of slots currently handed out.
    #[must_use]
    pub fn active(&self) -> usize {
        self.shared.slots.lock().iter().filter(|active| **active).count()
    }

    /// Open the first idle slot.
    ///
    /// # Errors
    /// Returns [`Error::NoConnectionsAvailable`] when every slot is active, or
    /// the connector error when opening fails (the slot then stays idle).
    pub fn acquire(&self) -> Result<Pooled<C>> {
        let mut slots = self.shared.slots.lock();

        let Some(slot) = slots.iter().position(|active| !*active) else {
            debug!(pool = self.shared.name, "pool exhausted");
            return Err(Error::NoConnectionsAvailable);
        };

        let connection = self.shared.connector.open()?;
        slots[slot] = true;

        debug!(pool = self.shared.name, slot, "connection acquired");

        Ok(Pooled {
            shared: Arc::clone(&self.shared),
            slot,
            connection,
            released: false,
        })
    }
}

impl<C: Connector> Shared<C> {
    fn release(&self, slot: usize, connection: &mut C::Connection) -> Result<()> {
        let mut slots = self.slots.lock();
        let closed = self.connector.close(connection);
        // The connection is discarded either way; a failed close must not pin the slot.
        slots[slot] = false;

        debug!(pool = self.name, slot, "connection released");

        closed
    }
}

/// An active slot. Dropping it releases the slot.
pub struct Pooled<C: Connector> {
    shared: Arc<Shared<C>>,
    slot: usize,
    connection: C::Connection,
    released: bool,
}

impl<C: Connector> Pooled<C> {
    /// Close the connection and return the slot to the pool.
    ///
    /// # Errors
    /// Returns the connector error when closing fails; the slot is idle regardless.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.shared.release(self.slot, &mut self.connection)
    }

    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<C: Connector> Deref for Pooled<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl<C: Connector> DerefMut for Pooled<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connection
    }
}

impl<C: Connector> Drop for Pooled<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.shared.release(self.slot, &mut self.connection) {
            warn!(pool = self.shared.name, slot = self.slot, "failed to close connection: {err}");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::{
        Barrier,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    use std::thread;

    /// Counts opens and closes; can be told to fail either.
    #[derive(Default)]
    pub(crate) struct CountingConnector {
        pub(crate) opened: AtomicUsize,
        pub(crate) closed: AtomicUsize,
        pub(crate) fail_open: AtomicBool,
        pub(crate) fail_close: AtomicBool,
    }

    impl Connector for Arc<CountingConnector> {
        type Connection = usize;

        fn open(&self) -> Result<usize> {
            if self.fail_open.load(Ordering::SeqCst) {
                return Err(Error::directory(anyhow!("connection refused")));
            }
            Ok(self.opened.fetch_add(1, Ordering::SeqCst))
        }

        fn close(&self, _connection: &mut usize) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close.load(Ordering::SeqCst) {
                return Err(Error::directory(anyhow!("broken pipe")));
            }
            Ok(())
        }
    }

    fn pool(capacity: usize) -> (Pool<Arc<CountingConnector>>, Arc<CountingConnector>) {
        let connector = Arc::new(CountingConnector::default());
        (Pool::new("test", Arc::clone(&connector), capacity), connector)
    }

    #[test]
    fn exhausted_pool_fails_fast() -> Result<()> {
        let (pool, _) = pool(2);
        let first = pool.acquire()?;
        let second = pool.acquire()?;
        assert_ne!(first.slot(), second.slot());

        assert!(matches!(pool.acquire(), Err(Error::NoConnectionsAvailable)));

        first.release()?;
        let third = pool.acquire()?;
        assert_eq!(third.slot(), 0);
        assert_eq!(pool.active(), 2);
        Ok(())
    }

    #[test]
    fn failed_open_leaves_slot_idle() {
        let (pool, connector) = pool(1);
        connector.fail_open.store(true, Ordering::SeqCst);

        assert!(matches!(pool.acquire(), Err(Error::Directory(_))));
        assert_eq!(pool.active(), 0);

        connector.fail_open.store(false, Ordering::SeqCst);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn drop_releases_exactly_once() -> Result<()> {
        let (pool, connector) = pool(1);
        {
            let _connection = pool.acquire()?;
            assert_eq!(pool.active(), 1);
        }
        assert_eq!(pool.active(), 0);
        assert_eq!(connector.closed.load(Ordering::SeqCst), 1);

        pool.acquire()?.release()?;
        assert_eq!(connector.closed.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn failed_close_still_frees_slot() -> Result<()> {
        let (pool, connector) = pool(1);
        connector.fail_close.store(true, Ordering::SeqCst);

        let connection = pool.acquire()?;
        assert!(connection.release().is_err());
        assert_eq!(pool.active(), 0);
        Ok(())
    }

    #[test]
    fn connections_are_opened_lazily() -> Result<()> {
        let (pool, connector) = pool(3);
        assert_eq!(connector.opened.load(Ordering::SeqCst), 0);

        let _connection = pool.acquire()?;
        assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn concurrent_acquire_beyond_capacity() {
        let capacity = 4;
        let (pool, _) = pool(capacity);
        let barrier = Arc::new(Barrier::new(capacity + 1));
        let hold = Arc::new(Barrier::new(capacity + 2));

        let handles: Vec<_> = (0..=capacity)
            .map(|_| {
                let pool = pool.clone();
                let barrier = Arc::clone(&barrier);
                let hold = Arc::clone(&hold);
                thread::spawn(move || {
                    barrier.wait();
                    let outcome = pool.acquire();
                    let exhausted = matches!(outcome, Err(Error::NoConnectionsAvailable));
                    // Keep the connection until every thread has tried.
                    hold.wait();
                    drop(outcome);
                    exhausted
                })
            })
            .collect();

        hold.wait();
        let exhausted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(false))
            .filter(|exhausted| *exhausted)
            .count();

        assert_eq!(exhausted, 1);
        assert_eq!(pool.active(), 0);
    }
}
