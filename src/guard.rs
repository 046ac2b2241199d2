use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

use crate::caller::{ReaderId, WriterId};
use crate::cancel::{CancelToken, CANCEL_POLL_INTERVAL};
use crate::error::GuardError;

/// Provides multiple-reader single-writer access to a shared resource
///
/// # Description
///
/// The guard keeps a count of active readers behind a mutex and a condition
/// variable bound to that mutex.
///
/// * Readers take the mutex only long enough to bump the count, then do their
///   work outside of it, so any number of them overlap.
/// * Writers take the mutex and keep it for their whole critical section. While
///   readers are counted they wait on the condition variable, re-checking the
///   count after every wake.
/// * The last reader out wakes every waiting writer. Only one of them gets the
///   mutex with a zero count; the rest see the count again after the winner
///   releases.
///
/// Because a reader needs the same mutex to register, nobody can start
/// reading while a writer is inside, and a writer never proceeds while the
/// count is non-zero.
///
/// The order in which competing writers get in is whatever the mutex hands
/// out. No FIFO promise is made.
pub struct ReadWriteGuard<T: ? Sized>
{
    active_readers: Mutex<usize>,
    drained: Condvar,
    data: UnsafeCell<T>,
}

/// Shared access obtained by `enter_read`. Dropping it exits the read.
pub struct ReadAccess<'a, T: ? Sized + 'a>
{
    guard: &'a ReadWriteGuard<T>,
    data: &'a T,
    reader: ReaderId,
}

/// Exclusive access obtained by `enter_write`. Holds the internal lock until
/// dropped.
pub struct WriteAccess<'a, T: ? Sized + 'a>
{
    readers: MutexGuard<'a, usize>,
    data: &'a mut T,
    writer: WriterId,
}

// Readers hand out `&T` to many threads at once, writers `&mut T` to one.
unsafe impl<T: ? Sized + Send + Sync> Sync for ReadWriteGuard<T> {}

impl<T> ReadWriteGuard<T>
{
    pub fn new(resource: T) -> ReadWriteGuard<T>
    {
        ReadWriteGuard {
            active_readers: Mutex::new(0),
            drained: Condvar::new(),
            data: UnsafeCell::new(resource),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ? Sized> ReadWriteGuard<T>
{
    /// Number of readers currently between entering and exiting.
    ///
    /// Takes the internal lock, so this waits for an active writer to finish.
    pub fn active_readers(&self) -> usize {
        *self.active_readers.lock()
    }

    /// Like `active_readers`, but returns `None` instead of waiting when the
    /// lock is held (a writer is inside, or a reader is mid-update).
    pub fn try_active_readers(&self) -> Option<usize> {
        self.active_readers.try_lock().map(|readers| *readers)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn obtained_read(&self, mut readers: MutexGuard<usize>, reader: ReaderId) -> ReadAccess<T> {
        *readers += 1;
        info!(%reader, active_readers = *readers, "entered read");
        drop(readers);

        ReadAccess {
            guard: self,
            data: unsafe { &*self.data.get() },
            reader,
        }
    }

    fn obtained_write<'a>(&'a self, readers: MutexGuard<'a, usize>, writer: WriterId) -> WriteAccess<'a, T> {
        debug_assert_eq!(*readers, 0);
        info!(%writer, "no readers left, entered write");

        WriteAccess {
            readers,
            data: unsafe { &mut *self.data.get() },
            writer,
        }
    }

    fn exit_read(&self, reader: ReaderId) {
        let mut readers = self.active_readers.lock();
        debug_assert!(*readers > 0, "{} exited without entering", reader);
        *readers -= 1;
        info!(%reader, active_readers = *readers, "exited read");

        if *readers == 0 {
            let woken = self.drained.notify_all();
            trace!(woken, "last reader out, woke waiting writers");
        }
    }

    /// Registers a reader and returns its access handle.
    ///
    /// Only blocks for as long as it takes to get the internal lock, which is
    /// the whole critical section of a writer that is currently inside.
    pub fn enter_read(&self, reader: ReaderId) -> ReadAccess<T>
    {
        debug!(%reader, "trying to read the shared resource");
        let readers = self.active_readers.lock();
        self.obtained_read(readers, reader)
    }

    /// Registers a reader only if the internal lock is free right now.
    pub fn try_enter_read(&self, reader: ReaderId) -> Option<ReadAccess<T>>
    {
        self.active_readers.try_lock().map(|readers| self.obtained_read(readers, reader))
    }

    /// Runs `work` with shared access. The work itself runs outside the
    /// internal lock, so concurrent reads overlap.
    pub fn read<R, F>(&self, reader: ReaderId, work: F) -> R
        where F: FnOnce(&T) -> R
    {
        let access = self.enter_read(reader);
        work(&access)
    }

    /// Takes the internal lock and waits until no reader is active.
    pub fn enter_write(&self, writer: WriterId) -> WriteAccess<T>
    {
        debug!(%writer, "trying to write the shared resource");
        let mut readers = self.active_readers.lock();

        while *readers != 0 {
            info!(%writer, active_readers = *readers, "readers active, waiting");
            self.drained.wait(&mut readers);
        }

        self.obtained_write(readers, writer)
    }

    /// Enters write mode only if the lock is free and no reader is active.
    pub fn try_enter_write(&self, writer: WriterId) -> Option<WriteAccess<T>>
    {
        let readers = self.active_readers.try_lock()?;
        if *readers != 0 {
            return None;
        }

        Some(self.obtained_write(readers, writer))
    }

    /// `enter_write` bounded by `timeout`, covering both the wait for the lock
    /// and the wait for readers to drain.
    pub fn enter_write_timeout(&self, writer: WriterId, timeout: Duration) -> Result<WriteAccess<T>, GuardError>
    {
        let started = Instant::now();
        let deadline = match started.checked_add(timeout) {
            Some(deadline) => deadline,
            None => return Ok(self.enter_write(writer)),
        };
        let timed_out = || {
            let waited = started.elapsed();
            warn!(%writer, ?waited, "gave up waiting for exclusive access");
            GuardError::TimedOut { writer, waited }
        };

        let mut readers = match self.active_readers.try_lock_until(deadline) {
            Some(readers) => readers,
            None => return Err(timed_out()),
        };

        while *readers != 0 {
            info!(%writer, active_readers = *readers, "readers active, waiting");
            if self.drained.wait_until(&mut readers, deadline).timed_out() && *readers != 0 {
                return Err(timed_out());
            }
        }

        Ok(self.obtained_write(readers, writer))
    }

    /// `enter_write` that gives up once `token` is cancelled.
    ///
    /// The token is checked before every attempt at the lock and after every
    /// wake, at least once per `CANCEL_POLL_INTERVAL`. A cancelled writer
    /// never proceeds, even if the readers have drained in the meantime.
    pub fn enter_write_cancellable(&self, writer: WriterId, token: &CancelToken) -> Result<WriteAccess<T>, GuardError>
    {
        let cancelled = || {
            warn!(%writer, "cancelled while waiting for exclusive access");
            GuardError::Cancelled { writer }
        };

        let mut readers = loop {
            if token.is_cancelled() {
                return Err(cancelled());
            }
            if let Some(readers) = self.active_readers.try_lock_for(CANCEL_POLL_INTERVAL) {
                break readers;
            }
        };

        loop {
            if token.is_cancelled() {
                return Err(cancelled());
            }
            if *readers == 0 {
                break;
            }

            info!(%writer, active_readers = *readers, "readers active, waiting");
            self.drained.wait_for(&mut readers, CANCEL_POLL_INTERVAL);
        }

        Ok(self.obtained_write(readers, writer))
    }

    /// Runs `work` with exclusive access. The internal lock is held for the
    /// whole of `work` and released afterwards, also when `work` panics.
    pub fn write<R, F>(&self, writer: WriterId, work: F) -> R
        where F: FnOnce(&mut T) -> R
    {
        let mut access = self.enter_write(writer);
        work(&mut access)
    }

    pub fn write_timeout<R, F>(&self, writer: WriterId, timeout: Duration, work: F) -> Result<R, GuardError>
        where F: FnOnce(&mut T) -> R
    {
        let mut access = self.enter_write_timeout(writer, timeout)?;
        Ok(work(&mut access))
    }

    pub fn write_cancellable<R, F>(&self, writer: WriterId, token: &CancelToken, work: F) -> Result<R, GuardError>
        where F: FnOnce(&mut T) -> R
    {
        let mut access = self.enter_write_cancellable(writer, token)?;
        Ok(work(&mut access))
    }
}

impl<T: Default> Default for ReadWriteGuard<T>
{
    fn default() -> ReadWriteGuard<T> {
        ReadWriteGuard::new(T::default())
    }
}

impl<T: ? Sized> fmt::Debug for ReadWriteGuard<T>
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.try_active_readers() {
            Some(readers) => f.debug_struct("ReadWriteGuard").field("active_readers", &readers).finish(),
            None => f.debug_struct("ReadWriteGuard").field("active_readers", &"<locked>").finish(),
        }
    }
}

impl<'a, T: ? Sized> ReadAccess<'a, T>
{
    pub fn reader(&self) -> ReaderId {
        self.reader
    }
}

impl<'a, T: ? Sized> WriteAccess<'a, T>
{
    pub fn writer(&self) -> WriterId {
        self.writer
    }
}

macro_rules! define_deref_for {
    ($cls:path) => (
        impl<'a, T: ? Sized> Deref for ($cls)
        {
            type Target = T;
            fn deref(&self) -> &T { &*self.data }
        }
    )
}

define_deref_for!(ReadAccess<'a, T>);
define_deref_for!(WriteAccess<'a, T>);

impl<'a, T: ? Sized> DerefMut for WriteAccess<'a, T>
{
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}

impl<'a, T: ? Sized> Drop for ReadAccess<'a, T>
{
    fn drop(&mut self)
    {
        self.guard.exit_read(self.reader);
    }
}

impl<'a, T: ? Sized> Drop for WriteAccess<'a, T>
{
    /// The internal lock goes with `readers` right after this runs.
    fn drop(&mut self)
    {
        debug_assert_eq!(*self.readers, 0);
        info!(writer = %self.writer, "finished writing, releasing");
    }
}
