//! Lock-scoped access to a database.
//!
//! The single-writer/multi-reader rule is enforced by an external
//! [`ReadWriteLock`], not by [`Database`]. A [`ScopedDb`] is where a caller
//! states which side of that lock it holds: the guard lives inside the
//! scope, so the lock is released when the scope is dropped, whether by
//! normal exit, early return or unwinding.

use crate::database::Database;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;

/// The lock callers share to serialise writers against readers.
pub type ReadWriteLock = parking_lot::RwLock<()>;

/// Which side of the [`ReadWriteLock`] a scope holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared; any number at once.
    Read,
    /// Exclusive; required for [`crate::Batch`].
    Write,
}

enum ScopeGuard<'a> {
    Read(#[allow(dead_code)] RwLockReadGuard<'a, ()>),
    Write(#[allow(dead_code)] RwLockWriteGuard<'a, ()>),
}

/// A database borrowed under a held lock.
///
/// Dereferences to [`Database`], so point operations and cursors are used
/// directly on the scope.
///
/// ```rust
/// use xrefdb_core::{Database, Flags, LockMode, ReadWriteLock, ScopedDb};
///
/// let db = Database::open_in_memory(Flags::NONE);
/// let lock = ReadWriteLock::new(());
///
/// {
///     let scope = ScopedDb::write(&db, &lock);
///     scope.put(b"k", b"v").unwrap();
/// }
///
/// let a = ScopedDb::read(&db, &lock);
/// let b = ScopedDb::new(&db, &lock, LockMode::Read);
/// assert_eq!(a.get(b"k").unwrap(), b.get(b"k").unwrap());
/// ```
pub struct ScopedDb<'a> {
    db: &'a Database,
    mode: LockMode,
    _guard: ScopeGuard<'a>,
}

impl<'a> ScopedDb<'a> {
    /// Takes `lock` in `mode`, blocking until it is available.
    pub fn new(db: &'a Database, lock: &'a ReadWriteLock, mode: LockMode) -> Self {
        let guard = match mode {
            LockMode::Read => ScopeGuard::Read(lock.read()),
            LockMode::Write => ScopeGuard::Write(lock.write()),
        };
        Self {
            db,
            mode,
            _guard: guard,
        }
    }

    /// Takes `lock` shared.
    pub fn read(db: &'a Database, lock: &'a ReadWriteLock) -> Self {
        Self::new(db, lock, LockMode::Read)
    }

    /// Takes `lock` exclusively.
    pub fn write(db: &'a Database, lock: &'a ReadWriteLock) -> Self {
        Self::new(db, lock, LockMode::Write)
    }

    /// The scoped database.
    #[must_use]
    pub fn database(&self) -> &'a Database {
        self.db
    }

    /// The mode this scope holds the lock in.
    #[must_use]
    pub fn lock_mode(&self) -> LockMode {
        self.mode
    }
}

impl Deref for ScopedDb<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
    }
}

impl std::fmt::Debug for ScopedDb<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedDb")
            .field("db", self.db)
            .field("mode", &self.mode)
            .finish()
    }
}

/// A database bundled with the lock that guards it.
///
/// Wrap in an `Arc` to share between threads.
///
/// ```rust
/// use std::sync::Arc;
/// use xrefdb_core::{Database, Flags, SharedDatabase};
///
/// let shared = Arc::new(SharedDatabase::new(Database::open_in_memory(Flags::NONE)));
/// shared.write().put(b"k", b"v").unwrap();
///
/// let reader = Arc::clone(&shared);
/// let found = std::thread::spawn(move || reader.read().contains(b"k").unwrap())
///     .join()
///     .unwrap();
/// assert!(found);
/// ```
#[derive(Debug)]
pub struct SharedDatabase {
    db: Database,
    lock: ReadWriteLock,
}

impl SharedDatabase {
    /// Pairs `db` with a fresh lock.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db,
            lock: ReadWriteLock::new(()),
        }
    }

    /// Takes a shared scope.
    pub fn read(&self) -> ScopedDb<'_> {
        ScopedDb::read(&self.db, &self.lock)
    }

    /// Takes the exclusive scope.
    pub fn write(&self) -> ScopedDb<'_> {
        ScopedDb::write(&self.db, &self.lock)
    }

    /// Mutable access for operations that need no other users, such as
    /// compaction or close.
    pub fn get_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Unwraps the database.
    #[must_use]
    pub fn into_inner(self) -> Database {
        self.db
    }
}
