//! MemoryManager: two allocation disciplines behind one placement API.
//!
//! Grounded on `SeqString` (`crates/runtime/src/seqstring.rs` in Seq
//! crate), which already carries exactly this duality —
//! "arena-allocated, freed in bulk" versus "globally allocated, refcounted or
//! owned" — for a single payload type (strings). `Handle<T>` generalizes that
//! duality to any payload.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bumpalo::Bump;

/// A handle to a value placed through a [`MemoryManager`].
///
/// `Rc` handles share ownership through atomic reference counting and
/// destroy the object the instant the last handle drops. `Pooled` handles are
/// raw pointers into a bump [`Arena`] that is only ever freed as a whole, at
/// [`Arena::reset`] — bumpalo guarantees allocated objects keep a stable
/// address until then, so the pointer stays valid for the arena's lifetime.
///
/// Mixing handles obtained from two different `MemoryManager`s within one
/// evaluation is undefined: nothing here checks that a
/// `Pooled` handle's arena is still the active one.
pub enum Handle<T: ?Sized> {
    Rc(Arc<T>),
    Pooled(*const T),
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        match self {
            Handle::Rc(rc) => Handle::Rc(Arc::clone(rc)),
            Handle::Pooled(ptr) => Handle::Pooled(*ptr),
        }
    }
}

impl<T: ?Sized> std::ops::Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Handle::Rc(rc) => rc,
            // Safety: valid until the originating Arena resets; see struct docs.
            Handle::Pooled(ptr) => unsafe { &**ptr },
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

// Safety: `Rc` payloads are Arc-shared (Send+Sync when `T` is); `Pooled`
// payloads are never mutated after placement and the arena they live in is
// used by a single evaluation at a time, so sending the pointer across threads is sound as
// long as `T` itself is Send+Sync. This mirrors `SeqString`'s identical
// reasoning for its arena-vs-global pointer duality.
unsafe impl<T: ?Sized + Send + Sync> Send for Handle<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Handle<T> {}

/// Allocation statistics exposed for embedders, letting a host observe a
/// sandboxed evaluation's footprint.
#[derive(Debug, Default)]
pub struct MemoryStats {
    allocations: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl MemoryStats {
    fn record(&self, bytes: usize) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn reset(&self) {
        self.allocations.store(0, Ordering::Relaxed);
        self.live_bytes.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (usize, usize) {
        (
            self.allocations.load(Ordering::Relaxed),
            self.live_bytes.load(Ordering::Relaxed),
        )
    }
}

/// A single bump-allocated region backing the "pooling" discipline.
///
/// Values are freed only as a whole, at [`Arena::reset`], except for types
/// that call [`Arena::register_destructor`] — trivially-destructible types
/// should not.
pub struct Arena {
    bump: Bump,
    destructors: RefCell<Vec<Box<dyn FnOnce()>>>,
    stats: MemoryStats,
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (allocations, live_bytes) = self.stats.snapshot();
        f.debug_struct("Arena")
            .field("allocations", &allocations)
            .field("live_bytes", &live_bytes)
            .finish()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    pub fn new() -> Self {
        Arena {
            bump: Bump::new(),
            destructors: RefCell::new(Vec::new()),
            stats: MemoryStats::default(),
        }
    }

    fn alloc<T>(&self, value: T) -> *const T {
        let placed: &T = self.bump.alloc(value);
        self.stats.record(std::mem::size_of::<T>());
        placed as *const T
    }

    fn alloc_str(&self, s: &str) -> *const str {
        let placed: &str = self.bump.alloc_str(s);
        self.stats.record(s.len());
        placed as *const str
    }

    fn alloc_bytes(&self, bytes: &[u8]) -> *const [u8] {
        let placed: &[u8] = self.bump.alloc_slice_copy(bytes);
        self.stats.record(bytes.len());
        placed as *const [u8]
    }

    /// Record a destructor to run at the next [`Arena::reset`].
    pub fn register_destructor(&self, f: impl FnOnce() + 'static) {
        self.destructors.borrow_mut().push(Box::new(f));
    }

    pub fn stats(&self) -> (usize, usize) {
        self.stats.snapshot()
    }

    /// Free the whole region: run registered destructors in insertion order,
    /// then reset the bump pointer. All previously returned `Handle::Pooled`
    /// pointers become dangling.
    pub fn reset(&mut self) {
        let pending = self.destructors.get_mut().drain(..).collect::<Vec<_>>();
        for destructor in pending {
            destructor();
        }
        self.bump.reset();
        let (allocations, _) = self.stats.snapshot();
        tracing::debug!(allocations, "arena reset");
        self.stats.reset();
    }
}

/// Two allocation disciplines with a uniform placement API.
#[derive(Debug)]
pub enum MemoryManager {
    /// Strong-count refcounting; the last handle dropping destroys the object
    /// eagerly. No cycles are created by the core (all references are
    /// strictly downward, toward leaves).
    ReferenceCounting,
    /// Bump-allocate into a region, freed as a whole at [`Arena::reset`].
    Pooling(Arena),
}

impl MemoryManager {
    pub fn reference_counting() -> Self {
        MemoryManager::ReferenceCounting
    }

    pub fn pooling(arena: Arena) -> Self {
        MemoryManager::Pooling(arena)
    }

    pub fn allocate<T>(&self, value: T) -> Handle<T> {
        match self {
            MemoryManager::ReferenceCounting => Handle::Rc(Arc::new(value)),
            MemoryManager::Pooling(arena) => Handle::Pooled(arena.alloc(value)),
        }
    }

    pub fn allocate_str(&self, s: &str) -> Handle<str> {
        match self {
            MemoryManager::ReferenceCounting => Handle::Rc(Arc::from(s)),
            MemoryManager::Pooling(arena) => Handle::Pooled(arena.alloc_str(s)),
        }
    }

    pub fn allocate_bytes(&self, bytes: &[u8]) -> Handle<[u8]> {
        match self {
            MemoryManager::ReferenceCounting => Handle::Rc(Arc::from(bytes)),
            MemoryManager::Pooling(arena) => Handle::Pooled(arena.alloc_bytes(bytes)),
        }
    }

    /// No-op under the reference-counted discipline: destructors there run
    /// automatically when the last `Arc` drops.
    pub fn register_destructor(&self, f: impl FnOnce() + 'static) {
        if let MemoryManager::Pooling(arena) = self {
            arena.register_destructor(f);
        }
    }

    pub fn stats(&self) -> Option<(usize, usize)> {
        match self {
            MemoryManager::ReferenceCounting => None,
            MemoryManager::Pooling(arena) => Some(arena.stats()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering as AOrdering};

    #[test]
    fn rc_handle_shares_storage() {
        let manager = MemoryManager::reference_counting();
        let a = manager.allocate(42i64);
        let b = a.clone();
        assert_eq!(*a, 42);
        assert_eq!(*b, 42);
    }

    #[test]
    fn pooled_handle_reads_back() {
        let manager = MemoryManager::pooling(Arena::new());
        let h = manager.allocate_str("hello arena");
        assert_eq!(&*h, "hello arena");
    }

    #[test]
    fn pooled_bytes_roundtrip() {
        let manager = MemoryManager::pooling(Arena::new());
        let h = manager.allocate_bytes(&[1, 2, 3]);
        assert_eq!(&*h, &[1u8, 2, 3]);
    }

    #[test]
    fn reference_counting_ignores_destructor_registration() {
        let manager = MemoryManager::reference_counting();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        manager.register_destructor(move || ran2.store(true, AOrdering::SeqCst));
        assert!(!ran.load(AOrdering::SeqCst));
    }

    #[test]
    fn pooling_runs_destructors_on_reset() {
        let mut arena = Arena::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran2 = ran.clone();
        arena.register_destructor(move || ran2.store(true, AOrdering::SeqCst));
        assert!(!ran.load(AOrdering::SeqCst));
        arena.reset();
        assert!(ran.load(AOrdering::SeqCst));
    }

    #[test]
    fn arena_stats_track_allocations() {
        let manager = MemoryManager::pooling(Arena::new());
        let _ = manager.allocate(1i64);
        let _ = manager.allocate(2i64);
        let (allocations, _) = manager.stats().unwrap();
        assert_eq!(allocations, 2);
    }

    #[test]
    fn reference_counting_reports_no_stats() {
        let manager = MemoryManager::reference_counting();
        assert!(manager.stats().is_none());
    }
}
