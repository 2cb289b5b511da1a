//! Deferred destructors for values constructed inside an arena
//!
//! Every value with drop glue that is constructed in an arena leaves a
//! [`DropThunk`] behind: its address plus a monomorphised `drop_in_place`
//! erased to `unsafe fn(*mut u8)`. Thunks are popped newest-first, so a value
//! is always dropped before anything constructed ahead of it.

use core::cell::RefCell;
use core::ptr::NonNull;

use parking_lot::Mutex;

/// Type-erased pending destructor call
pub struct DropThunk {
    ptr: NonNull<u8>,
    drop_fn: unsafe fn(*mut u8),
}

impl DropThunk {
    /// Records the destructor of the `T` living at `ptr`
    pub(crate) fn new<T>(ptr: NonNull<T>) -> Self {
        Self {
            ptr: ptr.cast(),
            drop_fn: drop_erased::<T>,
        }
    }

    /// Runs the destructor
    ///
    /// # Safety
    ///
    /// The value must still be initialised and no reference to it may be live.
    pub(crate) unsafe fn run(self) {
        // SAFETY: `drop_fn` was instantiated for the type stored at `ptr` (see `new`).
        unsafe { (self.drop_fn)(self.ptr.as_ptr()) }
    }
}

unsafe fn drop_erased<T>(ptr: *mut u8) {
    // SAFETY: the thunk pairs this instantiation with a pointer to a live `T`.
    unsafe { core::ptr::drop_in_place(ptr.cast::<T>()) }
}

/// Storage for pending thunks
pub trait DropRegistry: Default {
    fn push(&self, thunk: DropThunk);
    fn pop(&self) -> Option<DropThunk>;
    fn len(&self) -> usize;
}

/// Thunk list for single-threaded arenas
#[derive(Default)]
pub struct LocalDropList(RefCell<Vec<DropThunk>>);

impl DropRegistry for LocalDropList {
    fn push(&self, thunk: DropThunk) {
        self.0.borrow_mut().push(thunk);
    }

    fn pop(&self) -> Option<DropThunk> {
        self.0.borrow_mut().pop()
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

/// Thunk list for arenas shared between threads
#[derive(Default)]
pub struct SharedDropList(Mutex<Vec<DropThunk>>);

// SAFETY: the multi-threaded arena only records thunks for `T: Send`, so
// running a thunk on whichever thread resets or drops the arena is sound.
// The raw pointers are only dereferenced through `DropThunk::run`.
unsafe impl Send for SharedDropList {}
// SAFETY: all access to the list goes through the mutex.
unsafe impl Sync for SharedDropList {}

impl DropRegistry for SharedDropList {
    fn push(&self, thunk: DropThunk) {
        self.0.lock().push(thunk);
    }

    fn pop(&self) -> Option<DropThunk> {
        self.0.lock().pop()
    }

    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Runs pending thunks newest-first until only `keep` remain.
///
/// Each thunk is popped before it runs, so a panicking destructor leaves the
/// older thunks queued for the next reset or drop rather than running twice.
///
/// # Safety
///
/// Every value whose thunk is above `keep` must be unborrowed and still
/// initialised.
pub(crate) unsafe fn run_until<D: DropRegistry>(drops: &D, keep: usize) -> usize {
    let mut ran = 0;
    while drops.len() > keep {
        let Some(thunk) = drops.pop() else {
            break;
        };
        // SAFETY: forwarded from the caller.
        unsafe { thunk.run() };
        ran += 1;
    }
    ran
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::mem::ManuallyDrop;
    use std::rc::Rc;

    struct Noisy {
        id: u32,
        log: Rc<StdRefCell<Vec<u32>>>,
    }

    impl Drop for Noisy {
        fn drop(&mut self) {
            self.log.borrow_mut().push(self.id);
        }
    }

    #[test]
    fn test_thunks_run_newest_first() {
        let log = Rc::new(StdRefCell::new(Vec::new()));
        let mut values: Vec<ManuallyDrop<Noisy>> = (1..=3)
            .map(|id| {
                ManuallyDrop::new(Noisy {
                    id,
                    log: Rc::clone(&log),
                })
            })
            .collect();

        let list = LocalDropList::default();
        for value in &mut values {
            list.push(DropThunk::new(NonNull::from(&mut **value)));
        }
        assert_eq!(list.len(), 3);

        // SAFETY: values are wrapped in ManuallyDrop and never touched again.
        let ran = unsafe { run_until(&list, 1) };
        assert_eq!(ran, 2);
        assert_eq!(*log.borrow(), vec![3, 2]);

        // SAFETY: as above.
        unsafe { run_until(&list, 0) };
        assert_eq!(*log.borrow(), vec![3, 2, 1]);
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_shared_list_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedDropList>();

        let list = SharedDropList::default();
        let mut value = ManuallyDrop::new(String::from("shared"));
        list.push(DropThunk::new(NonNull::from(&mut *value)));
        assert_eq!(list.len(), 1);
        // SAFETY: value is in ManuallyDrop and not used after this point.
        unsafe { run_until(&list, 0) };
        assert_eq!(list.len(), 0);
    }
}
