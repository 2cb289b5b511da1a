//! Property tests for bump allocation invariants.
//!
//! Regions never overlap, stay inside the buffer, honour their alignment,
//! a reset always gives the full capacity back, and no sequence of restores
//! hands out the bytes of a value that is still waiting for its destructor.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::mem::{MaybeUninit, size_of};
use std::rc::Rc;

use epoch_arena::prelude::*;
use proptest::prelude::*;

const CAPACITY: usize = 4096;

fn request() -> impl Strategy<Value = (usize, usize)> {
    (1usize..200, 0u32..8).prop_map(|(size, shift)| (size, 1usize << shift))
}

// ---------------------------------------------------------------------------
// Interleaved checkpoint / restore / construct workload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Step {
    Checkpoint,
    Restore(usize),
    Construct,
    Allocate(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => Just(Step::Checkpoint),
        3 => any::<usize>().prop_map(Step::Restore),
        3 => Just(Step::Construct),
        2 => (1usize..96).prop_map(Step::Allocate),
    ]
}

/// Live values by id, mapped to the address one past their last byte
type Live = Rc<RefCell<BTreeMap<usize, usize>>>;

struct Tenant {
    id: usize,
    live: Live,
}

impl Drop for Tenant {
    fn drop(&mut self) {
        self.live.borrow_mut().remove(&self.id);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn regions_are_disjoint_aligned_and_in_bounds(
        requests in proptest::collection::vec(request(), 1..80),
    ) {
        let mut buffer = vec![MaybeUninit::<u8>::uninit(); CAPACITY];
        let base = buffer.as_ptr() as usize;
        let arena = PoolAllocator::with_buffer(&mut buffer).unwrap();

        let mut granted = Vec::new();
        let mut last_used = 0;
        for (size, align) in requests {
            match arena.allocate(size, align) {
                Ok(region) => {
                    prop_assert_eq!(region.addr() % align, 0);
                    prop_assert!(region.addr() >= base);
                    prop_assert!(region.addr() + size <= base + CAPACITY);
                    granted.push((region.addr(), size));
                }
                Err(err) => {
                    prop_assert!(err.is_exhaustion());
                    prop_assert_eq!(arena.used(), last_used);
                }
            }
            prop_assert!(arena.used() >= last_used);
            last_used = arena.used();
        }

        granted.sort_unstable();
        for pair in granted.windows(2) {
            let (start, len) = pair[0];
            prop_assert!(start + len <= pair[1].0);
        }
    }

    #[test]
    fn exact_fit_then_one_more_byte_fails(
        sizes in proptest::collection::vec(1usize..64, 1..40),
    ) {
        let capacity: usize = sizes.iter().sum();
        let arena = PoolAllocator::production(capacity).unwrap();

        for &size in &sizes {
            prop_assert!(arena.allocate(size, 1).is_ok());
        }
        prop_assert_eq!(arena.available(), 0);

        let is_oom = matches!(arena.allocate(1, 1), Err(ArenaError::OutOfMemory { .. }));
        prop_assert!(is_oom);
    }

    #[test]
    fn reset_returns_full_capacity(
        requests in proptest::collection::vec(request(), 0..40),
        resets in 1usize..4,
    ) {
        let mut arena = PoolAllocator::production(CAPACITY).unwrap();
        for (size, align) in requests {
            let _ = arena.allocate(size, align);
        }

        for _ in 0..resets {
            arena.reset();
        }
        prop_assert_eq!(arena.used(), 0);
        prop_assert_eq!(arena.generation() as usize, resets);
        prop_assert!(arena.allocate(CAPACITY, 1).is_ok());
    }

    #[test]
    fn restore_returns_to_checkpoint_offset(
        before in proptest::collection::vec(request(), 0..20),
        after in proptest::collection::vec(request(), 0..20),
    ) {
        let mut arena = PoolAllocator::production(CAPACITY).unwrap();
        for (size, align) in before {
            let _ = arena.allocate(size, align);
        }

        let checkpoint = arena.checkpoint();
        for (size, align) in after {
            let _ = arena.allocate(size, align);
        }

        arena.restore(checkpoint).unwrap();
        prop_assert_eq!(arena.used(), checkpoint.offset());
    }

    #[test]
    fn interleaved_restores_never_release_live_values(
        steps in proptest::collection::vec(step(), 1..120),
    ) {
        let live = Live::default();
        let mut buffer = vec![MaybeUninit::<u8>::uninit(); CAPACITY];
        let base = buffer.as_ptr() as usize;

        {
            let mut arena = PoolAllocator::with_buffer(&mut buffer).unwrap();
            let mut checkpoints = Vec::new();

            for (id, step) in steps.into_iter().enumerate() {
                match step {
                    Step::Checkpoint => checkpoints.push(arena.checkpoint()),
                    Step::Restore(pick) => {
                        if !checkpoints.is_empty() {
                            let checkpoint = checkpoints[pick % checkpoints.len()];
                            let before = arena.used();
                            if arena.restore(checkpoint).is_ok() {
                                prop_assert_eq!(arena.used(), checkpoint.offset());
                            } else {
                                prop_assert_eq!(arena.used(), before);
                            }
                        }
                    }
                    Step::Construct => {
                        let tenant = Tenant { id, live: Rc::clone(&live) };
                        if let Ok(slot) = arena.construct(tenant) {
                            let end = std::ptr::from_mut(slot) as usize + size_of::<Tenant>();
                            live.borrow_mut().insert(id, end);
                        }
                    }
                    Step::Allocate(size) => {
                        if let Ok(region) = arena.allocate(size, 8) {
                            region.fill(0xEE);
                        }
                    }
                }

                let ends: Vec<usize> = live.borrow().values().copied().collect();
                prop_assert_eq!(arena.pending_drops(), ends.len());
                for end in ends {
                    prop_assert!(end <= base + arena.used());
                }
            }
        }

        prop_assert!(live.borrow().is_empty());
    }
}
