//! Main quicksort loop and the two partition schemes.

use core::mem::{self, ManuallyDrop};
use core::ptr;

use crate::pivot::choose_pivot;
use crate::smallsort::{small_sort, small_sort_threshold};
use crate::GapGuard;

/// Sorts `v` recursively.
///
/// If the slice had a predecessor in the original array, it is specified as
/// `ancestor_pivot`.
///
/// `limit` is the number of allowed imbalanced partitions before switching to
/// `heapsort`. If zero, this function will immediately switch to heapsort.
pub(crate) fn quicksort<'a, T, F>(
    mut v: &'a mut [T],
    mut ancestor_pivot: Option<&'a T>,
    mut limit: u32,
    is_less: &mut F,
) where
    F: FnMut(&T, &T) -> bool,
{
    loop {
        if v.len() <= small_sort_threshold::<T>() {
            small_sort(v, is_less);
            return;
        }

        // If too many bad pivot choices were made, simply fall back to
        // heapsort in order to guarantee `O(n * log(n))` worst-case.
        if limit == 0 {
            crate::heapsort::heapsort(v, is_less);
            return;
        }

        limit -= 1;

        // Choose a pivot and try guessing whether the slice is already
        // sorted.
        let pivot_pos = choose_pivot(v, is_less);

        // If the chosen pivot is equal to the predecessor, then it's the
        // smallest element in the slice. Partition the slice into elements
        // equal to and elements greater than the pivot. This case is usually
        // hit when the slice contains many duplicate elements.
        if let Some(p) = ancestor_pivot {
            // SAFETY: We assume choose_pivot yields an in-bounds position.
            if !is_less(p, unsafe { v.get_unchecked(pivot_pos) }) {
                let num_lt = partition(v, pivot_pos, &mut |a, b| !is_less(b, a));

                // Continue sorting elements greater than the pivot. We know
                // that `num_lt` contains the pivot. So we can continue after
                // it.
                v = &mut v[(num_lt + 1)..];
                ancestor_pivot = None;
                continue;
            }
        }

        // Partition the slice.
        let num_lt = partition(v, pivot_pos, is_less);

        // Split the slice into `left`, `pivot`, and `right`.
        let (left, right) = v.split_at_mut(num_lt);
        let (pivot, right) = right.split_at_mut(1);
        let pivot = &pivot[0];

        // Recurse into the left side. We have a fixed recursion limit,
        // testing shows no real benefit for recursing into the shorter side.
        quicksort(left, ancestor_pivot, limit, is_less);

        // Continue with the right side.
        v = right;
        ancestor_pivot = Some(pivot);
    }
}

// Instead of swapping one pair at the time, it is more efficient to perform a
// cyclic permutation. This is not strictly equivalent to swapping, but
// produces a similar result using fewer memory operations.
//
// Example cyclic permutation to swap A,B,C,D with W,X,Y,Z
//
// A -> TMP
// Z -> A   | Z,B,C,D ___ W,X,Y,Z
//
// Loop iter 1
// B -> Z   | Z,B,C,D ___ W,X,Y,B
// Y -> B   | Z,Y,C,D ___ W,X,Y,B
//
// Loop iter 2
// C -> Y   | Z,Y,C,D ___ W,X,C,B
// X -> C   | Z,Y,X,D ___ W,X,C,B
//
// Loop iter 3
// D -> X   | Z,Y,X,D ___ W,D,C,B
// W -> D   | Z,Y,X,W ___ W,D,C,B
//
// TMP -> W | Z,Y,X,W ___ A,D,C,B

/// Takes the input slice `v` and re-arranges elements such that when the call
/// returns normally all elements that compare true for `is_less(elem, pivot)`
/// where `pivot == v[pivot_pos]` are on the left side of `v` followed by the
/// other elements, notionally considered greater or equal to `pivot`.
///
/// Returns the number of elements that are compared true for
/// `is_less(elem, pivot)`.
///
/// If `is_less` does not implement a total order the resulting order and
/// return value are unspecified. All original elements will remain in `v` and
/// any possible modifications via interior mutability will be observable.
/// Same is true if `is_less` panics.
fn partition<T, F>(v: &mut [T], pivot_pos: usize, is_less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    // Allows for panic-free code-gen by proving this property to the
    // compiler.
    if len == 0 {
        return 0;
    }

    // Place the pivot at the beginning of the slice. The swap doubles as the
    // bounds check for `pivot_pos`.
    v.swap(0, pivot_pos);
    let (pivot, v_without_pivot) = v.split_at_mut(1);

    // Assuming that Rust generates noalias LLVM IR we can be sure that a
    // partition function signature of the form `(v: &mut [T], pivot: &T)`
    // guarantees that pivot and v can't alias. Having this guarantee is
    // crucial for optimizations. It's possible to copy the pivot value into a
    // stack value, but this creates issues for types with interior mutability
    // mandating a drop guard.
    let pivot = &pivot[0];

    // Branchless partitioning has large leverage for types that are cheap to
    // move, e.g. `u64` and `String`. For large types every copy is a memcpy
    // call, there halving the data movement wins over avoiding branches.
    const MAX_BRANCHLESS_PARTITION_SIZE: usize = 96;
    let num_lt = if mem::size_of::<T>() <= MAX_BRANCHLESS_PARTITION_SIZE {
        partition_lomuto_branchless_cyclic(v_without_pivot, pivot, is_less)
    } else {
        partition_hoare_branchy_cyclic(v_without_pivot, pivot, is_less)
    };

    // Place the pivot between the two partitions.
    v.swap(0, num_lt);

    num_lt
}

struct PartitionState<T> {
    /// The current element that is being looked at, scans left to right
    /// through slice.
    right: *mut T,
    /// Counts the number of elements that compared less-than.
    num_lt: usize,
    /// Gap guard that tracks the temporary duplicate in the input.
    gap: GapGuardRaw<T>,
}

/// Variant of [`GapGuard`] that stores a pointer to the parked value instead
/// of the value itself. The value lives in a stack slot owned by the caller,
/// which keeps the mutable borrow of the partition state disjoint from the
/// reference to the gap value.
struct GapGuardRaw<T> {
    pos: *mut T,
    value: *mut T,
}

impl<T> Drop for GapGuardRaw<T> {
    fn drop(&mut self) {
        // SAFETY: `pos` names the one slot of the input that holds a stale
        // duplicate, see type invariant of [`GapGuard`].
        unsafe {
            ptr::copy_nonoverlapping(self.value, self.pos, 1);
        }
    }
}

/// See [`partition`].
fn partition_lomuto_branchless_cyclic<T, F>(v: &mut [T], pivot: &T, is_less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    // Novel partition implementation by Lukas Bergdoll and Orson Peters.
    // Branchless Lomuto partition paired with a cyclic permutation. A
    // straight Lomuto partition spends a data-dependent branch per element;
    // here every element performs the same two copies and only the less-than
    // counter advances conditionally.

    let len = v.len();
    if len == 0 {
        return 0;
    }

    // SAFETY: The left-to-right scan stops ahead of the unroll tail, the
    // cleanup loop re-feeds the gap value exactly once as final element, and
    // `num_lt` can never exceed the number of elements already scanned. All
    // pointers derived below thus stay in-bounds. `gap` ensures that should
    // `is_less` panic, the duplicate slot in the input is overwritten with
    // the parked value before unwinding continues.
    unsafe {
        let v_base = v.as_mut_ptr();

        let mut temp = ManuallyDrop::new(ptr::read(v_base));
        let mut state = PartitionState {
            right: v_base.add(1),
            num_lt: 0,
            gap: GapGuardRaw {
                pos: v_base,
                value: &mut *temp,
            },
        };

        let mut loop_body = |state: &mut PartitionState<T>| {
            // SAFETY: See surrounding function. `right` is in-bounds, or
            // points to the stack copy of the gap value in the final cleanup
            // round.
            unsafe {
                let right_is_lt = is_less(&*state.right, pivot);
                let left = v_base.add(state.num_lt);

                ptr::copy(left, state.gap.pos, 1);
                ptr::copy_nonoverlapping(state.right, left, 1);
                state.gap.pos = state.right;

                state.num_lt += right_is_lt as usize;
                state.right = state.right.add(1);
            }
        };

        // Manual unrolling that works well on x86 and Arm without murdering
        // compile-times. Leaving this to the compiler yields ok to bad
        // results.
        let unroll_len = if mem::size_of::<T>() <= 16 { 2 } else { 1 };

        if len > unroll_len {
            let unroll_end = v_base.add(len - unroll_len);
            while state.right < unroll_end {
                if unroll_len == 2 {
                    loop_body(&mut state);
                    loop_body(&mut state);
                } else {
                    loop_body(&mut state);
                }
            }
        }

        // Single instantiation of `loop_body` for both the unroll cleanup and
        // the cyclic permutation cleanup. Optimizes binary-size and
        // compile-time.
        let end = v_base.add(len);
        loop {
            let is_done = state.right == end;
            state.right = if is_done { state.gap.value } else { state.right };

            loop_body(&mut state);

            if is_done {
                // The gap value was consumed as the final scan element, the
                // guard must not write it a second time.
                mem::forget(state.gap);
                return state.num_lt;
            }
        }
    }
}

/// See [`partition`].
fn partition_hoare_branchy_cyclic<T, F>(v: &mut [T], pivot: &T, is_less: &mut F) -> usize
where
    F: FnMut(&T, &T) -> bool,
{
    // Optimized for large types that are expensive to move. Not optimized for
    // integers. Optimized for small code-gen, assuming that is_less is an
    // expensive operation that generates substantial amounts of code or a
    // call. And that copying elements will likely be a call to memcpy. Using
    // two `ptr::copy_nonoverlapping` per out-of-place pair has the chance to
    // be faster than `ptr::swap_nonoverlapping` because `memcpy` can use wide
    // SIMD based on runtime feature detection.

    let len = v.len();
    if len == 0 {
        return 0;
    }

    // SAFETY: The left-to-right scanning loop performs a bounds check, where
    // we know that `left >= v_base && left < right && right <=
    // v_base.add(len)`. The right-to-left scanning loop performs a bounds
    // check ensuring that `right` is in-bounds. We checked that `len` is more
    // than zero, which means that unconditional `right = right.sub(1)` is
    // safe to do. The exit check makes sure that `left` and `right` never
    // alias, making `ptr::copy_nonoverlapping` safe. The drop-guard `gap`
    // ensures that should `is_less` panic we always overwrite the duplicate
    // in the input. `gap.pos` stores the previous value of `right` and starts
    // at `right` and so it too is in-bounds. The parked `gap.value` is never
    // handed to `is_less` while inside the guard, so any changes via interior
    // mutability will be observed.
    unsafe {
        let v_base = v.as_mut_ptr();
        let mut left = v_base;
        let mut right = v_base.add(len);

        let mut gap_opt: Option<GapGuard<T>> = None;

        loop {
            // Find the first element greater than the pivot.
            while left < right && is_less(&*left, pivot) {
                left = left.add(1);
            }

            // Find the last element equal to the pivot.
            loop {
                right = right.sub(1);
                if left >= right || is_less(&*right, pivot) {
                    break;
                }
            }

            if left >= right {
                break;
            }

            // Swap the found pair of out-of-order elements via cyclic
            // permutation.
            let is_first_swap_pair = gap_opt.is_none();

            if is_first_swap_pair {
                gap_opt = Some(GapGuard {
                    pos: right,
                    value: ManuallyDrop::new(ptr::read(left)),
                });
            }

            let gap = gap_opt.as_mut().unwrap_unchecked();

            // Single place where we instantiate ptr::copy_nonoverlapping in
            // the partition.
            if !is_first_swap_pair {
                ptr::copy_nonoverlapping(left, gap.pos, 1);
            }
            gap.pos = right;
            ptr::copy_nonoverlapping(right, left, 1);

            left = left.add(1);
        }

        left.offset_from(v_base) as usize

        // `gap_opt` goes out of scope, writing the parked value into the last
        // remaining hole.
    }
}
