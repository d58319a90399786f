//! Sorting strategies for small slices, used both for small inputs and for
//! small sub-slices produced by the main quicksort loop.

use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr;

use crate::{GapGuard, MAX_STACK_ARRAY_SIZE};

/// Optimal number of comparisons for the plain insertion strategy, and good
/// perf.
pub(crate) const SMALL_SORT_FALLBACK_THRESHOLD: usize = 16;

/// SAFETY: If you change this value, you have to adjust
/// [`small_sort_general`] !
pub(crate) const SMALL_SORT_GENERAL_THRESHOLD: usize = 32;

/// [`small_sort_general`] writes both halves of the input into the scratch
/// buffer and uses the space past the threshold as temporary storage for the
/// eight element sorts. This affects the required scratch buffer size.
///
/// SAFETY: If you change this value, you have to adjust
/// [`small_sort_general`] !
pub(crate) const SMALL_SORT_GENERAL_SCRATCH_LEN: usize = SMALL_SORT_GENERAL_THRESHOLD + 16;

/// SAFETY: If you change this value, you have to adjust
/// [`small_sort_network`] !
pub(crate) const SMALL_SORT_NETWORK_THRESHOLD: usize = 32;
pub(crate) const SMALL_SORT_NETWORK_SCRATCH_LEN: usize = SMALL_SORT_NETWORK_THRESHOLD;

pub(crate) enum SmallSortStrategy {
    Fallback,
    General,
    Network,
}

/// Selects the small-sort strategy once per element type. The scratch based
/// strategies create bitwise duplicates of elements while user code runs, so
/// they are limited to types without drop glue. That way a panicking
/// comparator can never cause the same value to be dropped twice.
pub(crate) const fn small_sort_strategy<T>() -> SmallSortStrategy {
    if !mem::needs_drop::<T>()
        && mem::size_of::<T>() <= mem::size_of::<u64>()
        && mem::size_of::<T>() * SMALL_SORT_NETWORK_SCRATCH_LEN <= MAX_STACK_ARRAY_SIZE
    {
        SmallSortStrategy::Network
    } else if !mem::needs_drop::<T>()
        && mem::size_of::<T>() * SMALL_SORT_GENERAL_SCRATCH_LEN <= MAX_STACK_ARRAY_SIZE
    {
        SmallSortStrategy::General
    } else {
        SmallSortStrategy::Fallback
    }
}

/// Slices at or below this length are handed to [`small_sort`] by the main
/// quicksort loop instead of being partitioned further.
pub(crate) const fn small_sort_threshold<T>() -> usize {
    match small_sort_strategy::<T>() {
        SmallSortStrategy::Fallback => SMALL_SORT_FALLBACK_THRESHOLD,
        SmallSortStrategy::General => SMALL_SORT_GENERAL_THRESHOLD,
        SmallSortStrategy::Network => SMALL_SORT_NETWORK_THRESHOLD,
    }
}

/// Sorts `v` using strategies optimized for small sizes.
pub(crate) fn small_sort<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    match small_sort_strategy::<T>() {
        SmallSortStrategy::Fallback => {
            if v.len() >= 2 {
                insertion_sort_shift_left(v, 1, is_less);
            }
        }
        SmallSortStrategy::General => small_sort_general(v, is_less),
        SmallSortStrategy::Network => small_sort_network(v, is_less),
    }
}

// --- Insertion sort ---

/// Inserts `v[v.len() - 1]` into pre-sorted sequence `v[..v.len() - 1]` so
/// that whole `v[..]` becomes sorted.
fn insert_tail<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    assert!(v.len() >= 2);

    let v_base = v.as_mut_ptr();
    let i = v.len() - 1;

    // SAFETY: We checked that `v.len()` is at least 2, all offsets up to `i`
    // are in-bounds.
    unsafe {
        let v_i = v_base.add(i);

        // It's important that we use v_i here. If this check is positive and
        // we continue, we want to make sure that no other copy of the value
        // was seen by is_less. Otherwise we would have to copy it back.
        if is_less(&*v_i, &*v_i.sub(1)) {
            // It's important that from now on the comparisons use `gap.value`,
            // as that is the copy that will be written back. The intermediate
            // state of the insertion is tracked by `gap`, which serves two
            // purposes:
            // 1. Protects integrity of `v` from panics in `is_less`.
            // 2. Fills the remaining gap in `v` in the end.
            let mut gap = GapGuard {
                pos: v_i.sub(1),
                value: ManuallyDrop::new(ptr::read(v_i)),
            };
            ptr::copy_nonoverlapping(gap.pos, v_i, 1);

            // SAFETY: We know i is at least 1.
            for j in (0..(i - 1)).rev() {
                let v_j = v_base.add(j);
                if !is_less(&*gap.value, &*v_j) {
                    break;
                }

                ptr::copy_nonoverlapping(v_j, gap.pos, 1);
                gap.pos = v_j;
            }
            // `gap` gets dropped and thus copies the parked value into the
            // remaining hole in `v`.
        }
    }
}

/// Sort `v` assuming `v[..offset]` is already sorted.
pub(crate) fn insertion_sort_shift_left<T, F>(v: &mut [T], offset: usize, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    // This would be a logic bug in other code.
    debug_assert!(offset != 0 && offset <= len);

    // Shift each element of the unsorted region v[i..] as far left as is
    // needed to make v sorted.
    for i in offset..len {
        insert_tail(&mut v[..=i], is_less);
    }
}

// --- Sorting networks ---

/// Swaps the values at `left` and `right` if the one at `right` is less.
///
/// SAFETY: The caller must guarantee that `left` and `right` are valid for
/// reads and writes, properly aligned, and do not alias.
unsafe fn branchless_swap<T>(left: *mut T, right: *mut T, should_swap: bool) {
    // This is a branchless version of swap if. The equivalent code with a
    // branch would be:
    //
    // if should_swap {
    //     ptr::swap(left, right);
    // }
    //
    // The goal is to generate cmov instructions here.
    let left_swap = if should_swap { right } else { left };
    let right_swap = if should_swap { left } else { right };

    let right_swap_tmp = ManuallyDrop::new(ptr::read(right_swap));

    ptr::copy(left_swap, left, 1);
    ptr::copy_nonoverlapping(&*right_swap_tmp, right, 1);
}

/// Swap two values in the slice pointed to by `v_base` at the positions
/// `a_pos` and `b_pos` if the value at position `b_pos` is less than the one
/// at position `a_pos`.
///
/// SAFETY: The caller must guarantee that `a_pos` and `b_pos` each added to
/// `v_base` yield valid pointers into the same allocation, and are distinct.
unsafe fn swap_if_less<T, F>(v_base: *mut T, a_pos: usize, b_pos: usize, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let v_a = v_base.add(a_pos);
    let v_b = v_base.add(b_pos);

    // Important to only swap if it is more and not if it is equal. is_less
    // should return false for equal, so we don't swap.
    let should_swap = is_less(&*v_b, &*v_a);
    branchless_swap(v_a, v_b, should_swap);
}

// Never inline this function to avoid code bloat. It still optimizes nicely
// and has practically no performance impact.
#[inline(never)]
fn sort9_optimal<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    assert!(v.len() == 9);

    let v_base = v.as_mut_ptr();

    // Optimal sorting network, see
    // https://bertdobbelaere.github.io/sorting_networks.html.

    // SAFETY: We checked the len.
    unsafe {
        swap_if_less(v_base, 0, 3, is_less);
        swap_if_less(v_base, 1, 7, is_less);
        swap_if_less(v_base, 2, 5, is_less);
        swap_if_less(v_base, 4, 8, is_less);
        swap_if_less(v_base, 0, 7, is_less);
        swap_if_less(v_base, 2, 4, is_less);
        swap_if_less(v_base, 3, 8, is_less);
        swap_if_less(v_base, 5, 6, is_less);
        swap_if_less(v_base, 0, 2, is_less);
        swap_if_less(v_base, 1, 3, is_less);
        swap_if_less(v_base, 4, 5, is_less);
        swap_if_less(v_base, 7, 8, is_less);
        swap_if_less(v_base, 1, 4, is_less);
        swap_if_less(v_base, 3, 6, is_less);
        swap_if_less(v_base, 5, 7, is_less);
        swap_if_less(v_base, 0, 1, is_less);
        swap_if_less(v_base, 2, 4, is_less);
        swap_if_less(v_base, 3, 5, is_less);
        swap_if_less(v_base, 6, 8, is_less);
        swap_if_less(v_base, 2, 3, is_less);
        swap_if_less(v_base, 4, 5, is_less);
        swap_if_less(v_base, 6, 7, is_less);
        swap_if_less(v_base, 1, 2, is_less);
        swap_if_less(v_base, 3, 4, is_less);
        swap_if_less(v_base, 5, 6, is_less);
    }
}

// Never inline this function to avoid code bloat. It still optimizes nicely
// and has practically no performance impact.
#[inline(never)]
fn sort13_optimal<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    assert!(v.len() == 13);

    let v_base = v.as_mut_ptr();

    // Optimal sorting network, see
    // https://bertdobbelaere.github.io/sorting_networks.html.

    // SAFETY: We checked the len.
    unsafe {
        swap_if_less(v_base, 0, 12, is_less);
        swap_if_less(v_base, 1, 10, is_less);
        swap_if_less(v_base, 2, 9, is_less);
        swap_if_less(v_base, 3, 7, is_less);
        swap_if_less(v_base, 5, 11, is_less);
        swap_if_less(v_base, 6, 8, is_less);
        swap_if_less(v_base, 1, 6, is_less);
        swap_if_less(v_base, 2, 3, is_less);
        swap_if_less(v_base, 4, 11, is_less);
        swap_if_less(v_base, 7, 9, is_less);
        swap_if_less(v_base, 8, 10, is_less);
        swap_if_less(v_base, 0, 4, is_less);
        swap_if_less(v_base, 1, 2, is_less);
        swap_if_less(v_base, 3, 6, is_less);
        swap_if_less(v_base, 7, 8, is_less);
        swap_if_less(v_base, 9, 10, is_less);
        swap_if_less(v_base, 11, 12, is_less);
        swap_if_less(v_base, 4, 6, is_less);
        swap_if_less(v_base, 5, 9, is_less);
        swap_if_less(v_base, 8, 11, is_less);
        swap_if_less(v_base, 10, 12, is_less);
        swap_if_less(v_base, 0, 5, is_less);
        swap_if_less(v_base, 3, 8, is_less);
        swap_if_less(v_base, 4, 7, is_less);
        swap_if_less(v_base, 6, 11, is_less);
        swap_if_less(v_base, 9, 10, is_less);
        swap_if_less(v_base, 0, 1, is_less);
        swap_if_less(v_base, 2, 5, is_less);
        swap_if_less(v_base, 6, 9, is_less);
        swap_if_less(v_base, 7, 8, is_less);
        swap_if_less(v_base, 10, 11, is_less);
        swap_if_less(v_base, 1, 3, is_less);
        swap_if_less(v_base, 2, 4, is_less);
        swap_if_less(v_base, 5, 6, is_less);
        swap_if_less(v_base, 9, 10, is_less);
        swap_if_less(v_base, 1, 2, is_less);
        swap_if_less(v_base, 3, 4, is_less);
        swap_if_less(v_base, 5, 7, is_less);
        swap_if_less(v_base, 6, 8, is_less);
        swap_if_less(v_base, 2, 3, is_less);
        swap_if_less(v_base, 4, 5, is_less);
        swap_if_less(v_base, 6, 7, is_less);
        swap_if_less(v_base, 8, 9, is_less);
        swap_if_less(v_base, 3, 4, is_less);
        swap_if_less(v_base, 5, 6, is_less);
    }
}

// --- Stable four and eight element sorts ---

/// SAFETY: The caller must guarantee that `v_base` is valid for 4 reads and
/// `dst` is valid for 4 writes, and that they do not alias. The result is
/// stored in `dst[0..4]`.
unsafe fn sort4_stable<T, F>(v_base: *const T, dst: *mut T, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    // By limiting select to picking pointers, we are guaranteed good cmov
    // code-gen regardless of type T's layout. Further this only does 5
    // instead of 6 comparisons compared to a stable transposition 4 element
    // sorting-network, and always copies each element exactly once.

    unsafe {
        // Stably create two pairs a <= b and c <= d.
        let c1 = is_less(&*v_base.add(1), &*v_base);
        let c2 = is_less(&*v_base.add(3), &*v_base.add(2));
        let a = v_base.add(c1 as usize);
        let b = v_base.add(!c1 as usize);
        let c = v_base.add(2 + c2 as usize);
        let d = v_base.add(2 + (!c2 as usize));

        // Compare (a, c) and (b, d) to identify max/min. We're left with two
        // unknown elements, but because we are a stable sort we must know
        // which one is leftmost and which one is rightmost.
        // c3, c4 | min max unknown_left unknown_right
        //  0,  0 |  a   d    b         c
        //  0,  1 |  a   b    c         d
        //  1,  0 |  c   d    a         b
        //  1,  1 |  c   b    a         d
        let c3 = is_less(&*c, &*a);
        let c4 = is_less(&*d, &*b);
        let min = select(c3, c, a);
        let max = select(c4, b, d);
        let unknown_left = select(c3, a, select(c4, c, b));
        let unknown_right = select(c4, d, select(c3, b, c));

        // Sort the last two unknown elements.
        let c5 = is_less(&*unknown_right, &*unknown_left);
        let lo = select(c5, unknown_right, unknown_left);
        let hi = select(c5, unknown_left, unknown_right);

        ptr::copy_nonoverlapping(min, dst, 1);
        ptr::copy_nonoverlapping(lo, dst.add(1), 1);
        ptr::copy_nonoverlapping(hi, dst.add(2), 1);
        ptr::copy_nonoverlapping(max, dst.add(3), 1);
    }

    #[inline(always)]
    fn select<T>(cond: bool, if_true: *const T, if_false: *const T) -> *const T {
        if cond {
            if_true
        } else {
            if_false
        }
    }
}

/// SAFETY: The caller must guarantee that `v_base` is valid for 8 reads,
/// `scratch_base` and `dst` are each valid for 8 writes, and that none of the
/// three ranges alias. The result is stored in `dst[0..8]`.
#[inline(never)]
unsafe fn sort8_stable<T, F>(v_base: *const T, scratch_base: *mut T, dst: *mut T, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    // SAFETY: The caller guarantees scratch_base is valid for 8 writes, and
    // that v_base is valid for 8 reads.
    unsafe {
        sort4_stable(v_base, scratch_base, is_less);
        sort4_stable(v_base.add(4), scratch_base.add(4), is_less);
    }

    // SAFETY: scratch_base[0..8] is now initialized, allowing us to merge
    // back into dst.
    unsafe {
        bidir_merge(&*ptr::slice_from_raw_parts(scratch_base, 8), dst, is_less);
    }
}

// --- Bidirectional merge ---

#[inline(always)]
unsafe fn merge_up<T, F>(
    mut left_src: *const T,
    mut right_src: *const T,
    mut dst: *mut T,
    is_less: &mut F,
) -> (*const T, *const T, *mut T)
where
    F: FnMut(&T, &T) -> bool,
{
    // This is a branchless merge utility function. The equivalent code with a
    // branch would be:
    //
    // if !is_less(&*right_src, &*left_src) {
    //     ptr::copy_nonoverlapping(left_src, dst, 1);
    //     left_src = left_src.wrapping_add(1);
    // } else {
    //     ptr::copy_nonoverlapping(right_src, dst, 1);
    //     right_src = right_src.wrapping_add(1);
    // }
    // dst = dst.add(1);

    // SAFETY: The caller must guarantee that `left_src` and `right_src` are
    // valid to read and `dst` is valid to write, while not aliasing.
    unsafe {
        let is_l = !is_less(&*right_src, &*left_src);
        let src = if is_l { left_src } else { right_src };
        ptr::copy_nonoverlapping(src, dst, 1);
        right_src = right_src.wrapping_add(!is_l as usize);
        left_src = left_src.wrapping_add(is_l as usize);
        dst = dst.add(1);
    }

    (left_src, right_src, dst)
}

#[inline(always)]
unsafe fn merge_down<T, F>(
    mut left_src: *const T,
    mut right_src: *const T,
    mut dst: *mut T,
    is_less: &mut F,
) -> (*const T, *const T, *mut T)
where
    F: FnMut(&T, &T) -> bool,
{
    // Mirror image of merge_up, consuming the larger of the two backs while
    // walking the destination backwards.

    // SAFETY: The caller must guarantee that `left_src` and `right_src` are
    // valid to read and `dst` is valid to write, while not aliasing.
    unsafe {
        let is_l = !is_less(&*right_src, &*left_src);
        let src = if is_l { right_src } else { left_src };
        ptr::copy_nonoverlapping(src, dst, 1);
        right_src = right_src.wrapping_sub(is_l as usize);
        left_src = left_src.wrapping_sub(!is_l as usize);
        dst = dst.sub(1);
    }

    (left_src, right_src, dst)
}

/// Merge `v` assuming `v[..len / 2]` and `v[len / 2..]` are each sorted,
/// writing the result to `dst`. On ties the left run wins, making each merge
/// step stable on its own.
///
/// Bi-directional merging was originally developed by Igor van den Hoven
/// (quadsort). Advancing from both ends at once does useful work in every
/// iteration and roughly halves the branch misses of a single-direction
/// merge.
///
/// SAFETY: The caller must guarantee that `dst` is valid for `v.len()`
/// writes, that `v` and `dst` do not alias, and that `v.len() >= 2`.
unsafe fn bidir_merge<T, F>(v: &[T], dst: *mut T, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    // It helps to visualize the merge:
    //
    // Initial:
    //
    //  |dst (in dst)
    //  |left               |right
    //  v                   v
    // [xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx]
    //                     ^                   ^
    //                     |left_rev           |right_rev
    //                                         |dst_rev (in dst)
    //
    // In each iteration one of left or right moves up one position, and one
    // of left_rev or right_rev moves down one position, whereas dst always
    // moves up one position and dst_rev always moves down one position.
    // Assuming the input was sorted and the comparison function is correctly
    // implemented, at the end we will have left == left_rev + 1 and
    // right == right_rev + 1, fully consuming the input having written it to
    // dst.

    let len = v.len();
    let src = v.as_ptr();
    let half = len / 2;
    debug_assert!(half != 0);

    // SAFETY: No matter what the result of the user-provided comparison
    // function is, all 4 read pointers will always be in-bounds. Writing
    // `dst` and `dst_rev` will always be in bounds if the caller guarantees
    // that `dst` is valid for `v.len()` writes.
    unsafe {
        let mut left = src;
        let mut right = src.wrapping_add(half);
        let mut dst_fwd = dst;

        let mut left_rev = src.wrapping_add(half - 1);
        let mut right_rev = src.wrapping_add(len - 1);
        let mut dst_rev = dst.wrapping_add(len - 1);

        for _ in 0..half {
            (left, right, dst_fwd) = merge_up(left, right, dst_fwd, is_less);
            (left_rev, right_rev, dst_rev) = merge_down(left_rev, right_rev, dst_rev, is_less);
        }

        let left_end = left_rev.wrapping_add(1);
        let right_end = right_rev.wrapping_add(1);

        // Odd length, so one element is left unconsumed in the input. It goes
        // into the middle slot of dst, which is the only one not yet written.
        if len % 2 != 0 {
            let left_nonempty = left < left_end;
            let last_src = if left_nonempty { left } else { right };
            ptr::copy_nonoverlapping(last_src, dst_fwd, 1);
            left = left.wrapping_add(left_nonempty as usize);
            right = right.wrapping_add(!left_nonempty as usize);
        }

        // If the input wasn't fully consumed the comparison function broke
        // the total order contract and dst now holds duplicates. Panicking
        // here lets the callers' guards restore the original element set.
        if left != left_end || right != right_end {
            panic_on_ord_violation();
        }
    }
}

// --- Strategies ---

fn small_sort_network<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    // This implementation is tuned to be efficient for integer types.

    let len = v.len();
    if len < 2 {
        return;
    }

    // The dispatcher only selects this strategy for slices that fit the
    // scratch buffer, see [`small_sort_strategy`].
    debug_assert!(len <= SMALL_SORT_NETWORK_SCRATCH_LEN);

    if len < 18 {
        small_sort_network_region(v, is_less);
        return;
    }

    let half = len / 2;
    {
        let (left, right) = v.split_at_mut(half);
        small_sort_network_region(left, is_less);
        small_sort_network_region(right, is_less);
    }

    let mut scratch = MaybeUninit::<[T; SMALL_SORT_NETWORK_SCRATCH_LEN]>::uninit();
    let scratch_base = scratch.as_mut_ptr() as *mut T;

    // SAFETY: We checked that len fits the scratch buffer, v and scratch
    // cannot alias, and both halves of v were just sorted. Should is_less
    // panic mid-merge, v still holds its full original element set and the
    // partially filled scratch buffer is simply abandoned.
    unsafe {
        bidir_merge(v, scratch_base, is_less);
        ptr::copy_nonoverlapping(scratch_base, v.as_mut_ptr(), len);
    }
}

/// Sorts a region in place, pre-sorting a prefix with a fixed
/// compare-exchange schedule and extending it by tail insertion.
fn small_sort_network_region<T, F>(region: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let sorted_len = if region.len() >= 13 {
        sort13_optimal(&mut region[..13], is_less);
        13
    } else if region.len() >= 9 {
        sort9_optimal(&mut region[..9], is_less);
        9
    } else {
        1
    };

    insertion_sort_shift_left(region, sorted_len, is_less);
}

fn small_sort_general<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    // This implementation is tuned to be efficient for various types that
    // are larger than u64.

    let len = v.len();
    if len < 2 {
        return;
    }

    // The dispatcher only selects this strategy for slices that fit the
    // scratch buffer, see [`small_sort_strategy`].
    debug_assert!(len <= SMALL_SORT_GENERAL_THRESHOLD);

    let mut scratch = MaybeUninit::<[T; SMALL_SORT_GENERAL_SCRATCH_LEN]>::uninit();
    let scratch_base = scratch.as_mut_ptr() as *mut T;

    let half = len / 2;
    let v_base = v.as_mut_ptr();

    // SAFETY: The scratch buffer holds the len merge elements in
    // scratch[0..len] plus two times 8 elements of temporary space for
    // sort8_stable past SMALL_SORT_GENERAL_THRESHOLD, which len cannot
    // exceed. All pointer offsets below stay inside those regions.
    unsafe {
        let presorted_len = if mem::size_of::<T>() <= 16 && len >= 16 {
            sort8_stable(
                v_base,
                scratch_base.add(SMALL_SORT_GENERAL_THRESHOLD),
                scratch_base,
                is_less,
            );
            sort8_stable(
                v_base.add(half),
                scratch_base.add(SMALL_SORT_GENERAL_THRESHOLD + 8),
                scratch_base.add(half),
                is_less,
            );

            8
        } else if len >= 8 {
            sort4_stable(v_base, scratch_base, is_less);
            sort4_stable(v_base.add(half), scratch_base.add(half), is_less);

            4
        } else {
            ptr::copy_nonoverlapping(v_base, scratch_base, 1);
            ptr::copy_nonoverlapping(v_base.add(half), scratch_base.add(half), 1);

            1
        };

        // Extend the sorted prefixes inside the scratch buffer. Until the
        // final merge completes, v keeps its full original element set, so a
        // panicking comparator loses nothing.
        for offset in [0, half] {
            let src = v_base.add(offset);
            let dst = scratch_base.add(offset);
            let region_len = if offset == 0 { half } else { len - half };

            for i in presorted_len..region_len {
                ptr::copy_nonoverlapping(src.add(i), dst.add(i), 1);
                insert_tail(&mut *ptr::slice_from_raw_parts_mut(dst, i + 1), is_less);
            }
        }

        // All len elements now live in scratch[0..len], as two sorted halves.
        // Merging directly into v is faster than ping-ponging through the
        // scratch buffer; the guard copies the scratch content back over v if
        // is_less panics mid-merge.
        let drop_guard = DropGuard {
            src: scratch_base,
            dst: v_base,
            len,
        };
        bidir_merge(
            &*ptr::slice_from_raw_parts(drop_guard.src, drop_guard.len),
            drop_guard.dst,
            is_less,
        );
        mem::forget(drop_guard);
    }

    struct DropGuard<T> {
        src: *mut T,
        dst: *mut T,
        len: usize,
    }

    impl<T> Drop for DropGuard<T> {
        fn drop(&mut self) {
            // SAFETY: `src` holds the original `len` elements of `v` in some
            // order, and `dst` is valid for `len` writes.
            unsafe {
                ptr::copy_nonoverlapping(self.src, self.dst, self.len);
            }
        }
    }
}

#[inline(never)]
fn panic_on_ord_violation() -> ! {
    panic!("user-provided comparison function does not correctly implement a total order");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_selection() {
        assert!(matches!(
            small_sort_strategy::<i32>(),
            SmallSortStrategy::Network
        ));
        assert!(matches!(
            small_sort_strategy::<u64>(),
            SmallSortStrategy::Network
        ));
        assert!(matches!(
            small_sort_strategy::<u128>(),
            SmallSortStrategy::General
        ));
        assert!(matches!(
            small_sort_strategy::<[u64; 4]>(),
            SmallSortStrategy::General
        ));
        assert!(matches!(
            small_sort_strategy::<String>(),
            SmallSortStrategy::Fallback
        ));
        assert!(matches!(
            small_sort_strategy::<[u8; 512]>(),
            SmallSortStrategy::Fallback
        ));
    }

    #[test]
    fn threshold_matches_strategy() {
        assert_eq!(small_sort_threshold::<u64>(), SMALL_SORT_NETWORK_THRESHOLD);
        assert_eq!(small_sort_threshold::<u128>(), SMALL_SORT_GENERAL_THRESHOLD);
        assert_eq!(
            small_sort_threshold::<String>(),
            SMALL_SORT_FALLBACK_THRESHOLD
        );
    }
}
