//! Heapsort, the worst-case fallback of the main quicksort loop.

use core::cmp;
use core::ptr;

/// Sorts `v` using heapsort, which guarantees *O*(*n* \* log(*n*)) worst-case
/// regardless of input and comparator behavior.
///
/// Never inline this, it keeps the rarely taken fallback out of the hot code
/// path.
#[inline(never)]
pub(crate) fn heapsort<T, F>(v: &mut [T], is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();

    // The fused loop first builds the max-heap bottom-up while i counts down
    // from len + len / 2 to len (sifting the nodes len / 2 - 1 down to 0),
    // and then repeatedly extracts the maximum to position i over v[..i].
    for i in (0..len + len / 2).rev() {
        let sift_idx = if i >= len {
            i - len
        } else {
            v.swap(0, i);
            0
        };

        sift_down(&mut v[..cmp::min(i, len)], sift_idx, is_less);
    }
}

// This binary heap respects the invariant `parent >= child`.
fn sift_down<T, F>(v: &mut [T], mut node: usize, is_less: &mut F)
where
    F: FnMut(&T, &T) -> bool,
{
    let len = v.len();
    let v_base = v.as_mut_ptr();

    loop {
        // Children of `node`.
        let mut child = 2 * node + 1;
        if child >= len {
            break;
        }

        // SAFETY: The invariants and checks guarantee that both node and
        // child are in-bounds.
        unsafe {
            // Choose the greater child.
            if child + 1 < len {
                // We need a branch to be sure not to out-of-bounds index, but
                // it's highly predictable. The comparison, however, is better
                // done branchless, especially for primitives.
                child += is_less(&*v_base.add(child), &*v_base.add(child + 1)) as usize;
            }

            // Stop if the invariant holds at `node`.
            if !is_less(&*v_base.add(node), &*v_base.add(child)) {
                break;
            }

            ptr::swap_nonoverlapping(v_base.add(node), v_base.add(child), 1);
        }

        node = child;
    }
}
