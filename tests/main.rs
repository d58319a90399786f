use sort_harness::{instantiate_sort_tests, Sort};

struct SortImpl {}

impl Sort for SortImpl {
    fn name() -> String {
        "veersort_unstable".into()
    }

    fn sort<T>(arr: &mut [T])
    where
        T: Ord,
    {
        veersort::sort(arr);
    }

    fn sort_by<T, F>(arr: &mut [T], compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        veersort::sort_by(arr, compare);
    }
}

instantiate_sort_tests!(SortImpl);

// --- Crate specific tests ---

#[test]
fn sorts_concrete_scenarios() {
    let mut v = [5, 3, 4, 1, 2];
    veersort::sort(&mut v);
    assert_eq!(v, [1, 2, 3, 4, 5]);

    // Reverse sorted input is handled by a single reversal.
    let mut v = [5, 4, 3, 2, 1];
    veersort::sort(&mut v);
    assert_eq!(v, [1, 2, 3, 4, 5]);

    let mut v = [3, 3, 3, 3];
    veersort::sort(&mut v);
    assert_eq!(v, [3, 3, 3, 3]);

    let mut v = [5, 3, 4, 1, 2];
    veersort::sort_by(&mut v, |a, b| b.cmp(a));
    assert_eq!(v, [5, 4, 3, 2, 1]);

    let mut v: [i32; 0] = [];
    veersort::sort(&mut v);
    assert_eq!(v, []);

    let mut v = [1];
    veersort::sort(&mut v);
    assert_eq!(v, [1]);
}

#[test]
fn sort_is_idempotent() {
    for len in [16, 33, 280] {
        let mut v = sort_harness::patterns::random(len);

        veersort::sort(&mut v);
        let first = v.clone();

        veersort::sort(&mut v);
        assert_eq!(v, first);
    }
}

#[test]
fn is_sorted_basic() {
    assert!(veersort::is_sorted::<i32>(&[]));
    assert!(veersort::is_sorted(&[7]));
    assert!(veersort::is_sorted(&[1, 2, 3]));
    assert!(veersort::is_sorted(&[1, 1, 1]));
    assert!(veersort::is_sorted(&[1, 2, 2, 3]));
    assert!(!veersort::is_sorted(&[1, 3, 2]));
    assert!(!veersort::is_sorted(&[2, 1]));
}

#[test]
fn is_sorted_by_comparator() {
    assert!(veersort::is_sorted_by(&[3, 2, 1], |a, b| b.cmp(a)));
    assert!(!veersort::is_sorted_by(&[1, 2, 3], |a, b| b.cmp(a)));

    // One comparison per adjacent pair, the scan is a single forward pass.
    let mut comps = 0u32;
    let v: Vec<i32> = (0..1000).collect();
    assert!(veersort::is_sorted_by(&v, |a, b| {
        comps += 1;
        a.cmp(b)
    }));
    assert_eq!(comps, 999);
}

#[test]
fn sort_then_is_sorted() {
    for len in [0, 1, 2, 15, 16, 17, 31, 32, 33, 63, 64, 65, 500] {
        let mut v = sort_harness::patterns::random(len);
        veersort::sort(&mut v);
        assert!(veersort::is_sorted(&v), "len: {len}");
    }
}
