#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    use crate::btree::node::Node;
    use crate::btree::{BTreeQueue, DEFAULT_ORDER};
    use crate::error::InvariantViolation;

    /// Work item ordered by priority only; `seq` records insertion order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Job {
        priority: u8,
        seq: usize,
    }

    fn by_priority(a: &Job, b: &Job) -> Ordering {
        a.priority.cmp(&b.priority)
    }

    fn check(queue: &BTreeQueue<i64>) {
        if let Err(e) = queue.check_invariants() {
            panic!("invariant violated: {e} ({queue:?})");
        }
    }

    /// Sizes covering a single leaf, one level of splits and 2+ levels.
    fn regimes(order: usize) -> [usize; 3] {
        [order, order * order, order * order * 2 + 7]
    }

    #[test]
    fn empty_queue() {
        let mut queue = BTreeQueue::<i64>::new();
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
        assert_eq!(queue.peek(), None);
        assert_eq!(queue.poll(), None);
        assert_eq!(queue.index_of(&5), None);
        assert_eq!(queue.index_before(&5), 0);
        assert_eq!(queue.get(0), None);
        assert!(queue.to_vec().is_empty());
        assert_eq!(queue.height(), 1);
        check(&queue);
    }

    #[test]
    fn single_value_round_trip() {
        let mut queue = BTreeQueue::new();
        queue.add(11);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.poll(), Some(11));
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.poll(), None);
        assert_eq!(queue.poll(), None);
        check(&queue);
    }

    #[test]
    fn small_unsorted_input_comes_out_sorted() {
        let mut queue = BTreeQueue::new();
        for v in [1, 6, 5, 4, 2, 3, 0] {
            queue.add(v);
        }
        assert_eq!(queue.to_vec(), vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(queue.peek(), Some(&0));
        check(&queue);
    }

    #[test]
    fn sorted_inserts_keep_invariants_across_regimes() {
        for order in [4, 5, 8] {
            for n in regimes(order) {
                let mut queue = BTreeQueue::with_order(order);
                for v in 0..n as i64 {
                    queue.add(v);
                    check(&queue);
                }
                assert_eq!(queue.to_vec(), (0..n as i64).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn reverse_sorted_inserts_keep_invariants_across_regimes() {
        for order in [4, 5, 8] {
            for n in regimes(order) {
                let mut queue = BTreeQueue::with_order(order);
                for v in (0..n as i64).rev() {
                    queue.add(v);
                    check(&queue);
                }
                assert_eq!(queue.to_vec(), (0..n as i64).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn polling_drains_in_order_and_rebalances() {
        let mut rng = StdRng::seed_from_u64(7);
        for order in [4, 5, 8] {
            for n in regimes(order) {
                let mut values: Vec<i64> = (0..n as i64).collect();
                values.shuffle(&mut rng);

                let mut queue = BTreeQueue::with_order(order);
                for &v in &values {
                    queue.add(v);
                }
                check(&queue);
                let expected = queue.to_vec();

                let mut drained = Vec::with_capacity(n);
                while let Some(v) = queue.poll() {
                    drained.push(v);
                    check(&queue);
                }
                assert_eq!(drained, expected);
                assert_eq!(queue.poll(), None);
                assert_eq!(queue.height(), 1);
            }
        }
    }

    #[test]
    fn default_order_reaches_three_levels() {
        let n = DEFAULT_ORDER * DEFAULT_ORDER * 2;
        let mut rng = StdRng::seed_from_u64(42);
        let mut queue = BTreeQueue::new();
        for i in 0..n {
            queue.add(rng.gen_range(0..1_000_000i64));
            if i % 97 == 0 {
                check(&queue);
            }
        }
        check(&queue);
        assert!(queue.height() >= 3, "height {}", queue.height());
        assert_eq!(queue.len(), n);

        for i in 0..n / 2 {
            queue.poll();
            if i % 89 == 0 {
                check(&queue);
            }
        }
        check(&queue);
        assert_eq!(queue.len(), n - n / 2);
    }

    #[test]
    fn interleaved_adds_and_polls_track_size() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = BTreeQueue::with_order(4);
        let mut oracle: Vec<i64> = Vec::new();
        let (mut adds, mut polls) = (0usize, 0usize);

        for _ in 0..5_000 {
            if rng.gen_bool(0.6) || oracle.is_empty() {
                let v = rng.gen_range(-50..50);
                queue.add(v);
                let pos = oracle.partition_point(|&x| x <= v);
                oracle.insert(pos, v);
                adds += 1;
            } else {
                assert_eq!(queue.poll(), Some(oracle.remove(0)));
                polls += 1;
            }
            assert_eq!(queue.len(), adds - polls);
            assert_eq!(queue.peek(), oracle.first());
        }
        check(&queue);
        assert_eq!(queue.to_vec(), oracle);
    }

    #[test]
    fn peek_is_first_of_to_vec() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut queue = BTreeQueue::with_order(5);
        for _ in 0..300 {
            queue.add(rng.gen_range(0..100i64));
            assert_eq!(queue.peek(), queue.to_vec().first());
        }
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut rng = StdRng::seed_from_u64(5);
        for order in [4, 7, DEFAULT_ORDER] {
            let mut queue = BTreeQueue::with_order_and_comparator(order, by_priority);
            for seq in 0..2_000 {
                queue.add(Job {
                    priority: rng.gen_range(0..6),
                    seq,
                });
            }
            queue.check_invariants().unwrap();

            let jobs = queue.to_vec();
            for pair in jobs.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                assert!(a.priority <= b.priority);
                if a.priority == b.priority {
                    assert!(a.seq < b.seq, "{a:?} before {b:?}");
                }
            }

            let mut last: Option<Job> = None;
            while let Some(job) = queue.poll() {
                if let Some(prev) = last {
                    assert!(
                        prev.priority < job.priority
                            || (prev.priority == job.priority && prev.seq < job.seq)
                    );
                }
                last = Some(job);
            }
        }
    }

    #[test]
    fn rank_queries_on_even_numbers() {
        for order in [4, DEFAULT_ORDER] {
            let n = 3_000i64;
            let mut queue = BTreeQueue::with_order(order);
            for i in 0..n {
                queue.add(i * 2);
            }
            check(&queue);

            for i in 0..n {
                let rank = i as usize;
                assert_eq!(queue.index_before(&(i * 2 - 1)), rank);
                assert_eq!(queue.index_before(&(i * 2)), rank);
                assert_eq!(queue.index_before(&(i * 2 + 1)), rank + 1);
                assert_eq!(queue.index_of(&(i * 2)), Some(rank));
                assert_eq!(queue.index_of(&(i * 2 - 1)), None);
                assert_eq!(queue.index_of(&(i * 2 + 1)), None);
                assert_eq!(queue.get(rank), Some(&(i * 2)));
            }
            assert_eq!(queue.index_before(&(n * 2 + 100)), n as usize);
            assert_eq!(queue.index_before(&-100), 0);
        }
    }

    #[test]
    fn index_of_finds_first_of_duplicates_across_leaves() {
        let mut queue = BTreeQueue::with_order(4);
        for v in [1, 9] {
            queue.add(v);
        }
        for _ in 0..40 {
            queue.add(5);
        }
        check(&queue);
        assert!(queue.height() >= 3);
        assert_eq!(queue.index_of(&5), Some(1));
        assert_eq!(queue.index_before(&5), 1);
        assert_eq!(queue.index_before(&6), 41);
        assert_eq!(queue.index_of(&9), Some(41));
        assert_eq!(queue.index_of(&4), None);
    }

    #[test]
    fn add_index_of_matches_index_of() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut queue = BTreeQueue::with_order(4);
        for _ in 0..1_500 {
            let v = rng.gen_range(0..400i64);
            let rank = queue.add_index_of(v);
            assert_eq!(Some(rank), queue.index_of(&v));
        }
        check(&queue);
    }

    #[test]
    fn add_index_of_returns_rank_of_distinct_value() {
        let mut queue = BTreeQueue::new();
        assert_eq!(queue.add_index_of(10), 0);
        assert_eq!(queue.add_index_of(30), 1);
        assert_eq!(queue.add_index_of(20), 1);
        assert_eq!(queue.add_index_of(0), 0);
        assert_eq!(queue.to_vec(), vec![0, 10, 20, 30]);
    }

    #[test]
    fn get_matches_to_vec() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut queue = BTreeQueue::with_order(6);
        for _ in 0..700 {
            queue.add(rng.gen_range(0..10_000i64));
        }
        let all = queue.to_vec();
        for (rank, v) in all.iter().enumerate() {
            assert_eq!(queue.get(rank), Some(v));
        }
        assert_eq!(queue.get(all.len()), None);
        assert_eq!(queue.iter().len(), all.len());
    }

    #[test]
    fn internal_capacity_counts_leaves() {
        let mut queue = BTreeQueue::with_order(4);
        assert_eq!(queue.internal_capacity(), 4);
        for v in 0..5 {
            queue.add(v);
        }
        assert_eq!(queue.internal_capacity(), 8);
    }

    #[test]
    fn clear_resets_to_single_leaf() {
        let mut queue = BTreeQueue::with_order(4);
        for v in 0..200 {
            queue.add(v);
        }
        queue.clear();
        check(&queue);
        assert!(queue.is_empty());
        assert_eq!(queue.height(), 1);
        assert_eq!(queue.internal_capacity(), 4);
        queue.add(3);
        assert_eq!(queue.poll(), Some(3));
    }

    #[test]
    fn freed_nodes_are_reused() {
        let mut queue = BTreeQueue::with_order(4);
        let mut peak = None;
        for _ in 0..5 {
            for v in 0..300 {
                queue.add(v);
            }
            while queue.poll().is_some() {}
            check(&queue);
            let slots = queue.nodes.len();
            assert_eq!(*peak.get_or_insert(slots), slots, "arena grew after reuse");
        }
    }

    #[test]
    fn checker_reports_out_of_order_leaf() {
        let mut queue = BTreeQueue::new();
        for v in [1, 2, 3] {
            queue.add(v);
        }
        if let Node::Leaf(values) = &mut queue.nodes[queue.head] {
            values.swap(0, 2);
        }
        assert_eq!(
            queue.check_invariants(),
            Err(InvariantViolation::Order { rank: 1 })
        );
    }

    #[test]
    fn checker_reports_stale_size() {
        let mut queue = BTreeQueue::with_order(4);
        for v in 0..20 {
            queue.add(v);
        }
        let root = queue.root;
        if let Node::Internal(node) = &mut queue.nodes[root] {
            node.size += 1;
        }
        assert!(matches!(
            queue.check_invariants(),
            Err(InvariantViolation::Size { .. })
        ));
    }

    #[test]
    fn checker_reports_underfull_leaf() {
        let mut queue = BTreeQueue::with_order(4);
        for v in 0..20 {
            queue.add(v);
        }
        let head = queue.head;
        if let Node::Leaf(values) = &mut queue.nodes[head] {
            values.truncate(1);
        }
        assert!(matches!(
            queue.check_invariants(),
            Err(InvariantViolation::Occupancy { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "btree order must be at least")]
    fn rejects_tiny_order() {
        let _ = BTreeQueue::<i64>::with_order(3);
    }
}
