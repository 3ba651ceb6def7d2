use calculator::tree::{Tree, compute};
use calculator::validator::parse_tree_text;
use calculator::{CalcError, EngineError, Limits, calculate_tree_text};
use proptest::prelude::*;

/// Slots that survive pruning below absent ancestors.
fn present(slots: &[Option<i64>]) -> Vec<bool> {
    let mut alive = vec![false; slots.len()];
    for i in 0..slots.len() {
        alive[i] = slots[i].is_some() && (i == 0 || alive[(i - 1) / 2]);
    }
    alive
}

fn ancestors(mut slot: usize) -> Vec<usize> {
    let mut chain = vec![slot];
    while slot > 0 {
        slot = (slot - 1) / 2;
        chain.push(slot);
    }
    chain
}

/// Sum of the unique path between two slots.
fn path_sum(slots: &[Option<i64>], a: usize, b: usize) -> i64 {
    let up_a = ancestors(a);
    let up_b = ancestors(b);
    let lca = *up_a.iter().find(|s| up_b.contains(s)).unwrap();
    let value = |s: &usize| slots[*s].unwrap();
    let from_a: i64 = up_a.iter().take_while(|&&s| s != lca).map(value).sum();
    let from_b: i64 = up_b.iter().take_while(|&&s| s != lca).map(value).sum();
    from_a + from_b + slots[lca].unwrap()
}

fn brute_force(slots: &[Option<i64>]) -> (i64, i64) {
    let alive = present(slots);
    let nodes: Vec<usize> = (0..slots.len()).filter(|&i| alive[i]).collect();
    let is_alive = |i: usize| i < alive.len() && alive[i];
    let leaves: Vec<usize> = nodes
        .iter()
        .copied()
        .filter(|&i| !is_alive(2 * i + 1) && !is_alive(2 * i + 2))
        .collect();

    let mut best_path = i64::MIN;
    for &a in &nodes {
        for &b in &nodes {
            best_path = best_path.max(path_sum(slots, a, b));
        }
    }

    let best_leaf = if leaves.len() >= 2 {
        let mut best = i64::MIN;
        for (i, &a) in leaves.iter().enumerate() {
            for &b in &leaves[i + 1..] {
                best = best.max(path_sum(slots, a, b));
            }
        }
        best
    } else {
        let leaf = leaves[0];
        ancestors(leaf)
            .into_iter()
            .map(|top| path_sum(slots, top, leaf))
            .max()
            .unwrap()
    };

    (best_path, best_leaf)
}

fn slot_strategy() -> impl Strategy<Value = Vec<Option<i64>>> {
    (
        -30i64..30,
        prop::collection::vec(prop::option::weighted(0.75, -30i64..30), 0..31),
    )
        .prop_map(|(root, rest)| {
            let mut slots = vec![Some(root)];
            slots.extend(rest);
            slots
        })
}

#[test]
fn reference_examples() {
    let limits = Limits::default();

    let result = calculate_tree_text("1,2,3", &limits).unwrap();
    assert_eq!(result.max_path_sum, 6);
    assert_eq!(result.max_path.len(), 3);

    let result = calculate_tree_text("-10,9,20,null,null,15,7", &limits).unwrap();
    assert_eq!(result.max_path_sum, 42);
    assert_eq!(result.max_path, vec![15, 20, 7]);

    let result = calculate_tree_text("1", &limits).unwrap();
    assert_eq!((result.max_path_sum, result.max_leaf_sum), (1, 1));
    assert_eq!(result.max_path, vec![1]);
}

#[test]
fn client_placeholder_example() {
    // 10,5,-3,3,2,null,11 as suggested by the input form
    let result = calculate_tree_text("10,5,-3,3,2,null,11", &Limits::default()).unwrap();
    assert_eq!(result.max_path_sum, 26);
    assert_eq!(result.max_path, vec![3, 5, 10, -3, 11]);
    assert_eq!(result.max_leaf_sum, 26);
    assert_eq!(result.max_leaf_path, vec![3, 5, 10, -3, 11]);
}

#[test]
fn absent_root_is_an_empty_tree() {
    assert_eq!(
        calculate_tree_text("null, 1, 2", &Limits::default()),
        Err(CalcError::Engine(EngineError::EmptyTree))
    );
}

#[test]
fn orphans_under_absent_slots_are_ignored() {
    let slots: Vec<Option<i64>> = parse_tree_text("1,null,2,100,100")
        .unwrap()
        .into_iter()
        .map(|s| s.map(|v| v as i64))
        .collect();
    let result = compute(&slots).unwrap();
    assert_eq!(result.max_path_sum, 3);
    assert_eq!(result.max_path, vec![1, 2]);
}

#[test]
fn serializes_with_client_field_names() {
    let value = serde_json::to_value(compute(&[Some(1), Some(2), Some(3)]).unwrap()).unwrap();
    assert_eq!(value["maxPathSum"], 6);
    assert_eq!(value["maxLeafSum"], 6);
    assert_eq!(value["maxPath"], serde_json::json!([2, 1, 3]));
    assert!(value.get("maxLeafPath").is_some());
    assert!(value.get("calculationTime").is_some());
}

proptest! {
    #[test]
    fn sums_match_exhaustive_search(slots in slot_strategy()) {
        let result = compute(&slots).unwrap();
        let (best_path, best_leaf) = brute_force(&slots);
        prop_assert_eq!(result.max_path_sum, best_path);
        prop_assert_eq!(result.max_leaf_sum, best_leaf);
    }

    #[test]
    fn reported_paths_add_up(slots in slot_strategy()) {
        let result = compute(&slots).unwrap();
        prop_assert!(!result.max_path.is_empty());
        prop_assert!(!result.max_leaf_path.is_empty());
        prop_assert_eq!(result.max_path.iter().sum::<i64>(), result.max_path_sum);
        prop_assert_eq!(result.max_leaf_path.iter().sum::<i64>(), result.max_leaf_sum);
    }

    #[test]
    fn reflattening_preserves_shape(slots in slot_strategy()) {
        let tree = Tree::from_slots(&slots);
        let flat = tree.to_slots();
        let rebuilt = Tree::from_slots(&flat);
        prop_assert_eq!(&rebuilt, &tree);
        prop_assert_eq!(rebuilt.to_slots(), flat.clone());

        let original = compute(&slots).unwrap();
        let again = compute(&flat).unwrap();
        prop_assert_eq!(original.max_path, again.max_path);
        prop_assert_eq!(original.max_leaf_path, again.max_leaf_path);
    }

    #[test]
    fn repeated_calls_agree(slots in slot_strategy()) {
        let first = compute(&slots).unwrap();
        let second = compute(&slots).unwrap();
        prop_assert_eq!(first.max_path, second.max_path);
        prop_assert_eq!(first.max_path_sum, second.max_path_sum);
        prop_assert_eq!(first.max_leaf_path, second.max_leaf_path);
    }
}
