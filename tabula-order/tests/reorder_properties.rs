//! Property-based tests for the reorder engine.

use proptest::prelude::*;
use tabula_order::{
    apply_plan, container_items, densify, plan_move, Anchor, MoveIntent, OrderedItem,
};

type Item = OrderedItem<String, String>;

fn ids(items: &[Item], container: &Option<String>) -> Vec<String> {
    container_items(items, container)
        .iter()
        .map(|i| i.id.clone())
        .collect()
}

fn indices(items: &[Item], container: &Option<String>) -> Vec<i64> {
    container_items(items, container)
        .iter()
        .map(|i| i.order_index)
        .collect()
}

/// Two containers with arbitrary (possibly gapped) order indices.
fn layout_strategy() -> impl Strategy<Value = Vec<Item>> {
    (
        prop::collection::vec(0i64..50, 1..12),
        prop::collection::vec(0i64..50, 0..8),
    )
        .prop_map(|(left, right)| {
            let mut items = Vec::new();
            for (n, idx) in left.into_iter().enumerate() {
                items.push(OrderedItem::new(format!("l{n}"), Some("left".to_string()), idx));
            }
            for (n, idx) in right.into_iter().enumerate() {
                items.push(OrderedItem::new(format!("r{n}"), None, idx));
            }
            items
        })
}

proptest! {
    #[test]
    fn move_to_index_round_trips(items in layout_strategy(), pick in any::<prop::sample::Index>(), pos in 0usize..16) {
        let left = Some("left".to_string());
        let before = ids(&items, &left);
        let moved = before[pick.index(before.len())].clone();

        let plan = plan_move(&items, &MoveIntent::within(moved.clone(), left.clone(), Anchor::Index(pos))).unwrap();
        let mut after = items.clone();
        apply_plan(&mut after, &plan);

        let order = ids(&after, &left);
        let expected_pos = pos.min(before.len() - 1);
        prop_assert_eq!(&order[expected_pos], &moved);
        prop_assert_eq!(indices(&after, &left), (0..before.len() as i64).collect::<Vec<_>>());

        let siblings_before: Vec<_> = before.iter().filter(|id| **id != moved).cloned().collect();
        let siblings_after: Vec<_> = order.iter().filter(|id| **id != moved).cloned().collect();
        prop_assert_eq!(siblings_before, siblings_after);
    }

    #[test]
    fn cross_move_keeps_both_containers_dense(items in layout_strategy(), pick in any::<prop::sample::Index>()) {
        let left = Some("left".to_string());
        let before_left = ids(&items, &left);
        let before_right = ids(&items, &None);
        let moved = before_left[pick.index(before_left.len())].clone();

        let plan = plan_move(&items, &MoveIntent::between(moved.clone(), left.clone(), None, Anchor::End)).unwrap();
        let mut after = items.clone();
        apply_plan(&mut after, &plan);

        let left_after = ids(&after, &left);
        let right_after = ids(&after, &None);
        prop_assert_eq!(left_after.len(), before_left.len() - 1);
        prop_assert_eq!(right_after.len(), before_right.len() + 1);
        prop_assert_eq!(right_after.last(), Some(&moved));
        prop_assert_eq!(indices(&after, &left), (0..left_after.len() as i64).collect::<Vec<_>>());
        prop_assert_eq!(indices(&after, &None), (0..right_after.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn applied_plan_leaves_nothing_to_densify(items in layout_strategy(), pick in any::<prop::sample::Index>(), pos in 0usize..16) {
        let left = Some("left".to_string());
        let before = ids(&items, &left);
        let moved = before[pick.index(before.len())].clone();

        let plan = plan_move(&items, &MoveIntent::within(moved, left.clone(), Anchor::Index(pos))).unwrap();
        let mut after = items.clone();
        apply_plan(&mut after, &plan);

        prop_assert!(densify(&after, &left).is_empty());
        // a plan never touches the container it does not involve
        prop_assert!(plan.iter().all(|u| u.container == left));
    }
}
