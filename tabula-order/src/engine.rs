//! Reorder planning over dense, 0-based order indices.
//!
//! A move runs Idle → MoveRequested → Computing → UpdatesProduced → Idle,
//! collapsed here into one call to [`plan_move`]. Nothing is mutated; callers
//! apply the plan optimistically with [`apply_plan`] and persist it.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{OrderError, Result};

/// Anything with an identity, an optional container and an order index.
///
/// `container == None` is the virtual default container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedItem<I, C> {
    pub id: I,
    pub container: Option<C>,
    pub order_index: i64,
}

impl<I, C> OrderedItem<I, C> {
    /// Create an item snapshot
    pub fn new(id: I, container: Option<C>, order_index: i64) -> Self {
        Self {
            id,
            container,
            order_index,
        }
    }
}

/// Where the moved item lands inside the target container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor<I> {
    /// Directly before this sibling; end of container if the sibling is absent
    Before(I),
    /// Directly after this sibling; end of container if the sibling is absent
    After(I),
    /// At this 0-based index, clamped to the container length
    Index(usize),
    End,
}

/// A discrete "move this item there" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent<I, C> {
    pub item: I,
    pub source: Option<C>,
    pub target: Option<C>,
    pub anchor: Anchor<I>,
}

impl<I, C: Clone> MoveIntent<I, C> {
    /// Move inside one container
    pub fn within(item: I, container: Option<C>, anchor: Anchor<I>) -> Self {
        Self {
            item,
            source: container.clone(),
            target: container,
            anchor,
        }
    }

    /// Move from one container to another
    pub fn between(item: I, source: Option<C>, target: Option<C>, anchor: Anchor<I>) -> Self {
        Self {
            item,
            source,
            target,
            anchor,
        }
    }
}

/// New placement of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate<I, C> {
    pub id: I,
    pub container: Option<C>,
    pub order_index: i64,
}

/// The minimal set of placements a move changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderPlan<I, C> {
    pub updates: Vec<OrderUpdate<I, C>>,
}

impl<I, C> Default for ReorderPlan<I, C> {
    fn default() -> Self {
        Self {
            updates: Vec::new(),
        }
    }
}

impl<I: PartialEq, C: PartialEq> ReorderPlan<I, C> {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderUpdate<I, C>> {
        self.updates.iter()
    }

    /// The update for `id`, if the plan touches it.
    pub fn get(&self, id: &I) -> Option<&OrderUpdate<I, C>> {
        self.updates.iter().find(|u| &u.id == id)
    }

    /// Append another plan's updates, replacing any for the same id.
    pub fn merge(&mut self, other: ReorderPlan<I, C>) {
        for update in other.updates {
            self.updates.retain(|u| u.id != update.id);
            self.updates.push(update);
        }
    }
}

/// Items of one container in current order: `order_index`, then list order.
///
/// Historical gaps and duplicate indices are tolerated; duplicates keep the
/// order they have in `items`.
pub fn container_items<'a, I, C: PartialEq>(
    items: &'a [OrderedItem<I, C>],
    container: &Option<C>,
) -> Vec<&'a OrderedItem<I, C>> {
    let mut members: Vec<&OrderedItem<I, C>> =
        items.iter().filter(|i| &i.container == container).collect();
    members.sort_by_key(|i| i.order_index);
    members
}

/// Order index for an item appended to `container`.
pub fn append_index<I, C: PartialEq>(items: &[OrderedItem<I, C>], container: &Option<C>) -> i64 {
    items.iter().filter(|i| &i.container == container).count() as i64
}

/// Plan a move.
///
/// The target container (without the moved item) keeps its relative order,
/// the item is inserted at the anchor, and the list is renumbered densely from
/// zero. When the container changes, the source container is renumbered too.
/// Only placements that differ from `items` are returned. An unknown item is
/// `ItemNotFound` and yields no plan.
pub fn plan_move<I, C>(
    items: &[OrderedItem<I, C>],
    intent: &MoveIntent<I, C>,
) -> Result<ReorderPlan<I, C>>
where
    I: Clone + PartialEq + Display,
    C: Clone + PartialEq,
{
    let moved = items
        .iter()
        .find(|i| i.id == intent.item)
        .ok_or_else(|| OrderError::ItemNotFound {
            id: intent.item.to_string(),
        })?;

    let source = moved.container.clone();
    if source != intent.source {
        trace!(item = %intent.item, "move intent source differs from current container");
    }
    let target = intent.target.clone();

    let mut target_list: Vec<&OrderedItem<I, C>> = container_items(items, &target)
        .into_iter()
        .filter(|i| i.id != intent.item)
        .collect();

    let insert_at = match &intent.anchor {
        Anchor::Before(sibling) => target_list
            .iter()
            .position(|i| &i.id == sibling)
            .unwrap_or(target_list.len()),
        Anchor::After(sibling) => target_list
            .iter()
            .position(|i| &i.id == sibling)
            .map(|p| p + 1)
            .unwrap_or(target_list.len()),
        Anchor::Index(index) => (*index).min(target_list.len()),
        Anchor::End => target_list.len(),
    };
    target_list.insert(insert_at, moved);

    let mut plan = ReorderPlan::default();
    renumber(&target_list, &target, &mut plan);

    let crossed = source != target;
    if crossed {
        let remaining: Vec<&OrderedItem<I, C>> = container_items(items, &source)
            .into_iter()
            .filter(|i| i.id != intent.item)
            .collect();
        renumber(&remaining, &source, &mut plan);
    }

    debug!(
        item = %intent.item,
        index = insert_at,
        crossed,
        updates = plan.updates.len(),
        "planned move"
    );
    Ok(plan)
}

/// Plan an explicit ordering of one container.
///
/// Listed ids come first in the given order; unlisted members follow in their
/// current order. Repeated ids count once.
pub fn reorder_container<I, C>(
    items: &[OrderedItem<I, C>],
    container: &Option<C>,
    ordered: &[I],
) -> Result<ReorderPlan<I, C>>
where
    I: Clone + PartialEq + Display,
    C: Clone + PartialEq,
{
    let members = container_items(items, container);
    let mut list: Vec<&OrderedItem<I, C>> = Vec::with_capacity(members.len());

    for id in ordered {
        if list.iter().any(|i| &i.id == id) {
            continue;
        }
        match members.iter().find(|i| &i.id == id) {
            Some(item) => list.push(*item),
            None if items.iter().any(|i| &i.id == id) => {
                return Err(OrderError::NotInContainer { id: id.to_string() })
            }
            None => return Err(OrderError::ItemNotFound { id: id.to_string() }),
        }
    }
    for item in members {
        if !list.iter().any(|i| i.id == item.id) {
            list.push(item);
        }
    }

    let mut plan = ReorderPlan::default();
    renumber(&list, container, &mut plan);
    Ok(plan)
}

/// Plan a dense renumbering of one container, closing historical gaps.
pub fn densify<I, C>(items: &[OrderedItem<I, C>], container: &Option<C>) -> ReorderPlan<I, C>
where
    I: Clone + PartialEq,
    C: Clone + PartialEq,
{
    let mut plan = ReorderPlan::default();
    renumber(&container_items(items, container), container, &mut plan);
    plan
}

/// Apply a plan to a snapshot in place.
pub fn apply_plan<I, C>(items: &mut [OrderedItem<I, C>], plan: &ReorderPlan<I, C>)
where
    I: PartialEq,
    C: Clone,
{
    for update in &plan.updates {
        if let Some(item) = items.iter_mut().find(|i| i.id == update.id) {
            item.container = update.container.clone();
            item.order_index = update.order_index;
        }
    }
}

fn renumber<I, C>(list: &[&OrderedItem<I, C>], container: &Option<C>, plan: &mut ReorderPlan<I, C>)
where
    I: Clone + PartialEq,
    C: Clone + PartialEq,
{
    for (index, item) in list.iter().enumerate() {
        let index = index as i64;
        if item.order_index != index || &item.container != container {
            plan.updates.push(OrderUpdate {
                id: item.id.clone(),
                container: container.clone(),
                order_index: index,
            });
        }
    }
}
