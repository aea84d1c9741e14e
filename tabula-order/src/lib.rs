//! Hierarchical reorder engine
//!
//! Computes new order indices when an item moves inside one ordered container
//! or between two. The engine is a pure function over a snapshot: it takes the
//! current items and a move intent and returns the minimal set of updates. It
//! knows nothing about fields, sections or pages; callers map their entities
//! onto [`OrderedItem`] and apply or persist the resulting [`ReorderPlan`].
//!
//! ```
//! use tabula_order::{plan_move, Anchor, MoveIntent, OrderedItem};
//!
//! let items = vec![
//!     OrderedItem::new("a", Some("general"), 0),
//!     OrderedItem::new("b", Some("general"), 1),
//!     OrderedItem::new("c", Some("general"), 2),
//! ];
//! let plan = plan_move(&items, &MoveIntent::within("c", Some("general"), Anchor::Before("a"))).unwrap();
//! assert_eq!(plan.len(), 3);
//! ```

mod engine;
mod error;

pub use engine::{
    append_index, apply_plan, container_items, densify, plan_move, reorder_container, Anchor,
    MoveIntent, OrderUpdate, OrderedItem, ReorderPlan,
};
pub use error::{OrderError, Result};
