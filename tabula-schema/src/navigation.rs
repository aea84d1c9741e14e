//! Navigation grouping: pages inside optional groups, both user-ordered.
//!
//! The same reorder engine that orders fields inside sections orders pages
//! inside groups and groups inside the navigation bar.

use serde::{Deserialize, Serialize};
use tabula_order::{
    append_index, apply_plan, container_items, densify, plan_move, Anchor, MoveIntent,
    OrderedItem, ReorderPlan,
};
use tracing::debug;

use crate::error::{Result, SchemaError};

tabula_fields::define_id!(
    /// Identity of a navigation page
    PageId
);
tabula_fields::define_id!(
    /// Identity of a navigation group
    GroupId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavPage {
    pub id: PageId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupId>,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGroup {
    pub id: GroupId,
    pub name: String,
    pub order_index: i64,
}

/// Pages and groups of one navigation bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    #[serde(default)]
    pages: Vec<NavPage>,
    #[serde(default)]
    groups: Vec<NavGroup>,
}

impl Navigation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a group after the existing ones.
    pub fn add_group(&mut self, name: impl Into<String>) -> GroupId {
        self.densify_groups();
        let id = GroupId::new();
        let order_index = append_index(&self.group_items(), &None);
        self.groups.push(NavGroup {
            id: id.clone(),
            name: name.into(),
            order_index,
        });
        id
    }

    /// Append a page to the end of a group, or of the ungrouped pages.
    pub fn add_page(&mut self, title: impl Into<String>, group: Option<&GroupId>) -> Result<PageId> {
        if let Some(group) = group {
            self.check_group(group)?;
        }
        let id = PageId::new();
        let container = group.cloned();
        let gaps = densify(&self.page_items(), &container);
        self.apply_page_plan(&gaps);
        let order_index = append_index(&self.page_items(), &container);
        self.pages.push(NavPage {
            id: id.clone(),
            title: title.into(),
            group: container,
            order_index,
        });
        Ok(id)
    }

    /// Groups in display order.
    pub fn groups(&self) -> Vec<&NavGroup> {
        let items = self.group_items();
        container_items(&items, &None)
            .into_iter()
            .filter_map(|item| self.groups.iter().find(|g| g.id == item.id))
            .collect()
    }

    /// Pages of one group (`None` for ungrouped) in display order.
    pub fn pages_in(&self, group: Option<&GroupId>) -> Vec<&NavPage> {
        let items = self.page_items();
        container_items(&items, &group.cloned())
            .into_iter()
            .filter_map(|item| self.pages.iter().find(|p| p.id == item.id))
            .collect()
    }

    /// Move a page within or across groups and apply the result.
    pub fn move_page(
        &mut self,
        page: &PageId,
        target: Option<&GroupId>,
        anchor: Anchor<PageId>,
    ) -> Result<ReorderPlan<PageId, GroupId>> {
        if let Some(group) = target {
            self.check_group(group)?;
        }
        let current = self
            .pages
            .iter()
            .find(|p| &p.id == page)
            .ok_or_else(|| SchemaError::not_found("page", page.as_str()))?;

        let intent = MoveIntent::between(
            page.clone(),
            current.group.clone(),
            target.cloned(),
            anchor,
        );
        let plan = plan_move(&self.page_items(), &intent)?;
        self.apply_page_plan(&plan);
        debug!(page = %page, updates = plan.len(), "moved page");
        Ok(plan)
    }

    /// Move a group and apply the result.
    pub fn move_group(
        &mut self,
        group: &GroupId,
        anchor: Anchor<GroupId>,
    ) -> Result<ReorderPlan<GroupId, ()>> {
        self.check_group(group)?;
        let mut items = self.group_items();
        let plan = plan_move(&items, &MoveIntent::within(group.clone(), None, anchor))?;
        apply_plan(&mut items, &plan);
        for item in items {
            if let Some(g) = self.groups.iter_mut().find(|g| g.id == item.id) {
                g.order_index = item.order_index;
            }
        }
        debug!(group = %group, updates = plan.len(), "moved group");
        Ok(plan)
    }

    /// Remove a group; its pages move, in order, to the end of the ungrouped
    /// pages.
    pub fn remove_group(&mut self, group: &GroupId) -> Result<ReorderPlan<PageId, GroupId>> {
        self.check_group(group)?;

        let members: Vec<PageId> = self
            .pages_in(Some(group))
            .into_iter()
            .map(|p| p.id.clone())
            .collect();
        let mut plan = ReorderPlan::default();
        for page in members {
            plan.merge(self.move_page(&page, None, Anchor::End)?);
        }

        self.groups.retain(|g| &g.id != group);
        self.densify_groups();
        debug!(group = %group, pages = plan.len(), "removed group");
        Ok(plan)
    }

    /// Close gaps in group order, e.g. after loading hand-edited data.
    fn densify_groups(&mut self) {
        let mut items = self.group_items();
        let plan = densify(&items, &None);
        apply_plan(&mut items, &plan);
        for item in items {
            if let Some(g) = self.groups.iter_mut().find(|g| g.id == item.id) {
                g.order_index = item.order_index;
            }
        }
    }

    fn check_group(&self, group: &GroupId) -> Result<()> {
        if self.groups.iter().any(|g| &g.id == group) {
            Ok(())
        } else {
            Err(SchemaError::not_found("group", group.as_str()))
        }
    }

    fn page_items(&self) -> Vec<OrderedItem<PageId, GroupId>> {
        self.pages
            .iter()
            .map(|p| OrderedItem::new(p.id.clone(), p.group.clone(), p.order_index))
            .collect()
    }

    fn group_items(&self) -> Vec<OrderedItem<GroupId, ()>> {
        self.groups
            .iter()
            .map(|g| OrderedItem::new(g.id.clone(), None, g.order_index))
            .collect()
    }

    fn apply_page_plan(&mut self, plan: &ReorderPlan<PageId, GroupId>) {
        for update in plan.iter() {
            if let Some(page) = self.pages.iter_mut().find(|p| p.id == update.id) {
                page.group = update.container.clone();
                page.order_index = update.order_index;
            }
        }
    }
}
