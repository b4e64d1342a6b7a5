//! In-memory entity cache.
//!
//! One keyed collection per entity kind. Lookups are O(1) by ID; each
//! collection also keeps display order so a restored entity lands back where
//! it was. The cache holds no business logic.

use std::collections::HashMap;

use crate::models::{Entity, Epic, Issue, Sprint, Task};

/// Ordered, keyed storage for one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<E> {
    items: HashMap<String, E>,
    order: Vec<String>,
}

impl<E> Default for Slot<E> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<E: Entity> Slot<E> {
    pub fn get(&self, id: &str) -> Option<&E> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Display position of `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        if !self.items.contains_key(id) {
            return None;
        }
        self.order.iter().position(|o| o == id)
    }

    /// Replace in place, or append when new.
    pub fn upsert(&mut self, entity: E) {
        let id = entity.id().to_string();
        if self.items.insert(id.clone(), entity).is_none() {
            self.order.push(id);
        }
    }

    /// Replace in place, or insert at `index` (clamped) when new.
    pub fn insert_at(&mut self, index: usize, entity: E) {
        let id = entity.id().to_string();
        if self.items.insert(id.clone(), entity).is_none() {
            let index = index.min(self.order.len());
            self.order.insert(index, id);
        }
    }

    /// Replace the entry stored under `old_id` with `entity`, keeping its
    /// position. Returns false when `old_id` is absent.
    pub fn rename(&mut self, old_id: &str, entity: E) -> bool {
        let Some(position) = self.position(old_id) else {
            return false;
        };
        self.items.remove(old_id);
        let new_id = entity.id().to_string();
        if new_id != old_id && self.items.contains_key(&new_id) {
            // Already present under its confirmed ID; drop the placeholder
            self.order.remove(position);
            self.items.insert(new_id, entity);
        } else {
            self.order[position] = new_id.clone();
            self.items.insert(new_id, entity);
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<E> {
        let removed = self.items.remove(id)?;
        self.order.retain(|o| o != id);
        Some(removed)
    }

    /// Entities in display order.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the whole collection.
    pub fn replace_all(&mut self, entities: Vec<E>) {
        self.items.clear();
        self.order.clear();
        for entity in entities {
            self.upsert(entity);
        }
    }
}

/// Entities that live in an [`EntityCache`] slot.
pub trait Cached: Entity {
    fn slot(cache: &EntityCache) -> &Slot<Self>;
    fn slot_mut(cache: &mut EntityCache) -> &mut Slot<Self>;
}

/// The single in-memory source of truth for all four collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCache {
    tasks: Slot<Task>,
    issues: Slot<Issue>,
    sprints: Slot<Sprint>,
    epics: Slot<Epic>,
}

impl Cached for Task {
    fn slot(cache: &EntityCache) -> &Slot<Self> {
        &cache.tasks
    }
    fn slot_mut(cache: &mut EntityCache) -> &mut Slot<Self> {
        &mut cache.tasks
    }
}

impl Cached for Issue {
    fn slot(cache: &EntityCache) -> &Slot<Self> {
        &cache.issues
    }
    fn slot_mut(cache: &mut EntityCache) -> &mut Slot<Self> {
        &mut cache.issues
    }
}

impl Cached for Sprint {
    fn slot(cache: &EntityCache) -> &Slot<Self> {
        &cache.sprints
    }
    fn slot_mut(cache: &mut EntityCache) -> &mut Slot<Self> {
        &mut cache.sprints
    }
}

impl Cached for Epic {
    fn slot(cache: &EntityCache) -> &Slot<Self> {
        &cache.epics
    }
    fn slot_mut(cache: &mut EntityCache) -> &mut Slot<Self> {
        &mut cache.epics
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<E: Cached>(&self, id: &str) -> Option<&E> {
        E::slot(self).get(id)
    }

    pub fn contains<E: Cached>(&self, id: &str) -> bool {
        E::slot(self).contains(id)
    }

    pub fn upsert<E: Cached>(&mut self, entity: E) {
        E::slot_mut(self).upsert(entity);
    }

    pub fn remove<E: Cached>(&mut self, id: &str) -> Option<E> {
        E::slot_mut(self).remove(id)
    }

    /// All entities of one kind, in display order.
    pub fn list<E: Cached>(&self) -> impl Iterator<Item = &E> + '_ {
        E::slot(self).iter()
    }

    pub fn list_where<E: Cached>(&self, predicate: impl Fn(&E) -> bool) -> Vec<&E> {
        E::slot(self).iter().filter(|e| predicate(e)).collect()
    }

    pub fn len<E: Cached>(&self) -> usize {
        E::slot(self).len()
    }

    pub fn replace_all<E: Cached>(&mut self, entities: Vec<E>) {
        E::slot_mut(self).replace_all(entities);
    }

    pub fn slot<E: Cached>(&self) -> &Slot<E> {
        E::slot(self)
    }

    pub fn slot_mut<E: Cached>(&mut self) -> &mut Slot<E> {
        E::slot_mut(self)
    }

    /// Tasks whose title or ID contains `query` (case-insensitive).
    pub fn search_tasks(&self, query: &str) -> Vec<&Task> {
        let q = query.trim().to_lowercase();
        self.list_where::<Task>(|t| {
            q.is_empty() || t.title.to_lowercase().contains(&q) || t.id.to_lowercase().contains(&q)
        })
    }

    /// Issues whose title or ID contains `query` (case-insensitive).
    pub fn search_issues(&self, query: &str) -> Vec<&Issue> {
        let q = query.trim().to_lowercase();
        self.list_where::<Issue>(|i| {
            q.is_empty() || i.title.to_lowercase().contains(&q) || i.id.to_lowercase().contains(&q)
        })
    }
}
