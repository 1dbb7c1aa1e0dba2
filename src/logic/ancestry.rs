use std::collections::{HashMap, HashSet, VecDeque};
use std::marker::PhantomData;

use crate::error::{Result, StoreError};
use crate::model::{Id, Model, ValueKind};

/// Walks the model inheritance graph breadth-first.
///
/// Generic over the lookup so it works against any snapshot of the graph.
pub struct Ancestry<'a, L>
where
    L: Fn(&Id) -> Option<&'a Model>,
{
    lookup: L,
    _graph: PhantomData<&'a Model>,
}

impl<'a, L> Ancestry<'a, L>
where
    L: Fn(&Id) -> Option<&'a Model>,
{
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            _graph: PhantomData,
        }
    }

    /// `start` followed by every model reachable through parent links, nearest first.
    ///
    /// Fails with `NotFound` if any model on the way is missing. Cycles are
    /// tolerated here; `check_acyclic` reports them.
    pub fn lineage(&self, start: &Id) -> Result<Vec<&'a Model>> {
        let mut seen: HashSet<&Id> = HashSet::new();
        let mut queue: VecDeque<&Id> = VecDeque::from([start]);
        let mut lineage = Vec::new();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let model = (self.lookup)(id)
                .ok_or_else(|| StoreError::not_found(format!("model '{}'", id)))?;
            lineage.push(model);
            queue.extend(model.parent_model_ids.iter());
        }

        Ok(lineage)
    }

    /// Ids of every model reachable from `parents`, including the parents themselves.
    pub fn ancestors_of_parents<'p>(
        &self,
        parents: impl IntoIterator<Item = &'p Id>,
    ) -> Result<HashSet<Id>> {
        let mut ancestors = HashSet::new();
        for parent in parents {
            for model in self.lineage(parent)? {
                if let Some(id) = &model.id {
                    ancestors.insert(id.clone());
                }
            }
        }
        Ok(ancestors)
    }

    /// Reject a model whose parents would make it its own ancestor.
    pub fn check_acyclic(&self, model: &Model) -> Result<()> {
        let Some(id) = &model.id else {
            // A model without an id cannot be referenced yet, so it cannot close a cycle
            return Ok(());
        };
        if model.parent_model_ids.contains(id) {
            return Err(StoreError::validation(format!(
                "model '{}' cannot inherit from itself",
                id
            )));
        }
        if self.ancestors_of_parents(&model.parent_model_ids)?.contains(id) {
            return Err(StoreError::validation(format!(
                "model '{}' would inherit from one of its own descendants",
                id
            )));
        }
        Ok(())
    }

    /// Field kinds visible through `start`'s lineage; the nearest definition wins.
    pub fn inherited_fields(&self, start: &Id) -> Result<HashMap<String, ValueKind>> {
        let mut fields = HashMap::new();
        for model in self.lineage(start)? {
            for property in &model.properties {
                fields
                    .entry(property.key().to_string())
                    .or_insert_with(|| property.kind());
            }
        }
        Ok(fields)
    }
}
