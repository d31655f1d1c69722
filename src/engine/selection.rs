use std::collections::HashSet;

use uuid::Uuid;

/// Order ids picked for a batch operation. Lives entirely on the console side;
/// nothing here reaches the backend until a commit is made from it.
#[derive(Debug, Default, Clone)]
pub struct SelectionSet {
    ids: HashSet<Uuid>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the id was newly added.
    pub fn select(&mut self, id: Uuid) -> bool {
        self.ids.insert(id)
    }

    /// Returns true if the id was present.
    pub fn deselect(&mut self, id: Uuid) -> bool {
        self.ids.remove(&id)
    }

    /// Returns the new membership state of the id.
    pub fn toggle(&mut self, id: Uuid) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn select_all(&mut self, visible: impl IntoIterator<Item = Uuid>) {
        self.ids.extend(visible);
    }

    pub fn deselect_all(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in a stable order, for deterministic request payloads.
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.ids.iter().copied().collect();
        ids.sort();
        ids
    }

    /// False when nothing is visible, so a header checkbox over an empty page
    /// never shows as checked.
    pub fn is_all_selected(&self, visible: &[Uuid]) -> bool {
        !visible.is_empty() && visible.iter().all(|id| self.ids.contains(id))
    }
}
