//! Connected datasets and the current selection.
//!
//! The backend list is authoritative: the registry is only ever replaced
//! with a freshly fetched list, never patched locally. The selection is an id
//! into that list and is revalidated every time the list changes, so it is
//! `None` exactly when the list is empty.

use crate::api::FileItem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    files: Vec<FileItem>,
    selected: Option<String>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[FileItem] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_file(&self) -> Option<&FileItem> {
        let id = self.selected.as_deref()?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&FileItem> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Replaces the list after a plain refresh.
    ///
    /// A selection that survives is kept; otherwise the last item (most
    /// recently added) is selected.
    pub fn apply_refresh(&mut self, files: Vec<FileItem>) {
        self.files = files;
        self.reconcile();
    }

    /// Replaces the list after an add and selects the id the add returned.
    ///
    /// Returns `false` when the added id is not in the list; the selection
    /// then follows the refresh rule.
    pub fn apply_added(&mut self, files: Vec<FileItem>, added_id: &str) -> bool {
        self.files = files;
        if self.get(added_id).is_some() {
            self.selected = Some(added_id.to_string());
            return true;
        }
        tracing::warn!(file_id = added_id, "added file missing from refreshed list");
        self.reconcile();
        false
    }

    /// Replaces the list after a delete.
    ///
    /// If the removed file was selected, the last remaining item is selected.
    pub fn apply_removed(&mut self, files: Vec<FileItem>, removed_id: &str) {
        self.files = files;
        if self.selected.as_deref() == Some(removed_id) {
            self.selected = None;
        }
        self.reconcile();
    }

    /// Selects an existing file. Unknown ids leave the selection unchanged.
    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    fn reconcile(&mut self) {
        let still_present = self
            .selected
            .as_deref()
            .is_some_and(|id| self.files.iter().any(|f| f.id == id));
        if !still_present {
            self.selected = self.files.last().map(|f| f.id.clone());
        }
        tracing::debug!(
            files = self.files.len(),
            selected = ?self.selected,
            "file registry updated"
        );
    }
}
