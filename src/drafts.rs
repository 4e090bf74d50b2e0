use crate::errors::{AppError, AppResult};
use crate::models::{normalize_progress, Mood, WorkItem};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Report being composed before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub work_items: Vec<WorkItem>,
    pub problems: String,
    pub tomorrow_plan: String,
    pub mood: Mood,
}

impl Default for ReportDraft {
    fn default() -> Self {
        Self {
            work_items: vec![WorkItem::new(Utc::now().timestamp_millis(), "", 100)],
            problems: String::new(),
            tomorrow_plan: String::new(),
            mood: Mood::Neutral,
        }
    }
}

impl ReportDraft {
    pub fn add_item(&mut self) -> i64 {
        let last = self.work_items.iter().map(|item| item.id).max().unwrap_or(0);
        let id = Utc::now().timestamp_millis().max(last + 1);
        self.work_items.push(WorkItem::new(id, "", 0));
        id
    }

    pub fn set_item_text(&mut self, id: i64, text: impl Into<String>) -> bool {
        match self.work_items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_item_progress(&mut self, id: i64, progress: u8) -> bool {
        match self.work_items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.progress = normalize_progress(progress);
                true
            }
            None => false,
        }
    }

    /// The last remaining item cannot be removed.
    pub fn remove_item(&mut self, id: i64) -> bool {
        if self.work_items.len() <= 1 {
            return false;
        }
        let before = self.work_items.len();
        self.work_items.retain(|item| item.id != id);
        self.work_items.len() != before
    }

    pub fn filled_items(&self) -> Vec<WorkItem> {
        self.work_items
            .iter()
            .filter(|item| !item.text.trim().is_empty())
            .cloned()
            .collect()
    }

    pub fn validated_items(&self) -> AppResult<Vec<WorkItem>> {
        let items = self.filled_items();
        if items.is_empty() {
            return Err(AppError::Validation("at least one work item is required".to_string()));
        }
        Ok(items)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub fn legacy_body(items: &[WorkItem]) -> String {
    items.iter().map(WorkItem::render).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::{legacy_body, ReportDraft};
    use crate::errors::AppError;
    use crate::models::Mood;

    #[test]
    fn fresh_draft_has_one_complete_item() {
        let draft = ReportDraft::default();
        assert_eq!(draft.work_items.len(), 1);
        assert_eq!(draft.work_items[0].progress, 100);
        assert_eq!(draft.mood, Mood::Neutral);
    }

    #[test]
    fn added_items_start_at_zero_with_unique_ids() {
        let mut draft = ReportDraft::default();
        let first = draft.add_item();
        let second = draft.add_item();
        assert_ne!(first, second);
        assert_eq!(draft.work_items.len(), 3);
        assert_eq!(draft.work_items[2].progress, 0);
    }

    #[test]
    fn last_item_cannot_be_removed() {
        let mut draft = ReportDraft::default();
        let only = draft.work_items[0].id;
        assert!(!draft.remove_item(only));

        let extra = draft.add_item();
        assert!(draft.remove_item(extra));
        assert!(!draft.remove_item(extra));
        assert_eq!(draft.work_items.len(), 1);
    }

    #[test]
    fn blank_items_are_dropped_and_empty_draft_rejected() {
        let mut draft = ReportDraft::default();
        let id = draft.work_items[0].id;
        assert!(matches!(draft.validated_items(), Err(AppError::Validation(_))));

        draft.set_item_text(id, "Ship login");
        draft.set_item_progress(id, 73);
        let extra = draft.add_item();
        draft.set_item_text(extra, "   ");

        let items = draft.validated_items().expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].progress, 70);
        assert_eq!(legacy_body(&items), "Ship login (70%)");

        draft.reset();
        assert_eq!(draft.work_items.len(), 1);
    }
}
