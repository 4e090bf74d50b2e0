use crate::models::{DailyReport, Mood};
use serde::{Deserialize, Serialize};

/// Conjunction of optional predicates over the report feed. Dates compare as `YYYY-MM-DD`
/// strings, which order the same way the dates do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportFilter {
    pub search: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub mood: Option<Mood>,
}

impl ReportFilter {
    pub fn matches(&self, report: &DailyReport) -> bool {
        if let Some(search) = non_empty(&self.search) {
            let needle = search.to_lowercase();
            if !report.search_text().to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(start) = non_empty(&self.start_date) {
            if report.date.as_str() < start {
                return false;
            }
        }
        if let Some(end) = non_empty(&self.end_date) {
            if report.date.as_str() > end {
                return false;
            }
        }
        if let Some(user_id) = non_empty(&self.user_id) {
            if report.user_id != user_id {
                return false;
            }
        }
        if let Some(group_id) = non_empty(&self.group_id) {
            if report.group_id.as_deref() != Some(group_id) {
                return false;
            }
        }
        if let Some(mood) = self.mood {
            if report.mood != mood {
                return false;
            }
        }
        true
    }

    /// Keeps feed order; nothing is re-sorted.
    pub fn apply<'a>(&self, reports: &'a [DailyReport]) -> Vec<&'a DailyReport> {
        reports.iter().filter(|report| self.matches(report)).collect()
    }

    /// Number of panel filters in use. Free-text search is shown separately and not counted.
    pub fn active_count(&self) -> usize {
        [
            non_empty(&self.start_date).is_some(),
            non_empty(&self.end_date).is_some(),
            non_empty(&self.user_id).is_some(),
            non_empty(&self.group_id).is_some(),
            self.mood.is_some(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
