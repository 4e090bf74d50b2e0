use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Directory entry for a team member. Credential material lives only in the store and is never
/// part of this record, so it is safe to persist as the local session artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "uid")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub joined_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Energetic,
    Happy,
    #[default]
    Neutral,
    Tired,
    Stressed,
}

impl Mood {
    pub const ALL: [Mood; 5] = [Mood::Energetic, Mood::Happy, Mood::Neutral, Mood::Tired, Mood::Stressed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Energetic => "energetic",
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Tired => "tired",
            Self::Stressed => "stressed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mood| mood.as_str() == raw)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Energetic => "能量满满",
            Self::Happy => "开心顺利",
            Self::Neutral => "平稳正常",
            Self::Tired => "有点疲惫",
            Self::Stressed => "压力山大",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: i64,
    pub text: String,
    pub progress: u8,
}

impl WorkItem {
    pub fn new(id: i64, text: impl Into<String>, progress: u8) -> Self {
        Self {
            id,
            text: text.into(),
            progress: normalize_progress(progress),
        }
    }

    /// `"{text} ({progress}%)"`, the line format of the legacy report body.
    pub fn render(&self) -> String {
        format!("{} ({}%)", self.text, self.progress)
    }

    pub fn progress_tier(&self) -> ProgressTier {
        ProgressTier::from_progress(self.progress)
    }
}

/// Snaps a percentage onto the 0..=100 scale in steps of ten.
pub fn normalize_progress(progress: u8) -> u8 {
    let clamped = progress.min(100);
    ((u16::from(clamped) + 5) / 10 * 10) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressTier {
    Behind,
    Underway,
    OnTrack,
}

impl ProgressTier {
    pub fn from_progress(progress: u8) -> Self {
        if progress < 30 {
            Self::Behind
        } else if progress < 70 {
            Self::Underway
        } else {
            Self::OnTrack
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group_name: String,
    pub date: String,
    #[serde(default)]
    pub today_work: String,
    #[serde(default)]
    pub work_items: Option<Vec<WorkItem>>,
    #[serde(default)]
    pub problems: String,
    #[serde(default)]
    pub tomorrow_plan: String,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub likes: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub created_at_millis: i64,
}

impl DailyReport {
    /// Structured items win when present; otherwise every non-blank line of the legacy body counts.
    pub fn work_count(&self) -> usize {
        match &self.work_items {
            Some(items) if !items.is_empty() => items.len(),
            _ => self
                .today_work
                .lines()
                .filter(|line| !line.trim().is_empty())
                .count(),
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.contains(user_id)
    }

    pub fn mention_text(&self) -> String {
        format!("{} {} {}", self.today_work, self.problems, self.tomorrow_plan)
    }

    pub fn search_text(&self) -> String {
        let item_text = self
            .work_items
            .as_ref()
            .map(|items| items.iter().map(|item| item.text.as_str()).collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        format!("{} {} {} {}", self.today_work, self.problems, self.tomorrow_plan, item_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Mention,
    Approval,
    System,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Approval => "approval",
            Self::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mention" => Some(Self::Mention),
            "approval" => Some(Self::Approval),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub link_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub content: String,
    pub link_id: Option<String>,
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|notification| !notification.read).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            daily: 8,
            weekly: 4,
            monthly: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub team_name: String,
    pub work_days: Vec<u8>,
    pub thresholds: Thresholds,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            team_name: "TeamDaily".to_string(),
            work_days: vec![1, 2, 3, 4, 5],
            thresholds: Thresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub invite_code: String,
    #[serde(default)]
    pub admin_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub user_id: String,
    pub user_name: String,
    pub group_id: Option<String>,
    pub group_name: String,
    pub date: String,
    pub today_work: String,
    pub work_items: Vec<WorkItem>,
    pub problems: String,
    pub tomorrow_plan: String,
    pub mood: Mood,
    pub created_at_millis: i64,
}

#[cfg(test)]
mod tests {
    use super::{normalize_progress, AppSettings, DailyReport, Mood, ProgressTier, User, WorkItem};
    use chrono::Utc;

    fn report(today_work: &str, items: Option<Vec<WorkItem>>) -> DailyReport {
        DailyReport {
            id: "r1".to_string(),
            user_id: "u1".to_string(),
            user_name: "Ana".to_string(),
            group_id: None,
            group_name: String::new(),
            date: "2024-06-01".to_string(),
            today_work: today_work.to_string(),
            work_items: items,
            problems: String::new(),
            tomorrow_plan: String::new(),
            mood: Mood::Neutral,
            likes: Default::default(),
            created_at: Utc::now(),
            created_at_millis: 0,
        }
    }

    #[test]
    fn legacy_work_count_skips_blank_lines() {
        let report = report("a\n\n  \nb\nc", None);
        assert_eq!(report.work_count(), 3);
    }

    #[test]
    fn structured_items_take_precedence() {
        let items = vec![WorkItem::new(1, "one", 100), WorkItem::new(2, "two", 40)];
        let report = report("one (100%)", Some(items));
        assert_eq!(report.work_count(), 2);
    }

    #[test]
    fn progress_snaps_to_steps_of_ten() {
        assert_eq!(normalize_progress(44), 40);
        assert_eq!(normalize_progress(45), 50);
        assert_eq!(normalize_progress(250), 100);
        assert_eq!(WorkItem::new(1, "x", 20).progress_tier(), ProgressTier::Behind);
        assert_eq!(WorkItem::new(1, "x", 70).progress_tier(), ProgressTier::OnTrack);
    }

    #[test]
    fn partial_settings_document_keeps_defaults() {
        let settings: AppSettings = serde_json::from_value(serde_json::json!({
            "teamName": "Core",
            "thresholds": { "daily": 5 }
        }))
        .expect("settings");
        assert_eq!(settings.team_name, "Core");
        assert_eq!(settings.work_days, vec![1, 2, 3, 4, 5]);
        assert_eq!(settings.thresholds.daily, 5);
        assert_eq!(settings.thresholds.monthly, 20);
    }

    #[test]
    fn user_serializes_uid_without_credentials() {
        let user = User {
            id: "abc".to_string(),
            email: "a@example.com".to_string(),
            name: "Ana".to_string(),
            role: super::Role::User,
            group_id: None,
            created_at: Utc::now(),
            joined_at: "2024-06-01".to_string(),
        };
        let value = serde_json::to_value(&user).expect("json");
        assert_eq!(value["uid"], "abc");
        assert_eq!(value["role"], "user");
        assert!(value.get("password").is_none());
    }
}
