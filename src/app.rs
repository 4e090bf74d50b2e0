use crate::aggregation::{self, Achievement, CalendarMonth, ChartPoint, DashboardStats};
use crate::auth::{self, AdmissionPolicy};
use crate::config::AppConfig;
use crate::db::Database;
use crate::drafts::{legacy_body, ReportDraft};
use crate::errors::{AppError, AppResult, AuthError};
use crate::filters::ReportFilter;
use crate::mentions::mention_notifications;
use crate::models::{
    unread_count, AppSettings, DailyReport, Group, LoginPayload, NewReport, Notification, RegisterPayload, User,
};
use crate::session::SessionStore;
use crate::subscriptions::{SnapshotHub, Subscription};
use crate::summary::SummaryClient;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub report: DailyReport,
    pub notified: usize,
    pub failed_notifications: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberMonth {
    pub calendar: CalendarMonth,
    pub series: Vec<ChartPoint>,
    pub achievements: Vec<Achievement>,
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Owns every collaborator of a running client and republishes the affected collections after each
/// write, so subscribers always see whole, current snapshots.
#[derive(Debug)]
pub struct TeamDailyCore {
    db: Arc<Database>,
    sessions: SessionStore,
    hub: SnapshotHub,
    summary: SummaryClient,
    admission: AdmissionPolicy,
    current_user: RwLock<Option<User>>,
    data_dir: PathBuf,
}

impl TeamDailyCore {
    pub fn new(config: &AppConfig) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&config.database_path())?);
        if config.admission.uses_placeholder_secrets() {
            tracing::warn!("admission secrets are the built-in placeholders; configure real values before sharing");
        }

        Ok(Arc::new(Self {
            db,
            sessions: SessionStore::new(&config.data_dir),
            hub: SnapshotHub::new(),
            summary: SummaryClient::new(config.summary.clone()),
            admission: config.admission.clone(),
            current_user: RwLock::new(None),
            data_dir: config.data_dir.clone(),
        }))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Connectivity check, session restore and first publication of every collection.
    pub async fn bootstrap(&self) -> AppResult<Option<User>> {
        self.db.ping()?;
        let restored = self.sessions.load()?;
        if let Some(user) = &restored {
            tracing::info!(user_id = %user.id, "restored local session");
            self.publish_notifications_for(&user.id);
        }
        *self.current_user.write().await = restored.clone();

        self.publish_reports();
        self.publish_directory();
        self.publish_settings();
        Ok(restored)
    }

    pub async fn login(&self, payload: LoginPayload) -> AppResult<User> {
        let user = auth::login(&self.db, &payload)?;
        self.start_session(&user).await?;
        tracing::info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    pub async fn register(&self, payload: RegisterPayload) -> AppResult<User> {
        let user = auth::register(&self.db, &self.admission, &payload)?;
        self.start_session(&user).await?;
        self.publish_directory();
        Ok(user)
    }

    pub async fn logout(&self) -> AppResult<()> {
        let previous = self.current_user.write().await.take();
        self.sessions.clear()?;
        let pruned = self.hub.prune_notification_channels();
        if let Some(user) = previous {
            tracing::info!(user_id = %user.id, pruned, "signed out");
        }
        Ok(())
    }

    pub async fn current_user(&self) -> Option<User> {
        self.current_user.read().await.clone()
    }

    async fn start_session(&self, user: &User) -> AppResult<()> {
        self.sessions.save(user)?;
        *self.current_user.write().await = Some(user.clone());
        self.publish_notifications_for(&user.id);
        Ok(())
    }

    async fn require_user(&self) -> AppResult<User> {
        self.current_user().await.ok_or(AppError::Auth(AuthError::NotSignedIn))
    }

    async fn require_admin(&self) -> AppResult<User> {
        let user = self.require_user().await?;
        if !user.is_admin() {
            return Err(AuthError::Forbidden.into());
        }
        Ok(user)
    }

    pub async fn submit_report(&self, draft: &ReportDraft) -> AppResult<SubmitOutcome> {
        let author = self.require_user().await?;
        let items = draft.validated_items()?;

        let members = self.db.list_users()?;
        let group_id = members
            .iter()
            .find(|member| member.id == author.id)
            .and_then(|member| member.group_id.clone());
        let group_name = match &group_id {
            Some(group_id) => self
                .db
                .list_groups()?
                .into_iter()
                .find(|group| &group.id == group_id)
                .map(|group| group.name)
                .unwrap_or_default(),
            None => String::new(),
        };

        let report = self.db.insert_report(&NewReport {
            user_id: author.id.clone(),
            user_name: author.name.clone(),
            group_id,
            group_name,
            date: aggregation::format_date(today()),
            today_work: legacy_body(&items),
            work_items: items,
            problems: draft.problems.clone(),
            tomorrow_plan: draft.tomorrow_plan.clone(),
            mood: draft.mood,
            created_at_millis: Utc::now().timestamp_millis(),
        })?;
        tracing::info!(report_id = %report.id, user_id = %author.id, items = report.work_count(), "report submitted");
        self.publish_reports();

        let mut notified = 0;
        let mut failed_notifications = 0;
        for notification in mention_notifications(&report, &members) {
            match self.db.insert_notification(&notification) {
                Ok(_) => {
                    notified += 1;
                    self.publish_notifications_for(&notification.user_id);
                }
                Err(error) => {
                    failed_notifications += 1;
                    tracing::warn!(
                        report_id = %report.id,
                        recipient = %notification.user_id,
                        error = %error,
                        "failed to write mention notification"
                    );
                }
            }
        }

        Ok(SubmitOutcome {
            report,
            notified,
            failed_notifications,
        })
    }

    /// Returns whether the current user likes the report afterwards.
    pub async fn toggle_like(&self, report_id: &str) -> AppResult<bool> {
        let user = self.require_user().await?;
        let liked = self.db.toggle_like(report_id, &user.id)?;
        self.publish_reports();
        Ok(liked)
    }

    pub async fn notifications(&self) -> AppResult<Vec<Notification>> {
        let user = self.require_user().await?;
        self.db.list_notifications_for(&user.id)
    }

    pub async fn unread_count(&self) -> AppResult<usize> {
        Ok(unread_count(&self.notifications().await?))
    }

    pub async fn mark_notification_read(&self, notification_id: &str) {
        match self.db.mark_notification_read(notification_id) {
            Ok(()) => {
                if let Some(user) = self.current_user().await {
                    self.publish_notifications_for(&user.id);
                }
            }
            Err(error) => {
                tracing::warn!(notification_id, error = %error, "failed to mark notification read");
            }
        }
    }

    /// Marks the notification read and yields the linked report id, if any.
    pub async fn open_notification(&self, notification_id: &str) -> Option<String> {
        let link_id = match self.db.get_notification(notification_id) {
            Ok(notification) => notification.and_then(|notification| notification.link_id),
            Err(error) => {
                tracing::warn!(notification_id, error = %error, "failed to load notification");
                None
            }
        };
        self.mark_notification_read(notification_id).await;
        link_id
    }

    pub async fn search_reports(&self, filter: &ReportFilter) -> AppResult<Vec<DailyReport>> {
        self.require_user().await?;
        let reports = self.db.list_reports()?;
        Ok(filter.apply(&reports).into_iter().cloned().collect())
    }

    pub async fn dashboard(&self, today: NaiveDate, group_id: Option<&str>) -> AppResult<DashboardStats> {
        self.require_admin().await?;
        let reports = self.db.list_reports()?;
        let team_size = self.db.list_users()?.len();
        Ok(aggregation::dashboard(&reports, today, team_size, group_id))
    }

    /// Members may only look at their own month; admins at anyone's.
    pub async fn member_month(&self, member_id: &str, year: i32, month: u32) -> AppResult<MemberMonth> {
        let user = self.require_user().await?;
        if !user.is_admin() && user.id != member_id {
            return Err(AuthError::Forbidden.into());
        }

        let reports = self.db.list_reports()?;
        let settings = self.db.get_settings()?;
        let calendar = aggregation::calendar(&reports, member_id, year, month, &settings.thresholds)?;
        Ok(MemberMonth {
            series: calendar.series(),
            achievements: aggregation::achievements(&calendar),
            calendar,
        })
    }

    pub async fn generate_summary(&self, today: NaiveDate) -> AppResult<String> {
        self.require_admin().await?;
        let date = aggregation::format_date(today);
        let reports = self
            .db
            .list_reports()?
            .into_iter()
            .filter(|report| report.date == date)
            .collect::<Vec<_>>();
        tracing::info!(date = %date, reports = reports.len(), model = self.summary.model(), "generating team summary");
        Ok(self.summary.generate_team_summary(&reports).await)
    }

    pub async fn create_group(&self, name: &str) -> AppResult<Group> {
        self.require_admin().await?;
        if name.trim().is_empty() {
            return Err(AppError::Validation("group name is required".to_string()));
        }
        let group = self.db.insert_group(name)?;
        self.publish_directory();
        Ok(group)
    }

    pub async fn assign_member_group(&self, user_id: &str, group_id: Option<&str>) -> AppResult<()> {
        self.require_admin().await?;
        if let Some(group_id) = group_id {
            if !self.db.list_groups()?.iter().any(|group| group.id == group_id) {
                return Err(AppError::NotFound(format!("group {}", group_id)));
            }
        }
        self.db.set_user_group(user_id, group_id)?;
        self.publish_directory();
        Ok(())
    }

    pub async fn settings(&self) -> AppResult<AppSettings> {
        self.db.get_settings()
    }

    pub async fn update_settings(&self, patch: serde_json::Value) -> AppResult<AppSettings> {
        self.require_admin().await?;
        let settings = self.db.update_settings(patch)?;
        self.hub.publish_settings(settings.clone());
        Ok(settings)
    }

    pub fn subscribe_reports(&self) -> Subscription<Vec<DailyReport>> {
        self.hub.subscribe_reports()
    }

    pub fn subscribe_members(&self) -> Subscription<Vec<User>> {
        self.hub.subscribe_members()
    }

    pub fn subscribe_groups(&self) -> Subscription<Vec<Group>> {
        self.hub.subscribe_groups()
    }

    pub fn subscribe_settings(&self) -> Subscription<AppSettings> {
        self.hub.subscribe_settings()
    }

    pub fn subscribe_notifications(&self, user_id: &str) -> Subscription<Vec<Notification>> {
        let subscription = self.hub.subscribe_notifications(user_id);
        self.publish_notifications_for(user_id);
        subscription
    }

    fn publish_reports(&self) {
        match self.db.list_reports() {
            Ok(reports) => self.hub.publish_reports(reports),
            Err(error) => tracing::warn!(error = %error, "failed to refresh report feed"),
        }
    }

    fn publish_directory(&self) {
        match self.db.list_users() {
            Ok(members) => self.hub.publish_members(members),
            Err(error) => tracing::warn!(error = %error, "failed to refresh member directory"),
        }
        match self.db.list_groups() {
            Ok(groups) => self.hub.publish_groups(groups),
            Err(error) => tracing::warn!(error = %error, "failed to refresh groups"),
        }
    }

    fn publish_settings(&self) {
        match self.db.get_settings() {
            Ok(settings) => self.hub.publish_settings(settings),
            Err(error) => tracing::warn!(error = %error, "failed to refresh settings"),
        }
    }

    fn publish_notifications_for(&self, user_id: &str) {
        match self.db.list_notifications_for(user_id) {
            Ok(notifications) => self.hub.publish_notifications(user_id, notifications),
            Err(error) => tracing::warn!(user_id, error = %error, "failed to refresh notifications"),
        }
    }
}
