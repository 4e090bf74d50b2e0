use crate::models::{unread_count, AppSettings, DailyReport, Group, Notification, Role, User};
use crate::subscriptions::Snapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const CONNECTION_FAILED_MESSAGE: &str = "系统连接失败，请刷新重试";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Login,
    Dashboard,
    Submit,
    Reports,
    Analytics,
    Team,
    Settings,
}

impl View {
    pub fn requires_admin(self) -> bool {
        matches!(self, Self::Dashboard | Self::Team | Self::Settings)
    }

    pub fn landing_for(role: Role) -> Self {
        match role {
            Role::Admin => Self::Dashboard,
            Role::User => Self::Submit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    Connecting,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub view: View,
    pub connection: ConnectionStatus,
    pub user: Option<User>,
    pub reports: Snapshot<DailyReport>,
    pub members: Snapshot<User>,
    pub groups: Snapshot<Group>,
    pub settings: Arc<AppSettings>,
    pub notifications: Snapshot<Notification>,
    pub auth_error: Option<String>,
    pub highlight_report_id: Option<String>,
    pub summary: Option<String>,
    pub generating_summary: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            view: View::Login,
            connection: ConnectionStatus::Connecting,
            user: None,
            reports: Arc::new(Vec::new()),
            members: Arc::new(Vec::new()),
            groups: Arc::new(Vec::new()),
            settings: Arc::new(AppSettings::default()),
            notifications: Arc::new(Vec::new()),
            auth_error: None,
            highlight_report_id: None,
            summary: None,
            generating_summary: false,
        }
    }
}

impl AppState {
    pub fn unread_count(&self) -> usize {
        unread_count(&self.notifications)
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().map(User::is_admin).unwrap_or(false)
    }

    pub fn can_navigate(&self, view: View) -> bool {
        match &self.user {
            None => view == View::Login,
            Some(user) => view != View::Login && (!view.requires_admin() || user.is_admin()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionEstablished,
    ConnectionFailed(String),
    SessionRestored(Option<User>),
    LoggedIn(User),
    AuthFailed(String),
    LoggedOut,
    ReportsUpdated(Snapshot<DailyReport>),
    MembersUpdated(Snapshot<User>),
    GroupsUpdated(Snapshot<Group>),
    SettingsUpdated(Arc<AppSettings>),
    NotificationsUpdated(Snapshot<Notification>),
    Navigate(View),
    NotificationOpened { link_id: Option<String> },
    HighlightCleared,
    SummaryRequested,
    SummaryReady(String),
}

/// Single transition of the application state. Snapshot events that arrive after logout are
/// dropped, since every live query belongs to a signed-in session.
pub fn reduce(mut state: AppState, event: AppEvent) -> AppState {
    match event {
        AppEvent::ConnectionEstablished => {
            state.connection = ConnectionStatus::Ready;
        }
        AppEvent::ConnectionFailed(reason) => {
            tracing::warn!(reason = %reason, "document store connection failed");
            state.connection = ConnectionStatus::Failed;
            state.auth_error = Some(CONNECTION_FAILED_MESSAGE.to_string());
            if state.user.is_none() {
                state.view = View::Login;
            }
        }
        AppEvent::SessionRestored(Some(user)) | AppEvent::LoggedIn(user) => {
            state.view = View::landing_for(user.role);
            state.user = Some(user);
            state.auth_error = None;
        }
        AppEvent::SessionRestored(None) => {
            state.view = View::Login;
        }
        AppEvent::AuthFailed(message) => {
            state.auth_error = Some(message);
        }
        AppEvent::LoggedOut => {
            let connection = state.connection;
            let settings = state.settings.clone();
            state = AppState {
                connection,
                settings,
                ..AppState::default()
            };
        }
        AppEvent::ReportsUpdated(reports) => {
            if state.user.is_some() {
                state.reports = reports;
            }
        }
        AppEvent::MembersUpdated(members) => {
            if state.user.is_some() {
                state.members = members;
            }
        }
        AppEvent::GroupsUpdated(groups) => {
            if state.user.is_some() {
                state.groups = groups;
            }
        }
        AppEvent::SettingsUpdated(settings) => {
            state.settings = settings;
        }
        AppEvent::NotificationsUpdated(notifications) => {
            if state.user.is_some() {
                state.notifications = notifications;
            }
        }
        AppEvent::Navigate(view) => {
            if state.can_navigate(view) {
                state.view = view;
            }
        }
        AppEvent::NotificationOpened { link_id } => {
            if let Some(link_id) = link_id {
                if state.user.is_some() {
                    state.view = View::Reports;
                    state.highlight_report_id = Some(link_id);
                }
            }
        }
        AppEvent::HighlightCleared => {
            state.highlight_report_id = None;
        }
        AppEvent::SummaryRequested => {
            state.generating_summary = true;
        }
        AppEvent::SummaryReady(summary) => {
            state.generating_summary = false;
            state.summary = Some(summary);
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::{reduce, AppEvent, AppState, ConnectionStatus, View, CONNECTION_FAILED_MESSAGE};
    use crate::models::{Role, User};
    use chrono::Utc;
    use std::sync::Arc;

    fn user(role: Role) -> User {
        User {
            id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
            role,
            group_id: None,
            created_at: Utc::now(),
            joined_at: "2024-06-01".to_string(),
        }
    }

    fn run(events: Vec<AppEvent>) -> AppState {
        events.into_iter().fold(AppState::default(), reduce)
    }

    #[test]
    fn landing_view_depends_on_role() {
        let admin = run(vec![AppEvent::ConnectionEstablished, AppEvent::LoggedIn(user(Role::Admin))]);
        assert_eq!(admin.view, View::Dashboard);
        assert_eq!(admin.connection, ConnectionStatus::Ready);

        let member = run(vec![AppEvent::SessionRestored(Some(user(Role::User)))]);
        assert_eq!(member.view, View::Submit);

        let nobody = run(vec![AppEvent::SessionRestored(None)]);
        assert_eq!(nobody.view, View::Login);
    }

    #[test]
    fn connection_failure_keeps_login_with_message() {
        let state = run(vec![AppEvent::ConnectionFailed("offline".to_string())]);
        assert_eq!(state.view, View::Login);
        assert_eq!(state.connection, ConnectionStatus::Failed);
        assert_eq!(state.auth_error.as_deref(), Some(CONNECTION_FAILED_MESSAGE));
    }

    #[test]
    fn members_cannot_open_admin_views() {
        let state = run(vec![
            AppEvent::LoggedIn(user(Role::User)),
            AppEvent::Navigate(View::Dashboard),
            AppEvent::Navigate(View::Settings),
        ]);
        assert_eq!(state.view, View::Submit);

        let state = reduce(state, AppEvent::Navigate(View::Analytics));
        assert_eq!(state.view, View::Analytics);
    }

    #[test]
    fn opening_linked_notification_highlights_report() {
        let state = run(vec![
            AppEvent::LoggedIn(user(Role::User)),
            AppEvent::NotificationOpened {
                link_id: Some("r9".to_string()),
            },
        ]);
        assert_eq!(state.view, View::Reports);
        assert_eq!(state.highlight_report_id.as_deref(), Some("r9"));

        let state = reduce(state, AppEvent::HighlightCleared);
        assert!(state.highlight_report_id.is_none());
    }

    #[test]
    fn logout_clears_session_data_and_ignores_late_snapshots() {
        let state = run(vec![
            AppEvent::ConnectionEstablished,
            AppEvent::LoggedIn(user(Role::Admin)),
            AppEvent::MembersUpdated(Arc::new(vec![user(Role::Admin)])),
            AppEvent::SummaryRequested,
            AppEvent::SummaryReady("## Summary".to_string()),
            AppEvent::LoggedOut,
            AppEvent::MembersUpdated(Arc::new(vec![user(Role::Admin)])),
        ]);
        assert_eq!(state.view, View::Login);
        assert!(state.user.is_none());
        assert!(state.members.is_empty());
        assert!(state.summary.is_none());
        assert_eq!(state.connection, ConnectionStatus::Ready);
    }

    #[test]
    fn summary_flag_toggles() {
        let state = run(vec![AppEvent::LoggedIn(user(Role::Admin)), AppEvent::SummaryRequested]);
        assert!(state.generating_summary);
        let state = reduce(state, AppEvent::SummaryReady("done".to_string()));
        assert!(!state.generating_summary);
        assert_eq!(state.summary.as_deref(), Some("done"));
    }
}
