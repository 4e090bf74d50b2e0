use crate::models::{AppSettings, DailyReport, Group, Notification, User};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub type Snapshot<T> = Arc<Vec<T>>;

/// Handle on a live query. Each emission is the complete collection, replacing whatever the
/// holder cached before. Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: watch::Receiver<Arc<T>>,
}

impl<T> Subscription<T> {
    fn new(receiver: watch::Receiver<Arc<T>>) -> Self {
        Self { receiver }
    }

    pub fn current(&self) -> Arc<T> {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot. `None` once the publishing side has shut down.
    pub async fn next(&mut self) -> Option<Arc<T>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn has_pending(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    pub fn cancel(self) {}
}

#[derive(Debug)]
pub struct SnapshotHub {
    reports: watch::Sender<Snapshot<DailyReport>>,
    members: watch::Sender<Snapshot<User>>,
    groups: watch::Sender<Snapshot<Group>>,
    settings: watch::Sender<Arc<AppSettings>>,
    notifications: Mutex<HashMap<String, watch::Sender<Snapshot<Notification>>>>,
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self {
            reports: watch::Sender::new(Arc::new(Vec::new())),
            members: watch::Sender::new(Arc::new(Vec::new())),
            groups: watch::Sender::new(Arc::new(Vec::new())),
            settings: watch::Sender::new(Arc::new(AppSettings::default())),
            notifications: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe_reports(&self) -> Subscription<Vec<DailyReport>> {
        Subscription::new(self.reports.subscribe())
    }

    pub fn subscribe_members(&self) -> Subscription<Vec<User>> {
        Subscription::new(self.members.subscribe())
    }

    pub fn subscribe_groups(&self) -> Subscription<Vec<Group>> {
        Subscription::new(self.groups.subscribe())
    }

    pub fn subscribe_settings(&self) -> Subscription<AppSettings> {
        Subscription::new(self.settings.subscribe())
    }

    pub fn subscribe_notifications(&self, user_id: &str) -> Subscription<Vec<Notification>> {
        let mut channels = self.notifications.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let sender = channels
            .entry(user_id.to_string())
            .or_insert_with(|| watch::Sender::new(Arc::new(Vec::new())));
        Subscription::new(sender.subscribe())
    }

    pub fn publish_reports(&self, reports: Vec<DailyReport>) {
        self.reports.send_replace(Arc::new(reports));
    }

    pub fn publish_members(&self, members: Vec<User>) {
        self.members.send_replace(Arc::new(members));
    }

    pub fn publish_groups(&self, groups: Vec<Group>) {
        self.groups.send_replace(Arc::new(groups));
    }

    pub fn publish_settings(&self, settings: AppSettings) {
        self.settings.send_replace(Arc::new(settings));
    }

    /// No-op for recipients nobody subscribed to; their channel is created on first subscribe.
    pub fn publish_notifications(&self, user_id: &str, notifications: Vec<Notification>) {
        let channels = self.notifications.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(sender) = channels.get(user_id) {
            sender.send_replace(Arc::new(notifications));
        }
    }

    pub fn notification_channel_count(&self) -> usize {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Drops per-recipient channels nobody is listening to any more.
    pub fn prune_notification_channels(&self) -> usize {
        let mut channels = self.notifications.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SnapshotHub;
    use crate::models::{AppSettings, Group, Notification, NotificationKind};
    use chrono::Utc;

    fn notification(user_id: &str) -> Notification {
        Notification {
            id: format!("n-{}", user_id),
            user_id: user_id.to_string(),
            kind: NotificationKind::Mention,
            content: "Lead mentioned you in their daily report.".to_string(),
            read: false,
            created_at: Utc::now(),
            link_id: None,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_whole_snapshots() {
        let hub = SnapshotHub::new();
        let mut groups = hub.subscribe_groups();
        assert!(groups.current().is_empty());

        hub.publish_groups(vec![Group {
            id: "g1".to_string(),
            name: "Platform".to_string(),
        }]);
        let snapshot = groups.next().await.expect("snapshot");
        assert_eq!(snapshot.len(), 1);

        hub.publish_groups(Vec::new());
        assert!(groups.has_pending());
        assert!(groups.next().await.expect("replacement").is_empty());
    }

    #[tokio::test]
    async fn settings_snapshot_replaces_previous_value() {
        let hub = SnapshotHub::new();
        let mut settings = hub.subscribe_settings();
        hub.publish_settings(AppSettings {
            team_name: "Core".to_string(),
            ..AppSettings::default()
        });
        assert_eq!(settings.next().await.expect("settings").team_name, "Core");
    }

    #[tokio::test]
    async fn notification_channels_exist_only_for_subscribers() {
        let hub = SnapshotHub::new();
        let mut ana = hub.subscribe_notifications("ana");
        hub.publish_notifications("bob", vec![notification("bob")]);
        assert_eq!(hub.notification_channel_count(), 1);
        assert!(!ana.has_pending());

        hub.publish_notifications("ana", vec![notification("ana")]);
        assert_eq!(ana.next().await.expect("inbox").len(), 1);

        assert_eq!(hub.prune_notification_channels(), 0);
        ana.cancel();
        assert_eq!(hub.prune_notification_channels(), 1);
        assert_eq!(hub.notification_channel_count(), 0);
    }
}
