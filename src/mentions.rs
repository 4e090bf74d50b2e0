use crate::models::{DailyReport, NewNotification, NotificationKind, User};

/// Members mentioned in `text`, excluding the author.
///
/// Matching is a literal substring test on `@<display name>`, so a short name that prefixes a
/// longer one also matches (`@Alice Smith` mentions both `Alice Smith` and `Alice`). Each member is
/// matched at most once regardless of how often the name appears.
pub fn detect_mentions<'a>(text: &str, members: &'a [User], author_id: &str) -> Vec<&'a User> {
    members
        .iter()
        .filter(|member| member.id != author_id && !member.name.is_empty())
        .filter(|member| text.contains(&format!("@{}", member.name)))
        .collect()
}

pub fn mention_notifications(report: &DailyReport, members: &[User]) -> Vec<NewNotification> {
    let text = report.mention_text();
    detect_mentions(&text, members, &report.user_id)
        .into_iter()
        .map(|member| NewNotification {
            user_id: member.id.clone(),
            kind: NotificationKind::Mention,
            content: format!("{} mentioned you in their daily report.", report.user_name),
            link_id: Some(report.id.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{detect_mentions, mention_notifications};
    use crate::models::{DailyReport, Mood, NotificationKind, Role, User};
    use chrono::Utc;

    fn member(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: name.to_string(),
            role: Role::User,
            group_id: None,
            created_at: Utc::now(),
            joined_at: "2024-06-01".to_string(),
        }
    }

    fn names(users: Vec<&User>) -> Vec<String> {
        users.into_iter().map(|user| user.name.clone()).collect()
    }

    #[test]
    fn exact_name_is_matched_and_longer_name_is_not() {
        let members = vec![member("a", "Alice"), member("b", "Alice Smith"), member("c", "Bob")];
        let found = detect_mentions("sync with @Alice tomorrow", &members, "c");
        assert_eq!(names(found), vec!["Alice".to_string()]);
    }

    #[test]
    fn longer_mention_also_matches_shorter_prefix_name() {
        let members = vec![member("a", "Alice"), member("b", "Alice Smith")];
        let found = detect_mentions("thanks @Alice Smith", &members, "z");
        assert_eq!(names(found), vec!["Alice".to_string(), "Alice Smith".to_string()]);
    }

    #[test]
    fn short_name_matches_inside_longer_handle() {
        let members = vec![member("a", "Al")];
        let found = detect_mentions("ping @Alice", &members, "z");
        assert_eq!(names(found), vec!["Al".to_string()]);
    }

    #[test]
    fn author_and_bare_names_are_ignored() {
        let members = vec![member("a", "Alice"), member("b", "Bob")];
        assert!(detect_mentions("@Alice wrote this, Bob reviewed", &members, "a").is_empty());
    }

    #[test]
    fn one_notification_per_member_linking_the_report() {
        let members = vec![member("a", "Alice"), member("b", "Bob")];
        let report = DailyReport {
            id: "r1".to_string(),
            user_id: "b".to_string(),
            user_name: "Bob".to_string(),
            group_id: None,
            group_name: String::new(),
            date: "2024-06-01".to_string(),
            today_work: "pair with @Alice (100%)".to_string(),
            work_items: None,
            problems: "blocked on @Alice".to_string(),
            tomorrow_plan: "demo to @Alice".to_string(),
            mood: Mood::Neutral,
            likes: Default::default(),
            created_at: Utc::now(),
            created_at_millis: 0,
        };

        let notifications = mention_notifications(&report, &members);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].user_id, "a");
        assert_eq!(notifications[0].kind, NotificationKind::Mention);
        assert_eq!(notifications[0].content, "Bob mentioned you in their daily report.");
        assert_eq!(notifications[0].link_id.as_deref(), Some("r1"));
    }
}
