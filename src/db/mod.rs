use crate::errors::{AppError, AppResult, AuthError};
use crate::models::{
    AppSettings, DailyReport, Group, Mood, NewNotification, NewReport, Notification, NotificationKind, Role, User,
    WorkItem,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("schema.sql");
const SETTINGS_KEY: &str = "global";

const USER_COLUMNS: &str = "id, email, name, role, group_id, created_at, joined_at";
const REPORT_COLUMNS: &str = "id, user_id, user_name, group_id, group_name, date, today_work, work_items_json,
     problems, tomorrow_plan, mood, likes_json, created_at, created_at_millis";
const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, content, read, link_id, created_at";

/// Document store backing the directory, report and notification collections.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|err| AppError::ConnectionFailed(err.to_string()))?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn ping(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|err| AppError::ConnectionFailed(err.to_string()))?;
        Ok(())
    }

    /// Fails with `EmailTaken` when the address is already registered. The existence check and
    /// the insert share one lock, and the unique index backs it up.
    pub fn insert_user(&self, name: &str, email: &str, role: Role, password_hash: &str) -> AppResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            group_id: None,
            created_at: now,
            joined_at: now.format("%Y-%m-%d").to_string(),
        };

        let conn = self.lock()?;
        let existing: i64 = conn.query_row(
            "SELECT COUNT(1) FROM users_directory WHERE email = ?1",
            [email],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(AuthError::EmailTaken.into());
        }
        conn.execute(
            "INSERT INTO users_directory (
               id, email, name, role, group_id, password_hash, joined_at, created_at
             ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.name,
                role.as_str(),
                password_hash,
                user.joined_at,
                format_time(now),
            ],
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
                AppError::Auth(AuthError::EmailTaken)
            }
            other => AppError::from(other),
        })?;
        Ok(user)
    }

    /// Directory entries for `email` with their stored password hashes, oldest first.
    pub fn users_with_credentials_by_email(&self, email: &str) -> AppResult<Vec<(User, String)>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {USER_COLUMNS}, password_hash
             FROM users_directory WHERE email = ?1 ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = statement.query_map([email], |row| Ok((parse_user_row(row)?, row.get::<_, String>(7)?)))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn email_exists(&self, email: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM users_directory WHERE email = ?1",
            [email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn list_users(&self) -> AppResult<Vec<User>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users_directory ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = statement.query_map([], parse_user_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users_directory WHERE id = ?1"),
            [user_id],
            parse_user_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    pub fn set_user_group(&self, user_id: &str, group_id: Option<&str>) -> AppResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE users_directory SET group_id = ?1 WHERE id = ?2",
            params![group_id, user_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }

    pub fn insert_group(&self, name: &str) -> AppResult<Group> {
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO team_groups (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![group.id, group.name, format_time(Utc::now())],
        )?;
        Ok(group)
    }

    pub fn list_groups(&self) -> AppResult<Vec<Group>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare("SELECT id, name FROM team_groups ORDER BY created_at ASC, rowid ASC")?;
        let rows = statement.query_map([], |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn insert_report(&self, report: &NewReport) -> AppResult<DailyReport> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let work_items = if report.work_items.is_empty() {
            None
        } else {
            Some(report.work_items.clone())
        };
        let work_items_json = work_items.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO daily_reports (
               id, user_id, user_name, group_id, group_name, date, today_work, work_items_json,
               problems, tomorrow_plan, mood, likes_json, created_at, created_at_millis
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, '[]', ?12, ?13)",
            params![
                id,
                report.user_id,
                report.user_name,
                report.group_id,
                report.group_name,
                report.date,
                report.today_work,
                work_items_json,
                report.problems,
                report.tomorrow_plan,
                report.mood.as_str(),
                format_time(now),
                report.created_at_millis,
            ],
        )?;

        Ok(DailyReport {
            id,
            user_id: report.user_id.clone(),
            user_name: report.user_name.clone(),
            group_id: report.group_id.clone(),
            group_name: report.group_name.clone(),
            date: report.date.clone(),
            today_work: report.today_work.clone(),
            work_items,
            problems: report.problems.clone(),
            tomorrow_plan: report.tomorrow_plan.clone(),
            mood: report.mood,
            likes: BTreeSet::new(),
            created_at: now,
            created_at_millis: report.created_at_millis,
        })
    }

    /// Newest first, the order every report view inherits.
    pub fn list_reports(&self) -> AppResult<Vec<DailyReport>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM daily_reports ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = statement.query_map([], parse_report_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_report(&self, report_id: &str) -> AppResult<Option<DailyReport>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM daily_reports WHERE id = ?1"),
            [report_id],
            parse_report_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Flips `user_id` in the report's like set. Returns whether the user likes the report afterwards.
    pub fn toggle_like(&self, report_id: &str, user_id: &str) -> AppResult<bool> {
        self.update_likes(report_id, |likes| {
            if likes.remove(user_id) {
                false
            } else {
                likes.insert(user_id.to_string())
            }
        })
    }

    // Read-modify-write under one connection lock keeps each like change atomic per report.
    fn update_likes<R>(&self, report_id: &str, apply: impl FnOnce(&mut BTreeSet<String>) -> R) -> AppResult<R> {
        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT likes_json FROM daily_reports WHERE id = ?1",
                [report_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(existing) = existing else {
            return Err(AppError::NotFound(format!("report {}", report_id)));
        };

        let mut likes: BTreeSet<String> = serde_json::from_str(&existing)
            .map_err(|error| AppError::Internal(format!("unreadable likes on report {}: {}", report_id, error)))?;
        let outcome = apply(&mut likes);
        conn.execute(
            "UPDATE daily_reports SET likes_json = ?1 WHERE id = ?2",
            params![serde_json::to_string(&likes)?, report_id],
        )?;
        Ok(outcome)
    }

    pub fn insert_notification(&self, notification: &NewNotification) -> AppResult<Notification> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (id, user_id, kind, content, read, link_id, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            params![
                id,
                notification.user_id,
                notification.kind.as_str(),
                notification.content,
                notification.link_id,
                format_time(now),
            ],
        )?;

        Ok(Notification {
            id,
            user_id: notification.user_id.clone(),
            kind: notification.kind,
            content: notification.content.clone(),
            read: false,
            created_at: now,
            link_id: notification.link_id.clone(),
        })
    }

    pub fn list_notifications_for(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = statement.query_map([user_id], parse_notification_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn get_notification(&self, notification_id: &str) -> AppResult<Option<Notification>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            [notification_id],
            parse_notification_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Read is terminal: there is no statement that sets the flag back to unread.
    pub fn mark_notification_read(&self, notification_id: &str) -> AppResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute("UPDATE notifications SET read = 1 WHERE id = ?1", [notification_id])?;
        if updated == 0 {
            return Err(AppError::NotFound(format!("notification {}", notification_id)));
        }
        Ok(())
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                [SETTINGS_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => match serde_json::from_str::<AppSettings>(&raw) {
                Ok(settings) => Ok(settings),
                Err(error) => {
                    tracing::warn!(error = %error, "stored settings are unreadable; using defaults");
                    Ok(AppSettings::default())
                }
            },
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings =
            serde_json::from_value(merged).map_err(|err| AppError::Validation(err.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![SETTINGS_KEY, serde_json::to_string(&settings)?, format_time(Utc::now())],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM settings WHERE key = ?1",
            [SETTINGS_KEY],
            |row| row.get(0),
        )?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    SETTINGS_KEY,
                    serde_json::to_string(&AppSettings::default())?,
                    format_time(Utc::now())
                ],
            )?;
        }
        Ok(())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

fn parse_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role_raw: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: Role::parse(&role_raw).ok_or_else(|| conversion_error(format!("Unknown role '{}'", role_raw)))?,
        group_id: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        joined_at: row.get(6)?,
    })
}

fn parse_report_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DailyReport> {
    let work_items_raw: Option<String> = row.get(7)?;
    let mood_raw: String = row.get(10)?;
    let likes_raw: String = row.get(11)?;
    Ok(DailyReport {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        group_id: row.get(3)?,
        group_name: row.get(4)?,
        date: row.get(5)?,
        today_work: row.get(6)?,
        work_items: work_items_raw.and_then(|raw| serde_json::from_str::<Vec<WorkItem>>(&raw).ok()),
        problems: row.get(8)?,
        tomorrow_plan: row.get(9)?,
        mood: Mood::parse(&mood_raw).unwrap_or_default(),
        likes: serde_json::from_str::<BTreeSet<String>>(&likes_raw).unwrap_or_default(),
        created_at: parse_time(&row.get::<_, String>(12)?)?,
        created_at_millis: row.get(13)?,
    })
}

fn parse_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let kind_raw: String = row.get(2)?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: NotificationKind::parse(&kind_raw)
            .ok_or_else(|| conversion_error(format!("Unknown notification type '{}'", kind_raw)))?,
        content: row.get(3)?,
        read: row.get::<_, i64>(4)? != 0,
        link_id: row.get(5)?,
        created_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| conversion_error(error.to_string()))
}

fn conversion_error(message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
