use crate::errors::{AppError, AppResult};
use crate::models::User;
use std::fs;
use std::path::{Path, PathBuf};

pub const SESSION_FILE_NAME: &str = "teamdaily_user.json";

/// Local session artifact: a JSON copy of the signed-in user. There is no expiry and nothing
/// server-side to invalidate, so clearing the file is the whole of logout.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AppResult<Option<User>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(AppError::from(error)),
        };

        match serde_json::from_str::<User>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(error) => {
                tracing::warn!(path = %self.path.to_string_lossy(), error = %error, "discarding malformed session");
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn save(&self, user: &User) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(user)?)?;
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(AppError::from(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStore;
    use crate::models::{Role, User};
    use chrono::Utc;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            email: "ana@example.com".to_string(),
            name: "Ana".to_string(),
            role: Role::Admin,
            group_id: Some("g1".to_string()),
            created_at: Utc::now(),
            joined_at: "2024-06-01".to_string(),
        }
    }

    #[test]
    fn saved_session_is_restored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        assert!(store.load().expect("empty").is_none());

        let user = user();
        store.save(&user).expect("save");
        assert_eq!(store.load().expect("load"), Some(user));

        store.clear().expect("clear");
        store.clear().expect("clear twice");
        assert!(store.load().expect("cleared").is_none());
    }

    #[test]
    fn malformed_session_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path());
        std::fs::write(store.path(), "{not json").expect("write");

        assert!(store.load().expect("load").is_none());
        assert!(!store.path().exists());
    }
}
