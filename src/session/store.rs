use super::message::{Message, Session, SessionRecord};
use crate::error::{AgError, Result, StoreCause, StoreResultExt};

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_SESSION: &str = "DEFAULT_SESSION";
const SESSIONS_DIR: &str = "sessions";
const POINTER_FILE: &str = "CURRENT_SESSION";
const RECORD_EXT: &str = "json";

/// Durable session name -> message log mapping plus the current-session pointer.
///
/// Layout under `root`:
///
/// ```text
/// root/
///   CURRENT_SESSION        name of the current session
///   sessions/<name>.json   {"messages": [...]}
/// ```
///
/// Every write goes to a temporary sibling and is renamed into place, so
/// readers only ever see complete records. One writer per session at a time;
/// two processes appending to the same session may lose a turn.
pub struct SessionStore {
    root: PathBuf,
}

/// Outcome of [`SessionStore::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deletion {
    /// A record existed and was removed.
    pub existed: bool,
    /// The session was current; the default session is current now.
    pub was_current: bool,
}

impl SessionStore {
    /// Opens the store, creating directories and the default session as needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        store.ensure_directories()?;

        let pointer_ok = match store.read_pointer()? {
            Some(name) => store.record_path(&name)?.exists(),
            None => false,
        };
        if !pointer_ok {
            store.switch_current(DEFAULT_SESSION)?;
        }

        Ok(store)
    }

    fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(self.sessions_dir()).map_err(|e| {
            AgError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", self.sessions_dir().display(), e),
            ))
        })
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join(SESSIONS_DIR)
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join(POINTER_FILE)
    }

    fn record_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self
            .sessions_dir()
            .join(format!("{}.{}", name, RECORD_EXT)))
    }

    /// Loads a session. A zero-length record reads as an empty session.
    pub fn load(&self, name: &str) -> Result<Session> {
        let path = self.record_path(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AgError::SessionNotFound(name.to_string()));
            }
            Err(e) => return Err(AgError::store(name, e)),
        };

        if content.trim().is_empty() {
            return Ok(Session::empty(name));
        }

        let record: SessionRecord = serde_json::from_str(&content).for_session(name)?;
        Ok(Session {
            name: name.to_string(),
            messages: record.messages,
        })
    }

    /// Returns the existing session unchanged, or creates an empty one.
    pub fn create(&self, name: &str) -> Result<Session> {
        self.load_or_create(name).map(|(session, _)| session)
    }

    fn load_or_create(&self, name: &str) -> Result<(Session, bool)> {
        match self.load(name) {
            Ok(session) => Ok((session, false)),
            Err(AgError::SessionNotFound(_)) => {
                let session = Session::empty(name);
                self.write_record(name, &SessionRecord::default())?;
                tracing::info!(session = name, "Created session");
                Ok((session, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Makes `name` the current session, creating it first if absent.
    /// Returns `true` when the session was newly created.
    pub fn switch_current(&self, name: &str) -> Result<bool> {
        let (_, created) = self.load_or_create(name)?;
        write_atomic(&self.pointer_path(), name.as_bytes()).for_session(name)?;
        tracing::info!(session = name, "Switched current session");
        Ok(created)
    }

    /// Name of the current session. A record removed behind our back is
    /// re-materialized empty so the pointer keeps resolving.
    pub fn current(&self) -> Result<String> {
        match self.read_pointer()? {
            Some(name) => {
                self.create(&name)?;
                Ok(name)
            }
            None => {
                self.switch_current(DEFAULT_SESSION)?;
                Ok(DEFAULT_SESSION.to_string())
            }
        }
    }

    fn read_pointer(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.pointer_path()) {
            Ok(content) => {
                let name = content.trim();
                if name.is_empty() || validate_name(name).is_err() {
                    tracing::warn!(pointer = name, "Ignoring unusable current-session pointer");
                    Ok(None)
                } else {
                    Ok(Some(name.to_string()))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AgError::store(POINTER_FILE, e)),
        }
    }

    /// Appends one message and rewrites the record. Creates the session on
    /// first write.
    pub fn append(&self, name: &str, message: Message) -> Result<()> {
        let (session, _) = self.load_or_create(name)?;
        let mut record = SessionRecord {
            messages: session.messages,
        };
        record.messages.push(message);
        self.write_record(name, &record)?;
        tracing::debug!(
            session = name,
            messages = record.messages.len(),
            "Appended message"
        );
        Ok(())
    }

    /// Removes a session without reading its record, so corrupt records can
    /// be deleted too. If it was current, the default session becomes current.
    pub fn delete(&self, name: &str) -> Result<Deletion> {
        let path = self.record_path(name)?;
        let was_current = self.read_pointer()?.as_deref() == Some(name);

        let existed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(AgError::store(name, e)),
        };

        if existed {
            tracing::info!(session = name, "Deleted session");
        }
        if was_current {
            self.switch_current(DEFAULT_SESSION)?;
        }

        Ok(Deletion {
            existed,
            was_current,
        })
    }

    /// Removes every session and switches to the default one.
    pub fn delete_all(&self) -> Result<usize> {
        let names = self.list()?;
        for name in &names {
            let path = self.record_path(name)?;
            fs::remove_file(&path).for_session(name)?;
        }
        tracing::info!(count = names.len(), "Deleted all sessions");
        self.switch_current(DEFAULT_SESSION)?;
        Ok(names.len())
    }

    /// Names of all stored sessions, sorted.
    pub fn list(&self) -> Result<BTreeSet<String>> {
        let entries = fs::read_dir(self.sessions_dir()).for_session(SESSIONS_DIR)?;
        let mut names = BTreeSet::new();

        for entry in entries {
            let path = entry.for_session(SESSIONS_DIR)?.path();
            if !path.is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.insert(stem.to_string());
                }
            }
        }

        Ok(names)
    }

    fn write_record(&self, name: &str, record: &SessionRecord) -> Result<()> {
        let path = self.record_path(name)?;
        let content = serde_json::to_string_pretty(record).for_session(name)?;
        write_atomic(&path, content.as_bytes()).for_session(name)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains('\0');
    if valid {
        Ok(())
    } else {
        Err(AgError::store(name, StoreCause::InvalidName))
    }
}

/// Writes `data` to a temporary sibling, then renames it over `path`.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, data)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
