use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Scholarship/grant category a user registers under.
///
/// Serialized as the display label, so the file stays readable by whoever
/// maintains it by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    #[serde(rename = "IC (Iniciação Científica)")]
    IniciacaoCientifica,
    #[serde(rename = "Mestrado")]
    Mestrado,
    #[serde(rename = "Doutorado")]
    Doutorado,
    #[serde(rename = "Pós-Doutorado")]
    PosDoutorado,
}

impl GrantType {
    /// Every grant type, in the order the registration form offers them.
    pub const ALL: [GrantType; 4] = [
        GrantType::IniciacaoCientifica,
        GrantType::Mestrado,
        GrantType::Doutorado,
        GrantType::PosDoutorado,
    ];

    /// Get the display label of a grant type
    ///
    /// # Returns
    /// * `&'static str` - The label shown in the form and stored in the file
    pub fn label(self) -> &'static str {
        match self {
            GrantType::IniciacaoCientifica => "IC (Iniciação Científica)",
            GrantType::Mestrado => "Mestrado",
            GrantType::Doutorado => "Doutorado",
            GrantType::PosDoutorado => "Pós-Doutorado",
        }
    }
}

/// A registered user as persisted in the users file.
///
/// The username is the key of the surrounding map and is not repeated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Display name
    #[serde(rename = "nome")]
    pub full_name: String,

    #[serde(rename = "bolsa")]
    pub grant_type: GrantType,

    /// Plaintext, or an Argon2 PHC string when hashing is enabled
    #[serde(rename = "senha")]
    pub password: String,

    /// Local creation time, `YYYY-MM-DD HH:MM:SS`
    pub created_at: String,
}

/// Username to record mapping, the full content of the users file.
pub type UserMap = BTreeMap<String, UserRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read user store {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("user store {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write user store {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// True for failures that happened while loading the file.
    pub fn is_read(&self) -> bool {
        matches!(self, StoreError::Read { .. } | StoreError::Parse { .. })
    }
}

/// Flat-file persistence for user records.
///
/// Every operation goes to disk; nothing is cached between calls. Callers
/// load the whole map, change it and save the whole map back. The file is
/// replaced by rename, so a crash mid-write leaves the previous content.
/// There is no locking against other processes writing the same file.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    /// Create a store for a users file
    ///
    /// The file is not touched until the first load or save.
    ///
    /// # Arguments
    /// * `path` - Location of the users file
    ///
    /// # Returns
    /// * `UserStore` - A store reading and writing that file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UserStore { path: path.into() }
    }

    /// Get the location of the users file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every user record.
    ///
    /// A missing file is an empty store, not an error.
    ///
    /// # Returns
    /// * `Result<UserMap, StoreError>` - All users keyed by username
    ///
    /// # Errors
    /// * `StoreError::Read` if the file exists but cannot be opened or read
    /// * `StoreError::Parse` if the content is not a valid users map
    pub fn load_all(&self) -> Result<UserMap, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("user store {} does not exist yet", self.path.display());
                return Ok(UserMap::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            if source.is_io() {
                StoreError::Read {
                    path: self.path.clone(),
                    source: source.into(),
                }
            } else {
                StoreError::Parse {
                    path: self.path.clone(),
                    source,
                }
            }
        })
    }

    /// Replace the file content with `users`.
    ///
    /// Writes pretty-printed JSON to a temporary file next to the target,
    /// syncs it and renames it into place. The parent directory is created
    /// when missing.
    ///
    /// # Errors
    /// * `StoreError::Write` on any I/O failure
    pub fn save_all(&self, users: &UserMap) -> Result<(), StoreError> {
        self.write_atomically(users).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        log::debug!(
            "saved {} user(s) to {}",
            users.len(),
            self.path.display()
        );
        Ok(())
    }

    fn write_atomically(&self, users: &UserMap) -> io::Result<()> {
        let json = serde_json::to_string_pretty(users)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
