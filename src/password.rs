use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// How passwords are written to and checked against the users file.
///
/// `Plaintext` keeps the file format other tools already read: the password
/// is stored as typed and compared byte for byte. `Argon2` stores an Argon2id
/// PHC string with a random salt instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PasswordScheme {
    #[default]
    Plaintext,
    Argon2,
}

impl PasswordScheme {
    /// Produce the value to persist for `password`.
    ///
    /// # Errors
    /// * Returns an error message if Argon2 hashing fails
    pub fn encode(self, password: &str) -> Result<String, String> {
        match self {
            PasswordScheme::Plaintext => Ok(password.to_string()),
            PasswordScheme::Argon2 => hash_password(password),
        }
    }

    /// Check a submitted password against a persisted value.
    pub fn verify(self, password: &str, stored: &str) -> bool {
        match self {
            PasswordScheme::Plaintext => password == stored,
            PasswordScheme::Argon2 => verify_password(password, stored),
        }
    }
}

fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| e.to_string())
}

fn verify_password(password: &str, stored: &str) -> bool {
    let parsed_hash = match PasswordHash::new(stored) {
        Ok(hash) => hash,
        Err(_) => {
            log::warn!("stored password is not an Argon2 hash; rejecting login");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}
