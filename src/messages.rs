use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::login::AuthError;

/// Outcome of a form submission that the user gets told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    DuplicateUsername,
    RegistrationSuccess,
    LoginInvalidCredentials,
    LoginSuccess(String),
    MissingField,
    StorageFailure,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::RegistrationSuccess | Notice::LoginSuccess(_))
    }
}

impl From<&AuthError> for Notice {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::DuplicateUsername { .. } => Notice::DuplicateUsername,
            AuthError::InvalidCredentials => Notice::LoginInvalidCredentials,
            AuthError::MissingField { .. } => Notice::MissingField,
            AuthError::Hash { .. } | AuthError::Store(_) => Notice::StorageFailure,
        }
    }
}

/// Form captions and button texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub page_title: String,
    pub register_title: String,
    pub login_title: String,
    pub dashboard_title: String,
    pub full_name: String,
    pub grant_type: String,
    pub username: String,
    pub password: String,
    pub register_button: String,
    pub login_button: String,
    pub switch_to_login: String,
    pub switch_to_register: String,
    pub logout_button: String,
    pub member_since: String,
}

impl Default for Labels {
    fn default() -> Self {
        Labels {
            page_title: "Painel de Bolsas".to_string(),
            register_title: "Cadastro".to_string(),
            login_title: "Login".to_string(),
            dashboard_title: "Painel".to_string(),
            full_name: "Nome completo".to_string(),
            grant_type: "Tipo de bolsa".to_string(),
            username: "Usuário".to_string(),
            password: "Senha".to_string(),
            register_button: "Cadastrar".to_string(),
            login_button: "Entrar".to_string(),
            switch_to_login: "Já tem conta? Entrar".to_string(),
            switch_to_register: "Não tem conta? Cadastre-se".to_string(),
            logout_button: "Sair".to_string(),
            member_since: "Cadastrado em".to_string(),
        }
    }
}

/// Localized user-facing strings, Portuguese by default.
///
/// A JSON file can override any subset of keys; the rest keep their
/// defaults. `login_success` may contain `{name}`, replaced by the user's
/// full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub duplicate_username: String,
    pub registration_success: String,
    pub login_invalid_credentials: String,
    pub login_success: String,
    pub missing_field: String,
    pub storage_failure: String,
    pub labels: Labels,
}

impl Default for Messages {
    fn default() -> Self {
        Messages {
            duplicate_username: "Nome de usuário já existe. Escolha outro.".to_string(),
            registration_success: "Cadastro realizado com sucesso! Faça login.".to_string(),
            login_invalid_credentials: "Usuário ou senha incorretos.".to_string(),
            login_success: "Bem-vindo(a), {name}!".to_string(),
            missing_field: "Preencha todos os campos.".to_string(),
            storage_failure: "Não foi possível acessar o cadastro de usuários. Tente novamente."
                .to_string(),
            labels: Labels::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MessagesError {
    #[error("failed to read messages file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("messages file {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Messages {
    /// Load the table, applying overrides from `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, MessagesError> {
        let Some(path) = path else {
            return Ok(Messages::default());
        };

        let text = fs::read_to_string(path).map_err(|source| MessagesError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let messages = serde_json::from_str(&text).map_err(|source| MessagesError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("loaded messages from {}", path.display());
        Ok(messages)
    }

    /// Text shown to the user for `notice`.
    pub fn text(&self, notice: &Notice) -> String {
        match notice {
            Notice::DuplicateUsername => self.duplicate_username.clone(),
            Notice::RegistrationSuccess => self.registration_success.clone(),
            Notice::LoginInvalidCredentials => self.login_invalid_credentials.clone(),
            Notice::LoginSuccess(name) => self.login_success.replace("{name}", name),
            Notice::MissingField => self.missing_field.clone(),
            Notice::StorageFailure => self.storage_failure.clone(),
        }
    }
}
