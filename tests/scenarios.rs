use grantboard::{
    AuthError, AuthState, Authenticator, GrantType, LoginForm, PasswordScheme, RegistrationForm,
    Session, UserStore,
};
use tempfile::TempDir;

fn authenticator(dir: &TempDir) -> Authenticator {
    Authenticator::new(
        UserStore::new(dir.path().join("users.json")),
        PasswordScheme::Plaintext,
    )
}

fn register_ana(auth: &Authenticator) -> Result<(), AuthError> {
    let form = RegistrationForm {
        full_name: "Ana Silva".to_string(),
        grant_type: GrantType::IniciacaoCientifica,
        username: "ana".to_string(),
        password: "1234".to_string(),
    };
    auth.register(&mut Session::new(), form)
}

fn login(
    auth: &Authenticator,
    session: &mut Session,
    username: &str,
    password: &str,
) -> Result<(), AuthError> {
    let form = LoginForm {
        username: username.to_string(),
        password: password.to_string(),
    };
    auth.login(session, form).map(|_| ())
}

#[test]
fn empty_store_register_then_login() {
    let dir = TempDir::new().unwrap();
    let auth = authenticator(&dir);

    register_ana(&auth).unwrap();

    let users = auth.store().load_all().unwrap();
    let ana = &users["ana"];
    assert_eq!(ana.full_name, "Ana Silva");
    assert_eq!(ana.grant_type.label(), "IC (Iniciação Científica)");
    assert_eq!(ana.password, "1234");
    assert!(!ana.created_at.is_empty());

    let mut session = Session::new();
    login(&auth, &mut session, "ana", "1234").unwrap();
    assert_eq!(session.state(), AuthState::Authenticated);
    assert_eq!(session.username.as_deref(), Some("ana"));
}

#[test]
fn second_registration_of_same_username_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let auth = authenticator(&dir);
    register_ana(&auth).unwrap();
    let file_before = std::fs::read_to_string(auth.store().path()).unwrap();

    let err = register_ana(&auth).unwrap_err();

    assert!(matches!(err, AuthError::DuplicateUsername { .. }));
    assert_eq!(
        std::fs::read_to_string(auth.store().path()).unwrap(),
        file_before
    );
}

#[test]
fn bad_credentials_are_indistinguishable() {
    let dir = TempDir::new().unwrap();
    let auth = authenticator(&dir);
    register_ana(&auth).unwrap();
    let mut session = Session::new();

    let wrong_password = login(&auth, &mut session, "ana", "wrong").unwrap_err();
    let unknown_user = login(&auth, &mut session, "bob", "x").unwrap_err();

    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    assert!(!session.is_authenticated());
}

#[test]
fn file_written_by_hand_is_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.json");
    std::fs::write(
        &path,
        "{\n  \"joao\": {\n    \"nome\": \"João Souza\",\n    \"bolsa\": \"Mestrado\",\n    \"senha\": \"abc\",\n    \"created_at\": \"2024-05-10 14:22:01\"\n  }\n}",
    )
    .unwrap();
    let auth = authenticator(&dir);

    let mut session = Session::new();
    login(&auth, &mut session, "joao", "abc").unwrap();
    assert_eq!(session.user.unwrap().full_name, "João Souza");
}
