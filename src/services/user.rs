//! Accounts and sessions
//!
//! - registration (the first account becomes admin)
//! - login / logout / session validation
//! - password reset by mailed one-time token, and password change

use crate::config::AuthConfig;
use crate::db::repositories::{PasswordResetRepository, SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::email::EmailService;
use crate::services::form::trimmed_or_none;
use crate::services::password::{
    generate_reset_token, hash_password, hash_reset_token, validate_new_password, verify_password,
    MIN_PASSWORD_LENGTH,
};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    /// Unknown, used or expired reset token
    #[error("Reset link is invalid or has expired.")]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    email: Arc<EmailService>,
    auth: AuthConfig,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        email: Arc<EmailService>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            email,
            auth,
        }
    }

    /// Register a new account. The first account in the system is admin.
    ///
    /// # Arguments
    /// * `input` - Email (normalised to lower case), password and an
    ///   optional display name
    ///
    /// # Returns
    /// The created user, `UserExists` for a taken email and
    /// `ValidationError` for a malformed email or a short password.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(
                "Please enter a valid email address.".to_string(),
            ));
        }
        if input.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let display_name = trimmed_or_none(input.display_name.as_deref());
        let user = User::new(email, display_name, password_hash, role);

        let created = match self.user_repo.create(&user).await {
            Ok(created) => created,
            Err(e) if crate::db::is_unique_violation(&e) => {
                return Err(UserServiceError::UserExists(format!(
                    "Email '{}' is already registered",
                    user.email
                )))
            }
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check credentials and open a session.
    ///
    /// Unknown emails and wrong passwords give the same
    /// `AuthenticationError`.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, UserServiceError> {
        let invalid = || UserServiceError::AuthenticationError("Invalid email or password".to_string());

        let user = self
            .user_repo
            .get_by_email(&normalize_email(email))
            .await
            .context("Failed to get user by email")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            return Err(invalid());
        }

        self.create_session(user.id).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        self.get_by_id(session.user_id).await
    }

    /// Whether reset mails are actually sent
    pub fn email_configured(&self) -> bool {
        self.email.is_configured()
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Start a password reset.
    ///
    /// # Arguments
    /// * `email` - Address the reset link goes to
    /// * `redirect_to` - Optional reset page; honoured only when it has the
    ///   same origin as the configured one
    ///
    /// # Returns
    /// `Ok(())` for every well-formed address, whether it is registered or
    /// the mail could not be delivered, so callers cannot probe accounts.
    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), UserServiceError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(UserServiceError::ValidationError(
                "Please enter a valid email address.".to_string(),
            ));
        }

        let Some(user) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
        else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(self.auth.reset_token_minutes);
        self.reset_repo
            .create(user.id, &hash_reset_token(&token), expires_at)
            .await
            .context("Failed to store password reset")?;

        let base = redirect_to
            .filter(|url| same_origin(url, &self.auth.reset_redirect_url))
            .unwrap_or(&self.auth.reset_redirect_url);
        let link = reset_link(base, &token);

        // Same answer as for unknown addresses; the failure is only logged
        if let Err(e) = self.email.send_password_reset(&user.email, &link).await {
            tracing::error!(user_id = user.id, error = %e, "Failed to send password reset mail");
        }
        Ok(())
    }

    /// Finish a password reset. Signs the user out everywhere.
    ///
    /// # Arguments
    /// * `token` - The token from the reset link
    /// * `password` - New password, at least 8 characters
    /// * `confirmation` - Must equal `password`
    ///
    /// # Returns
    /// `InvalidResetToken` for unknown, expired or already used tokens. The
    /// ticket is consumed before the password changes, so a token sets a
    /// password at most once even under concurrent requests.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<(), UserServiceError> {
        validate_new_password(password, confirmation).map_err(UserServiceError::ValidationError)?;

        let reset = self
            .reset_repo
            .get_by_token_hash(&hash_reset_token(token.trim()))
            .await
            .context("Failed to get password reset")?
            .filter(|r| r.is_usable())
            .ok_or(UserServiceError::InvalidResetToken)?;

        let password_hash = hash_password(password).context("Failed to hash password")?;

        let consumed = self
            .reset_repo
            .mark_used(reset.id)
            .await
            .context("Failed to consume password reset")?;
        if !consumed {
            return Err(UserServiceError::InvalidResetToken);
        }

        self.user_repo
            .update_password(reset.user_id, &password_hash)
            .await
            .context("Failed to update password")?;
        self.session_repo
            .delete_by_user(reset.user_id)
            .await
            .context("Failed to sign out sessions")?;

        tracing::info!(user_id = reset.user_id, "Password reset completed");
        Ok(())
    }

    /// Set a new password for a logged-in user
    pub async fn change_password(
        &self,
        user: &User,
        password: &str,
        confirmation: &str,
    ) -> Result<(), UserServiceError> {
        validate_new_password(password, confirmation).map_err(UserServiceError::ValidationError)?;

        let password_hash = hash_password(password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user.id, &password_hash)
            .await
            .context("Failed to update password")?;
        self.reset_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to drop password resets")?;
        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.auth.session_days),
            created_at: now,
        };

        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

/// One `@`, no whitespace, a dot somewhere in the domain
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// `scheme://host[:port]` of a URL
fn origin(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    let rest = &url[scheme_end..];
    let host_end = rest.find('/').map(|i| scheme_end + i).unwrap_or(url.len());
    Some(&url[..host_end])
}

fn same_origin(a: &str, b: &str) -> bool {
    matches!((origin(a), origin(b)), (Some(x), Some(y)) if x.eq_ignore_ascii_case(y))
}

fn reset_link(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxPasswordResetRepository, SqlxSessionRepository, SqlxUserRepository,
    };
    use crate::config::SmtpConfig;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        setup_with_email(EmailService::new(None)).await
    }

    async fn setup_with_email(email: EmailService) -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            Arc::new(email),
            AuthConfig::default(),
        );
        (pool, service)
    }

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            display_name: Some("  Vera ".to_string()),
        }
    }

    /// Store a reset ticket with a known token, bypassing the mailer
    async fn issue_reset(pool: &DynDatabasePool, user_id: i64, token: &str, minutes: i64) {
        SqlxPasswordResetRepository::new(pool.clone())
            .create(user_id, &hash_reset_token(token), Utc::now() + Duration::minutes(minutes))
            .await
            .expect("Failed to create reset");
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let (_pool, service) = setup_test_service().await;

        let first = service.register(input("First@Example.org")).await.unwrap();
        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(first.email, "first@example.org");
        assert_eq!(first.display_name.as_deref(), Some("Vera"));

        let second = service.register(input("second@example.org")).await.unwrap();
        assert_eq!(second.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_register_validation_and_duplicates() {
        let (_pool, service) = setup_test_service().await;

        let bad_email = service.register(input("no-at-sign")).await;
        assert!(matches!(bad_email, Err(UserServiceError::ValidationError(_))));

        let mut short = input("a@example.org");
        short.password = "short".into();
        assert!(matches!(
            service.register(short).await,
            Err(UserServiceError::ValidationError(_))
        ));

        service.register(input("a@example.org")).await.unwrap();
        assert!(matches!(
            service.register(input("A@example.org")).await,
            Err(UserServiceError::UserExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(input("login@example.org")).await.unwrap();

        let session = service.login(" LOGIN@example.org ", "password123").await.unwrap();
        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        assert!(matches!(
            service.login("login@example.org", "wrong-password").await,
            Err(UserServiceError::AuthenticationError(_))
        ));
        assert!(matches!(
            service.login("nobody@example.org", "password123").await,
            Err(UserServiceError::AuthenticationError(_))
        ));

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_request_reset_does_not_reveal_unknown_email() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("known@example.org")).await.unwrap();

        service.request_password_reset("unknown@example.org", None).await.unwrap();
        service.request_password_reset("known@example.org", None).await.unwrap();
        assert!(matches!(
            service.request_password_reset("garbage", None).await,
            Err(UserServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("reset@example.org")).await.unwrap();
        let session = service.login("reset@example.org", "password123").await.unwrap();
        issue_reset(&pool, user.id, "known-token", 60).await;

        let mismatch = service.reset_password("known-token", "newpassword", "other-pass").await;
        assert!(matches!(mismatch, Err(UserServiceError::ValidationError(_))));

        service.reset_password("known-token", "newpassword", "newpassword").await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(service.login("reset@example.org", "password123").await.is_err());
        service.login("reset@example.org", "newpassword").await.unwrap();

        let reused = service.reset_password("known-token", "another-pass", "another-pass").await;
        assert!(matches!(reused, Err(UserServiceError::InvalidResetToken)));
    }

    #[tokio::test]
    async fn test_reset_mail_failure_is_not_revealed() {
        let broken_mailer = EmailService::new(Some(SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from: "not an address".into(),
            from_name: "Haven".into(),
        }));
        let (pool, service) = setup_with_email(broken_mailer).await;
        service.register(input("known@example.org")).await.unwrap();

        service.request_password_reset("known@example.org", None).await.unwrap();
        let tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_resets")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(tickets, 1);
    }

    #[tokio::test]
    async fn test_concurrent_resets_use_token_once() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("race@example.org")).await.unwrap();
        issue_reset(&pool, user.id, "shared-token", 60).await;

        let (a, b) = tokio::join!(
            service.reset_password("shared-token", "first-pass", "first-pass"),
            service.reset_password("shared-token", "second-pass", "second-pass"),
        );
        let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert!(succeeded <= 1);

        let again = service.reset_password("shared-token", "third-pass", "third-pass").await;
        assert!(matches!(again, Err(UserServiceError::InvalidResetToken)));
        assert!(service.login("race@example.org", "third-pass").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("late@example.org")).await.unwrap();
        issue_reset(&pool, user.id, "stale", -1).await;

        let result = service.reset_password("stale", "newpassword", "newpassword").await;
        assert!(matches!(result, Err(UserServiceError::InvalidResetToken)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(input("change@example.org")).await.unwrap();

        service.change_password(&user, "brand-new-pass", "brand-new-pass").await.unwrap();
        service.login("change@example.org", "brand-new-pass").await.unwrap();
    }

    #[test]
    fn test_reset_link_and_origin() {
        assert_eq!(
            reset_link("http://localhost:5173/reset-password", "t"),
            "http://localhost:5173/reset-password?token=t"
        );
        assert_eq!(reset_link("http://h/r?x=1", "t"), "http://h/r?x=1&token=t");
        assert!(same_origin("http://localhost:5173/other", "http://localhost:5173/reset-password"));
        assert!(!same_origin("https://evil.example/reset", "http://localhost:5173/reset-password"));
        assert!(!same_origin("not a url", "http://localhost:5173"));
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("vera@example.org"));
        assert!(!is_valid_email("vera@localhost"));
        assert!(!is_valid_email("vera example@org.at"));
        assert!(!is_valid_email("no-at-sign.org"));
        assert!(!is_valid_email("a@b@c.org"));
    }
}
