//! Registration, login, refresh and logout.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::services::session_service::{
    IssuedRefreshToken, SessionError, SessionService,
};
use crate::domain::entities::{NewUser, User, normalize_email};
use crate::domain::repositories::{RefreshTokenRepository, UserRepository};
use crate::error::AppError;
use crate::security::{PasswordHasher, TokenError, TokenIssuer};

/// Token lifetimes and refresh policy.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Issue a new refresh token on every refresh and revoke the presented one.
    pub rotate_refresh_tokens: bool,
}

/// Access and refresh token returned by a successful login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_in: i64,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub refresh_expires_in: i64,
}

/// Outcome of a refresh call. `rotated` is set only when rotation is enabled.
#[derive(Debug, Clone)]
pub struct RefreshedAccess {
    pub access_token: String,
    pub access_expires_in: i64,
    pub rotated: Option<IssuedRefreshToken>,
}

/// Caller identity established from a bearer access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

/// Orchestrates the credential components. Holds no state of its own.
pub struct AuthService<U, R>
where
    U: UserRepository + ?Sized,
    R: RefreshTokenRepository + ?Sized,
{
    users: Arc<U>,
    sessions: Arc<SessionService<R>>,
    tokens: Arc<TokenIssuer>,
    hasher: PasswordHasher,
    settings: AuthSettings,
}

impl<U, R> AuthService<U, R>
where
    U: UserRepository + ?Sized,
    R: RefreshTokenRepository + ?Sized,
{
    pub fn new(
        users: Arc<U>,
        sessions: Arc<SessionService<R>>,
        tokens: Arc<TokenIssuer>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            hasher: PasswordHasher::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the normalized email is taken, even
    /// when a concurrent registration slips past the pre-check.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let password_hash = self.hash_password(password).await?;

        let user = self
            .users
            .create(NewUser {
                email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                AppError::Conflict { .. } => email_taken(),
                other => other,
            })?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(user)
    }

    /// Verifies credentials and opens a session.
    ///
    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Err(invalid_credentials());
        };

        if !self
            .verify_password(password, &user.password_hash)
            .await?
        {
            return Err(invalid_credentials());
        }

        let access_token = self.mint_access(&user.id, &user.email)?;
        let refresh = self
            .sessions
            .issue(user.id, self.settings.refresh_ttl)
            .await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(TokenPair {
            access_token,
            access_expires_in: self.settings.access_ttl.num_seconds(),
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
            refresh_expires_in: self.settings.refresh_ttl.num_seconds(),
        })
    }

    /// Mints a new access token from a refresh token.
    ///
    /// Any refresh token problem (unknown, revoked, expired) is `Unauthorized`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedAccess, AppError> {
        let (user_id, rotated) = if self.settings.rotate_refresh_tokens {
            let (user_id, issued) = self
                .sessions
                .rotate(refresh_token, self.settings.refresh_ttl)
                .await
                .map_err(refresh_rejected)?;
            (user_id, Some(issued))
        } else {
            let user_id = self
                .sessions
                .validate(refresh_token)
                .await
                .map_err(refresh_rejected)?;
            (user_id, None)
        };

        let user = self.users.find_by_id(user_id).await?.ok_or_else(|| {
            AppError::unauthorized("Invalid refresh token", json!({ "reason": "unknown user" }))
        })?;

        Ok(RefreshedAccess {
            access_token: self.mint_access(&user.id, &user.email)?,
            access_expires_in: self.settings.access_ttl.num_seconds(),
            rotated,
        })
    }

    /// Revokes a refresh token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no session has this token.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        self.sessions.revoke(refresh_token).await?;
        Ok(())
    }

    /// Verifies a bearer access token.
    pub fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AppError> {
        let verified = self.tokens.verify(access_token).map_err(|e| {
            let reason = match e {
                TokenError::Expired => "Token has expired",
                TokenError::InvalidSignature => "Token signature is invalid",
                TokenError::Malformed | TokenError::Signing(_) => "Token is malformed",
            };
            AppError::unauthorized("Unauthorized", json!({ "reason": reason }))
        })?;

        Ok(AuthenticatedUser {
            id: verified.user_id,
            email: verified.email,
        })
    }

    fn mint_access(&self, user_id: &Uuid, email: &str) -> Result<String, AppError> {
        self.tokens
            .issue(*user_id, email, self.settings.access_ttl)
            .map_err(|e| {
                tracing::error!(error = %e, "Access token signing failed");
                AppError::internal("Internal server error", json!({}))
            })
    }

    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing task failed");
                AppError::internal("Internal server error", json!({}))
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing failed");
                AppError::internal("Internal server error", json!({}))
            })
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let digest = digest.to_owned();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password verification task failed");
                AppError::internal("Internal server error", json!({}))
            })
    }
}

fn email_taken() -> AppError {
    AppError::conflict("Email already registered", json!({ "field": "email" }))
}

fn invalid_credentials() -> AppError {
    AppError::unauthorized("Invalid credentials", json!({}))
}

fn refresh_rejected(err: SessionError) -> AppError {
    match err {
        SessionError::NotFound | SessionError::Revoked | SessionError::Expired => {
            AppError::unauthorized(
                "Invalid refresh token",
                json!({ "reason": err.to_string() }),
            )
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RefreshToken;
    use crate::domain::repositories::{MockRefreshTokenRepository, MockUserRepository};

    const SECRET: &[u8] = b"unit-test-secret-unit-test-secret";

    fn settings(rotate: bool) -> AuthSettings {
        AuthSettings {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            rotate_refresh_tokens: rotate,
        }
    }

    fn user(email: &str, password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: PasswordHasher::new().hash(password).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(
        users: MockUserRepository,
        tokens: MockRefreshTokenRepository,
        rotate: bool,
    ) -> AuthService<MockUserRepository, MockRefreshTokenRepository> {
        AuthService::new(
            Arc::new(users),
            Arc::new(SessionService::new(Arc::new(tokens), "hash-secret".into())),
            Arc::new(TokenIssuer::new(SECRET)),
            settings(rotate),
        )
    }

    fn echo_create(repo: &mut MockRefreshTokenRepository) {
        repo.expect_create().returning(|new| {
            Ok(RefreshToken {
                id: Uuid::new_v4(),
                user_id: new.user_id,
                token_hash: new.token_hash,
                revoked: false,
                expires_at: new.expires_at,
                created_at: Utc::now(),
            })
        });
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_hashes_password() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .withf(|email| email == "user@example.com")
            .times(1)
            .returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|new| new.email == "user@example.com" && new.password_hash.starts_with("$argon2id$"))
            .times(1)
            .returning(|new| {
                Ok(User {
                    id: Uuid::new_v4(),
                    email: new.email,
                    password_hash: new.password_hash,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            });

        let svc = service(users, MockRefreshTokenRepository::new(), false);
        let created = svc.register("  User@Example.com ", "password123").await.unwrap();

        assert_eq!(created.email, "user@example.com");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(|email| Ok(Some(user(email, "x"))));
        users.expect_create().times(0);

        let svc = service(users, MockRefreshTokenRepository::new(), false);

        assert!(matches!(
            svc.register("USER@example.com", "password123").await,
            Err(AppError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_conflict_from_storage() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users.expect_create().returning(|_| {
            Err(AppError::conflict(
                "Unique constraint violation",
                json!({ "constraint": "users_email_key" }),
            ))
        });

        let svc = service(users, MockRefreshTokenRepository::new(), false);
        let err = svc.register("race@example.com", "password123").await.unwrap_err();

        assert!(matches!(err, AppError::Conflict { .. }));
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn test_login_success() {
        let stored = user("user@example.com", "password123");
        let user_id = stored.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .withf(|email| email == "user@example.com")
            .returning(move |_| Ok(Some(stored.clone())));

        let mut tokens = MockRefreshTokenRepository::new();
        echo_create(&mut tokens);

        let svc = service(users, tokens, false);
        let pair = svc.login("User@Example.com", "password123").await.unwrap();

        assert_eq!(pair.access_expires_in, 900);
        assert_eq!(pair.refresh_expires_in, 604_800);
        assert_eq!(svc.authenticate(&pair.access_token).unwrap().id, user_id);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let stored = user("user@example.com", "password123");
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_create().times(0);

        let svc = service(users, tokens, false);

        assert!(matches!(
            svc.login("user@example.com", "wrong-password").await,
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));

        let svc = service(users, MockRefreshTokenRepository::new(), false);
        let err = svc.login("ghost@example.com", "password123").await.unwrap_err();

        assert!(matches!(err, AppError::Unauthorized { .. }));
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_refresh_unknown_token_is_unauthorized() {
        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_find_by_hash().returning(|_| Ok(None));

        let svc = service(MockUserRepository::new(), tokens, false);

        assert!(matches!(
            svc.refresh("missing").await,
            Err(AppError::Unauthorized { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_without_rotation_keeps_token() {
        let stored = user("user@example.com", "pw");
        let user_id = stored.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_find_by_hash().returning(move |hash| {
            Ok(Some(RefreshToken {
                id: Uuid::new_v4(),
                user_id,
                token_hash: hash.to_string(),
                revoked: false,
                expires_at: Utc::now() + Duration::days(1),
                created_at: Utc::now(),
            }))
        });
        tokens.expect_consume().times(0);
        tokens.expect_create().times(0);

        let svc = service(users, tokens, false);
        let refreshed = svc.refresh("plain").await.unwrap();

        assert!(refreshed.rotated.is_none());
        assert_eq!(svc.authenticate(&refreshed.access_token).unwrap().id, user_id);
    }

    #[tokio::test]
    async fn test_refresh_with_rotation_issues_new_token() {
        let stored = user("user@example.com", "pw");
        let user_id = stored.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_consume().times(1).returning(move |hash, _| {
            Ok(Some(RefreshToken {
                id: Uuid::new_v4(),
                user_id,
                token_hash: hash.to_string(),
                revoked: false,
                expires_at: Utc::now() + Duration::days(1),
                created_at: Utc::now(),
            }))
        });
        echo_create(&mut tokens);

        let svc = service(users, tokens, true);
        let refreshed = svc.refresh("plain").await.unwrap();

        let rotated = refreshed.rotated.unwrap();
        assert_ne!(rotated.token, "plain");
    }

    #[tokio::test]
    async fn test_logout_unknown_token_is_not_found() {
        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_revoke().returning(|_| Ok(false));

        let svc = service(MockUserRepository::new(), tokens, false);

        assert!(matches!(
            svc.logout("missing").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_authenticate_rejects_garbage() {
        let svc = service(
            MockUserRepository::new(),
            MockRefreshTokenRepository::new(),
            false,
        );

        let err = svc.authenticate("garbage").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }
}
