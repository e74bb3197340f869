//! Authentication service for login, token management and the bootstrap account

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::{Role, User};
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::users::USER_COLUMNS;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt_secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

/// Which of the two tokens a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub username: String,
    pub role: Role,
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid user ID in token".to_string()))
    }
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Login result: the account and its fresh tokens
#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// User row including the password hash; never serialized
#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            jwt_secret: config.auth.jwt_secret.clone(),
            access_token_expiry: config.auth.access_token_expiry,
            refresh_token_expiry: config.auth.refresh_token_expiry,
        }
    }

    /// Authenticate with username or email and password
    pub async fn login(&self, identifier: &str, password: &str) -> AppResult<LoginResult> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {}, password_hash FROM users WHERE username = $1 OR LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(identifier.trim())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(invalid)?;

        // Check if user is active
        if !row.user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }

        // Verify password
        let valid = verify(password, &row.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;
        if !valid {
            tracing::warn!(identifier = %identifier, "Failed login attempt");
            return Err(invalid());
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(row.user.id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User logged in");

        let tokens = self.generate_tokens(&user)?;
        Ok(LoginResult { user, tokens })
    }

    /// Exchange a refresh token for a new token pair
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let claims = self.verify_token(refresh_token, TokenType::Refresh)?;
        let user = self.active_user(claims.user_id()?).await?;
        self.generate_tokens(&user)
    }

    /// The account behind a token, rejected when missing or disabled
    pub async fn active_user(&self, user_id: i64) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        if !user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }
        Ok(user)
    }

    /// Generate access and refresh tokens
    pub fn generate_tokens(&self, user: &User) -> AppResult<AuthTokens> {
        Ok(AuthTokens {
            access_token: self.sign(user, TokenType::Access, self.access_token_expiry)?,
            refresh_token: self.sign(user, TokenType::Refresh, self.refresh_token_expiry)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    fn sign(&self, user: &User, token_type: TokenType, ttl_secs: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role,
            token_type,
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Decode a token and check that it is of the expected type
    pub fn verify_token(&self, token: &str, expected: TokenType) -> AppResult<Claims> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        if claims.token_type != expected {
            return Err(AppError::Unauthorized("Wrong token type".to_string()));
        }
        Ok(claims)
    }

    /// Create the configured superuser when the database has none
    pub async fn ensure_bootstrap_superuser(&self, config: &Config) -> AppResult<Option<User>> {
        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE role = 'superuser'",
        )
        .fetch_one(&self.db)
        .await?;
        if existing > 0 {
            return Ok(None);
        }

        let password_hash = hash_password(&config.auth.bootstrap_password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, name, email, password_hash, role)
            VALUES ($1, 'Administrator', $2, $3, 'superuser')
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&config.auth.bootstrap_username)
        .bind(&config.auth.bootstrap_email)
        .bind(&password_hash)
        .fetch_one(&self.db)
        .await?;

        tracing::warn!(
            username = %user.username,
            "Created bootstrap superuser; change its password"
        );
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService {
            db: PgPool::connect_lazy("postgres://localhost/unused").unwrap(),
            jwt_secret: "test-secret".into(),
            access_token_expiry: 3600,
            refresh_token_expiry: 7200,
        }
    }

    fn user(role: Role) -> User {
        User {
            id: 42,
            username: "clerk".into(),
            name: "Clerk".into(),
            email: "clerk@example.com".into(),
            phone: None,
            role,
            store_id: None,
            is_active: true,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_token_round_trip() {
        let svc = service();
        let tokens = svc.generate_tokens(&user(Role::Superuser)).unwrap();
        let claims = svc.verify_token(&tokens.access_token, TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Superuser);
        assert_eq!(claims.username, "clerk");
    }

    #[tokio::test]
    async fn test_refresh_token_not_accepted_as_access() {
        let svc = service();
        let tokens = svc.generate_tokens(&user(Role::User)).unwrap();
        assert!(svc.verify_token(&tokens.refresh_token, TokenType::Access).is_err());
        assert!(svc.verify_token(&tokens.refresh_token, TokenType::Refresh).is_ok());
    }

    #[tokio::test]
    async fn test_foreign_secret_rejected() {
        let svc = service();
        let tokens = svc.generate_tokens(&user(Role::User)).unwrap();
        let other = AuthService {
            jwt_secret: "another-secret".into(),
            ..service()
        };
        assert!(other.verify_token(&tokens.access_token, TokenType::Access).is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let hashed = hash_password("correct horse").unwrap();
        assert!(verify("correct horse", &hashed).unwrap());
        assert!(!verify("wrong horse", &hashed).unwrap());
    }
}
