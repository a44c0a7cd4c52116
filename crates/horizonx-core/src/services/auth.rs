// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! User authentication: password verification and session tokens.

use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::domain::User;
use crate::error::{CoreError, Result};
use crate::persistence::UserRepository;

/// JWT claims carried in the session cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    /// Expiry as a unix timestamp.
    pub exp: i64,
    /// Issued-at as a unix timestamp.
    pub iat: i64,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, secret: &str, expiry: Duration) -> Self {
        Self {
            users,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    /// Hash a password for storage.
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::Database {
                operation: "hash_password",
                details: e.to_string(),
            })?
            .to_string())
    }

    /// Verify credentials and mint a session token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .users
            .get_by_email(email)
            .await
            .map_err(|_| CoreError::Unauthorized)?;

        let hash = PasswordHash::new(&user.password).map_err(|_| CoreError::Unauthorized)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| CoreError::Unauthorized)?;

        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    /// Mint a token for a user id.
    pub fn issue_token(&self, user_id: i64) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            exp: now + self.expiry.as_secs() as i64,
            iat: now,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            CoreError::Database {
                operation: "sign_token",
                details: e.to_string(),
            }
        })
    }

    /// Validate a token and return the user id it was issued for.
    pub fn validate_token(&self, token: &str) -> Result<i64> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| CoreError::Unauthorized)?;
        Ok(data.claims.sub)
    }

    /// Load the user behind a validated token.
    pub async fn user_for_token(&self, token: &str) -> Result<User> {
        let user_id = self.validate_token(token)?;
        self.user_for_id(user_id).await
    }

    /// Load a user by id, collapsing lookup failures to `Unauthorized`.
    pub async fn user_for_id(&self, user_id: i64) -> Result<User> {
        self.users
            .get_by_id(user_id)
            .await
            .map_err(|_| CoreError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeUsers {
        users: Mutex<Vec<User>>,
    }

    #[async_trait]
    impl UserRepository for FakeUsers {
        async fn get_by_id(&self, user_id: i64) -> Result<User> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == user_id)
                .cloned()
                .ok_or(CoreError::NotFound { entity: "user" })
        }

        async fn get_by_email(&self, email: &str) -> Result<User> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned()
                .ok_or(CoreError::NotFound { entity: "user" })
        }

        async fn upsert_by_email(
            &self,
            name: &str,
            email: &str,
            password_hash: &str,
            role_id: i64,
        ) -> Result<i64> {
            let mut users = self.users.lock().unwrap();
            if let Some(existing) = users.iter_mut().find(|u| u.email == email) {
                existing.password = password_hash.to_string();
                return Ok(existing.id);
            }
            let id = users.len() as i64 + 1;
            users.push(User {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password: password_hash.to_string(),
                role_id,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            });
            Ok(id)
        }
    }

    async fn service_with_user(email: &str, password: &str) -> AuthService {
        let users = Arc::new(FakeUsers::default());
        let hash = AuthService::hash_password(password).unwrap();
        users.upsert_by_email("Admin", email, &hash, 1).await.unwrap();
        AuthService::new(users, "test-secret", Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_login_round_trip() {
        let svc = service_with_user("admin@example.com", "hunter2").await;
        let (user, token) = svc.login("admin@example.com", "hunter2").await.unwrap();
        assert_eq!(svc.validate_token(&token).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_password() {
        let svc = service_with_user("admin@example.com", "hunter2").await;
        let err = svc.login("admin@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[tokio::test]
    async fn test_login_rejects_unknown_email() {
        let svc = service_with_user("admin@example.com", "hunter2").await;
        let err = svc.login("nobody@example.com", "hunter2").await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[tokio::test]
    async fn test_validate_rejects_garbage_token() {
        let svc = service_with_user("admin@example.com", "hunter2").await;
        assert!(matches!(
            svc.validate_token("not-a-jwt").unwrap_err(),
            CoreError::Unauthorized
        ));
    }

    #[tokio::test]
    async fn test_seeding_twice_keeps_one_row_with_new_password() {
        let users = Arc::new(FakeUsers::default());

        let first = AuthService::hash_password("first").unwrap();
        let second = AuthService::hash_password("second").unwrap();
        users
            .upsert_by_email("Admin", "a@b.c", &first, 1)
            .await
            .unwrap();
        users
            .upsert_by_email("Admin", "a@b.c", &second, 1)
            .await
            .unwrap();

        assert_eq!(users.users.lock().unwrap().len(), 1);

        let svc = AuthService::new(users, "s", Duration::from_secs(60));
        assert!(svc.login("a@b.c", "first").await.is_err());
        assert!(svc.login("a@b.c", "second").await.is_ok());
    }
}
