// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server registration, agent authorization, and status tracking.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::password_hash::rand_core::OsRng;
use argon2::Argon2;
use chrono::Utc;
use rand::RngCore;
use tracing::info;
use uuid::Uuid;

use horizonx_protocol::AgentCredentials;

use crate::bus::{Bus, topics};
use crate::domain::events::ServerStatusChanged;
use crate::domain::{Event, ListResult, Meta, OsInfo, Server, ServerListOptions, ServerSaveRequest};
use crate::error::{CoreError, Result};
use crate::persistence::ServerRepository;

/// Length of the random API token secret in bytes (hex-encoded on the wire).
const TOKEN_BYTES: usize = 32;

pub struct ServerService {
    repo: Arc<dyn ServerRepository>,
    bus: Arc<Bus>,
}

impl ServerService {
    pub fn new(repo: Arc<dyn ServerRepository>, bus: Arc<Bus>) -> Self {
        Self { repo, bus }
    }

    pub async fn list(&self, opts: ServerListOptions) -> Result<ListResult<Server>> {
        let paginate = opts.list.paginate;
        let (page, limit) = {
            let normalized = opts.list.clone().normalized();
            (normalized.page, normalized.limit)
        };

        let (servers, total) = self.repo.list(&opts).await?;
        Ok(ListResult {
            data: servers,
            meta: paginate.then(|| Meta::calculate(total, page, limit)),
        })
    }

    pub async fn get(&self, server_id: Uuid) -> Result<Server> {
        self.repo.get_by_id(server_id).await
    }

    /// Register a new server. Returns the created row and the plaintext API
    /// token; only the argon2 hash is stored, so this is the one time the
    /// token is visible.
    pub async fn register(&self, req: ServerSaveRequest) -> Result<(Server, String)> {
        if req.name.trim().is_empty() {
            return Err(CoreError::validation("name", "required"));
        }

        let mut secret = [0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        let token: String = secret.iter().map(|b| format!("{:02x}", b)).collect();

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(token.as_bytes(), &salt)
            .map_err(|e| CoreError::Database {
                operation: "hash_token",
                details: e.to_string(),
            })?
            .to_string();

        let server = Server {
            id: Uuid::nil(),
            name: req.name,
            ip_address: req.ip_address,
            api_token: hash,
            is_online: false,
            os_info: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let created = self.repo.create(&server).await?;
        info!(server_id = %created.id, name = %created.name, "server registered");
        Ok((created, token))
    }

    pub async fn update(&self, server_id: Uuid, req: ServerSaveRequest) -> Result<()> {
        if req.name.trim().is_empty() {
            return Err(CoreError::validation("name", "required"));
        }
        self.repo
            .update(server_id, &req.name, req.ip_address.as_deref())
            .await
    }

    pub async fn delete(&self, server_id: Uuid) -> Result<()> {
        self.repo.soft_delete(server_id).await
    }

    /// Verify agent credentials against the stored token hash.
    ///
    /// The secret is compared with the argon2 verifier (constant-time); any
    /// lookup or verification failure collapses to `Unauthorized` so callers
    /// cannot distinguish a missing server from a bad secret.
    pub async fn authorize_agent(&self, creds: &AgentCredentials) -> Result<Server> {
        let server = self
            .repo
            .get_by_id(creds.server_id)
            .await
            .map_err(|_| CoreError::Unauthorized)?;

        let hash = PasswordHash::new(&server.api_token).map_err(|_| CoreError::Unauthorized)?;
        Argon2::default()
            .verify_password(creds.secret.as_bytes(), &hash)
            .map_err(|_| CoreError::Unauthorized)?;

        Ok(server)
    }

    /// Flip the online flag and broadcast the change.
    pub async fn update_status(&self, server_id: Uuid, is_online: bool) -> Result<()> {
        self.repo.update_status(server_id, is_online).await?;

        self.bus.publish(
            topics::SERVER_STATUS_CHANGED,
            &Event::ServerStatusChanged(ServerStatusChanged {
                server_id,
                is_online,
            }),
        );
        Ok(())
    }

    /// Store the OS details an agent reports on connect.
    pub async fn update_os_info(&self, server_id: Uuid, os_info: OsInfo) -> Result<()> {
        self.repo.update_os_info(server_id, &os_info).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory repository capturing what the service writes.
    #[derive(Default)]
    struct FakeRepo {
        servers: Mutex<Vec<Server>>,
    }

    #[async_trait]
    impl ServerRepository for FakeRepo {
        async fn list(&self, _opts: &ServerListOptions) -> Result<(Vec<Server>, i64)> {
            let servers = self.servers.lock().unwrap().clone();
            let total = servers.len() as i64;
            Ok((servers, total))
        }

        async fn get_by_id(&self, server_id: Uuid) -> Result<Server> {
            self.servers
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.id == server_id)
                .cloned()
                .ok_or(CoreError::NotFound { entity: "server" })
        }

        async fn create(&self, server: &Server) -> Result<Server> {
            let mut created = server.clone();
            created.id = Uuid::new_v4();
            self.servers.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn update(&self, _id: Uuid, _name: &str, _ip: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn soft_delete(&self, _id: Uuid) -> Result<()> {
            Ok(())
        }

        async fn update_status(&self, server_id: Uuid, is_online: bool) -> Result<()> {
            for s in self.servers.lock().unwrap().iter_mut() {
                if s.id == server_id {
                    s.is_online = is_online;
                }
            }
            Ok(())
        }

        async fn update_os_info(&self, _id: Uuid, _os: &OsInfo) -> Result<()> {
            Ok(())
        }
    }

    fn service() -> (ServerService, Arc<Bus>) {
        let bus = Arc::new(Bus::new());
        (
            ServerService::new(Arc::new(FakeRepo::default()), bus.clone()),
            bus,
        )
    }

    #[tokio::test]
    async fn test_register_returns_plaintext_once_and_stores_hash() {
        let (svc, _bus) = service();
        let (server, token) = svc
            .register(ServerSaveRequest {
                name: "edge-1".to_string(),
                ip_address: Some("10.0.0.1".to_string()),
            })
            .await
            .unwrap();

        assert_ne!(server.api_token, token, "plaintext must never be stored");
        assert_eq!(token.len(), TOKEN_BYTES * 2);

        // The stored hash verifies against the returned plaintext.
        let creds = AgentCredentials::new(server.id, token);
        let authorized = svc.authorize_agent(&creds).await.unwrap();
        assert_eq!(authorized.id, server.id);
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let (svc, _bus) = service();
        let err = svc
            .register(ServerSaveRequest {
                name: "  ".to_string(),
                ip_address: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_authorize_agent_rejects_wrong_secret() {
        let (svc, _bus) = service();
        let (server, _token) = svc
            .register(ServerSaveRequest {
                name: "edge-1".to_string(),
                ip_address: None,
            })
            .await
            .unwrap();

        let creds = AgentCredentials::new(server.id, "wrong-secret");
        let err = svc.authorize_agent(&creds).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized));
    }

    #[tokio::test]
    async fn test_authorize_agent_rejects_unknown_server() {
        let (svc, _bus) = service();
        let creds = AgentCredentials::new(Uuid::new_v4(), "anything");
        assert!(matches!(
            svc.authorize_agent(&creds).await.unwrap_err(),
            CoreError::Unauthorized
        ));
    }

    #[tokio::test]
    async fn test_update_status_publishes_event() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let (svc, bus) = service();
        let (server, _token) = svc
            .register(ServerSaveRequest {
                name: "edge-1".to_string(),
                ip_address: None,
            })
            .await
            .unwrap();

        let seen = Arc::new(AtomicBool::new(false));
        let flag = seen.clone();
        bus.subscribe(topics::SERVER_STATUS_CHANGED, move |event| {
            if let Event::ServerStatusChanged(e) = event {
                assert!(e.is_online);
                flag.store(true, Ordering::SeqCst);
            }
        });

        svc.update_status(server.id, true).await.unwrap();
        assert!(seen.load(Ordering::SeqCst));
    }
}
