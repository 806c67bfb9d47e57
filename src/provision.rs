//! Backing-store provisioning.
//!
//! Ensures a private repository exists for the current identity before the
//! store touches the remote. The machine runs
//! `Unchecked → Verifying → {Exists, Creating → {Created, ConflictRetry →
//! Created|Failed}, Failed}`; only success is remembered, so a transient
//! failure is retried on the next call and the remote can self-heal.

use std::sync::{Arc, RwLock};

use crate::remote::{RemoteError, RemoteRepository};

const STORE_DESCRIPTION: &str = "jot journal backing store";

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionState {
    Unchecked,
    Verifying,
    Exists(String),
    Creating(String),
    ConflictRetry(String),
    Created(String),
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("identity could not be verified: {0}")]
    IdentityUnverified(RemoteError),

    #[error("backing store lookup failed: {0}")]
    LookupFailed(RemoteError),

    #[error("backing store creation failed: {0}")]
    CreateFailed(RemoteError),

    /// The renamed retry also collided. Callers fall back to local-only
    /// mode; a manual `provision_fresh` is the way out.
    #[error("backing store name conflict could not be resolved")]
    ConflictUnresolved,
}

/// Deterministic store name: fixed prefix plus the sanitized identity.
pub fn derive_store_name(prefix: &str, identity: &str) -> String {
    format!("{prefix}{}", sanitize(identity))
}

fn sanitize(identity: &str) -> String {
    identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct Provisioner {
    remote: Arc<dyn RemoteRepository>,
    prefix: String,
    state: RwLock<ProvisionState>,
}

impl Provisioner {
    pub fn new(remote: Arc<dyn RemoteRepository>, prefix: &str) -> Self {
        Provisioner {
            remote,
            prefix: prefix.to_string(),
            state: RwLock::new(ProvisionState::Unchecked),
        }
    }

    pub fn state(&self) -> ProvisionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_state(&self, state: ProvisionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Resolve the name of a ready backing store, creating one if needed.
    ///
    /// The supplied identity is only a hint for logging; the canonical
    /// login reported by the remote always wins for name derivation.
    pub fn ensure_ready(&self) -> Result<String, ProvisionError> {
        if let ProvisionState::Exists(name) | ProvisionState::Created(name) = self.state() {
            return Ok(name);
        }

        self.set_state(ProvisionState::Verifying);

        let login = self.remote.viewer_login().map_err(|err| {
            self.set_state(ProvisionState::Unchecked);
            ProvisionError::IdentityUnverified(err)
        })?;

        let name = derive_store_name(&self.prefix, &login);

        match self.remote.list_repositories() {
            Ok(repos) if repos.iter().any(|r| r.name == name) => {
                log::debug!("backing store {name} present in listing");
                self.set_state(ProvisionState::Exists(name.clone()));
                return Ok(name);
            }
            Ok(_) => {}
            Err(err) => {
                // listing can lag or paginate; fall through to the direct
                // check unless the remote is outright unreachable
                if err.degrades_backend() {
                    self.set_state(ProvisionState::Unchecked);
                    return Err(ProvisionError::LookupFailed(err));
                }
            }
        }

        match self.remote.get_repository(&name) {
            Ok(_) => {
                self.set_state(ProvisionState::Exists(name.clone()));
                return Ok(name);
            }
            Err(RemoteError::NotFound) => {}
            Err(err) => {
                self.set_state(ProvisionState::Unchecked);
                return Err(ProvisionError::LookupFailed(err));
            }
        }

        self.set_state(ProvisionState::Creating(name.clone()));
        match self.remote.create_repository(&name, STORE_DESCRIPTION, true) {
            Ok(_) => {
                log::info!("created backing store {name}");
                self.set_state(ProvisionState::Created(name.clone()));
                Ok(name)
            }
            Err(RemoteError::AlreadyExists) => {
                // name taken by a repository this identity cannot see:
                // rename with a timestamp suffix and retry exactly once
                let renamed = format!("{name}-{}", unix_millis());
                log::warn!("backing store name {name} taken, retrying as {renamed}");
                self.set_state(ProvisionState::ConflictRetry(renamed.clone()));

                match self.remote.create_repository(&renamed, STORE_DESCRIPTION, true) {
                    Ok(_) => {
                        log::info!("created backing store {renamed}");
                        self.set_state(ProvisionState::Created(renamed.clone()));
                        Ok(renamed)
                    }
                    Err(RemoteError::AlreadyExists) => {
                        self.set_state(ProvisionState::Failed);
                        Err(ProvisionError::ConflictUnresolved)
                    }
                    Err(err) => {
                        self.set_state(ProvisionState::Failed);
                        Err(ProvisionError::CreateFailed(err))
                    }
                }
            }
            Err(err) => {
                self.set_state(ProvisionState::Failed);
                Err(ProvisionError::CreateFailed(err))
            }
        }
    }

    /// Create a store under a fresh, guaranteed-unique name. Used by the
    /// manual retry action; the caller migrates cache-only records
    /// afterwards.
    pub fn provision_fresh(&self) -> Result<String, ProvisionError> {
        self.set_state(ProvisionState::Verifying);

        let login = self.remote.viewer_login().map_err(|err| {
            self.set_state(ProvisionState::Unchecked);
            ProvisionError::IdentityUnverified(err)
        })?;

        let name = format!(
            "{}-{}",
            derive_store_name(&self.prefix, &login),
            unix_millis()
        );

        self.set_state(ProvisionState::Creating(name.clone()));
        match self.remote.create_repository(&name, STORE_DESCRIPTION, true) {
            Ok(_) => {
                log::info!("created fresh backing store {name}");
                self.set_state(ProvisionState::Created(name.clone()));
                Ok(name)
            }
            Err(RemoteError::AlreadyExists) => {
                self.set_state(ProvisionState::Failed);
                Err(ProvisionError::ConflictUnresolved)
            }
            Err(err) => {
                self.set_state(ProvisionState::Failed);
                Err(ProvisionError::CreateFailed(err))
            }
        }
    }
}
