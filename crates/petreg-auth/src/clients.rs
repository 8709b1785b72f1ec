//! API client credentials and token exchange.

use std::time::Duration;

use petreg_core::{ClientId, PlainSecret, secrets::generate_token_hex};
use serde::Serialize;

use super::AuthError;
use super::jwt::IssuedToken;
use super::middleware::AuthState;
use super::models::Client;

/// Random bytes in a public client identifier.
pub const CLIENT_ID_BYTES: usize = 16;

/// Random bytes in a client secret.
pub const CLIENT_SECRET_BYTES: usize = 32;

/// Credentials of a newly created client.
///
/// The secret is only ever available here; the store keeps its hash.
#[derive(Debug, Clone)]
pub struct IssuedClientCredentials {
    /// Integer ID (token subject).
    pub id: ClientId,
    /// Public client identifier.
    pub client_id: String,
    /// Plaintext secret.
    pub client_secret: PlainSecret,
}

/// Public view of a client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    /// Integer ID.
    pub id: ClientId,
    /// Public client identifier.
    pub client_id: String,
    /// Whether active.
    pub is_active: bool,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id,
            client_id: client.client_id.clone(),
            is_active: client.is_active,
        }
    }
}

/// Client administration and client login.
#[derive(Debug, Clone, Copy)]
pub struct ClientManager<'a> {
    state: &'a AuthState,
}

impl<'a> ClientManager<'a> {
    pub(crate) const fn new(state: &'a AuthState) -> Self {
        Self { state }
    }

    /// Register a new active client with fresh random credentials.
    ///
    /// # Errors
    ///
    /// Returns error if hashing or storage fails.
    pub fn create(&self) -> Result<IssuedClientCredentials, AuthError> {
        let id = self.state.store.next_client_id()?;
        let client_id = generate_token_hex(CLIENT_ID_BYTES);
        let secret = PlainSecret::generate(CLIENT_SECRET_BYTES);

        let client = Client::new(id, client_id.clone(), self.state.hasher.hash(secret.expose())?);
        self.state.store.insert_client(&client)?;

        tracing::info!(id = %id, client_id = %client_id, "Created client");

        Ok(IssuedClientCredentials {
            id,
            client_id,
            client_secret: secret,
        })
    }

    /// Replace a client's secret and return the new plaintext.
    ///
    /// Tokens already issued stay valid until they expire.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown client, `InvalidState` for an inactive one.
    pub fn rotate_secret(&self, client_id: &str) -> Result<PlainSecret, AuthError> {
        let mut client = self.get(client_id)?;
        if !client.is_active {
            tracing::warn!(client_id, "Refusing to rotate secret of inactive client");
            return Err(AuthError::InvalidState(format!(
                "client {client_id} is inactive"
            )));
        }

        let secret = PlainSecret::generate(CLIENT_SECRET_BYTES);
        client.client_secret_hash = self.state.hasher.hash(secret.expose())?;
        client.touch();
        self.state.store.update_client(&client)?;

        tracing::info!(client_id, "Rotated client secret");
        Ok(secret)
    }

    /// Deactivate a client. Its tokens stop resolving immediately.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown client.
    pub fn deactivate(&self, client_id: &str) -> Result<Client, AuthError> {
        self.set_active(client_id, false)
    }

    /// Reactivate a client.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown client.
    pub fn reactivate(&self, client_id: &str) -> Result<Client, AuthError> {
        self.set_active(client_id, true)
    }

    fn set_active(&self, client_id: &str, active: bool) -> Result<Client, AuthError> {
        let mut client = self.get(client_id)?;
        if client.is_active != active {
            client.is_active = active;
            client.touch();
            self.state.store.update_client(&client)?;
            tracing::info!(client_id, active, "Changed client status");
        }
        Ok(client)
    }

    /// Exchange client credentials for a client token.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCredentials` for an unknown ID or wrong secret, and
    /// `PrincipalInactive` once the secret checks out on an inactive client.
    pub fn login(
        &self,
        client_id: &str,
        client_secret: &str,
        ttl: Option<Duration>,
    ) -> Result<IssuedToken, AuthError> {
        let Some(client) = self.state.store.get_client_by_public_id(client_id)? else {
            self.state.hasher.verify_decoy(client_secret);
            tracing::warn!(client_id, "Client login with unknown id");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .state
            .hasher
            .verify(client_secret, &client.client_secret_hash)
        {
            tracing::warn!(client_id, "Client login with wrong secret");
            return Err(AuthError::InvalidCredentials);
        }

        if !client.is_active {
            tracing::warn!(client_id, "Client login while inactive");
            return Err(AuthError::PrincipalInactive);
        }

        self.state.client_tokens.issue(&client.id, ttl)
    }

    /// Look up a client by public identifier.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown client.
    pub fn get(&self, client_id: &str) -> Result<Client, AuthError> {
        self.state
            .store
            .get_client_by_public_id(client_id)?
            .ok_or_else(|| AuthError::NotFound(format!("client {client_id}")))
    }

    /// List all clients.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<ClientSummary>, AuthError> {
        Ok(self
            .state
            .store
            .list_clients()?
            .iter()
            .map(ClientSummary::from)
            .collect())
    }
}
