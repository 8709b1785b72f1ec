//! Authentication extractors for axum.

use std::path::Path;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use petreg_core::AuthConfig;
use serde::Serialize;

use super::AuthError;
use super::clients::ClientManager;
use super::guard::AuthGuard;
use super::jwt::{ClientKind, TokenIssuer, UserKind, extract_from_header};
use super::models::{Client, User};
use super::password::CredentialHasher;
use super::permissions::{PermissionResolver, Requirement};
use super::principal::PrincipalResolver;
use super::store::SledAuthStore;
use super::users::UserManager;

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration, with generated secrets filled in.
    pub config: AuthConfig,
    /// Backing store.
    pub store: Arc<SledAuthStore>,
    /// Credential hasher.
    pub hasher: CredentialHasher,
    /// Client token issuer.
    pub client_tokens: TokenIssuer<ClientKind>,
    /// User token issuer.
    pub user_tokens: TokenIssuer<UserKind>,
    /// Request-time gate.
    pub guard: AuthGuard,
}

impl AuthState {
    /// Build auth state over an open store, generating any missing token secret.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(mut config: AuthConfig, store: Arc<SledAuthStore>) -> Result<Self, AuthError> {
        let client_secret = ensure_secret(&mut config.client_token_secret, "client");
        let user_secret = ensure_secret(&mut config.user_token_secret, "user");
        config
            .validate()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let client_tokens = TokenIssuer::from_hex_secret(
            &client_secret,
            config.algorithm,
            config.client_token_expiry(),
        )?;
        let user_tokens = TokenIssuer::from_hex_secret(
            &user_secret,
            config.algorithm,
            config.user_token_expiry(),
        )?;
        let hasher = CredentialHasher::new(&config.hashing)?;

        let principals =
            PrincipalResolver::new(client_tokens.clone(), user_tokens.clone(), store.clone());
        let permissions = PermissionResolver::new(store.clone());

        Ok(Self {
            config,
            store,
            hasher,
            client_tokens,
            user_tokens,
            guard: AuthGuard::new(principals, permissions),
        })
    }

    /// Open the store under `data_dir` and build auth state over it.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the configuration is invalid.
    pub fn open(config: AuthConfig, data_dir: &Path) -> Result<Self, AuthError> {
        let store = SledAuthStore::open(data_dir)?;
        Self::new(config, Arc::new(store))
    }

    /// Client administration and login.
    #[must_use]
    pub const fn clients(&self) -> ClientManager<'_> {
        ClientManager::new(self)
    }

    /// User administration and login.
    #[must_use]
    pub const fn users(&self) -> UserManager<'_> {
        UserManager::new(self)
    }

    /// Permission resolver.
    #[must_use]
    pub const fn permissions(&self) -> &PermissionResolver {
        self.guard.permissions()
    }
}

fn ensure_secret(slot: &mut Option<String>, kind: &str) -> String {
    if let Some(secret) = slot {
        return secret.clone();
    }
    let secret = TokenIssuer::<ClientKind>::generate_hex_secret();
    *slot = Some(secret.clone());
    tracing::info!(kind, "Generated new token secret");
    secret
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("algorithm", &self.config.algorithm)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::TokenInvalid("Missing Authorization header".to_string()))?;

    extract_from_header(header)
        .ok_or_else(|| AuthError::TokenInvalid("Invalid Authorization header format".to_string()))
}

/// The active client behind a client token.
#[derive(Debug, Clone)]
pub struct CurrentClient(pub Client);

impl<S> FromRequestParts<S> for CurrentClient
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = Arc::<AuthState>::from_ref(state);
        let token = bearer_token(parts).map_err(IntoResponse::into_response)?;

        auth_state
            .guard
            .authorize_client(token)
            .map(Self)
            .map_err(IntoResponse::into_response)
    }
}

/// The active user behind a user token.
///
/// Handlers gate further with [`CurrentUser::require_permission`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The authenticated user.
    pub user: User,
    state: Arc<AuthState>,
}

impl CurrentUser {
    /// Require a permission.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if the user lacks it.
    pub fn require_permission(&self, codename: &str) -> Result<(), AuthError> {
        self.check(&Requirement::permission(codename))
    }

    /// Require superuser status.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` for non-superusers.
    pub fn require_superuser(&self) -> Result<(), AuthError> {
        self.check(&Requirement::Superuser)
    }

    /// Require a permission unless the user is a superuser.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` if neither holds.
    pub fn require_permission_or_superuser(&self, codename: &str) -> Result<(), AuthError> {
        self.check(&Requirement::PermissionOrSuperuser(codename.to_string()))
    }

    fn check(&self, requirement: &Requirement) -> Result<(), AuthError> {
        self.state
            .permissions()
            .check(&self.user, requirement)
            .inspect_err(|e| {
                tracing::debug!(user_id = %self.user.id, error = %e, "Handler permission check failed");
            })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = Arc::<AuthState>::from_ref(state);
        let token = bearer_token(parts).map_err(IntoResponse::into_response)?;

        let user = auth_state
            .guard
            .authorize_user(token, &Requirement::Authenticated)
            .map_err(IntoResponse::into_response)?;

        Ok(Self {
            user,
            state: auth_state,
        })
    }
}

/// Require superuser extractor.
#[derive(Debug, Clone)]
pub struct RequireSuperuser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireSuperuser
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        current
            .require_superuser()
            .map_err(IntoResponse::into_response)?;
        Ok(Self(current))
    }
}

/// Error response for auth failures.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "token_expired",
                "Token expired".to_string(),
            ),
            Self::TokenInvalid(_) | Self::InvalidSubjectFormat | Self::PrincipalNotFound => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Could not validate credentials".to_string(),
            ),
            Self::PermissionDenied(codename) => {
                tracing::debug!(codename = %codename, "Rejecting request without permission");
                (
                    StatusCode::FORBIDDEN,
                    "permission_denied",
                    "Not enough permissions".to_string(),
                )
            }
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            Self::PrincipalInactive => (StatusCode::FORBIDDEN, "inactive", self.to_string()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict", self.to_string()),
            Self::InvalidState(_) => (StatusCode::BAD_REQUEST, "invalid_state", self.to_string()),
            Self::Validation(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                self.to_string(),
            ),
            Self::Storage(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal error".to_string(),
                )
            }
        };

        let mut response = (
            status,
            Json(AuthErrorResponse {
                error: message,
                code,
            }),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    use super::*;
    use crate::setup::seed_catalog;
    use crate::testing;

    async fn me(CurrentUser { user, .. }: CurrentUser) -> String {
        user.email
    }

    async fn delete_pet(current: CurrentUser) -> Result<&'static str, AuthError> {
        current.require_permission("delete_pet")?;
        Ok("deleted")
    }

    async fn list_users(RequireSuperuser(current): RequireSuperuser) -> String {
        current.user.email
    }

    async fn whoami(CurrentClient(client): CurrentClient) -> String {
        client.client_id
    }

    fn app(state: Arc<AuthState>) -> Router {
        Router::new()
            .route("/me", get(me))
            .route("/pets/delete", get(delete_pet))
            .route("/users", get(list_users))
            .route("/client", get(whoami))
            .with_state(state)
    }

    fn request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthenticated() {
        let (_dir, state) = testing::state();
        let response = app(state).oneshot(request("/me", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(body_json(response).await["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_user_routes() {
        let (_dir, state) = testing::state();
        seed_catalog(&state.store).unwrap();
        let user = state
            .users()
            .register("member@example.com", "password123")
            .unwrap();
        let token = state.users().login("member@example.com", "password123").unwrap();
        let app = app(state.clone());

        let response = app
            .clone()
            .oneshot(request("/me", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The seeded user group holds the pet permissions.
        let response = app
            .clone()
            .oneshot(request("/pets/delete", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("/users", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "permission_denied");
        assert!(!body["error"].as_str().unwrap().contains("superuser"));

        state.users().deactivate(user.id).unwrap();
        let response = app
            .oneshot(request("/me", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn test_permission_denied_hides_codename() {
        let (_dir, state) = testing::state();
        let user = state
            .users()
            .create("bare@example.com", "password123", false)
            .unwrap();
        let token = state.user_tokens.issue(&user.id, None).unwrap();

        let response = app(state)
            .oneshot(request("/pets/delete", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert!(!body["error"].as_str().unwrap().contains("delete_pet"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let (_dir, state) = testing::state();
        let user = state
            .users()
            .create("a@example.com", "password123", false)
            .unwrap();
        let token = state
            .user_tokens
            .issue(&user.id, Some(Duration::ZERO))
            .unwrap();

        let response = app(state)
            .oneshot(request("/me", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "token_expired");
    }

    #[tokio::test]
    async fn test_superuser_route() {
        let (_dir, state) = testing::state();
        let admin = state
            .users()
            .create("root@example.com", "password123", true)
            .unwrap();
        let token = state.user_tokens.issue(&admin.id, None).unwrap();

        let response = app(state)
            .oneshot(request("/users", Some(&token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_client_route_rejects_user_token() {
        let (_dir, state) = testing::state();
        let issued = state.clients().create().unwrap();
        let client_token = state
            .clients()
            .login(&issued.client_id, issued.client_secret.expose(), None)
            .unwrap();
        let user = state
            .users()
            .create("a@example.com", "password123", false)
            .unwrap();
        let user_token = state.user_tokens.issue(&user.id, None).unwrap();
        let app = app(state);

        let response = app
            .clone()
            .oneshot(request("/client", Some(&client_token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("/client", Some(&user_token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(request("/me", Some(&client_token.access_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_generated_secrets_differ() {
        let (_dir, state) = testing::state();
        assert_ne!(
            state.config.client_token_secret,
            state.config.user_token_secret
        );
        assert!(state.config.client_token_secret.is_some());
    }

    #[test]
    fn test_equal_secrets_rejected() {
        let (_dir, store) = testing::store();
        let secret = TokenIssuer::<ClientKind>::generate_hex_secret();
        let config = AuthConfig::builder()
            .client_token_secret(secret.clone())
            .user_token_secret(secret)
            .hashing(testing::fast_hashing())
            .build();

        assert!(matches!(
            AuthState::new(config, store),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_oversized_expiry_rejected_at_startup() {
        let (_dir, store) = testing::store();
        let config = AuthConfig::builder()
            .client_token_expiry_days(300_000_000_000_000)
            .hashing(testing::fast_hashing())
            .build();

        assert!(matches!(
            AuthState::new(config, store),
            Err(AuthError::Config(_))
        ));
    }
}
