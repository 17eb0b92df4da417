use std::sync::Arc;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{AuthResult, LoginRequest, RegisterRequest},
    errors::AuthError,
    jwt::TokenIssuer,
    password::CredentialHasher,
    repo::UserStore,
    repo_types::{NewUser, UserView},
};

/// Register and login use cases. Stateless apart from the immutable hasher
/// and token issuer, so one instance is shared across all requests.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: CredentialHasher,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, hasher: CredentialHasher, tokens: TokenIssuer) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Creates the user and issues a token for it.
    ///
    /// The email lookup only produces the friendlier error; the store's unique
    /// constraints decide races. If no token can be issued the new row is
    /// deleted again and the call fails as a whole.
    #[instrument(skip(self, req), fields(username = %req.username, email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResult, AuthError> {
        if let Some(existing) = self.store.find_by_email(&req.email).await? {
            if existing.username == req.username {
                warn!("username already registered");
                return Err(AuthError::UsernameTaken);
            }
            warn!("email already registered");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let user = self
            .store
            .insert(NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                full_name: req.full_name,
                avatar_url: req.avatar_url.filter(|url| !url.trim().is_empty()),
            })
            .await
            .map_err(|e| {
                let err = AuthError::from(e);
                if matches!(err, AuthError::UsernameTaken | AuthError::EmailTaken) {
                    warn!(error = %err, "unique constraint rejected insert");
                }
                err
            })?;

        let access_token = match self.tokens.issue(user.id, &user.username, &user.email) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, user_id = %user.id, "jwt sign failed, revoking new user");
                self.revoke(user.id).await;
                return Err(AuthError::internal(e));
            }
        };

        info!(user_id = %user.id, "user registered");
        Ok(AuthResult {
            user: UserView::from(user),
            access_token,
        })
    }

    /// Deletes a half-registered row on its own task, so dropping the
    /// register future does not stop the delete.
    async fn revoke(&self, user_id: Uuid) {
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move { store.delete(user_id).await });
        match task.await {
            Ok(Ok(())) => info!(user_id = %user_id, "new user revoked"),
            Ok(Err(e)) => error!(error = %e, user_id = %user_id, "failed to revoke user row"),
            Err(e) => error!(error = %e, user_id = %user_id, "revoke task aborted"),
        }
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResult, AuthError> {
        let user = match self.store.find_by_email(&req.email).await? {
            Some(u) => u,
            None => {
                warn!("login unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(&req.password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = self.tokens.issue(user.id, &user.username, &user.email)?;

        info!(user_id = %user.id, "user logged in");
        Ok(AuthResult {
            user: UserView::from(user),
            access_token,
        })
    }
}
