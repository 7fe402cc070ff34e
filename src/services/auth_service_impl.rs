//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::db::Store;
use crate::models::User;
use crate::services::auth_service::{AuthError, AuthService, LoginResult, UserInfo};

/// How many times a revision-checked write is retried before giving up.
const UPDATE_RETRIES: usize = 3;

pub struct SeaOrmAuthService {
    store: Store,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Re-reads the user and reapplies `mutate` until the revision-checked
    /// update lands. Concurrent writers interleave instead of overwriting.
    async fn update_with_retry<F>(&self, user_id: &str, mutate: F) -> Result<User, AuthError>
    where
        F: Fn(&mut User),
    {
        for _ in 0..UPDATE_RETRIES {
            let mut user = self
                .store
                .get_user_by_id(user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;

            mutate(&mut user);

            if self.store.update_user(&user).await? {
                user.revision += 1;
                return Ok(user);
            }

            debug!(user_id, "Concurrent user update detected, retrying");
        }

        Err(AuthError::Conflict(
            "User was modified concurrently, please retry".to_string(),
        ))
    }

    fn validate_credentials(username: &str, password: &str) -> Result<(), AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::Validation("Username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("Password must not be empty".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        // Unknown username and wrong password take the same exit
        let mut user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.credential.verify(password) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = user.issue_token();

        if !self.store.update_user(&user).await? {
            // A concurrent write raced the login; retry once on fresh state
            let refreshed = self
                .update_with_retry(&user.id.clone(), |u| {
                    u.cleanup_tokens();
                    u.tokens.push(crate::models::AuthToken {
                        key: token.clone(),
                        expires: chrono::Utc::now().timestamp_millis()
                            + crate::models::TOKEN_VALIDITY_MS,
                    });
                })
                .await?;
            user = refreshed;
        }

        Ok(LoginResult {
            token,
            user: UserInfo::from(&user),
        })
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<UserInfo>, AuthError> {
        // Tokens are per-user, so resolution scans the user collection
        for mut user in self.store.list_users().await? {
            let before = user.tokens.len();
            let valid = user.validate_token(token);

            if user.tokens.len() != before {
                // Persist the purge of expired tokens; losing the race here
                // only delays cleanup to the next scan
                if let Err(err) = self.store.update_user(&user).await {
                    warn!(username = %user.username, "Failed to persist token cleanup: {err}");
                }
            }

            if valid {
                return Ok(Some(UserInfo::from(&user)));
            }
        }

        Ok(None)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        for user in self.store.list_users().await? {
            if user.tokens.iter().any(|t| t.key == token) {
                self.update_with_retry(&user.id, |u| {
                    u.remove_token(token);
                })
                .await?;
                return Ok(());
            }
        }

        Ok(())
    }

    async fn create_user(
        &self,
        username: &str,
        full_name: &str,
        password: &str,
        project: Option<&str>,
        scopes: &[String],
    ) -> Result<UserInfo, AuthError> {
        Self::validate_credentials(username, password)?;

        if let Some(existing) = self.store.get_user_by_username(username).await? {
            // Matching credentials mean an existing user is being invited to
            // another project: merge scopes instead of failing
            if existing.credential.verify(password) {
                if let Some(project) = project {
                    let scopes = scopes.to_vec();
                    let updated = self
                        .update_with_retry(&existing.id, |u| {
                            u.grant_scopes(project, &scopes);
                        })
                        .await?;
                    return Ok(UserInfo::from(&updated));
                }
                return Ok(UserInfo::from(&existing));
            }

            return Err(AuthError::Conflict(format!(
                "Username \"{username}\" is already taken"
            )));
        }

        let mut user = User::new(username, full_name, password);
        if let Some(project) = project {
            user.grant_scopes(project, scopes);
        }

        self.store.insert_user(&user).await?;

        Ok(UserInfo::from(&user))
    }

    async fn list_users(&self, project: Option<&str>) -> Result<Vec<UserInfo>, AuthError> {
        let users = match project {
            Some(project) => self.store.list_users_for_project(project).await?,
            None => self.store.list_users().await?,
        };

        Ok(users.iter().map(UserInfo::from).collect())
    }

    async fn get_user(&self, id: &str) -> Result<UserInfo, AuthError> {
        let user = self
            .store
            .get_user_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserInfo::from(&user))
    }

    async fn delete_user(&self, id: &str) -> Result<(), AuthError> {
        if !self.store.delete_user(id).await? {
            return Err(AuthError::UserNotFound);
        }

        Ok(())
    }

    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.len() < 8 {
            return Err(AuthError::Validation(
                "New password must be at least 8 characters".to_string(),
            ));
        }

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.credential.verify(current_password) {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        // set_password also revokes every session
        self.update_with_retry(&user.id, |u| {
            u.set_password(new_password);
        })
        .await?;

        Ok(())
    }

    async fn grant_scopes(
        &self,
        user_id: &str,
        project: &str,
        scopes: &[String],
    ) -> Result<UserInfo, AuthError> {
        if project.trim().is_empty() {
            return Err(AuthError::Validation("Project must not be empty".to_string()));
        }

        let scopes = scopes.to_vec();
        let updated = self
            .update_with_retry(user_id, |u| {
                u.grant_scopes(project, &scopes);
            })
            .await?;

        Ok(UserInfo::from(&updated))
    }

    async fn revoke_project_scope(
        &self,
        user_id: &str,
        project: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_scoped_to(project) {
            return Ok(());
        }

        // A project must never end up with zero authorized users
        let scoped = self.store.list_users_for_project(project).await?;
        if scoped.len() < 2 {
            return Err(AuthError::Conflict(format!(
                "Cannot remove the only user with access to \"{project}\""
            )));
        }

        self.update_with_retry(user_id, |u| {
            u.revoke_project(project);
        })
        .await?;

        Ok(())
    }

    async fn make_admin(&self, username: &str, password: &str) -> Result<UserInfo, AuthError> {
        if username.trim().is_empty() {
            return Err(AuthError::Validation("Username must not be empty".to_string()));
        }

        let user = match self.store.get_user_by_username(username).await? {
            Some(user) => user,
            None => {
                // Creating the admin on the fly needs a usable password
                Self::validate_credentials(username, password)?;
                let user = User::new(username, username, password);
                self.store.insert_user(&user).await?;
                user
            }
        };

        let updated = self
            .update_with_retry(&user.id, |u| {
                u.is_admin = true;
            })
            .await?;

        Ok(UserInfo::from(&updated))
    }

    async fn revoke_tokens(&self, user_id: &str) -> Result<(), AuthError> {
        self.update_with_retry(user_id, User::revoke_tokens).await?;
        Ok(())
    }
}
