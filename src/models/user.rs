//! CMS user model: credentials, bearer tokens, and per-project scopes.
//!
//! All of the logic here is pure and synchronous; persistence of mutated
//! users is the caller's responsibility (see `db::repositories::user`).

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// How long an issued token stays valid.
pub const TOKEN_VALIDITY_MS: i64 = 8 * 60 * 60 * 1000;

/// Salted password credential.
///
/// The salt doubles as the HMAC key, which binds the whole password to the
/// salt rather than merely prefixing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Hex digest of HMAC-SHA-512(key = salt, msg = password).
    pub hash: String,

    /// Hex-encoded random salt, unique per user.
    pub salt: String,
}

impl Credential {
    /// Creates a fresh credential for `password` with a new random salt.
    #[must_use]
    pub fn create(password: &str) -> Self {
        let mut salt_bytes = [0u8; 128];
        rand::Rng::fill(&mut rand::rng(), &mut salt_bytes[..]);
        let salt = hex::encode(salt_bytes);
        let hash = Self::digest(password, &salt);

        Self { hash, salt }
    }

    /// Recomputes the digest with the stored salt and compares exactly.
    /// Never errors; any mismatch is simply `false`.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        Self::digest(password, &self.salt) == self.hash
    }

    fn digest(password: &str, salt: &str) -> String {
        // new_from_slice only fails on zero-length keys, which we never produce
        let mut mac = HmacSha512::new_from_slice(salt.as_bytes())
            .unwrap_or_else(|_| HmacSha512::new_from_slice(b"-").expect("non-empty key"));
        mac.update(password.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// A bearer token entry on a user's session list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Opaque random key (20 bytes, hex encoded).
    pub key: String,

    /// Absolute expiry as milliseconds since the Unix epoch.
    pub expires: i64,
}

impl AuthToken {
    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires < now_ms
    }
}

/// A CMS user with an ordered token list and a project → scopes mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    pub username: String,

    pub full_name: String,

    pub is_admin: bool,

    pub credential: Credential,

    /// Active tokens, oldest first. Multiple concurrent sessions are allowed.
    pub tokens: Vec<AuthToken>,

    /// Project name → scope strings (e.g. "content.read").
    pub scopes: BTreeMap<String, Vec<String>>,

    /// Optimistic-concurrency counter; incremented by every persisted write.
    pub revision: i64,

    pub created_at: String,

    pub updated_at: String,
}

impl User {
    /// Creates a new user with a freshly salted credential and no sessions.
    #[must_use]
    pub fn new(username: &str, full_name: &str, password: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            full_name: full_name.to_string(),
            is_admin: false,
            credential: Credential::create(password),
            tokens: Vec::new(),
            scopes: BTreeMap::new(),
            revision: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Issues a new token valid for [`TOKEN_VALIDITY_MS`], purging expired
    /// entries first. Returns the key; the caller persists the user.
    pub fn issue_token(&mut self) -> String {
        self.cleanup_tokens();

        let key = generate_token_key();
        let expires = now_ms() + TOKEN_VALIDITY_MS;

        self.tokens.push(AuthToken {
            key: key.clone(),
            expires,
        });

        key
    }

    /// Scans the token list newest-first. Expired entries encountered on the
    /// way are removed (cleanup amortized across request traffic); an
    /// unexpired match returns `true` and retains the token.
    pub fn validate_token(&mut self, key: &str) -> bool {
        let now = now_ms();

        for i in (0..self.tokens.len()).rev() {
            if self.tokens[i].is_expired(now) {
                self.tokens.remove(i);
            } else if self.tokens[i].key == key {
                return true;
            }
        }

        false
    }

    /// Removes all expired tokens. Idempotent.
    pub fn cleanup_tokens(&mut self) {
        let now = now_ms();
        self.tokens.retain(|t| !t.is_expired(now));
    }

    /// Clears the whole token list — forced logout of every session.
    pub fn revoke_tokens(&mut self) {
        self.tokens.clear();
    }

    /// Removes one token by key. Returns whether anything was removed.
    pub fn remove_token(&mut self, key: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.key != key);
        self.tokens.len() != before
    }

    /// Pure scope query; a project with no entry yields an empty set.
    /// Admins bypass scope checks entirely.
    #[must_use]
    pub fn has_scope(&self, project: &str, scope: &str) -> bool {
        if self.is_admin {
            return true;
        }

        self.scopes
            .get(project)
            .is_some_and(|s| s.iter().any(|v| v == scope))
    }

    /// Scopes granted for `project`, empty when absent. Never mutates.
    #[must_use]
    pub fn scopes_for(&self, project: &str) -> &[String] {
        self.scopes.get(project).map_or(&[], Vec::as_slice)
    }

    /// Merges `scopes` into the project entry with set semantics: each
    /// requested scope is added only if absent.
    pub fn grant_scopes(&mut self, project: &str, scopes: &[String]) {
        let entry = self.scopes.entry(project.to_string()).or_default();

        for scope in scopes {
            if !entry.contains(scope) {
                entry.push(scope.clone());
            }
        }
    }

    /// Drops the project entry entirely. Returns whether it existed.
    /// The last-authorized-user invariant is enforced by the auth service,
    /// which can see the full user collection.
    pub fn revoke_project(&mut self, project: &str) -> bool {
        self.scopes.remove(project).is_some()
    }

    /// Rotates the password credential and revokes every session.
    pub fn set_password(&mut self, password: &str) {
        self.credential = Credential::create(password);
        self.revoke_tokens();
    }

    /// Whether this user holds any scope entry for `project`.
    #[must_use]
    pub fn is_scoped_to(&self, project: &str) -> bool {
        self.scopes.contains_key(project)
    }
}

/// 20 random bytes, hex encoded (160 bits of entropy).
#[must_use]
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; 20];
    rand::Rng::fill(&mut rand::rng(), &mut bytes[..]);
    hex::encode(bytes)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new("alice", "Alice", "secret123")
    }

    #[test]
    fn test_credential_round_trip() {
        let cred = Credential::create("secret123");
        assert!(cred.verify("secret123"));
        assert!(!cred.verify("secret124"));
        assert!(!cred.verify(""));
    }

    #[test]
    fn test_salts_are_unique() {
        let a = Credential::create("same");
        let b = Credential::create("same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_issue_then_validate() {
        let mut u = user();
        let key = u.issue_token();
        assert!(u.validate_token(&key));
        // token is retained after a successful validation
        assert_eq!(u.tokens.len(), 1);
    }

    #[test]
    fn test_expired_token_is_rejected_and_removed() {
        let mut u = user();
        let key = u.issue_token();
        u.tokens[0].expires = now_ms() - 1;

        assert!(!u.validate_token(&key));
        assert!(u.tokens.is_empty());
    }

    #[test]
    fn test_validate_purges_other_expired_tokens() {
        let mut u = user();
        let stale = u.issue_token();
        let fresh = u.issue_token();
        u.tokens[0].expires = now_ms() - 1;

        assert!(u.validate_token(&fresh));
        assert_eq!(u.tokens.len(), 1);
        assert!(!u.validate_token(&stale));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut u = user();
        u.issue_token();
        u.issue_token();
        u.tokens[0].expires = now_ms() - 1;

        u.cleanup_tokens();
        let after_first = u.tokens.clone();
        u.cleanup_tokens();
        assert_eq!(u.tokens, after_first);
        assert_eq!(u.tokens.len(), 1);
    }

    #[test]
    fn test_multiple_concurrent_sessions() {
        let mut u = user();
        let a = u.issue_token();
        let b = u.issue_token();
        assert!(u.validate_token(&a));
        assert!(u.validate_token(&b));
    }

    #[test]
    fn test_revoke_tokens_clears_all() {
        let mut u = user();
        let key = u.issue_token();
        u.revoke_tokens();
        assert!(!u.validate_token(&key));
    }

    #[test]
    fn test_has_scope_is_pure() {
        let u = user();
        assert!(!u.has_scope("proj1", "content.read"));
        // the query must not create an empty entry as a side effect
        assert!(u.scopes.is_empty());
    }

    #[test]
    fn test_grant_scopes_merges_as_set() {
        let mut u = user();
        u.grant_scopes("proj1", &["content.read".to_string()]);
        u.grant_scopes(
            "proj1",
            &["content.read".to_string(), "content.write".to_string()],
        );

        assert_eq!(u.scopes_for("proj1").len(), 2);
        assert!(u.has_scope("proj1", "content.read"));
        assert!(u.has_scope("proj1", "content.write"));
        assert!(!u.has_scope("proj1", "settings.write"));
    }

    #[test]
    fn test_admin_bypasses_scope_checks() {
        let mut u = user();
        u.is_admin = true;
        assert!(u.has_scope("anything", "content.write"));
    }

    #[test]
    fn test_set_password_revokes_sessions() {
        let mut u = user();
        let key = u.issue_token();
        u.set_password("new-secret");

        assert!(!u.validate_token(&key));
        assert!(u.credential.verify("new-secret"));
        assert!(!u.credential.verify("secret123"));
    }
}
