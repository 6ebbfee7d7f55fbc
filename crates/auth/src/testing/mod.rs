//! Test doubles and fixtures shared by unit and integration tests
//!
//! Enabled for this crate's own tests and, for other crates, through the
//! `test-support` feature. Never compiled into the server binary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use smartspend_common::RepositoryError;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwt::AccessTokenSigner;
use crate::providers::{Jwk, KeySet, KeySetSource};
use crate::store::UserStore;
use crate::types::{Currency, ProviderKind, User};

pub const FIXTURE_KID: &str = "fixture-key-1";
pub const OTHER_KID: &str = "fixture-key-2";

/// 2048-bit RSA key published under [`FIXTURE_KID`]
pub const PROVIDER_KEY_PEM: &str = include_str!("fixtures/provider_key.pem");
/// 2048-bit RSA key that is never published
pub const OTHER_PROVIDER_KEY_PEM: &str = include_str!("fixtures/other_provider_key.pem");

const PROVIDER_KEY_MODULUS: &str = "vc5w9se9HHI-rXDhlTnVoLyjMOkJNqvW0MOaZtmJhq0SuEeGAg597ekl2nSwHUMaN5diJnw-e262JPv5zs17YDvR9euoCMTGYX-K97LiufyR0nIXtt-r8EppCdLAbeUHRqZBkrfdNHKO3CceTCLRUAjyrmG-xsPHbvk_j6vIgswK77YCYARLSc8QhKcEMy65tb7IpIL3WVyUT3x4kgTL7YbnPFcf5Ui9kj5rkN6xVfzbsgLs_XxWiiuz8CNyMjWXOcWOwBs41o_yQIsGn9Ybater1nYo2_iXMWocAz5DH9H38SGGw-kNot8u0IEhdWLUJJOqzVTQX7bjcdpohWSaIQ";
const OTHER_PROVIDER_KEY_MODULUS: &str = "sMLtbOTg7vN0mSzrsoxqzPhLMT-C3dXWt_sMsFPk-9CLiOXUu-NjdA79wELQGLq-nWoRmxdHLTpL0cVGtq5lEZGagHtKN06cl-ABjvoRFuoVhZpQkRmsO63chtBIOM0-_lpJA09tPo2OxysTfIxO50XND0pTi-Y-1crRnokxkgqkuk_tDMB4oVgidodErVZTLWkcahKQiQuqU-gbVpbwmH9t5ArF9PEY1G7xgLxvrm_toiyRH8SeTs8ESUU8uiK_7CEclxhra8zjbcWLbSFHP3_Ye_V4kB4PQDZe9pCohg6YqVK-JtCMyGP2hGrt0rl1q4-_vuut5n-eFPwxJlW2VQ";

/// Public half of [`PROVIDER_KEY_PEM`]
pub fn fixture_jwk() -> Jwk {
    Jwk {
        kty: "RSA".to_string(),
        kid: FIXTURE_KID.to_string(),
        use_: "sig".to_string(),
        alg: "RS256".to_string(),
        n: PROVIDER_KEY_MODULUS.to_string(),
        e: "AQAB".to_string(),
    }
}

/// Public half of [`OTHER_PROVIDER_KEY_PEM`], published under [`OTHER_KID`]
pub fn other_jwk() -> Jwk {
    Jwk {
        kid: OTHER_KID.to_string(),
        n: OTHER_PROVIDER_KEY_MODULUS.to_string(),
        ..fixture_jwk()
    }
}

/// Key set served from memory, with a fetch counter and a switchable outage
#[derive(Default)]
pub struct StaticKeySetSource {
    keys: Mutex<Vec<Jwk>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl StaticKeySetSource {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self {
            keys: Mutex::new(keys),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        let source = Self::default();
        source.set_failing(true);
        source
    }

    pub fn set_keys(&self, keys: Vec<Jwk>) {
        *self.keys.lock().unwrap_or_else(|e| e.into_inner()) = keys;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch(&self) -> Result<KeySet, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::UpstreamUnavailable(
                "key set endpoint unreachable".to_string(),
            ));
        }
        Ok(KeySet {
            keys: self.keys.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        })
    }
}

/// Sign `claims` with the published fixture key, RS256, under `kid`
pub fn sign_provider_token(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    sign_provider_token_with_header(header, claims)
}

/// Sign `claims` with the published fixture key and an arbitrary header
pub fn sign_provider_token_with_header(header: Header, claims: &Value) -> String {
    sign_with_pem(header, claims, PROVIDER_KEY_PEM)
}

/// Sign `claims` with a key that matches no published modulus
pub fn sign_with_other_key(header: Header, claims: &Value) -> String {
    sign_with_pem(header, claims, OTHER_PROVIDER_KEY_PEM)
}

fn sign_with_pem(header: Header, claims: &Value, pem: &str) -> String {
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key is valid PEM");
    encode(&header, claims, &key).expect("fixture token signs")
}

/// Google ID token claims valid for the next hour, one subject per email
pub fn google_claims(audience: &str, email: &str) -> Value {
    let now = Utc::now();
    json!({
        "iss": "https://accounts.google.com",
        "aud": audience,
        "azp": audience,
        "sub": format!("google-{}", email),
        "email": email,
        "email_verified": true,
        "given_name": "Ana",
        "family_name": "Petrova",
        "picture": "https://lh3.googleusercontent.com/a/photo.jpg",
        "iat": now.timestamp(),
        "exp": (now + Duration::hours(1)).timestamp(),
    })
}

/// Apple identity token claims valid for the next ten minutes.
///
/// The subject is fixed, so every token belongs to the same Apple account.
pub fn apple_claims(audience: &str, email: Option<&str>) -> Value {
    let now = Utc::now();
    let mut claims = json!({
        "iss": "https://appleid.apple.com",
        "aud": audience,
        "sub": "001234.apple-subject",
        "iat": now.timestamp(),
        "exp": (now + Duration::minutes(10)).timestamp(),
    });
    if let Some(email) = email {
        claims["email"] = json!(email);
    }
    claims
}

/// Access token for `user_id` as if issued at `issued_at`
pub fn mint_access_token(config: &AuthConfig, user_id: Uuid, issued_at: DateTime<Utc>) -> String {
    AccessTokenSigner::new(config)
        .and_then(|signer| signer.issue_at(user_id, issued_at))
        .expect("test signer issues tokens")
}

/// Google user holding `refresh_token` until `expires_at`
pub fn user_with_refresh_token(refresh_token: &str, expires_at: DateTime<Utc>) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        first_name: "Ana".to_string(),
        last_name: "Petrova".to_string(),
        username: "ana".to_string(),
        google_email: Some(format!("ana.{}@gmail.com", id.simple())),
        apple_email: None,
        google_subject: Some(format!("google-{}", id.simple())),
        apple_subject: None,
        refresh_token: refresh_token.to_string(),
        refresh_token_expires_at: expires_at,
        avatar_url: None,
        created_at: Utc::now(),
        balance: Decimal::ZERO,
        monthly_saving_goal: Decimal::ZERO,
        preferred_currency: Currency::Mkd,
    }
}

/// [`UserStore`] over a process-local map
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.lock().insert(user.id, user);
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn find_user_by_provider_email(
        &self,
        provider: ProviderKind,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        if email.is_empty() {
            return Ok(None);
        }
        Ok(self
            .lock()
            .values()
            .find(|user| provider_email(user, provider) == Some(email))
            .cloned())
    }

    async fn find_user_by_provider_subject(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> Result<Option<User>, RepositoryError> {
        if subject.is_empty() {
            return Ok(None);
        }
        Ok(self
            .lock()
            .values()
            .find(|user| user.provider_subject(provider) == Some(subject))
            .cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.lock();
        let taken = users.values().any(|existing| {
            existing.id == user.id
                || [ProviderKind::Google, ProviderKind::Apple]
                    .into_iter()
                    .any(|provider| {
                        let email_clash = provider_email(user, provider)
                            .is_some_and(|email| provider_email(existing, provider) == Some(email));
                        let subject_clash = user.provider_subject(provider).is_some_and(|subject| {
                            existing.provider_subject(provider) == Some(subject)
                        });
                        email_clash || subject_clash
                    })
        });
        if taken {
            return Err(RepositoryError::AlreadyExists);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.lock();
        match users.get_mut(&user.id) {
            Some(existing) => {
                existing.first_name = user.first_name.clone();
                existing.last_name = user.last_name.clone();
                existing.username = user.username.clone();
                existing.avatar_url = user.avatar_url.clone();
                existing.balance = user.balance;
                existing.monthly_saving_goal = user.monthly_saving_goal;
                existing.preferred_currency = user.preferred_currency;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn update_refresh_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut users = self.lock();
        match users.get_mut(&id) {
            Some(user) => {
                user.refresh_token = token.to_string();
                user.refresh_token_expires_at = expires_at;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
        new_expiry: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut users = self.lock();
        match users.get_mut(&id) {
            Some(user) if !expected.is_empty() && user.refresh_token == expected => {
                user.refresh_token = new_token.to_string();
                user.refresh_token_expires_at = new_expiry;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn provider_email(user: &User, provider: ProviderKind) -> Option<&str> {
    match provider {
        ProviderKind::Google => user.google_email.as_deref(),
        ProviderKind::Apple => user.apple_email.as_deref(),
    }
}
