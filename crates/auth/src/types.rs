//! User records and verified identities
//!
//! `User` is owned by the persistence layer; this crate reads and writes it
//! only through the [`UserStore`](crate::UserStore) interface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currency a user keeps their books in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Mkd,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Mkd => "MKD",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MKD" => Ok(Currency::Mkd),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            other => Err(format!("unknown currency: {}", other)),
        }
    }
}

/// External identity provider that vouched for a sign-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Apple,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Apple => write!(f, "apple"),
        }
    }
}

/// Identity asserted by a provider token that passed every verification step.
///
/// Transient: mapped onto `User` fields on sign-up, never stored as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub provider: ProviderKind,
    /// Provider-side subject identifier
    pub subject: String,
    /// May be empty for Apple when the email scope was not granted
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture_url: Option<String>,
}

/// SmartSpend user record.
///
/// `google_email` and `apple_email` are mutually exclusive; both are unset
/// while an Apple sign-up without email is pending profile completion.
/// The provider subject is the stable account key and is set for the provider
/// the user signed up with. An empty `refresh_token` means the user is logged out.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub google_email: Option<String>,
    pub apple_email: Option<String>,
    pub google_subject: Option<String>,
    pub apple_subject: Option<String>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub balance: Decimal,
    pub monthly_saving_goal: Decimal,
    pub preferred_currency: Currency,
}

impl User {
    /// Build a new user record from a verified identity.
    ///
    /// The refresh token is left empty; the caller grants one before saving.
    pub fn from_identity(identity: &VerifiedIdentity) -> Self {
        let id = Uuid::new_v4();
        let email = (!identity.email.is_empty()).then(|| identity.email.clone());
        let subject = (!identity.subject.is_empty()).then(|| identity.subject.clone());

        let (google_email, apple_email, google_subject, apple_subject) = match identity.provider {
            ProviderKind::Google => (email, None, subject, None),
            ProviderKind::Apple => (None, email, None, subject),
        };

        Self {
            id,
            first_name: identity.given_name.clone().unwrap_or_default(),
            last_name: identity.family_name.clone().unwrap_or_default(),
            username: derive_username(&identity.email, id),
            google_email,
            apple_email,
            google_subject,
            apple_subject,
            refresh_token: String::new(),
            refresh_token_expires_at: DateTime::<Utc>::UNIX_EPOCH,
            avatar_url: identity.picture_url.clone(),
            created_at: Utc::now(),
            balance: Decimal::ZERO,
            monthly_saving_goal: Decimal::ZERO,
            preferred_currency: Currency::default(),
        }
    }

    pub fn provider_subject(&self, provider: ProviderKind) -> Option<&str> {
        match provider {
            ProviderKind::Google => self.google_subject.as_deref(),
            ProviderKind::Apple => self.apple_subject.as_deref(),
        }
    }

    pub fn is_logged_out(&self) -> bool {
        self.refresh_token.is_empty()
    }
}

/// Username from the email local part, or an id-based placeholder without email
fn derive_username(email: &str, id: Uuid) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => format!("user_{}", &id.simple().to_string()[..8]),
    }
}
