//! Identity provider seam.
//!
//! Archetypes and confirmation actors are anchored to a [`HumanIdentity`].
//! Resolving an email into one is the job of an external directory; the
//! crate ships [`LocalIdentityProvider`] for single-machine use.

use dashmap::DashMap;

use crate::error::IdentityError;
use crate::primitive::HumanIdentity;

/// Resolves people by email.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, email: &str) -> Result<HumanIdentity, IdentityError>;

    /// Every identity the provider knows about, sorted by email.
    fn list_available(&self) -> Vec<HumanIdentity>;
}

/// In-process identity directory.
///
/// Registered identities resolve as stored. Any other well-formed email
/// resolves to a minimal identity named after its local part
/// (`ana.silva@example.com` → `Ana Silva`).
#[derive(Debug, Default)]
pub struct LocalIdentityProvider {
    known: DashMap<String, HumanIdentity>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identity: HumanIdentity) -> Result<(), IdentityError> {
        let email = normalize_email(&identity.email)?;
        self.known.insert(email, identity);
        Ok(())
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn resolve(&self, email: &str) -> Result<HumanIdentity, IdentityError> {
        let key = normalize_email(email)?;
        if let Some(identity) = self.known.get(&key) {
            return Ok(identity.clone());
        }
        let local = key.split('@').next().unwrap_or_default();
        Ok(HumanIdentity::new(email.trim(), display_name_from(local)))
    }

    fn list_available(&self) -> Vec<HumanIdentity> {
        let mut all: Vec<HumanIdentity> = self.known.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.email.cmp(&b.email));
        all
    }
}

/// Lowercased, trimmed email, or an error when it is not `local@domain`.
fn normalize_email(email: &str) -> Result<String, IdentityError> {
    let trimmed = email.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !trimmed.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(IdentityError::InvalidEmail {
            email: email.to_string(),
        });
    }
    Ok(trimmed.to_lowercase())
}

fn display_name_from(local: &str) -> String {
    local
        .split(['.', '_', '-', '+'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
