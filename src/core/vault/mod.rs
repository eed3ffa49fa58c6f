use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use anyhow::{Result, bail};
use base64::Engine;
use hmac::Mac;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::core::error::invalid;
use crate::core::llm::Provider;

type HmacSha256 = hmac::Hmac<Sha256>;

const NONCE_LEN: usize = 12;

/// Provider credentials with the secret encrypted at rest.
pub struct CredentialVault {
    db: Arc<Mutex<Connection>>,
    cipher: Aes256Gcm,
}

/// A decrypted credential. Only the dispatch path sees this type.
#[derive(Clone)]
pub struct ProviderCredential {
    pub id: String,
    pub provider: Provider,
    pub secret: String,
    pub endpoint_override: Option<String>,
    pub model_family: Option<String>,
    pub model_version: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl std::fmt::Debug for ProviderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredential")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .field("endpoint_override", &self.endpoint_override)
            .field("active", &self.active)
            .finish()
    }
}

/// What list/read endpoints return: the secret is reduced to a presence flag.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub id: String,
    pub provider: Provider,
    pub has_secret: bool,
    pub endpoint_override: Option<String>,
    pub model_family: Option<String>,
    pub model_version: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ProviderCredential> for CredentialSummary {
    fn from(c: &ProviderCredential) -> Self {
        Self {
            id: c.id.clone(),
            provider: c.provider,
            has_secret: !c.secret.is_empty(),
            endpoint_override: c.endpoint_override.clone(),
            model_family: c.model_family.clone(),
            model_version: c.model_version.clone(),
            active: c.active,
            created_at: c.created_at.clone(),
            updated_at: c.updated_at.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Default, Deserialize)]
pub struct CredentialInput {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default)]
    pub model_family: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn hmac_key(label: &[u8], input: &[u8]) -> Result<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(label)
        .map_err(|e| anyhow::anyhow!("HMAC init failed: {}", e))?;
    mac.update(input);
    let mut key = [0u8; 32];
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(key)
}

/// HMAC-SHA256(hostname + username): stable across restarts, tied to the
/// local machine and user.
pub fn machine_key() -> Result<[u8; 32]> {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = whoami::username();
    hmac_key(b"flowdesk-vault-v1", format!("{}{}", hostname, username).as_bytes())
}

pub fn passphrase_key(passphrase: &str) -> Result<[u8; 32]> {
    hmac_key(b"flowdesk-master-v1", passphrase.as_bytes())
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

struct StoredRow {
    id: String,
    provider: Provider,
    secret: String,
    endpoint_override: Option<String>,
    model_family: Option<String>,
    model_version: Option<String>,
    active: bool,
    created_at: String,
    updated_at: String,
}

const CREDENTIAL_COLUMNS: &str = "id, provider, secret, endpoint_override, model_family, \
                                  model_version, active, created_at, updated_at";

fn row_to_stored(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        id: row.get(0)?,
        provider: row.get(1)?,
        secret: row.get(2)?,
        endpoint_override: row.get(3)?,
        model_family: row.get(4)?,
        model_version: row.get(5)?,
        active: row.get::<_, i32>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl CredentialVault {
    pub fn new(db: Arc<Mutex<Connection>>, key: [u8; 32]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { db, cipher }
    }

    /// No UNIQUE constraint on `provider`: uniqueness is kept by the upsert,
    /// and reads tolerate legacy duplicates.
    pub async fn initialize(&self) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "CREATE TABLE IF NOT EXISTS provider_credentials (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                secret TEXT NOT NULL,
                endpoint_override TEXT,
                model_family TEXT,
                model_version TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(())
    }

    /// Returns base64(nonce || ciphertext).
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("Base64 decode failed: {}", e))?;

        if combined.len() <= NONCE_LEN {
            bail!("Encrypted value too short");
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                anyhow::anyhow!("Decryption failed: the vault key does not match this credential")
            })?;

        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("UTF-8 decode failed: {}", e))
    }

    fn open_row(&self, row: StoredRow) -> Result<ProviderCredential> {
        Ok(ProviderCredential {
            secret: self.decrypt(&row.secret)?,
            id: row.id,
            provider: row.provider,
            endpoint_override: row.endpoint_override,
            model_family: row.model_family,
            model_version: row.model_version,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn rows_for(db: &Connection, provider: Provider) -> Result<Vec<StoredRow>> {
        let sql = format!(
            "SELECT {} FROM provider_credentials WHERE provider = ?1
             ORDER BY created_at ASC, rowid ASC",
            CREDENTIAL_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![provider], row_to_stored)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Upsert keyed by provider: an existing row keeps its `id` and
    /// `created_at`; everything else is overwritten.
    pub async fn save_credential(&self, input: &CredentialInput) -> Result<ProviderCredential> {
        let provider_raw = input.provider.trim();
        if provider_raw.is_empty() {
            return Err(invalid("provider is required"));
        }
        let Some(provider) = Provider::from_id(provider_raw) else {
            return Err(invalid(format!("unknown provider '{}'", provider_raw)));
        };
        let secret = input.secret.trim();
        if secret.is_empty() {
            return Err(invalid("secret is required"));
        }
        let encrypted = self.encrypt(secret)?;

        let db = self.db.lock().await;
        let existing = Self::rows_for(&db, provider)?.into_iter().next();
        let id = match existing {
            Some(row) => {
                db.execute(
                    "UPDATE provider_credentials SET secret = ?1, endpoint_override = ?2,
                        model_family = ?3, model_version = ?4, active = ?5,
                        updated_at = CURRENT_TIMESTAMP
                     WHERE id = ?6",
                    params![
                        encrypted,
                        trimmed(&input.endpoint_override),
                        trimmed(&input.model_family),
                        trimmed(&input.model_version),
                        input.active as i32,
                        row.id,
                    ],
                )?;
                row.id
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                db.execute(
                    "INSERT INTO provider_credentials
                        (id, provider, secret, endpoint_override, model_family, model_version, active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        id,
                        provider,
                        encrypted,
                        trimmed(&input.endpoint_override),
                        trimmed(&input.model_family),
                        trimmed(&input.model_version),
                        input.active as i32,
                    ],
                )?;
                id
            }
        };

        let sql = format!(
            "SELECT {} FROM provider_credentials WHERE id = ?1",
            CREDENTIAL_COLUMNS
        );
        let row = db
            .query_row(&sql, params![id], row_to_stored)
            .optional()?
            .ok_or_else(|| anyhow::anyhow!("credential '{}' vanished after write", id))?;
        self.open_row(row)
    }

    /// The earliest row wins when legacy duplicates exist.
    pub async fn get_credential(&self, provider: Provider) -> Result<Option<ProviderCredential>> {
        let db = self.db.lock().await;
        let rows = Self::rows_for(&db, provider)?;
        if rows.len() > 1 {
            warn!(
                "{} credential rows found for provider '{}'; using the earliest ({})",
                rows.len(),
                provider,
                rows[0].id
            );
        }
        match rows.into_iter().next() {
            Some(row) => Ok(Some(self.open_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_credentials(&self) -> Result<Vec<CredentialSummary>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM provider_credentials ORDER BY provider, created_at, rowid",
            CREDENTIAL_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_stored)?;
        let mut out = Vec::new();
        for row in rows {
            let row = row?;
            out.push(CredentialSummary {
                has_secret: !row.secret.is_empty(),
                id: row.id,
                provider: row.provider,
                endpoint_override: row.endpoint_override,
                model_family: row.model_family,
                model_version: row.model_version,
                active: row.active,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }
        Ok(out)
    }

    pub async fn delete_credential(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "DELETE FROM provider_credentials WHERE id = ?1",
            params![id.trim()],
        )?;
        Ok(rows > 0)
    }
}
