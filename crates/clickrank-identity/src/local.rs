//! Local identity provider
//!
//! Credentials have the form `<user id>.<hex Ed25519 signature of the user id>`.
//! User ids are the first 14 bytes of SHA-256 over the normalized email,
//! hex encoded. Passwords are kept only as salted SHA-256 digests.

use std::collections::HashMap;
use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use clickrank_core::{ClickrankError, ClickrankResult, NewUser, UserId};

use crate::IdentityVerifier;

const USER_ID_BYTES: usize = 14;
const SALT_BYTES: usize = 16;

/// Stored account
#[derive(Clone)]
pub struct Account {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    salt: [u8; SALT_BYTES],
    password_digest: [u8; 32],
}

impl Account {
    /// Check a password against the stored digest
    pub fn password_matches(&self, password: &str) -> bool {
        password_digest(&self.salt, password) == self.password_digest
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Identity provider holding its own signing key and account table
pub struct LocalIdentityProvider {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    accounts: RwLock<HashMap<UserId, Account>>,
}

impl LocalIdentityProvider {
    /// Provider with a freshly generated key
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Provider with a fixed key (credentials survive restarts)
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(bytes))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        LocalIdentityProvider {
            signing_key,
            verifying_key,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Register an account synchronously
    pub fn register(&self, user: NewUser) -> ClickrankResult<UserId> {
        let email = normalize_email(&user.email);
        let user_id = derive_user_id(&email);

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&user_id) {
            return Err(ClickrankError::AccountExists(email));
        }

        let mut salt = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt);
        let account = Account {
            user_id: user_id.clone(),
            password_digest: password_digest(&salt, &user.password),
            salt,
            email,
            display_name: user.display_name,
        };
        accounts.insert(user_id.clone(), account);

        tracing::info!(user = %user_id, "account created");
        Ok(user_id)
    }

    /// Mint a credential for a known user
    pub fn issue_credential(&self, user: &UserId) -> ClickrankResult<String> {
        if !self.accounts.read().contains_key(user) {
            return Err(ClickrankError::Identity(format!("unknown user {}", user)));
        }
        let signature = self.signing_key.sign(user.as_str().as_bytes());
        Ok(format!("{}.{}", user, hex::encode(signature.to_bytes())))
    }

    /// Look up an account by id
    pub fn account(&self, user: &UserId) -> Option<Account> {
        self.accounts.read().get(user).cloned()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    fn check_credential(&self, credential: &str) -> ClickrankResult<UserId> {
        let (user, signature) = credential
            .split_once('.')
            .ok_or(ClickrankError::InvalidCredential)?;

        let bytes: [u8; 64] = hex::decode(signature)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(ClickrankError::InvalidCredential)?;
        let signature = Signature::from_bytes(&bytes);

        self.verifying_key
            .verify(user.as_bytes(), &signature)
            .map_err(|_| ClickrankError::InvalidCredential)?;

        let user = UserId::new(user);
        if !self.accounts.read().contains_key(&user) {
            return Err(ClickrankError::InvalidCredential);
        }
        Ok(user)
    }
}

impl IdentityVerifier for LocalIdentityProvider {
    async fn verify(&self, credential: &str) -> ClickrankResult<UserId> {
        self.check_credential(credential)
    }

    async fn create_user(&self, user: NewUser) -> ClickrankResult<UserId> {
        self.register(user)
    }

    fn credential_for(&self, user: &UserId) -> Option<String> {
        self.issue_credential(user).ok()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn derive_user_id(email: &str) -> UserId {
    let hash = Sha256::digest(email.as_bytes());
    UserId::new(hex::encode(&hash[..USER_ID_BYTES]))
}

fn password_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}
