//! User directory: registration, sign-in and profile edits.
//!
//! Passwords are hashed with Argon2id and a random salt; the PHC string keeps
//! the algorithm parameters and salt alongside the hash.

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::error::{StoreError, StoreResult};
use crate::store::{GoalStore, find_mut};
use crate::types::{Profile, User, new_id};

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// `Ok(false)` on a mismatch; `Err` only when the stored hash is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

fn credentials(err: argon2::password_hash::Error) -> StoreError {
    StoreError::Credentials(err.to_string())
}

impl GoalStore {
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.state.users.iter().find(|u| u.email == email)
    }

    /// Duplicate-email check; `register_user` itself does not repeat it.
    pub fn ensure_email_available(&self, email: &str) -> StoreResult<()> {
        match self.user_by_email(email) {
            Some(_) => Err(StoreError::AuthConflict(email.to_string())),
            None => Ok(()),
        }
    }

    /// Stores the new user without touching the session.
    pub fn create_user(&mut self, registration: Registration) -> StoreResult<User> {
        let password_hash = hash_password(&registration.password).map_err(credentials)?;
        let user = User {
            id: new_id(),
            name: registration.name,
            email: registration.email,
            password_hash,
            profile: registration.profile,
            created_at: Utc::now(),
        };
        tracing::info!(user_id = %user.id, "user registered");
        self.state.users.push(user.clone());
        Ok(user)
    }

    /// Stores the new user and signs them in.
    pub fn register_user(&mut self, registration: Registration) -> StoreResult<User> {
        let user = self.create_user(registration)?;
        self.state.current_user_id = Some(user.id.clone());
        Ok(user)
    }

    /// The user matching an email/password pair, if any. Leaves the session alone.
    pub fn authenticate(&self, email: &str, password: &str) -> StoreResult<Option<User>> {
        let Some(user) = self.user_by_email(email) else {
            return Ok(None);
        };
        let matched = verify_password(password, &user.password_hash).map_err(credentials)?;
        if matched {
            tracing::info!(user_id = %user.id, "credentials accepted");
        } else {
            tracing::info!("credentials rejected");
        }
        Ok(matched.then(|| user.clone()))
    }

    /// Signs in on a matching email/password pair; any mismatch signs the session out.
    pub fn sign_in(&mut self, email: &str, password: &str) -> StoreResult<Option<User>> {
        let matched = self.authenticate(email, password)?;
        self.state.current_user_id = matched.as_ref().map(|u| u.id.clone());
        Ok(matched)
    }

    pub fn sign_out(&mut self) {
        self.state.current_user_id = None;
    }

    pub fn update_profile(&mut self, user_id: &str, patch: Profile) -> StoreResult<bool> {
        let outcome = find_mut(&mut self.state.users, user_id).map(|user| {
            user.profile.get_or_insert_with(Profile::default).merge(patch);
        });
        self.settle("update_profile", outcome)
    }
}
