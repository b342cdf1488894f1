use chrono::Utc;
use uuid::Uuid;

use crate::config::TradeWalletConfig;
use crate::errors::CoreError;
use crate::models::state::WalletState;
use crate::models::user::{
    AdminOverview, GeneratedAdmin, LoginRequest, NewUser, RegisterRequest, Role, User, UserPatch,
    UserQuery, UserSortKey,
};
use crate::storage::encryption;

/// Demo accounts seeded into an empty store: (name, email, password, role).
pub const DEMO_ACCOUNTS: [(&str, &str, &str, Role); 2] = [
    ("admin", "admin@gmail.com", "admin123", Role::Admin),
    ("user", "user@gmail.com", "user123", Role::User),
];

/// Accounts, sessions and the admin user-management actions.
///
/// Pure state manipulation over `WalletState`; persistence is the caller's job.
pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        Self
    }

    /// Build the demo accounts with freshly hashed passwords.
    pub fn demo_users(&self, config: &TradeWalletConfig) -> Result<Vec<User>, CoreError> {
        DEMO_ACCOUNTS
            .iter()
            .map(|(name, email, password, role)| {
                Ok(User {
                    id: Uuid::new_v4(),
                    name: (*name).to_string(),
                    first_name: String::new(),
                    email: (*email).to_string(),
                    phone: String::new(),
                    password_hash: encryption::hash_password(password, &config.password_kdf)?,
                    role: *role,
                    created_at: Utc::now(),
                })
            })
            .collect()
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Open a session for the account matching email and password.
    /// Any mismatch yields `InvalidCredentials` and leaves the session untouched.
    pub fn login(&self, state: &mut WalletState, req: &LoginRequest) -> Result<User, CoreError> {
        let user = state
            .find_user_by_email(&req.email)
            .filter(|u| encryption::verify_password(&req.password, &u.password_hash))
            .cloned()
            .ok_or(CoreError::InvalidCredentials)?;

        state.session = Some(user.id);
        tracing::debug!(user_id = %user.id, "login succeeded");
        Ok(user)
    }

    /// Create a `User` account and log it in.
    pub fn register(
        &self,
        state: &mut WalletState,
        req: &RegisterRequest,
        config: &TradeWalletConfig,
    ) -> Result<User, CoreError> {
        let email = req.email.trim();
        if state.find_user_by_email(email).is_some() {
            return Err(CoreError::EmailTaken(email.to_string()));
        }
        if req.password != req.confirm_password {
            return Err(CoreError::PasswordMismatch);
        }
        Self::validate_email(email)?;
        Self::validate_password(&req.password, config)?;

        let user = User {
            id: Uuid::new_v4(),
            name: Self::name_or_email_prefix(&req.name, email),
            first_name: req.first_name.trim().to_string(),
            email: email.to_string(),
            phone: req.phone.trim().to_string(),
            password_hash: encryption::hash_password(&req.password, &config.password_kdf)?,
            role: Role::User,
            created_at: Utc::now(),
        };

        state.users.push(user.clone());
        state.session = Some(user.id);
        tracing::debug!(user_id = %user.id, "account registered");
        Ok(user)
    }

    pub fn logout(&self, state: &mut WalletState) {
        state.session = None;
    }

    /// The logged-in user, or `NotAuthenticated`.
    pub fn require_user<'a>(&self, state: &'a WalletState) -> Result<&'a User, CoreError> {
        state.current_user().ok_or(CoreError::NotAuthenticated)
    }

    /// The logged-in user if they are an admin; `Forbidden` otherwise.
    pub fn require_admin<'a>(&self, state: &'a WalletState) -> Result<&'a User, CoreError> {
        let user = self.require_user(state)?;
        if !user.is_admin() {
            return Err(CoreError::Forbidden("admin role required".into()));
        }
        Ok(user)
    }

    // ── Admin: user management ──────────────────────────────────────

    pub fn list_users(&self, state: &WalletState) -> Result<Vec<User>, CoreError> {
        self.require_admin(state)?;
        Ok(state.users.clone())
    }

    /// Filter by a case-insensitive substring of name, first name, email or
    /// role, then sort. Text columns compare case-insensitively.
    pub fn search_users(&self, state: &WalletState, query: &UserQuery) -> Result<Vec<User>, CoreError> {
        self.require_admin(state)?;
        let term = query.query.trim().to_lowercase();

        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| {
                term.is_empty()
                    || u.name.to_lowercase().contains(&term)
                    || u.first_name.to_lowercase().contains(&term)
                    || u.email.to_lowercase().contains(&term)
                    || u.role.as_str().contains(&term)
            })
            .cloned()
            .collect();

        users.sort_by(|a, b| {
            let ordering = match query.sort_key {
                UserSortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                UserSortKey::FirstName => a.first_name.to_lowercase().cmp(&b.first_name.to_lowercase()),
                UserSortKey::Email => a.email.to_lowercase().cmp(&b.email.to_lowercase()),
                UserSortKey::Role => a.role.as_str().cmp(b.role.as_str()),
                UserSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            query.direction.apply(ordering)
        });
        Ok(users)
    }

    pub fn create_user(
        &self,
        state: &mut WalletState,
        new_user: &NewUser,
        config: &TradeWalletConfig,
    ) -> Result<User, CoreError> {
        self.require_admin(state)?;
        let email = new_user.email.trim();
        Self::validate_email(email)?;
        if state.find_user_by_email(email).is_some() {
            return Err(CoreError::EmailTaken(email.to_string()));
        }
        Self::validate_password(&new_user.password, config)?;

        let user = User {
            id: Uuid::new_v4(),
            name: Self::name_or_email_prefix(&new_user.name, email),
            first_name: new_user.first_name.trim().to_string(),
            email: email.to_string(),
            phone: new_user.phone.trim().to_string(),
            password_hash: encryption::hash_password(&new_user.password, &config.password_kdf)?,
            role: new_user.role,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        tracing::debug!(user_id = %user.id, role = %user.role, "account created by admin");
        Ok(user)
    }

    /// Apply a partial update. The patch is fully validated before any
    /// field changes.
    pub fn update_user(
        &self,
        state: &mut WalletState,
        user_id: Uuid,
        patch: &UserPatch,
        config: &TradeWalletConfig,
    ) -> Result<User, CoreError> {
        self.require_admin(state)?;

        let new_email = match &patch.email {
            Some(email) => {
                let email = email.trim();
                Self::validate_email(email)?;
                let taken = state
                    .users
                    .iter()
                    .any(|u| u.id != user_id && u.email.eq_ignore_ascii_case(email));
                if taken {
                    return Err(CoreError::EmailTaken(email.to_string()));
                }
                Some(email.to_string())
            }
            None => None,
        };
        let new_hash = match &patch.password {
            Some(password) => {
                Self::validate_password(password, config)?;
                Some(encryption::hash_password(password, &config.password_kdf)?)
            }
            None => None,
        };

        let user = Self::find_user_mut(state, user_id)?;
        if let Some(name) = &patch.name {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                user.name = trimmed.to_string();
            }
        }
        if let Some(first_name) = &patch.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(email) = new_email {
            user.email = email;
        }
        if let Some(phone) = &patch.phone {
            user.phone = phone.trim().to_string();
        }
        if let Some(hash) = new_hash {
            user.password_hash = hash;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    /// Delete an account. Its transactions and portfolios are kept.
    /// Deleting the logged-in account ends the session.
    pub fn delete_user(&self, state: &mut WalletState, user_id: Uuid) -> Result<bool, CoreError> {
        self.require_admin(state)?;
        let before = state.users.len();
        state.users.retain(|u| u.id != user_id);
        let removed = state.users.len() < before;
        if removed && state.session == Some(user_id) {
            state.session = None;
        }
        Ok(removed)
    }

    pub fn set_role(&self, state: &mut WalletState, user_id: Uuid, role: Role) -> Result<User, CoreError> {
        self.require_admin(state)?;
        let user = Self::find_user_mut(state, user_id)?;
        user.role = role;
        Ok(user.clone())
    }

    /// Flip between `User` and `Admin`.
    pub fn toggle_role(&self, state: &mut WalletState, user_id: Uuid) -> Result<User, CoreError> {
        self.require_admin(state)?;
        let current = state
            .find_user(user_id)
            .map(|u| u.role)
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))?;
        self.set_role(state, user_id, current.toggled())
    }

    pub fn reset_password(
        &self,
        state: &mut WalletState,
        user_id: Uuid,
        new_password: &str,
        config: &TradeWalletConfig,
    ) -> Result<(), CoreError> {
        self.require_admin(state)?;
        Self::validate_password(new_password, config)?;
        let hash = encryption::hash_password(new_password, &config.password_kdf)?;
        Self::find_user_mut(state, user_id)?.password_hash = hash;
        Ok(())
    }

    /// Create an admin with a random email and password. The password is
    /// returned once and never stored in clear.
    pub fn create_raw_admin(
        &self,
        state: &mut WalletState,
        config: &TradeWalletConfig,
    ) -> Result<GeneratedAdmin, CoreError> {
        self.require_admin(state)?;

        let password_len = config.min_password_len.max(12);
        let email = loop {
            let candidate = format!("admin-{}@tradewallet.local", encryption::random_token(6)?);
            if state.find_user_by_email(&candidate).is_none() {
                break candidate;
            }
        };
        let password = encryption::random_token(password_len)?;

        let user = User {
            id: Uuid::new_v4(),
            name: email.split('@').next().unwrap_or("admin").to_string(),
            first_name: String::new(),
            email,
            phone: String::new(),
            password_hash: encryption::hash_password(&password, &config.password_kdf)?,
            role: Role::Admin,
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        tracing::debug!(user_id = %user.id, "generated admin account");
        Ok(GeneratedAdmin { user, password })
    }

    pub fn overview(&self, state: &WalletState) -> Result<AdminOverview, CoreError> {
        self.require_admin(state)?;
        Ok(AdminOverview {
            total_users: state.users.len(),
            total_admins: state.users.iter().filter(|u| u.is_admin()).count(),
            total_transactions: state.transactions.len(),
            sum_total: state.transactions.iter().map(|t| t.total).sum(),
        })
    }

    // ── Internal ────────────────────────────────────────────────────

    fn find_user_mut(state: &mut WalletState, user_id: Uuid) -> Result<&mut User, CoreError> {
        state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| CoreError::UserNotFound(user_id.to_string()))
    }

    fn validate_email(email: &str) -> Result<(), CoreError> {
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(()),
            _ => Err(CoreError::ValidationError(format!("Invalid email address '{email}'"))),
        }
    }

    fn validate_password(password: &str, config: &TradeWalletConfig) -> Result<(), CoreError> {
        if password.chars().count() < config.min_password_len {
            return Err(CoreError::ValidationError(format!(
                "Password must be at least {} characters",
                config.min_password_len
            )));
        }
        Ok(())
    }

    fn name_or_email_prefix(name: &str, email: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            email.split('@').next().unwrap_or(email).to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}
