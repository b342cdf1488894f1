use thiserror::Error;

/// Unified error type for the entire tradewallet-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / Backup ────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: wrong password or corrupted backup")]
    Decryption,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Storage error on key '{key}': {message}")]
    Storage { key: String, message: String },

    // ── Authentication ──────────────────────────────────────────────
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use: {0}")]
    EmailTaken(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<aes_gcm::Error> for CoreError {
    fn from(_: aes_gcm::Error) -> Self {
        CoreError::Decryption
    }
}

impl From<argon2::password_hash::Error> for CoreError {
    fn from(e: argon2::password_hash::Error) -> Self {
        CoreError::PasswordHash(e.to_string())
    }
}
