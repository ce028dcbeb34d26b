//! Password hashing via bcrypt.
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("bcrypt: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash a plaintext password.
pub async fn hash(plaintext: &str) -> Result<String, PasswordError> {
    let plaintext = plaintext.to_owned();
    let digest = tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, BCRYPT_COST)).await??;
    Ok(digest)
}

/// Compare a plaintext password against a stored digest.
pub async fn compare(plaintext: &str, digest: &str) -> Result<bool, PasswordError> {
    let plaintext = plaintext.to_owned();
    let digest = digest.to_owned();
    let matches =
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest)).await??;
    Ok(matches)
}
