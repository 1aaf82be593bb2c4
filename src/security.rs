use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Algorithm identifier embedded in every encoded hash
pub const HASH_ALGORITHM: &str = "argon2id";

/// The only Argon2 version this implementation accepts (0x13)
pub const HASH_VERSION: u32 = 0x13;

/// Errors produced while hashing or verifying a password
#[derive(Error, Debug)]
pub enum HashError {
    #[error("encoded hash is not in correct format: {0}")]
    Decode(String),

    #[error("incompatible version of argon2: {0}")]
    Version(u32),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2id cost parameters
///
/// `memory_cost` is expressed in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    pub memory_cost: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub salt_length: usize,
    pub key_length: usize,
}

impl Default for HashParams {
    /// 32 MiB, 4 iterations, 4 lanes, 16-byte salt, 32-byte digest
    fn default() -> Self {
        Self {
            memory_cost: 32 * 1024,
            iterations: 4,
            parallelism: 4,
            salt_length: 16,
            key_length: 32,
        }
    }
}

/// An encoded hash split back into its parts
#[derive(Debug, Clone)]
pub struct DecodedHash {
    pub params: HashParams,
    pub salt: Vec<u8>,
    pub digest: Vec<u8>,
}

// =============================================================================
// Hashing
// =============================================================================

/// Hash a password with the default parameters
pub fn hash_password_default(password: &str) -> Result<String, HashError> {
    hash_password(password, &HashParams::default())
}

/// Hash a password, returning the self-describing encoded form
///
/// Output format: `$argon2id$v=19$m=<mem>,t=<iter>,p=<par>$<salt>$<hash>`
/// with salt and hash in unpadded standard base64. A fresh salt is drawn
/// from the OS random source on every call.
pub fn hash_password(password: &str, params: &HashParams) -> Result<String, HashError> {
    let mut salt = vec![0u8; params.salt_length];
    OsRng.fill_bytes(&mut salt);

    let digest = derive(password, &salt, params)?;

    Ok(encode_hash(params, &salt, &digest))
}

/// Verify a password against an encoded hash
///
/// The digest is recomputed with the embedded parameters and compared in
/// constant time.
pub fn verify_password(password: &str, encoded_hash: &str) -> Result<bool, HashError> {
    let decoded = decode_hash(encoded_hash)?;
    let computed = derive(password, &decoded.salt, &decoded.params)?;

    Ok(computed.ct_eq(&decoded.digest).into())
}

fn derive(password: &str, salt: &[u8], params: &HashParams) -> Result<Vec<u8>, HashError> {
    let argon_params = Params::new(
        params.memory_cost,
        params.iterations,
        params.parallelism,
        Some(params.key_length),
    )
    .map_err(|e| HashError::Hashing(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut digest = vec![0u8; params.key_length];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut digest)
        .map_err(|e| HashError::Hashing(e.to_string()))?;

    Ok(digest)
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode parameters, salt and digest into the standard string form
pub fn encode_hash(params: &HashParams, salt: &[u8], digest: &[u8]) -> String {
    format!(
        "${}$v={}$m={},t={},p={}${}${}",
        HASH_ALGORITHM,
        HASH_VERSION,
        params.memory_cost,
        params.iterations,
        params.parallelism,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest),
    )
}

/// Decode an encoded hash back into parameters, salt and digest
///
/// Salt and key lengths are recovered from the decoded byte lengths.
pub fn decode_hash(encoded_hash: &str) -> Result<DecodedHash, HashError> {
    let segments: Vec<&str> = encoded_hash.split('$').collect();
    if segments.len() != 6 || !segments[0].is_empty() {
        return Err(HashError::Decode(format!(
            "expected 6 segments, found {}",
            segments.len()
        )));
    }

    if segments[1] != HASH_ALGORITHM {
        return Err(HashError::Decode(format!(
            "unsupported algorithm '{}'",
            segments[1]
        )));
    }

    let version = segments[2]
        .strip_prefix("v=")
        .ok_or_else(|| HashError::Decode("missing version field".to_string()))
        .and_then(|v| parse_number::<u32>(v, "version"))?;
    if version != HASH_VERSION {
        return Err(HashError::Version(version));
    }

    let (memory_cost, iterations, parallelism) = parse_costs(segments[3])?;

    let salt = STANDARD_NO_PAD
        .decode(segments[4])
        .map_err(|e| HashError::Decode(format!("invalid salt encoding: {}", e)))?;

    let digest = STANDARD_NO_PAD
        .decode(segments[5])
        .map_err(|e| HashError::Decode(format!("invalid digest encoding: {}", e)))?;

    Ok(DecodedHash {
        params: HashParams {
            memory_cost,
            iterations,
            parallelism,
            salt_length: salt.len(),
            key_length: digest.len(),
        },
        salt,
        digest,
    })
}

fn parse_costs(segment: &str) -> Result<(u32, u32, u32), HashError> {
    let fields: Vec<&str> = segment.split(',').collect();
    if fields.len() != 3 {
        return Err(HashError::Decode(format!(
            "expected 3 cost parameters, found {}",
            fields.len()
        )));
    }

    let field = |raw: &str, prefix: &str, name: &str| -> Result<u32, HashError> {
        raw.strip_prefix(prefix)
            .ok_or_else(|| HashError::Decode(format!("missing {} parameter", name)))
            .and_then(|v| parse_number::<u32>(v, name))
    };

    Ok((
        field(fields[0], "m=", "memory")?,
        field(fields[1], "t=", "iterations")?,
        field(fields[2], "p=", "parallelism")?,
    ))
}

fn parse_number<T: std::str::FromStr>(raw: &str, name: &str) -> Result<T, HashError> {
    raw.parse()
        .map_err(|_| HashError::Decode(format!("invalid {} value '{}'", name, raw)))
}
