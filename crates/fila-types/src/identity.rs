//! National-ID credential handling shared by the client and the server.

use sha2::{Digest, Sha256};

pub const CPF_DIGITS: usize = 11;
pub const SUS_CARD_MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("CPF must have {CPF_DIGITS} digits")]
    InvalidCpf,
    #[error("SUS card must have between 1 and {SUS_CARD_MAX_DIGITS} digits")]
    InvalidSusCard,
}

/// Strips punctuation ("123.456.789-01") and checks the digit count.
pub fn normalize_cpf(raw: &str) -> Result<String, CredentialError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != CPF_DIGITS {
        return Err(CredentialError::InvalidCpf);
    }
    Ok(digits)
}

pub fn normalize_sus_card(raw: &str) -> Result<String, CredentialError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > SUS_CARD_MAX_DIGITS {
        return Err(CredentialError::InvalidSusCard);
    }
    Ok(digits)
}

/// Deterministic lookup key for a normalised CPF.
pub fn national_id_hash(cpf: &str) -> String {
    hex::encode(Sha256::digest(cpf.as_bytes()))
}
