//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref KPP_RE: Regex = Regex::new(r"^\d{4}[\dA-Z]{2}\d{3}$").unwrap();
}

/// Checksum weights for 10-digit (organization) INN.
const INN10_WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
/// Checksum weights for the 11th digit of a 12-digit (individual) INN.
const INN12_WEIGHTS_11: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
/// Checksum weights for the 12th digit of a 12-digit (individual) INN.
const INN12_WEIGHTS_12: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];

fn inn_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    sum % 11 % 10
}

/// Returns true when the value is a well-formed INN (taxpayer number) with a
/// valid checksum. Accepts 10-digit organization and 12-digit individual codes.
pub fn is_valid_inn(inn: &str) -> bool {
    let digits: Option<Vec<u32>> = inn.chars().map(|c| c.to_digit(10)).collect();
    let Some(digits) = digits else {
        return false;
    };

    match digits.len() {
        10 => inn_check_digit(&digits[..9], &INN10_WEIGHTS) == digits[9],
        12 => {
            inn_check_digit(&digits[..10], &INN12_WEIGHTS_11) == digits[10]
                && inn_check_digit(&digits[..11], &INN12_WEIGHTS_12) == digits[11]
        }
        _ => false,
    }
}

/// Validates an INN (taxpayer identification number).
pub fn validate_inn(inn: &str) -> Result<(), ValidationError> {
    if is_valid_inn(inn) {
        Ok(())
    } else {
        let mut err = ValidationError::new("inn_invalid");
        err.message = Some("INN must be 10 or 12 digits with a valid checksum".into());
        Err(err)
    }
}

/// Validates a KPP (tax registration reason code): 9 characters, NNNNPPNNN.
pub fn validate_kpp(kpp: &str) -> Result<(), ValidationError> {
    if KPP_RE.is_match(kpp) {
        Ok(())
    } else {
        let mut err = ValidationError::new("kpp_invalid");
        err.message = Some("KPP must be 9 characters in the NNNNPPNNN format".into());
        Err(err)
    }
}

/// Validates that a connection URL uses http or https and has a host part.
pub fn validate_base_url(url: &str) -> Result<(), ValidationError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => {
            let mut err = ValidationError::new("base_url_invalid");
            err.message = Some("Base URL must start with http:// or https://".into());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_organization_inn() {
        assert!(is_valid_inn("7707083893"));
        assert!(validate_inn("7707083893").is_ok());
    }

    #[test]
    fn test_valid_individual_inn() {
        assert!(is_valid_inn("500100732259"));
    }

    #[test]
    fn test_inn_bad_checksum() {
        assert!(!is_valid_inn("7707083894"));
        assert!(!is_valid_inn("500100732258"));
    }

    #[test]
    fn test_inn_wrong_length_or_chars() {
        assert!(!is_valid_inn(""));
        assert!(!is_valid_inn("123"));
        assert!(!is_valid_inn("77070838a3"));
    }

    #[test]
    fn test_validate_inn_error_message() {
        let err = validate_inn("1").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "INN must be 10 or 12 digits with a valid checksum"
        );
    }

    #[test]
    fn test_validate_kpp() {
        assert!(validate_kpp("773601001").is_ok());
        assert!(validate_kpp("7736AB001").is_ok());
        assert!(validate_kpp("77360100").is_err());
        assert!(validate_kpp("7736ab001").is_err());
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://portal.bitrix24.ru/rest").is_ok());
        assert!(validate_base_url("http://1c.local").is_ok());
        assert!(validate_base_url("ftp://1c.local").is_err());
        assert!(validate_base_url("https://").is_err());
        assert!(validate_base_url("portal.bitrix24.ru").is_err());
    }
}
