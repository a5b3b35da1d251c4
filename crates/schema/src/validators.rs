//! Primitive value validators attached to schema fields.

use base64::Engine as _;
use tfk8s_core::Value;

use crate::ValidationError;

/// Validator signature: the value under test and the field key used in messages.
pub type Validator = fn(&Value, &str) -> Vec<ValidationError>;

/// Octal file mode bits: must start with `0`, parse as octal and lie within `0..=0777`.
/// Each failing check reports independently.
pub fn validate_mode_bits(value: &Value, key: &str) -> Vec<ValidationError> {
    let Some(s) = value.as_str() else {
        return vec![ValidationError::new(key, format!("expected an octal mode string, found {}", value.kind_name()))];
    };
    let mut es = Vec::new();
    if !s.starts_with('0') {
        es.push(ValidationError::new(key, format!("value {} should start with '0' (octal numeral)", s)));
    }
    match i64::from_str_radix(s, 8) {
        Ok(v) if !(0..=0o777).contains(&v) => {
            es.push(ValidationError::new(key, format!("({:#o}) expects octal notation (a value between 0 and 0777)", v)));
        }
        Ok(_) => {}
        Err(e) => es.push(ValidationError::new(key, format!("cannot parse octal numeral ({:?}): {}", s, e))),
    }
    es
}

/// Standard padded base64. Non-string input (including null) is rejected, not fatal.
pub fn validate_base64_encoded(value: &Value, key: &str) -> Vec<ValidationError> {
    let Some(s) = value.as_str() else {
        return vec![ValidationError::new(key, "must be a non-nil base64-encoded string")];
    };
    match base64::engine::general_purpose::STANDARD.decode(s) {
        Ok(_) => Vec::new(),
        Err(_) => vec![ValidationError::new(key, "must be a base64-encoded string")],
    }
}

/// Parse an already validated mode string into its numeric value.
pub fn parse_mode_bits(s: &str) -> Option<i32> {
    i32::from_str_radix(s, 8).ok().filter(|v| (0..=0o777).contains(v))
}

/// Render numeric mode bits the way users write them (`0644`).
pub fn format_mode_bits(mode: i32) -> String {
    format!("0{:o}", mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits() {
        for ok in ["0", "0001", "0644", "0777"] {
            let es = validate_mode_bits(&Value::from(ok), "mode");
            assert!(es.is_empty(), "expected {ok} to be valid: {es:?}");
        }
        for bad in ["-5", "-1", "512", "777", "0778", "01000"] {
            assert!(!validate_mode_bits(&Value::from(bad), "mode").is_empty(), "expected {bad} to be invalid");
        }
        assert!(!validate_mode_bits(&Value::Int(420), "mode").is_empty());
    }

    #[test]
    fn mode_bits_reports_each_failure() {
        // no leading zero and out of range
        let es = validate_mode_bits(&Value::from("1000"), "mode");
        assert_eq!(es.len(), 2);
        assert!(es.iter().all(|e| e.key == "mode"));
    }

    #[test]
    fn base64() {
        let elf = "f0VMRgIBAQAAAAAAAAAAAAMAPgABAAAAMGEAAAAAAABAAAAAAAAAAKATAgAAAAAAAAAAAEAAOAALAEAAHAAbAAYAAAAEAAAAQAAAAAAAAABAAAAAAAAAAEAAAAAAAAAAaAIAAA==";
        for ok in ["", "Cg==", "blah", "VGVzdAo=", elf] {
            let es = validate_base64_encoded(&Value::from(ok), "binary_data");
            assert!(es.is_empty(), "expected {ok:?} to be valid: {es:?}");
        }
        for bad in [Value::Null, Value::from("bl ah"), Value::from("blahd"), Value::from("C=")] {
            assert!(!validate_base64_encoded(&bad, "binary_data").is_empty(), "expected {bad:?} to be invalid");
        }
    }

    #[test]
    fn mode_bits_format_round_trip() {
        assert_eq!(parse_mode_bits("0644"), Some(420));
        assert_eq!(format_mode_bits(420), "0644");
        assert_eq!(format_mode_bits(0), "00");
        assert_eq!(parse_mode_bits("00"), Some(0));
        assert_eq!(parse_mode_bits("0800"), None);
    }
}
