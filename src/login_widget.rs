use serde::Deserialize;
use serde_json::Value;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::crypto::{decode_lowercase_hex, hmac_sha256_verify, sha256};
use crate::error::VerifyError;

/// The callback payload produced by the Telegram Login Widget:
/// https://core.telegram.org/widgets/login#receiving-authorization-data
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginWidgetPayload {
    /// Telegram user ID.
    pub id: i64,

    /// User's first name.
    pub first_name: String,

    /// User's last name.
    pub last_name: Option<String>,

    /// Login of the user.
    pub username: Option<String>,

    /// Link to the user's profile photo.
    pub photo_url: Option<String>,

    /// The date the payload was signed. Unix timestamp in seconds.
    pub auth_date: u64,

    /// Payload signature as lowercase hex.
    pub hash: String,
}

/// Type guard for a value that claims to be a Login Widget payload.
///
/// The payload arrives from the browser and is adversarial until proven
/// otherwise, so the shape is checked on the raw JSON value before any
/// field is trusted.
pub fn is_valid_shape(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    object.get("id").is_some_and(Value::is_i64)
        && object.get("first_name").is_some_and(Value::is_string)
        && object.get("auth_date").is_some_and(Value::is_u64)
        && object.get("hash").is_some_and(Value::is_string)
}

/// Verifies a Login Widget payload against the bot token.
///
/// Returns `true` only if the payload is no older than `max_age` and its
/// `hash` is the HMAC-SHA256 of the sorted data-check-string under
/// `SHA256(bot_token)`. Every failure mode answers `false`; this function
/// never panics on adversarial input.
///
/// A payload exactly `max_age` old is still accepted. Callers that need a
/// stricter window should pass a smaller `max_age`.
pub fn verify(payload: &LoginWidgetPayload, bot_token: &str, max_age: Duration) -> bool {
    match check(payload, bot_token, max_age, SystemTime::now()) {
        Ok(()) => true,
        Err(reason) => {
            tracing::debug!(%reason, "login widget payload rejected");
            false
        }
    }
}

fn check(
    payload: &LoginWidgetPayload,
    bot_token: &str,
    max_age: Duration,
    now: SystemTime,
) -> Result<(), VerifyError> {
    if is_expired(payload.auth_date, max_age, now) {
        return Err(VerifyError::Expired);
    }

    let secret_key = sha256(bot_token.as_bytes());
    let tag = decode_lowercase_hex(&payload.hash).ok_or(VerifyError::SignInvalid)?;

    if !hmac_sha256_verify(&secret_key, data_check_string(payload).as_bytes(), &tag) {
        return Err(VerifyError::SignInvalid);
    }

    Ok(())
}

/// Builds the canonical data-check-string: every present field except
/// `hash`, rendered as `name=value`, sorted byte-wise and joined with `\n`.
/// Absent optional fields are omitted entirely, not rendered empty.
fn data_check_string(payload: &LoginWidgetPayload) -> String {
    let mut pairs = vec![
        format!("auth_date={}", payload.auth_date),
        format!("first_name={}", payload.first_name),
        format!("id={}", payload.id),
    ];

    if let Some(last_name) = &payload.last_name {
        pairs.push(format!("last_name={last_name}"));
    }
    if let Some(photo_url) = &payload.photo_url {
        pairs.push(format!("photo_url={photo_url}"));
    }
    if let Some(username) = &payload.username {
        pairs.push(format!("username={username}"));
    }

    pairs.sort();
    pairs.join("\n")
}

fn is_expired(auth_date: u64, max_age: Duration, now: SystemTime) -> bool {
    let now = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now.saturating_sub(auth_date) > max_age.as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hmac_sha256;

    const BOT_TOKEN: &str = "5768337691:AAH5YkoiEuPk8-FZa32hStHTqXiLPtAEhx8";

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// Signs a payload the way Telegram's servers do, so tests can mint
    /// valid fixtures.
    fn signed(mut payload: LoginWidgetPayload) -> LoginWidgetPayload {
        let secret_key = sha256(BOT_TOKEN.as_bytes());
        let tag = hmac_sha256(&secret_key, data_check_string(&payload).as_bytes());
        payload.hash = hex::encode(tag);
        payload
    }

    fn sample(auth_date: u64) -> LoginWidgetPayload {
        signed(LoginWidgetPayload {
            id: 123456789,
            first_name: "John".to_string(),
            last_name: Some("Doe".to_string()),
            username: Some("johndoe".to_string()),
            photo_url: None,
            auth_date,
            hash: String::new(),
        })
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let payload = sample(1_700_000_000);
        let result = check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100));
        assert!(result.is_ok());
    }

    #[test]
    fn verification_is_deterministic() {
        let payload = sample(1_700_000_000);
        let first = check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100)).is_ok();
        let second = check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100)).is_ok();
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn rejects_tampered_id() {
        let mut payload = sample(1_700_000_000);
        payload.id = 999999999;
        let result = check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100));
        assert!(matches!(result, Err(VerifyError::SignInvalid)));
    }

    #[test]
    fn rejects_tampered_optional_field() {
        let mut payload = sample(1_700_000_000);
        payload.username = Some("mallory".to_string());
        assert!(check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100)).is_err());
    }

    #[test]
    fn rejects_wrong_bot_token() {
        let payload = sample(1_700_000_000);
        let result = check(&payload, "other:token", Duration::from_secs(3600), at(1_700_000_100));
        assert!(matches!(result, Err(VerifyError::SignInvalid)));
    }

    #[test]
    fn rejects_non_hex_hash_without_panicking() {
        let mut payload = sample(1_700_000_000);
        payload.hash = "not hex at all".to_string();
        assert!(check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100)).is_err());
    }

    #[test]
    fn uppercase_rendering_of_correct_hash_is_rejected() {
        let mut payload = sample(1_700_000_000);
        payload.hash = payload.hash.to_ascii_uppercase();
        let result = check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_100));
        assert!(matches!(result, Err(VerifyError::SignInvalid)));
    }

    #[test]
    fn payload_exactly_at_max_age_is_accepted() {
        let now = 1_700_003_600;
        let payload = sample(now - 3600);
        assert!(check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(now)).is_ok());
    }

    #[test]
    fn payload_one_second_past_max_age_is_rejected() {
        let now = 1_700_003_601;
        let payload = sample(now - 3601);
        let result = check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(now));
        assert!(matches!(result, Err(VerifyError::Expired)));
    }

    #[test]
    fn auth_date_in_the_future_is_not_expired() {
        let payload = sample(1_700_000_500);
        assert!(check(&payload, BOT_TOKEN, Duration::from_secs(3600), at(1_700_000_000)).is_ok());
    }

    #[test]
    fn data_check_string_sorts_fields_and_omits_absent_ones() {
        let payload = LoginWidgetPayload {
            id: 1,
            first_name: "Ann".to_string(),
            last_name: None,
            username: Some("ann".to_string()),
            photo_url: None,
            auth_date: 42,
            hash: String::new(),
        };
        assert_eq!(
            data_check_string(&payload),
            "auth_date=42\nfirst_name=Ann\nid=1\nusername=ann"
        );
    }

    #[test]
    fn field_order_in_source_json_does_not_matter() {
        let a: LoginWidgetPayload = serde_json::from_str(
            r#"{"id":7,"first_name":"Ann","auth_date":42,"hash":"00"}"#,
        )
        .unwrap();
        let b: LoginWidgetPayload = serde_json::from_str(
            r#"{"hash":"00","auth_date":42,"first_name":"Ann","id":7}"#,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(data_check_string(&a), data_check_string(&b));
    }

    #[test]
    fn unicode_fields_sign_over_raw_utf8() {
        let payload = signed(LoginWidgetPayload {
            id: 5,
            first_name: "Жанна".to_string(),
            last_name: None,
            username: None,
            photo_url: None,
            auth_date: 1_700_000_000,
            hash: String::new(),
        });
        assert!(check(&payload, BOT_TOKEN, Duration::from_secs(60), at(1_700_000_000)).is_ok());
    }

    #[test]
    fn shape_guard_accepts_minimal_payload() {
        let value: Value = serde_json::from_str(
            r#"{"id":1,"first_name":"Ann","auth_date":42,"hash":"00"}"#,
        )
        .unwrap();
        assert!(is_valid_shape(&value));
    }

    #[test]
    fn shape_guard_rejects_wrong_types_and_non_objects() {
        let wrong_id: Value =
            serde_json::from_str(r#"{"id":"1","first_name":"Ann","auth_date":42,"hash":"00"}"#)
                .unwrap();
        assert!(!is_valid_shape(&wrong_id));

        let missing_hash: Value =
            serde_json::from_str(r#"{"id":1,"first_name":"Ann","auth_date":42}"#).unwrap();
        assert!(!is_valid_shape(&missing_hash));

        assert!(!is_valid_shape(&Value::Null));
        assert!(!is_valid_shape(&Value::String("payload".to_string())));
    }
}
