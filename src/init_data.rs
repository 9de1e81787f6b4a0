use serde::Deserialize;
use serde_json::Value;
use url::Url;

use std::{
    collections::HashMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::crypto::{decode_lowercase_hex, hmac_sha256, hmac_sha256_verify};
use crate::error::{ParseError, VerifyError};

/// Contains launch parameters data
/// https://docs.telegram-mini-apps.com/platform/init-data#parameters-list
#[derive(Debug, PartialEq, Deserialize)]
pub struct InitData {
    /// The date the initialization data was created. Is a number representing a
    /// Unix timestamp.
    pub auth_date: u64,

    /// The number of seconds after which a message can be sent via the method answerWebAppQuery.
    pub can_send_after: Option<u64>,

    /// An object containing data about the chat where the bot was launched via the attachment menu.
    /// Returned for supergroups, channels and group chats - only for Mini Apps launched via the attachment menu.
    pub chat: Option<Chat>,

    /// The type of chat from which the Mini Apps was opened.
    /// Returned only for applications opened by direct link.
    pub chat_type: Option<String>,

    /// A global identifier indicating the chat from which the Mini Apps was opened.
    /// Returned only for applications opened by direct link.
    pub chat_instance: Option<String>,

    /// Initialization data signature.
    pub hash: String,

    /// The unique session ID of the Mini App.
    /// Used in the process of sending a message via the method answerWebAppQuery.
    pub query_id: Option<String>,

    /// An object containing data about the chat partner of the current user in the chat where the bot was launched via the attachment menu.
    /// Returned only for private chats and only for Mini Apps launched via the attachment menu.
    pub receiver: Option<User>,

    /// The value of the startattach or startapp query parameter specified in the link.
    /// It is returned only for Mini Apps opened through the attachment menu.
    pub start_param: Option<String>,

    /// An object containing information about the current user.
    pub user: Option<User>,
}

/// Describes user information:
/// https://docs.telegram-mini-apps.com/launch-parameters/init-data#user
#[derive(Debug, PartialEq, Deserialize)]
pub struct User {
    /// True, if this user added the bot to the attachment menu.
    pub added_to_attachment_menu: Option<bool>,

    /// True, if this user allowed the bot to message them.
    pub allows_write_to_pm: Option<bool>,

    /// Has the user purchased Telegram Premium.
    pub is_premium: Option<bool>,

    /// Bot or user name.
    pub first_name: String,

    /// Bot or user ID.
    pub id: i64,

    /// Is the user a bot.
    pub is_bot: Option<bool>,

    /// User's last name.
    pub last_name: Option<String>,

    /// IETF user's language.
    pub language_code: Option<String>,

    /// Link to the user's or bot's photo. Photos can have formats `.jpeg` and `.svg`.
    /// It is returned only for Mini Apps opened through the attachment menu.
    pub photo_url: Option<String>,

    /// Login of the bot or user.
    pub username: Option<String>,
}

/// Describes the chat information.
/// https://docs.telegram-mini-apps.com/platform/init-data#chat
#[derive(Debug, PartialEq, Deserialize)]
pub struct Chat {
    /// Chat ID
    pub id: i64,

    /// Chat type
    pub r#type: String,

    /// Chat title
    pub title: String,

    /// Chat photo link. The photo can have .jpeg and .svg formats.
    /// It is returned only for Mini Apps opened through the attachments menu.
    pub photo_url: Option<String>,

    /// Chat user login.
    pub username: Option<String>,
}

/// Converts passed init data presented as query string to an InitData object.
///
/// The parse is best-effort: `user`, `receiver` and `chat` are JSON sub-objects
/// and a malformed one is dropped rather than failing the whole parse, since
/// callers run this only after [`verify`] has already vouched for the raw
/// string. `auth_date` and `hash` are the only fields that must be present.
pub fn parse(init_data: &str) -> Result<InitData, ParseError> {
    // Parse passed init data as query string
    let url = Url::parse(&format!("http://dummy.com?{init_data}"))?;

    let mut auth_date: Option<u64> = None;
    let mut can_send_after: Option<u64> = None;
    let mut chat: Option<Chat> = None;
    let mut chat_type: Option<String> = None;
    let mut chat_instance: Option<String> = None;
    let mut hash: Option<String> = None;
    let mut query_id: Option<String> = None;
    let mut receiver: Option<User> = None;
    let mut start_param: Option<String> = None;
    let mut user: Option<User> = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "auth_date" => auth_date = value.parse().ok(),
            "can_send_after" => can_send_after = value.parse().ok(),
            "chat" => chat = serde_json::from_str(&value).ok(),
            "chat_type" => chat_type = Some(value.into_owned()),
            "chat_instance" => chat_instance = Some(value.into_owned()),
            "hash" => hash = Some(value.into_owned()),
            "query_id" => query_id = Some(value.into_owned()),
            "receiver" => receiver = serde_json::from_str(&value).ok(),
            "start_param" => start_param = Some(value.into_owned()),
            "user" => user = serde_json::from_str(&value).ok(),
            // Unknown parameters still participate in the signature but have
            // no typed representation.
            _ => {}
        }
    }

    Ok(InitData {
        auth_date: auth_date.ok_or(ParseError::AuthDateMissing)?,
        can_send_after,
        chat,
        chat_type,
        chat_instance,
        hash: hash.ok_or(ParseError::HashMissing)?,
        query_id,
        receiver,
        start_param,
        user,
    })
}

/// Type guard for an already-decoded init data value: `auth_date` must be an
/// integer, `hash` a string, and a `user` sub-object (when present) must
/// carry an integer `id` and a string `first_name`.
pub fn is_valid_shape(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    if !object.get("auth_date").is_some_and(Value::is_u64) {
        return false;
    }
    if !object.get("hash").is_some_and(Value::is_string) {
        return false;
    }

    match object.get("user") {
        None => true,
        Some(user) => {
            user.get("id").is_some_and(Value::is_i64)
                && user.get("first_name").is_some_and(Value::is_string)
        }
    }
}

/// Signs the passed parameters using the two-stage Mini App key derivation
/// and returns the lowercase hex signature. Technical parameters `hash` and
/// `auth_date` in the map are skipped; the supplied `auth_date` is signed
/// instead.
pub fn sign(params: &HashMap<String, String>, bot_token: &str, auth_date: u64) -> String {
    let auth_date = auth_date.to_string();
    let mut pairs = params
        .iter()
        .filter_map(|(k, v)| {
            // Skip technical fields.
            if k == "hash" || k == "auth_date" {
                None
            } else {
                Some((k.as_str(), v.as_str()))
            }
        })
        .collect::<Vec<(&str, &str)>>();

    pairs.push(("auth_date", &auth_date));

    // Sorted by key, the same canonical order the verifier uses. Sorting
    // rendered "k=v" rows instead is not equivalent: '=' outranks some key
    // characters, so keys that are prefixes of each other would swap.
    pairs.sort();
    let data_check_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let secret_key = derive_secret_key(bot_token);
    hex::encode(hmac_sha256(&secret_key, data_check_string.as_bytes()))
}

/// Validates passed init data. This function expects init data to be passed
/// in the exact raw format as it could be found in
/// window.Telegram.WebApp.initData.
///
/// Implements the algorithm described in the official docs:
/// https://core.telegram.org/bots/webapps#validating-data-received-via-the-web-app
///
/// Returns `true` only when `hash` and `auth_date` are present, the payload
/// is no older than `max_age`, and the signature matches under the two-stage
/// `WebAppData` key derivation. All failure modes answer `false`; the reason
/// is logged at debug level. A payload exactly `max_age` old is still
/// accepted.
pub fn verify(init_data: &str, bot_token: &str, max_age: Duration) -> bool {
    match check(init_data, bot_token, max_age, SystemTime::now()) {
        Ok(()) => true,
        Err(reason) => {
            tracing::debug!(%reason, "init data rejected");
            false
        }
    }
}

fn check(
    init_data: &str,
    bot_token: &str,
    max_age: Duration,
    now: SystemTime,
) -> Result<(), VerifyError> {
    // Parse passed init data as query string
    let url = Url::parse(&format!("http://dummy.com?{init_data}"))
        .map_err(|_| VerifyError::InvalidQueryString)?;

    let mut auth_date: Option<u64> = None;
    let mut hash: Option<String> = None;
    let mut pairs = Vec::new();

    for (key, value) in url.query_pairs() {
        // The sign itself never participates in the data-check-string.
        if key == "hash" {
            hash = Some(value.into_owned());
            continue;
        }
        if key == "auth_date" {
            auth_date = value.parse().ok();
        }
        pairs.push((key.into_owned(), value.into_owned()));
    }

    // Sign is always required, and without auth_date there is nothing to
    // bound the replay window with.
    let hash = hash.ok_or(VerifyError::SignMissing)?;
    let auth_date = auth_date.ok_or(VerifyError::AuthDateMissing)?;

    if is_expired(auth_date, max_age, now) {
        return Err(VerifyError::Expired);
    }

    // According to docs, we sort all the pairs in alphabetical order. Values
    // stay in their raw URL-decoded form; embedded JSON is signed verbatim,
    // never re-serialized.
    pairs.sort();
    let data_check_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let secret_key = derive_secret_key(bot_token);
    let tag = decode_lowercase_hex(&hash).ok_or(VerifyError::SignInvalid)?;

    if !hmac_sha256_verify(&secret_key, data_check_string.as_bytes(), &tag) {
        return Err(VerifyError::SignInvalid);
    }

    Ok(())
}

/// First HMAC stage: the secret key is HMAC-SHA256("WebAppData", bot_token).
/// This is what keeps Mini App signatures in a different trust domain than
/// Login Widget signatures made with the same bot token.
fn derive_secret_key(bot_token: &str) -> [u8; 32] {
    hmac_sha256(b"WebAppData", bot_token.as_bytes())
}

fn is_expired(auth_date: u64, max_age: Duration, now: SystemTime) -> bool {
    let now = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now.saturating_sub(auth_date) > max_age.as_secs()
}
