/// Errors from [`crate::init_data::parse`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("init data is not a well-formed query string")]
    InvalidQueryString(#[from] url::ParseError),

    #[error("auth_date is missing or not an integer")]
    AuthDateMissing,

    #[error("hash is missing")]
    HashMissing,
}

/// Rejection reasons for the two HMAC verifiers. Never crosses the public
/// API, which is boolean by contract; this exists so logs and tests can name
/// why a payload was turned away.
#[derive(Debug, thiserror::Error)]
pub(crate) enum VerifyError {
    #[error("payload is not a well-formed query string")]
    InvalidQueryString,

    #[error("hash is missing")]
    SignMissing,

    #[error("auth_date is missing or not an integer")]
    AuthDateMissing,

    #[error("payload is older than the allowed maximum age")]
    Expired,

    #[error("signature does not match the payload")]
    SignInvalid,
}

/// Rejection reasons for the OIDC verifier, likewise collapsed to `false`
/// at the public boundary. The infrastructure variants are logged at a
/// higher level than plain token rejections.
#[derive(Debug, thiserror::Error)]
pub(crate) enum OidcError {
    #[error("failed to fetch JWKS")]
    FetchJwks(#[from] reqwest::Error),

    #[error("JWKS response contains no keys")]
    EmptyKeySet,

    #[error("no JWKS key matches the token kid")]
    NoMatchingKey,

    #[error("token header carries no kid")]
    MissingKeyId,

    #[error("token is not signed with RS256")]
    UnexpectedAlgorithm,

    #[error("token rejected: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token iat is in the future")]
    IssuedInFuture,
}

impl OidcError {
    /// Infrastructure failures mean the verifier itself could not do its
    /// job (key rotation, endpoint outage) rather than the token being bad.
    pub(crate) fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            OidcError::FetchJwks(_) | OidcError::EmptyKeySet | OidcError::NoMatchingKey
        )
    }
}
