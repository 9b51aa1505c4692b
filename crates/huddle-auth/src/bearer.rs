//! `Authorization` header parsing.

use crate::errors::{AuthError, Result};

/// Extract a Bearer token from an `Authorization` header value.
///
/// The scheme is case-insensitive. Anything other than exactly
/// `<scheme> <token>` is [`AuthError::MalformedHeader`].
pub fn bearer_token_from_header(header_value: &str) -> Result<&str> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = parts.next().ok_or(AuthError::MalformedHeader)?;
    if parts.next().is_some() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_bearer() {
        assert_eq!(bearer_token_from_header("Bearer abc.def").unwrap(), "abc.def");
        assert_eq!(bearer_token_from_header("bearer   abc").unwrap(), "abc");
    }

    #[test]
    fn rejects_other_schemes() {
        assert_matches!(
            bearer_token_from_header("Basic dXNlcjpwYXNz"),
            Err(AuthError::MalformedHeader)
        );
    }

    #[test]
    fn rejects_missing_or_extra_parts() {
        assert_matches!(bearer_token_from_header(""), Err(AuthError::MalformedHeader));
        assert_matches!(bearer_token_from_header("Bearer"), Err(AuthError::MalformedHeader));
        assert_matches!(
            bearer_token_from_header("Bearer a b"),
            Err(AuthError::MalformedHeader)
        );
    }
}
