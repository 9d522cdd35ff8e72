//! Input normalization and validation shared by the session manager and the
//! OAuth2 bridge.

use crate::auth::AuthError;

const NAME_MIN: usize = 3;
/// Longest stored display name, in characters.
pub const NAME_MAX: usize = 100;
const EMAIL_MIN: usize = 5;
const EMAIL_MAX: usize = 255;
const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 35;

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural email check: one `@`, non-empty local part, dotted domain.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let len = email.chars().count();
    if !(EMAIL_MIN..=EMAIL_MAX).contains(&len) {
        return Err(AuthError::ValidationError(format!(
            "Email must be between {EMAIL_MIN} and {EMAIL_MAX} characters"
        )));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AuthError::ValidationError("Invalid email".into()));
    }
    Ok(())
}

/// Display names: letters, numbers, spaces, `'`, `.` and `-`.
pub fn validate_name(name: &str) -> Result<(), AuthError> {
    let name = name.trim();
    let len = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(AuthError::ValidationError(format!(
            "Name must be between {NAME_MIN} and {NAME_MAX} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '\'' | '.' | '-'))
    {
        return Err(AuthError::ValidationError(
            "Name must not have special characters".into(),
        ));
    }
    Ok(())
}

/// Password policy: 8 to 35 characters with a lowercase letter, an uppercase
/// letter and a number or symbol.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AuthError::ValidationError(format!(
            "Password must be between {PASSWORD_MIN} and {PASSWORD_MAX} characters"
        )));
    }
    let lower = password.chars().any(|c| c.is_lowercase());
    let upper = password.chars().any(|c| c.is_uppercase());
    let digit_or_symbol = password.chars().any(|c| !c.is_alphabetic());
    if !(lower && upper && digit_or_symbol) {
        return Err(AuthError::ValidationError(
            "Password requires a lowercase letter, an uppercase letter, and a number or symbol"
                .into(),
        ));
    }
    Ok(())
}

/// Reject mismatched password/confirmation pairs.
pub fn passwords_match(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if password != confirmation {
        return Err(AuthError::ValidationError("Passwords do not match".into()));
    }
    Ok(())
}

/// Collapse whitespace and title-case each word of a display name.
pub fn format_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Dot-separated lowercase slug: `"Jane  O'Doe"` → `"jane.odoe"`.
pub fn point_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dot = false;
    for c in name.chars().filter(|c| *c != '\'') {
        if c.is_alphanumeric() {
            if pending_dot && !slug.is_empty() {
                slug.push('.');
            }
            pending_dot = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dot = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("jane.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("jane@example").is_err());
        assert!(validate_email("ja ne@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn password_policy() {
        assert!(validate_password("Passw0rd").is_ok());
        assert!(validate_password("Pass!word").is_ok());
        assert!(validate_password("short1A").is_err());
        assert!(validate_password("alllowercase1").is_err());
        assert!(validate_password("NoDigitsHere").is_err());
        assert!(validate_password(&"Aa1".repeat(12)).is_err());
    }

    #[test]
    fn name_policy() {
        assert!(validate_name("Jane O'Doe-Smith Jr.").is_ok());
        assert!(validate_name("Jo").is_err());
        assert!(validate_name("Jane <script>").is_err());
    }

    #[test]
    fn mismatched_passwords_fail() {
        assert!(passwords_match("a", "a").is_ok());
        assert!(matches!(
            passwords_match("a", "b"),
            Err(AuthError::ValidationError(_))
        ));
    }

    #[test]
    fn format_name_title_cases_words() {
        assert_eq!(format_name("  jANE   doe "), "Jane Doe");
    }

    #[test]
    fn point_slug_examples() {
        assert_eq!(point_slug("Jane Doe"), "jane.doe");
        assert_eq!(point_slug("  Jane   O'Doe  "), "jane.odoe");
        assert_eq!(point_slug("Mary-Kate  Olsen"), "mary.kate.olsen");
        assert_eq!(point_slug("..."), "");
    }
}
