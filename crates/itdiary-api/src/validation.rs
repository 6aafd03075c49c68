//! Form validation. Every check records a human-readable message against the
//! offending field and keeps going, so a single response lists all problems.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::NaiveDate;

use itdiary_types::api::{MessageForm, OfferForm, ProjectForm, ReviewForm};
use itdiary_types::{Money, Role};

use crate::avatars::{self, AvatarUpload};
use crate::error::{ApiError, FieldErrors};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_BIO_LEN: usize = 2000;
pub const MAX_EMAIL_LEN: usize = 254;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
pub const MIN_PASSWORD_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";

/// Trimmed value; records an error when nothing is left.
pub fn required(errors: &mut FieldErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value.to_string()
}

pub fn username(errors: &mut FieldErrors, value: &str) -> String {
    let value = required(errors, "username", value);
    if value.is_empty() {
        return value;
    }

    let len = value.chars().count();
    if !USERNAME_LEN.contains(&len) {
        errors.add(
            "username",
            format!(
                "Ensure this value has between {} and {} characters (it has {len}).",
                USERNAME_LEN.start(),
                USERNAME_LEN.end()
            ),
        );
    }
    if !value.chars().all(|c| c.is_alphanumeric() || "@.+-_".contains(c)) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    value
}

/// Blank input means "no email".
pub fn email(errors: &mut FieldErrors, value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;

    let valid = value.len() <= MAX_EMAIL_LEN
        && !value.chars().any(char::is_whitespace)
        && match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };

    if !valid {
        errors.add("email", "Enter a valid email address.");
    }
    Some(value.to_string())
}

/// Password pair as entered twice. Passwords are never trimmed.
pub fn new_password(
    errors: &mut FieldErrors,
    username: &str,
    (first_field, first): (&str, &str),
    (second_field, second): (&str, &str),
) {
    if first.is_empty() {
        errors.add(first_field, REQUIRED);
    }
    if second.is_empty() {
        errors.add(second_field, REQUIRED);
    }
    if first.is_empty() || second.is_empty() {
        return;
    }

    if first != second {
        errors.add(second_field, "The two password fields didn't match.");
        return;
    }

    if second.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            second_field,
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if second.chars().all(|c| c.is_ascii_digit()) {
        errors.add(second_field, "This password is entirely numeric.");
    }
    if !username.is_empty() && second.eq_ignore_ascii_case(username) {
        errors.add(second_field, "The password is too similar to the username.");
    }
}

pub fn money(errors: &mut FieldErrors, field: &str, value: &str) -> Option<Money> {
    match value.parse::<Money>() {
        Ok(amount) => Some(amount),
        Err(e) => {
            errors.add(field, e.to_string());
            None
        }
    }
}

/// Query-string bound: blank counts as absent.
pub fn optional_money(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<Money> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    money(errors, field, value)
}

pub fn date(errors: &mut FieldErrors, field: &str, value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Enter a valid date.");
            None
        }
    }
}

pub fn rating(errors: &mut FieldErrors, value: &str) -> Option<u8> {
    let value = value.trim();
    if value.is_empty() {
        errors.add("rating", REQUIRED);
        return None;
    }
    let Ok(n) = value.parse::<i64>() else {
        errors.add("rating", "Enter a whole number.");
        return None;
    };
    match n {
        i64::MIN..=0 => {
            errors.add("rating", "Ensure this value is greater than or equal to 1.");
            None
        }
        1..=5 => u8::try_from(n).ok(),
        _ => {
            errors.add("rating", "Ensure this value is less than or equal to 5.");
            None
        }
    }
}

/// Missing role falls back to the default.
pub fn role(errors: &mut FieldErrors, value: Option<&str>) -> Option<Role> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Some(Role::default()),
        Some(raw) => match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(message) => {
                errors.add("role", message);
                None
            }
        },
    }
}

pub fn bio(errors: &mut FieldErrors, value: &str) -> String {
    let value = value.trim();
    let len = value.chars().count();
    if len > MAX_BIO_LEN {
        errors.add(
            "bio",
            format!("Ensure this value has at most {MAX_BIO_LEN} characters (it has {len})."),
        );
    }
    value.to_string()
}

/// Base64 image, optionally wrapped in a `data:` URL.
pub fn avatar(errors: &mut FieldErrors, value: &str) -> Option<AvatarUpload> {
    let encoded = match value.trim().strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(""),
        None => value.trim(),
    };

    let Ok(bytes) = B64.decode(encoded) else {
        errors.add("avatar", "The submitted data was not a file. Check the encoding type on the form.");
        return None;
    };
    if bytes.is_empty() {
        errors.add("avatar", "The submitted file is empty.");
        return None;
    }
    if bytes.len() > avatars::MAX_AVATAR_BYTES {
        errors.add("avatar", "The uploaded image is larger than 5 MB.");
        return None;
    }
    let Some(extension) = avatars::sniff_image(&bytes) else {
        errors.add(
            "avatar",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        );
        return None;
    };

    Some(AvatarUpload { bytes, extension })
}

/// Cleaned project fields, shared by create and edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProject {
    pub title: String,
    pub description: String,
    pub budget: Money,
    pub deadline: NaiveDate,
}

pub fn project_form(form: &ProjectForm) -> Result<ValidProject, ApiError> {
    let mut errors = FieldErrors::new();

    let title = required(&mut errors, "title", &form.title);
    let title_len = title.chars().count();
    if title_len > MAX_TITLE_LEN {
        errors.add(
            "title",
            format!("Ensure this value has at most {MAX_TITLE_LEN} characters (it has {title_len})."),
        );
    }
    let description = required(&mut errors, "description", &form.description);
    let budget = money(&mut errors, "budget", &form.budget);
    let deadline = date(&mut errors, "deadline", &form.deadline);

    match (budget, deadline) {
        (Some(budget), Some(deadline)) if errors.is_empty() => Ok(ValidProject {
            title,
            description,
            budget,
            deadline,
        }),
        _ => Err(ApiError::Validation(errors)),
    }
}

pub fn offer_form(form: &OfferForm) -> Result<(String, Money), ApiError> {
    let mut errors = FieldErrors::new();
    let proposal_text = required(&mut errors, "proposal_text", &form.proposal_text);
    let price = money(&mut errors, "proposed_price", &form.proposed_price);

    match price {
        Some(price) if errors.is_empty() => Ok((proposal_text, price)),
        _ => Err(ApiError::Validation(errors)),
    }
}

pub fn message_form(form: &MessageForm) -> Result<String, ApiError> {
    let mut errors = FieldErrors::new();
    let text = required(&mut errors, "text", &form.text);
    errors.into_result()?;
    Ok(text)
}

pub fn review_form(form: &ReviewForm) -> Result<(u8, String), ApiError> {
    let mut errors = FieldErrors::new();
    let rating = rating(&mut errors, &form.rating);
    let comment = required(&mut errors, "comment", &form.comment);

    match rating {
        Some(rating) if errors.is_empty() => Ok((rating, comment)),
        _ => Err(ApiError::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(result: Result<impl std::fmt::Debug, ApiError>, field: &str) -> Vec<String> {
        match result {
            Err(ApiError::Validation(errors)) => errors.get(field).map(<[String]>::to_vec).unwrap_or_default(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn project_form_accepts_valid_input() {
        let form = ProjectForm {
            title: "  Landing page ".into(),
            description: "One pager".into(),
            budget: "500".into(),
            deadline: "2025-01-01".into(),
        };
        let project = project_form(&form).unwrap();
        assert_eq!(project.title, "Landing page");
        assert_eq!(project.budget.cents(), 50_000);
        assert_eq!(project.deadline, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn project_form_reports_every_bad_field() {
        let form = ProjectForm {
            title: "x".repeat(201),
            description: "   ".into(),
            budget: "12.345".into(),
            deadline: "01/01/2025".into(),
        };
        let errors = match project_form(&form) {
            Err(ApiError::Validation(errors)) => errors,
            other => panic!("unexpected {other:?}"),
        };
        assert!(errors.get("title").is_some());
        assert_eq!(errors.get("description").unwrap(), ["This field is required."]);
        assert_eq!(
            errors.get("budget").unwrap(),
            ["Ensure that there are no more than 2 decimal places."]
        );
        assert_eq!(errors.get("deadline").unwrap(), ["Enter a valid date."]);
    }

    #[test]
    fn past_deadlines_are_allowed() {
        let form = ProjectForm {
            title: "Old".into(),
            description: "d".into(),
            budget: "0".into(),
            deadline: "1999-12-31".into(),
        };
        assert!(project_form(&form).is_ok());
    }

    #[test]
    fn negative_prices_are_rejected() {
        let form = OfferForm {
            proposal_text: "Cheap".into(),
            proposed_price: "-1".into(),
        };
        assert_eq!(
            messages(offer_form(&form), "proposed_price"),
            ["Ensure this value is greater than or equal to 0."]
        );
    }

    #[test]
    fn ratings_must_be_between_one_and_five() {
        let review = |rating: &str| ReviewForm {
            rating: rating.into(),
            comment: "ok".into(),
        };
        assert_eq!(review_form(&review("5")).unwrap().0, 5);
        assert_eq!(review_form(&review(" 1 ")).unwrap().0, 1);
        assert_eq!(
            messages(review_form(&review("0")), "rating"),
            ["Ensure this value is greater than or equal to 1."]
        );
        assert_eq!(
            messages(review_form(&review("6")), "rating"),
            ["Ensure this value is less than or equal to 5."]
        );
        assert_eq!(messages(review_form(&review("4.5")), "rating"), ["Enter a whole number."]);
    }

    #[test]
    fn password_rules() {
        let check = |user: &str, a: &str, b: &str| {
            let mut errors = FieldErrors::new();
            new_password(&mut errors, user, ("password1", a), ("password2", b));
            errors.get("password2").map(<[String]>::to_vec).unwrap_or_default()
        };

        assert!(check("anna", "correct horse", "correct horse").is_empty());
        assert_eq!(check("anna", "correct horse", "battery staple"), ["The two password fields didn't match."]);
        assert_eq!(check("anna", "short", "short").len(), 1);
        assert_eq!(check("anna", "1234567890", "1234567890"), ["This password is entirely numeric."]);
        assert_eq!(check("annabelle", "AnnaBelle", "AnnaBelle"), ["The password is too similar to the username."]);
    }

    #[test]
    fn username_rules() {
        let check = |value: &str| {
            let mut errors = FieldErrors::new();
            username(&mut errors, value);
            errors.is_empty()
        };
        assert!(check("anna.k+dev"));
        assert!(check("Анна"));
        assert!(!check("an"));
        assert!(!check("has space"));
        assert!(!check(&"a".repeat(33)));
    }

    #[test]
    fn email_is_optional_but_checked() {
        let mut errors = FieldErrors::new();
        assert_eq!(email(&mut errors, None), None);
        assert_eq!(email(&mut errors, Some("  ")), None);
        assert_eq!(email(&mut errors, Some("a@b.co")).as_deref(), Some("a@b.co"));
        assert!(errors.is_empty());

        email(&mut errors, Some("not-an-email"));
        email(&mut errors, Some("a@b@c.d"));
        email(&mut errors, Some("a@localhost"));
        assert_eq!(errors.get("email").unwrap().len(), 3);
    }

    #[test]
    fn list_bounds_treat_blank_as_absent() {
        let mut errors = FieldErrors::new();
        assert_eq!(optional_money(&mut errors, "min_budget", Some("")), None);
        assert_eq!(optional_money(&mut errors, "min_budget", None), None);
        assert_eq!(
            optional_money(&mut errors, "min_budget", Some("100")),
            Some(Money::from_cents(10_000))
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn avatars_must_be_images() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let mut errors = FieldErrors::new();

        let upload = avatar(&mut errors, &B64.encode(png)).unwrap();
        assert_eq!(upload.extension, "png");

        let wrapped = format!("data:image/png;base64,{}", B64.encode(png));
        assert!(avatar(&mut errors, &wrapped).is_some());
        assert!(errors.is_empty());

        assert!(avatar(&mut errors, &B64.encode(b"plain text")).is_none());
        assert!(avatar(&mut errors, "%%%").is_none());
        assert_eq!(errors.get("avatar").unwrap().len(), 2);
    }
}
