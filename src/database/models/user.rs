use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::schema::{Field, Schema};
use crate::database::Document;
use crate::filter::FilterWhereInfo;

pub const ROLES: [&str; 4] = ["user", "guide", "lead-guide", "admin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "guide" => Ok(Role::Guide),
            "lead-guide" => Ok(Role::LeadGuide),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub static USER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    Schema::new("users")
        .with(Field::text("name").required("Please tell us your name!").trim())
        .with(
            Field::text("email")
                .required("Please provide your email")
                .unique()
                .trim()
                .lowercase(),
        )
        .with(Field::text("photo").default_value("default.jpg"))
        .with(
            Field::text("role")
                .one_of(&ROLES, "Role is either: user, guide, lead-guide, admin")
                .default_value("user"),
        )
        .with(Field::text("password").required("Please provide a password").hidden().guarded())
        .with(Field::date("passwordChangedAt").hidden().guarded())
        .with(Field::text("passwordResetToken").hidden().guarded())
        .with(Field::date("passwordResetExpires").hidden().guarded())
        .with(Field::boolean("active").default_value(true).hidden().guarded())
        .scoped(FilterWhereInfo::eq("active", true))
        .check(valid_email)
});

fn valid_email(doc: &Document) -> Option<String> {
    let email = doc.get("email").and_then(|v| v.as_str())?;
    (!is_email(email)).then(|| "Please provide a valid email".to_string())
}

pub fn is_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
                && !raw.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
