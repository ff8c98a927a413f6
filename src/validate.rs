use lazy_static::lazy_static;
use regex::Regex;

use crate::err::Error;

pub const USERNAME_MIN: usize = 6;
pub const USERNAME_MAX: usize = 30;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap();
}

/// Fails with `MissingFields` naming the first empty field. Whitespace counts
/// as a value.
pub fn require(fields: &[(&str, &str)]) -> Result<(), Error> {
    match fields.iter().find(|(_, value)| value.is_empty()) {
        Some((name, _)) => Err(Error::missing(format!("`{}` was empty", name))),
        None => Ok(()),
    }
}

/// Length is counted in bytes of UTF-8.
pub fn username(name: &str) -> Result<(), Error> {
    let length = name.len();
    if (USERNAME_MIN..=USERNAME_MAX).contains(&length) {
        Ok(())
    } else {
        Err(Error::UsernameLength { length })
    }
}

pub fn email(address: &str) -> Result<(), Error> {
    if EMAIL.is_match(address) {
        Ok(())
    } else {
        Err(Error::MalformedEmail)
    }
}

/// Turns an optional update field into a patch value: blank means "leave as is".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
