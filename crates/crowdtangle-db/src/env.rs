//! Environment variable helpers shared by the config loaders.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::DbError;

/// Read an optional variable through `lookup` and parse it.
///
/// Absent variables yield `None`; present but malformed ones are a
/// [`DbError::Config`] naming the variable.
pub(crate) fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, DbError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(name)
        .map(|raw| {
            raw.parse()
                .map_err(|e| DbError::Config(format!("invalid {name}: {e}")))
        })
        .transpose()
}

/// Like [`parse_var`], falling back to `default` when the variable is unset.
pub(crate) fn parse_var_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, DbError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_var(lookup, name)?.unwrap_or(default))
}
