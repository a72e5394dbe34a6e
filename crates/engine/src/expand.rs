//! Environment variable expansion for build number variables.

use std::sync::OnceLock;
use regex::{Captures, Regex};
use trackgit_core::EnvVars;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$(?:\{([^}]+)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid variable pattern")
    })
}

/// Expand `variable` against `env`.
///
/// A bare name (`REV`) is looked up directly. Anything containing `$NAME`
/// or `${NAME}` references is expanded in place. Returns the name of the
/// first unset variable on failure.
pub fn expand(variable: &str, env: &EnvVars) -> Result<String, String> {
    let variable = variable.trim();
    if !variable.contains('$') {
        return env.get(variable).cloned().ok_or_else(|| variable.to_string());
    }

    let mut missing = None;
    let expanded = reference_pattern().replace_all(variable, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match env.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(name),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bare_name() {
        let env = env(&[("REV", "42")]);
        assert_eq!(expand("REV", &env).unwrap(), "42");
        assert_eq!(expand(" REV ", &env).unwrap(), "42");
        assert_eq!(expand("OTHER", &env).unwrap_err(), "OTHER");
    }

    #[test]
    fn test_references() {
        let env = env(&[("REV", "42"), ("BASE", "1")]);
        assert_eq!(expand("${REV}", &env).unwrap(), "42");
        assert_eq!(expand("$REV", &env).unwrap(), "42");
        assert_eq!(expand("${BASE}0", &env).unwrap(), "10");
    }

    #[test]
    fn test_missing_reference() {
        let env = env(&[("REV", "42")]);
        assert_eq!(expand("${NOPE}", &env).unwrap_err(), "NOPE");
        assert_eq!(expand("$REV$NOPE", &env).unwrap_err(), "NOPE");
    }
}
