use anyhow::Result;
use regex::{Captures, Regex};
use std::env;
use tracing::{debug, warn};

const PLACEHOLDER: &str = r"\$\{(\w+)(?::-([^}]*))?\}";

/// Replace `${VAR}` and `${VAR:-fallback}` with environment values
///
/// Unset variables without a fallback keep their placeholder so validation
/// can report them.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(PLACEHOLDER)?;

    let result = re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        match (env::var(var_name), caps.get(2)) {
            (Ok(value), _) => {
                debug!(var = var_name, "Substituted environment variable");
                value
            }
            (Err(_), Some(fallback)) => {
                debug!(var = var_name, "Environment variable not set, using fallback");
                fallback.as_str().to_string()
            }
            (Err(_), None) => {
                warn!("Environment variable '{}' not set", var_name);
                caps[0].to_string()
            }
        }
    });

    Ok(result.into_owned())
}

/// Names of unresolved `${VAR}` placeholders left in `content`
pub fn unresolved_env_vars(content: &str) -> Vec<String> {
    match Regex::new(PLACEHOLDER) {
        Ok(re) => re.captures_iter(content).map(|caps| caps[1].to_string()).collect(),
        Err(_) => Vec::new(),
    }
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    !unresolved_env_vars(content).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_set_variable() {
        env::set_var("PERISCOPE_TEST_SUBST_KEY", "secret");
        let out = substitute_env_vars("api_key: ${PERISCOPE_TEST_SUBST_KEY}").unwrap();
        assert_eq!(out, "api_key: secret");
    }

    #[test]
    fn test_fallback_and_unset() {
        env::remove_var("PERISCOPE_TEST_SUBST_UNSET");
        let out = substitute_env_vars("a: ${PERISCOPE_TEST_SUBST_UNSET:-8080}").unwrap();
        assert_eq!(out, "a: 8080");

        let out = substitute_env_vars("b: ${PERISCOPE_TEST_SUBST_UNSET}").unwrap();
        assert_eq!(out, "b: ${PERISCOPE_TEST_SUBST_UNSET}");
        assert!(has_unresolved_env_vars(&out));
        assert_eq!(unresolved_env_vars(&out), vec!["PERISCOPE_TEST_SUBST_UNSET"]);
    }

    #[test]
    fn test_plain_dollar_is_untouched() {
        let out = substitute_env_vars("note: costs $5").unwrap();
        assert_eq!(out, "note: costs $5");
        assert!(!has_unresolved_env_vars(&out));
    }
}
