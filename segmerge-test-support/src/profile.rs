//! Property-test run profile read from the environment.
//!
//! Property suites across the workspace share one policy: the number of
//! cases and whether cases fork into subprocesses can be overridden from CI
//! without touching the test code.

use std::env;

use thiserror::Error;

/// Environment variable controlling proptest case counts.
pub const CASES_ENV_KEY: &str = "SEGMERGE_PBT_CASES";
/// Environment variable controlling proptest process forking.
pub const FORK_ENV_KEY: &str = "SEGMERGE_PBT_FORK";

/// Reasons an override was ignored.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProfileParseError {
    /// The case count was not an unsigned integer.
    #[error("case count `{raw}` is not an unsigned integer")]
    NotANumber {
        /// Value read from the environment.
        raw: String,
    },
    /// Zero cases would silently disable the suite.
    #[error("case count must be greater than zero")]
    ZeroCases,
    /// The fork flag was not a recognised boolean spelling.
    #[error("`{raw}` is not one of true/false/1/0/yes/no/on/off")]
    NotABool {
        /// Value read from the environment.
        raw: String,
    },
}

/// Runtime profile for property-test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Loads a profile from the environment, falling back to the defaults for
    /// missing or malformed overrides.
    ///
    /// # Examples
    /// ```
    /// use segmerge_test_support::profile::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self {
            cases: read_env_or_default(CASES_ENV_KEY, default_cases, parse_cases),
            fork: read_env_or_default(FORK_ENV_KEY, default_fork, parse_bool),
        }
    }

    /// Number of cases to run per property.
    #[must_use]
    pub fn cases(&self) -> u32 {
        self.cases
    }

    /// Whether to run cases in forked subprocesses.
    #[must_use]
    pub fn fork(&self) -> bool {
        self.fork
    }
}

fn read_env_or_default<T: Copy>(
    key: &'static str,
    default: T,
    parser: fn(&str) -> Result<T, ProfileParseError>,
) -> T {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    parser(&raw).unwrap_or_else(|reason| {
        tracing::warn!(env = key, raw = %raw, %reason, "ignoring property-test override");
        default
    })
}

fn parse_cases(raw: &str) -> Result<u32, ProfileParseError> {
    let parsed = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ProfileParseError::NotANumber {
            raw: raw.to_owned(),
        })?;
    if parsed == 0 {
        return Err(ProfileParseError::ZeroCases);
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> Result<bool, ProfileParseError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ProfileParseError::NotABool {
            raw: raw.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case(" 250 ", 250)]
    #[case("25000", 25_000)]
    fn parse_cases_accepts_positive_counts(#[case] raw: &str, #[case] expected: u32) {
        assert_eq!(parse_cases(raw), Ok(expected));
    }

    #[rstest]
    #[case("0", ProfileParseError::ZeroCases)]
    #[case("-1", ProfileParseError::NotANumber { raw: "-1".to_owned() })]
    #[case("abc", ProfileParseError::NotANumber { raw: "abc".to_owned() })]
    fn parse_cases_rejects_invalid_counts(#[case] raw: &str, #[case] expected: ProfileParseError) {
        assert_eq!(parse_cases(raw), Err(expected));
    }

    #[rstest]
    #[case("true", true)]
    #[case("TRUE", true)]
    #[case("1", true)]
    #[case("on", true)]
    #[case("false", false)]
    #[case("0", false)]
    #[case("no", false)]
    fn parse_bool_accepts_common_spellings(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(parse_bool(raw), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("maybe")]
    #[case("2")]
    fn parse_bool_rejects_unknown_spellings(#[case] raw: &str) {
        assert!(matches!(
            parse_bool(raw),
            Err(ProfileParseError::NotABool { .. })
        ));
    }
}
