use crate::record::LogRecord;
use regex::Regex;
use std::borrow::Cow;

/// Enrichment step applied to every record before it reaches any sink.
///
/// Returning `false` drops the record; the built-in filters always keep it.
pub trait Filter: Send + Sync {
    fn filter(&self, record: &mut LogRecord) -> bool;
}

/// Tags every record with a fixed environment label.
#[derive(Debug, Clone)]
pub struct EnvironmentFilter {
    environment: String,
}

impl EnvironmentFilter {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }
}

impl Filter for EnvironmentFilter {
    fn filter(&self, record: &mut LogRecord) -> bool {
        record.environment = Some(self.environment.clone());
        true
    }
}

/// Replacement written over masked values.
pub const MASK: &str = "***MASKED***";

/// Key names masked by default.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "access_key",
    "private_key",
    "credential",
    "auth",
    "bearer",
    "authorization",
];

/// Redacts values of sensitive keys in the record message.
///
/// Matches `key`, an optional quote, a `:` or `=` separator, an optional
/// quote, then the value up to the next quote, comma, whitespace or `}`.
/// Matching is case-insensitive. This is textual redaction only: values
/// that are encoded or split across tokens are not detected.
#[derive(Debug, Clone)]
pub struct SensitiveDataFilter {
    pattern: Regex,
}

impl SensitiveDataFilter {
    pub fn new() -> Self {
        Self::with_additional_keys(std::iter::empty::<&str>())
            .expect("default sensitive keys form a valid pattern")
    }

    /// Build a filter masking the default keys plus `extra`.
    pub fn with_additional_keys<I, S>(extra: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys: Vec<String> = DEFAULT_SENSITIVE_KEYS
            .iter()
            .map(|k| k.to_string())
            .chain(extra.into_iter().map(|k| k.as_ref().to_string()))
            .filter(|k| !k.is_empty())
            .collect();
        // longer keys first so `authorization` wins over `auth`
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        keys.dedup();

        let alternation = keys
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(
            r#"(?i)((?:{alternation})['"]?\s*[:=]\s*['"]?)([^'",\s}}]+)"#
        ))?;
        Ok(Self { pattern })
    }

    /// Mask every sensitive value in `text`.
    pub fn mask<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(text, format!("${{1}}{MASK}"))
    }
}

impl Default for SensitiveDataFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for SensitiveDataFilter {
    fn filter(&self, record: &mut LogRecord) -> bool {
        if let Cow::Owned(masked) = self.mask(&record.message) {
            record.message = masked;
        }
        true
    }
}
