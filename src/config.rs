//! Collectd-style configuration for the poll cycle.
//!
//! The configuration is an explicit object built once at startup and passed
//! by reference into the poller - there is no global state. Table names are
//! accumulated in order from repeated `Table <name>` directives; existence
//! is not checked here, only at the first poll.

use crate::pf::{PF_TABLE_NAME_SIZE, PfError};
use std::io;
use std::path::Path;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    Io(io::Error),
    /// Bad directive, with the 1-based line number.
    Parse { line: usize, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Parse { line, message } => write!(f, "line {}: {}", line, message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Polling configuration.
///
/// `no_action` and `dummy_action` carry pfctl's `PF_OPT_NOACTION` /
/// `PF_OPT_DUMMYACTION` semantics: enumeration errors are surfaced unless
/// no-action is set without the dummy-action override.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Tables to poll, in configuration order. Empty means "every table
    /// currently defined in the kernel".
    pub tables: Vec<String>,
    /// Dry-run: validate without treating kernel-call failures as fatal.
    pub no_action: bool,
    /// Overrides `no_action` error suppression.
    pub dummy_action: bool,
}

impl Config {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses directive text, one directive per line.
    ///
    /// Supported directives: `Table <name>` (repeatable, case-insensitive
    /// keyword). `#` comments and blank lines are ignored. Unknown
    /// directives and malformed table names are rejected with the line
    /// number.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        for (index, raw_line) in text.lines().enumerate() {
            let line = index + 1;
            let content = raw_line
                .split_once('#')
                .map_or(raw_line, |(before, _)| before)
                .trim();
            if content.is_empty() {
                continue;
            }

            let mut parts = content.split_whitespace();
            let keyword = parts.next().unwrap_or_default();
            if !keyword.eq_ignore_ascii_case("table") {
                return Err(ConfigError::Parse {
                    line,
                    message: format!("unknown directive '{}'", keyword),
                });
            }
            let name = parts.next().ok_or_else(|| ConfigError::Parse {
                line,
                message: "Table directive requires a name".to_string(),
            })?;
            if parts.next().is_some() {
                return Err(ConfigError::Parse {
                    line,
                    message: "Table directive takes exactly one name".to_string(),
                });
            }
            config.add_table(name).map_err(|e| ConfigError::Parse {
                line,
                message: e.to_string(),
            })?;
        }
        Ok(config)
    }

    /// Loads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Appends a table name, validating it fits the kernel name field.
    pub fn add_table(&mut self, name: impl Into<String>) -> Result<(), PfError> {
        let name = name.into();
        if name.len() >= PF_TABLE_NAME_SIZE {
            return Err(PfError::InvalidArguments("table name too long"));
        }
        self.tables.push(name);
        Ok(())
    }

    /// Whether enumeration errors should be surfaced this run.
    pub fn should_report_errors(&self) -> bool {
        !self.no_action || self.dummy_action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_accumulates_tables_in_order() {
        let config = Config::parse("Table abc\nTable xyz\nTable abc\n").unwrap();
        assert_eq!(config.tables, vec!["abc", "xyz", "abc"]);
    }

    #[test]
    fn test_parse_keyword_is_case_insensitive() {
        let config = Config::parse("table abc\nTABLE xyz\n").unwrap();
        assert_eq!(config.tables, vec!["abc", "xyz"]);
    }

    #[test]
    fn test_parse_skips_comments_and_blank_lines() {
        let text = "# pftables configuration\n\nTable abc  # spam sources\n   \nTable xyz\n";
        let config = Config::parse(text).unwrap();
        assert_eq!(config.tables, vec!["abc", "xyz"]);
    }

    #[test]
    fn test_parse_rejects_unknown_directive() {
        let err = Config::parse("Table abc\nInterval 10\n").unwrap_err();
        match err {
            ConfigError::Parse { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("Interval"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        let err = Config::parse("Table\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_extra_arguments() {
        let err = Config::parse("Table abc def\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_overlong_name() {
        let text = format!("Table {}\n", "a".repeat(PF_TABLE_NAME_SIZE));
        let err = Config::parse(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_input_yields_empty_table_list() {
        let config = Config::parse("").unwrap();
        assert!(config.tables.is_empty());
    }

    #[test]
    fn test_load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Table abc").unwrap();
        writeln!(file, "Table xyz").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tables, vec!["abc", "xyz"]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/pftables.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_error_reporting_matrix() {
        let mut config = Config::new();
        // Normal mode: report.
        assert!(config.should_report_errors());
        // No-action alone: suppress.
        config.no_action = true;
        assert!(!config.should_report_errors());
        // No-action with dummy-action override: report.
        config.dummy_action = true;
        assert!(config.should_report_errors());
        // Dummy-action alone: report.
        config.no_action = false;
        assert!(config.should_report_errors());
    }
}
