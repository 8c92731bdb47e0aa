//! Parser for the directive-style configuration file.
//!
//! Each non-blank line holds one `key value` directive. Values may be wrapped
//! in double quotes, in which case `\"` and `\\` escapes are honoured. A `#`
//! outside quotes starts a comment running to the end of the line.
//!
//! ```text
//! # plexus.conf
//! instance-id "nodeB"
//! smp-processes 3
//! log-format compact
//! ```

use std::fs;

use camino::Utf8Path;

use crate::error::ConfigError;
use crate::logging::LogFormat;

/// Settings read from a configuration file. Absent keys stay `None`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FileSettings {
    pub(crate) instance_id: Option<String>,
    pub(crate) smp_processes: Option<u16>,
    pub(crate) inbox_capacity: Option<usize>,
    pub(crate) log_filter: Option<String>,
    pub(crate) log_format: Option<LogFormat>,
}

struct Directive<'a> {
    key: &'a str,
    value: String,
}

struct Location<'a> {
    path: &'a Utf8Path,
    line: usize,
}

impl FileSettings {
    /// Reads and parses the file at `path`.
    pub(crate) fn read(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parses configuration text; `path` is only used for error reporting.
    pub(crate) fn parse(path: &Utf8Path, text: &str) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        for (index, raw_line) in text.lines().enumerate() {
            let location = Location {
                path,
                line: index + 1,
            };
            let directive = parse_line(raw_line).map_err(|message| ConfigError::Syntax {
                path: path.to_path_buf(),
                line: location.line,
                message,
            })?;
            if let Some(directive) = directive {
                settings.apply(&location, directive)?;
            }
        }
        Ok(settings)
    }

    fn apply(&mut self, location: &Location<'_>, directive: Directive<'_>) -> Result<(), ConfigError> {
        let Directive { key, value } = directive;
        match key {
            "instance-id" => store(&mut self.instance_id, value, location, key),
            "smp-processes" => {
                let parsed = value.parse::<u16>().map_err(|error| {
                    ConfigError::invalid_value("smp-processes", value.as_str(), error.to_string())
                })?;
                store(&mut self.smp_processes, parsed, location, key)
            }
            "inbox-capacity" => {
                let parsed = value.parse::<usize>().map_err(|error| {
                    ConfigError::invalid_value("inbox-capacity", value.as_str(), error.to_string())
                })?;
                store(&mut self.inbox_capacity, parsed, location, key)
            }
            "log-filter" => store(&mut self.log_filter, value, location, key),
            "log-format" => {
                let parsed = value.parse::<LogFormat>().map_err(|error| {
                    ConfigError::invalid_value("log-format", value.as_str(), error.to_string())
                })?;
                store(&mut self.log_format, parsed, location, key)
            }
            other => Err(ConfigError::UnknownKey {
                path: location.path.to_path_buf(),
                line: location.line,
                key: other.to_owned(),
            }),
        }
    }
}

fn store<T>(
    slot: &mut Option<T>,
    value: T,
    location: &Location<'_>,
    key: &str,
) -> Result<(), ConfigError> {
    if slot.is_some() {
        return Err(ConfigError::DuplicateKey {
            path: location.path.to_path_buf(),
            line: location.line,
            key: key.to_owned(),
        });
    }
    *slot = Some(value);
    Ok(())
}

fn parse_line(line: &str) -> Result<Option<Directive<'_>>, String> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let key_end = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let (key, rest) = trimmed.split_at(key_end);
    let rest = rest.trim_start();

    let (value, tail) = match rest.strip_prefix('"') {
        Some(quoted) => parse_quoted(quoted)?,
        None => {
            let (bare, tail) = split_bare(rest);
            if bare.is_empty() {
                return Err(format!("missing value for '{key}'"));
            }
            (bare.to_owned(), tail)
        }
    };

    let tail = tail.trim_start();
    if !tail.is_empty() && !tail.starts_with('#') {
        return Err(format!("unexpected text after value for '{key}': '{tail}'"));
    }

    Ok(Some(Directive { key, value }))
}

fn split_bare(input: &str) -> (&str, &str) {
    let end = input
        .find(|ch: char| ch.is_whitespace() || ch == '#')
        .unwrap_or(input.len());
    input.split_at(end)
}

fn parse_quoted(input: &str) -> Result<(String, &str), String> {
    let mut value = String::new();
    let mut chars = input.char_indices();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '"' => {
                let (_, tail) = input.split_at(offset + ch.len_utf8());
                return Ok((value, tail));
            }
            '\\' => match chars.next() {
                Some((_, escaped @ ('"' | '\\'))) => value.push(escaped),
                Some((_, other)) => return Err(format!("unsupported escape '\\{other}'")),
                None => break,
            },
            other => value.push(other),
        }
    }
    Err("unterminated quoted value".to_owned())
}
