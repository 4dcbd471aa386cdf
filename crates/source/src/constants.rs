use crate::crawler::read_source;
use crate::error::{Location, ParseError, ParseErrorKind, SourceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Marker that starts a constant reference inside a property value.
const CONSTANT_PREFIX: char = '^';

/// Global `name -> value` substitutions used while parsing property values.
#[derive(Debug, Clone, Default)]
pub struct ConstantTable {
    values: HashMap<String, (String, Location)>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `.constant` file in `files`, in order.
    pub fn load(files: &[PathBuf]) -> Result<Self, SourceError> {
        let mut table = Self::new();
        for path in files {
            let text = read_source(path)?;
            table.parse_file(path, &text)?;
        }
        tracing::debug!(constants = table.len(), "loaded constants");
        Ok(table)
    }

    /// Parse `name=value` lines. Blank lines and `//` comments are skipped.
    pub fn parse_file(&mut self, path: &Path, text: &str) -> Result<(), ParseError> {
        for (index, raw) in text.lines().enumerate() {
            let location = Location::new(path, index + 1);
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with("//") {
                continue;
            }
            let Some((name, value)) = line.split_once('=') else {
                return Err(ParseError::new(
                    location,
                    ParseErrorKind::BadSeparator {
                        text: line.to_string(),
                    },
                ));
            };
            self.insert(name.trim(), value, location)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, name: &str, value: &str, location: Location) -> Result<(), ParseError> {
        if let Some((_, first)) = self.values.get(name) {
            return Err(ParseError::new(
                location,
                ParseErrorKind::DuplicateConstant {
                    name: name.to_string(),
                    first: first.clone(),
                },
            ));
        }
        self.values
            .insert(name.to_string(), (value.to_string(), location));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|(v, _)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace every `^NAME` token in `value`.
    ///
    /// A token runs until whitespace, a comma, or the end of the value.
    pub fn expand(&self, value: &str, location: &Location) -> Result<String, ParseError> {
        if !value.contains(CONSTANT_PREFIX) {
            return Ok(value.to_string());
        }
        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find(CONSTANT_PREFIX) {
            out.push_str(&rest[..start]);
            let token = &rest[start + 1..];
            let end = token
                .find(|c: char| c.is_whitespace() || c == ',')
                .unwrap_or(token.len());
            let name = &token[..end];
            let replacement = self.get(name).ok_or_else(|| {
                ParseError::new(
                    location.clone(),
                    ParseErrorKind::UnknownConstant {
                        name: name.to_string(),
                    },
                )
            })?;
            out.push_str(replacement);
            rest = &token[end..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ConstantTable {
        let mut t = ConstantTable::new();
        t.parse_file(
            Path::new("colours.constant"),
            "// palette\nred=960\n\nbank_delay=4\n",
        )
        .unwrap();
        t
    }

    #[test]
    fn expands_tokens() {
        let t = table();
        let loc = Location::new("a.obj", 1);
        assert_eq!(t.expand("^red", &loc).unwrap(), "960");
        assert_eq!(t.expand("^red,^bank_delay", &loc).unwrap(), "960,4");
        assert_eq!(t.expand("x ^red y", &loc).unwrap(), "x 960 y");
        assert_eq!(t.expand("plain", &loc).unwrap(), "plain");
    }

    #[test]
    fn unknown_constant_is_located() {
        let t = table();
        let err = t.expand("^blue", &Location::new("a.obj", 7)).unwrap_err();
        assert_eq!(err.location.line, 7);
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownConstant {
                name: "blue".into()
            }
        );
    }

    #[test]
    fn duplicate_constant_rejected() {
        let mut t = table();
        let err = t
            .parse_file(Path::new("more.constant"), "red=1\n")
            .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::DuplicateConstant { .. }));
    }
}
