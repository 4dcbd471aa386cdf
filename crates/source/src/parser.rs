use crate::constants::ConstantTable;
use crate::crawler::read_source;
use crate::error::{Location, ParseError, ParseErrorKind, SourceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One `key=value` line after constant expansion, before coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// A `[debugname]` block with its untyped properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub debugname: String,
    pub location: Location,
    pub properties: Vec<RawProperty>,
}

/// Why a category rejected a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// No property with this key exists in the category.
    UnknownKey,
    /// The key is known but the value is not acceptable.
    Invalid(String),
}

/// Category-specific typing of property values.
pub trait Schema {
    type Value;

    fn coerce(&self, key: &str, value: &str) -> Result<Self::Value, CoerceError>;

    /// Keys every record of the category must define.
    fn required(&self) -> &[&'static str] {
        &[]
    }
}

/// A typed property, still carrying its source line for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Property<V> {
    pub key: String,
    pub value: V,
    pub line: usize,
}

/// A fully typed record.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRecord<V> {
    pub debugname: String,
    pub location: Location,
    pub properties: Vec<Property<V>>,
}

impl<V> ConfigRecord<V> {
    pub fn new(debugname: impl Into<String>, location: Location) -> Self {
        Self {
            debugname: debugname.into(),
            location,
            properties: Vec::new(),
        }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.value)
    }

    /// Location of a property line within this record's file.
    pub fn location_of(&self, property: &Property<V>) -> Location {
        Location::new(self.location.path.clone(), property.line)
    }
}

/// Scans config source files of one category into raw records.
///
/// Debugnames must be unique across every file fed to one parser.
pub struct SourceParser<'a> {
    constants: &'a ConstantTable,
    seen: HashMap<String, Location>,
    records: Vec<RawRecord>,
}

impl<'a> SourceParser<'a> {
    pub fn new(constants: &'a ConstantTable) -> Self {
        Self {
            constants,
            seen: HashMap::new(),
            records: Vec::new(),
        }
    }

    /// Read and scan every file in order.
    pub fn parse_files(&mut self, files: &[PathBuf]) -> Result<(), SourceError> {
        for path in files {
            tracing::debug!(path = %path.display(), "parsing");
            let text = read_source(path)?;
            self.parse_file(path, &text)?;
        }
        Ok(())
    }

    /// Scan one file's text.
    pub fn parse_file(&mut self, path: &Path, text: &str) -> Result<(), ParseError> {
        let mut current: Option<RawRecord> = None;
        for (index, raw) in text.lines().enumerate() {
            let location = Location::new(path, index + 1);
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("//") {
                continue;
            }

            if trimmed.starts_with('[') {
                let debugname = parse_header(trimmed).ok_or_else(|| {
                    ParseError::new(
                        location.clone(),
                        ParseErrorKind::BadHeader {
                            text: trimmed.to_string(),
                        },
                    )
                })?;
                if let Some(first) = self.seen.get(debugname) {
                    return Err(ParseError::new(
                        location,
                        ParseErrorKind::DuplicateDebugname {
                            name: debugname.to_string(),
                            first: first.clone(),
                        },
                    ));
                }
                self.seen.insert(debugname.to_string(), location.clone());
                if let Some(done) = current.take() {
                    self.records.push(done);
                }
                current = Some(RawRecord {
                    debugname: debugname.to_string(),
                    location,
                    properties: Vec::new(),
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ParseError::new(
                    location,
                    ParseErrorKind::BadSeparator {
                        text: line.to_string(),
                    },
                ));
            };
            let key = key.trim();
            let Some(record) = current.as_mut() else {
                return Err(ParseError::new(
                    location,
                    ParseErrorKind::PropertyOutsideRecord {
                        key: key.to_string(),
                    },
                ));
            };
            let value = self.constants.expand(value, &location)?;
            record.properties.push(RawProperty {
                key: key.to_string(),
                value,
                line: location.line,
            });
        }
        if let Some(done) = current {
            self.records.push(done);
        }
        Ok(())
    }

    /// Records scanned so far, in file order.
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    pub fn finish(self) -> Vec<RawRecord> {
        self.records
    }
}

fn parse_header(line: &str) -> Option<&str> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let valid = !name.is_empty() && !name.contains(['[', ']', '=']) && !name.contains(char::is_whitespace);
    valid.then_some(name)
}

/// Type every property of `raw` through `schema` and check required keys.
pub fn coerce_record<S: Schema>(
    schema: &S,
    raw: &RawRecord,
) -> Result<ConfigRecord<S::Value>, ParseError> {
    let mut record = ConfigRecord::new(raw.debugname.clone(), raw.location.clone());
    for prop in &raw.properties {
        let location = Location::new(raw.location.path.clone(), prop.line);
        let value = schema.coerce(&prop.key, &prop.value).map_err(|e| {
            let kind = match e {
                CoerceError::UnknownKey => ParseErrorKind::UnknownKey {
                    key: prop.key.clone(),
                },
                CoerceError::Invalid(reason) => ParseErrorKind::InvalidValue {
                    key: prop.key.clone(),
                    value: prop.value.clone(),
                    reason,
                },
            };
            ParseError::new(location, kind)
        })?;
        record.properties.push(Property {
            key: prop.key.clone(),
            value,
            line: prop.line,
        });
    }
    for key in schema.required() {
        if record.get(key).is_none() {
            return Err(ParseError::new(
                raw.location.clone(),
                ParseErrorKind::MissingRequired {
                    debugname: raw.debugname.clone(),
                    key: key.to_string(),
                },
            ));
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sizes;

    impl Schema for Sizes {
        type Value = u8;

        fn coerce(&self, key: &str, value: &str) -> Result<u8, CoerceError> {
            match key {
                "size" | "width" => value
                    .parse()
                    .map_err(|_| CoerceError::Invalid("expected 0..=255".into())),
                _ => Err(CoerceError::UnknownKey),
            }
        }

        fn required(&self) -> &[&'static str] {
            &["size"]
        }
    }

    fn scan(files: &[(&str, &str)]) -> Result<Vec<RawRecord>, ParseError> {
        let constants = ConstantTable::new();
        let mut parser = SourceParser::new(&constants);
        for (path, text) in files {
            parser.parse_file(Path::new(path), text)?;
        }
        Ok(parser.finish())
    }

    #[test]
    fn groups_lines_into_records() {
        let records = scan(&[(
            "a.npc",
            "// header comment\n[man]\nsize=1\n\nwidth=2\n[woman]\nsize=1\n",
        )])
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].debugname, "man");
        assert_eq!(records[0].location.line, 2);
        assert_eq!(records[0].properties.len(), 2);
        assert_eq!(records[0].properties[1].line, 5);
        assert_eq!(records[1].debugname, "woman");
    }

    #[test]
    fn expands_constants_in_values() {
        let mut constants = ConstantTable::new();
        constants
            .insert("big", "3", Location::new("x.constant", 1))
            .unwrap();
        let mut parser = SourceParser::new(&constants);
        parser
            .parse_file(Path::new("a.npc"), "[giant]\nsize=^big\n")
            .unwrap();
        assert_eq!(parser.records()[0].properties[0].value, "3");
    }

    #[test]
    fn duplicate_debugname_names_second_occurrence() {
        let err = scan(&[("a.obj", "[foo]\nsize=1\n"), ("b.obj", "\n[foo]\n")]).unwrap_err();
        assert_eq!(err.location, Location::new("b.obj", 2));
        match err.kind {
            ParseErrorKind::DuplicateDebugname { name, first } => {
                assert_eq!(name, "foo");
                assert_eq!(first, Location::new("a.obj", 1));
            }
            other => panic!("expected duplicate debugname, got {other}"),
        }
    }

    #[test]
    fn separator_and_placement_errors() {
        let err = scan(&[("a.npc", "[man]\nsize 1\n")]).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::BadSeparator { .. }));
        assert_eq!(err.location.line, 2);

        let err = scan(&[("a.npc", "size=1\n[man]\n")]).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::PropertyOutsideRecord { .. }));

        let err = scan(&[("a.npc", "[bad name]\n")]).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::BadHeader { .. }));
    }

    #[test]
    fn unknown_key_differs_from_invalid_value() {
        let records = scan(&[("a.npc", "[a]\ncolour=1\n[b]\nsize=999\n")]).unwrap();

        let unknown = coerce_record(&Sizes, &records[0]).unwrap_err();
        assert_eq!(
            unknown.kind,
            ParseErrorKind::UnknownKey {
                key: "colour".into()
            }
        );

        let invalid = coerce_record(&Sizes, &records[1]).unwrap_err();
        assert!(matches!(invalid.kind, ParseErrorKind::InvalidValue { .. }));
        assert_ne!(unknown.kind, invalid.kind);
    }

    #[test]
    fn required_key_checked_on_close() {
        let records = scan(&[("a.npc", "[a]\nwidth=1\n")]).unwrap();
        let err = coerce_record(&Sizes, &records[0]).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::MissingRequired {
                debugname: "a".into(),
                key: "size".into()
            }
        );

        let ok = scan(&[("a.npc", "[a]\nsize=4\n")]).unwrap();
        assert_eq!(coerce_record(&Sizes, &ok[0]).unwrap().get("size"), Some(&4));
    }
}
