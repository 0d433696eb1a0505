//! Radiator-format dictionary loader.
//!
//! Line-oriented; `#` starts a comment. Recognized directives:
//!
//! ```text
//! ATTRIBUTE    <name> <type> <data-type> [flags]
//! VALUE        <attr-name> <value-name> <int|hex>
//! VENDOR       <vendor-id> <vendor-name> [format=<typeSize>,<lengthSize>]
//! VENDORATTR   <vendor-id> <name> <type> <data-type> [flags]
//! BEGIN-VENDOR <vendor-name>
//! END-VENDOR   <vendor-name>
//! $INCLUDE     <relative-path>
//! ```
//!
//! `flags` is comma-separated from `has_tag` and `encrypt=1|2|3`.

use super::template::AttributeTemplate;
use super::vendor::Vendor;
use super::Dictionary;
use crate::error::DictionaryError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Default)]
pub struct DictionaryParser;

struct LoadState {
    /// Vendor id set by an open BEGIN-VENDOR block.
    current_vendor: Option<i32>,
    /// Normalized paths already visited, breaks $INCLUDE cycles.
    visited: HashSet<PathBuf>,
}

impl DictionaryParser {
    pub fn new() -> Self {
        DictionaryParser
    }

    /// Parse a dictionary file, following `$INCLUDE` directives relative to
    /// the including file.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Dictionary, DictionaryError> {
        let mut dict = Dictionary::default();
        let mut state = LoadState {
            current_vendor: None,
            visited: HashSet::new(),
        };
        self.load_file(&mut dict, &mut state, path.as_ref())?;
        Ok(dict)
    }

    /// Parse dictionary text that has no backing file. `$INCLUDE` lines are
    /// skipped with a warning since there is nothing to resolve against.
    pub fn parse_str(&self, resource: &str, content: &str) -> Result<Dictionary, DictionaryError> {
        let mut dict = Dictionary::default();
        let mut state = LoadState {
            current_vendor: None,
            visited: HashSet::new(),
        };
        self.load_lines(&mut dict, &mut state, resource, None, content)?;
        Ok(dict)
    }

    fn load_file(
        &self,
        dict: &mut Dictionary,
        state: &mut LoadState,
        path: &Path,
    ) -> Result<(), DictionaryError> {
        let normalized = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !state.visited.insert(normalized) {
            warn!(path = %path.display(), "skipping already-included dictionary");
            return Ok(());
        }

        let content = std::fs::read_to_string(path)?;
        let resource = path.display().to_string();
        self.load_lines(dict, state, &resource, path.parent(), &content)
    }

    fn load_lines(
        &self,
        dict: &mut Dictionary,
        state: &mut LoadState,
        resource: &str,
        base_dir: Option<&Path>,
        content: &str,
    ) -> Result<(), DictionaryError> {
        for (index, raw_line) in content.lines().enumerate() {
            let line_num = index + 1;
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens[0].to_ascii_uppercase().as_str() {
                "ATTRIBUTE" => {
                    self.parse_attribute(dict, state.current_vendor, &tokens, resource, line_num)?
                }
                "VALUE" => self.parse_value(dict, &tokens, resource, line_num)?,
                "VENDOR" => self.parse_vendor(dict, &tokens, resource, line_num)?,
                "VENDORATTR" => self.parse_vendorattr(dict, &tokens, resource, line_num)?,
                "BEGIN-VENDOR" => {
                    let name = require(&tokens, 1, resource, line_num, "vendor name")?;
                    match dict.vendor_by_name(name) {
                        Some(vendor) => state.current_vendor = Some(vendor.id()),
                        None => {
                            return Err(DictionaryError::parse(
                                resource,
                                line_num,
                                format!("BEGIN-VENDOR for undeclared vendor {name}"),
                            ))
                        }
                    }
                }
                "END-VENDOR" => {
                    state.current_vendor = None;
                }
                "$INCLUDE" => {
                    let target = require(&tokens, 1, resource, line_num, "include path")?;
                    match base_dir {
                        Some(dir) => {
                            let next = dir.join(target);
                            if next.is_file() {
                                self.load_file(dict, state, &next)?;
                            } else {
                                warn!(include = target, resource, line_num, "included dictionary not found, skipping");
                            }
                        }
                        None => {
                            warn!(include = target, resource, "cannot resolve include without a base path, skipping")
                        }
                    }
                }
                other => {
                    return Err(DictionaryError::parse(
                        resource,
                        line_num,
                        format!("unknown directive {other}"),
                    ))
                }
            }
        }
        Ok(())
    }

    fn parse_attribute(
        &self,
        dict: &mut Dictionary,
        current_vendor: Option<i32>,
        tokens: &[&str],
        resource: &str,
        line_num: usize,
    ) -> Result<(), DictionaryError> {
        if tokens.len() < 4 {
            return Err(DictionaryError::parse(
                resource,
                line_num,
                "ATTRIBUTE needs <name> <type> <data-type>",
            ));
        }
        let name = tokens[1];
        let attr_type = parse_int(tokens[2], resource, line_num)?;
        let (encrypt, has_tag) = parse_flags(tokens.get(4).copied(), resource, line_num)?;

        let vendor_id = current_vendor.unwrap_or(crate::attr::NO_VENDOR);
        let template =
            AttributeTemplate::with_flags(vendor_id, attr_type, name, tokens[3], encrypt, has_tag);
        dict.insert_template(template)
            .map_err(|reason| DictionaryError::parse(resource, line_num, reason))
    }

    fn parse_vendorattr(
        &self,
        dict: &mut Dictionary,
        tokens: &[&str],
        resource: &str,
        line_num: usize,
    ) -> Result<(), DictionaryError> {
        if tokens.len() < 5 {
            return Err(DictionaryError::parse(
                resource,
                line_num,
                "VENDORATTR needs <vendor-id> <name> <type> <data-type>",
            ));
        }
        let vendor_id = parse_int(tokens[1], resource, line_num)? as i32;
        let attr_type = parse_int(tokens[3], resource, line_num)?;
        let (encrypt, has_tag) = parse_flags(tokens.get(5).copied(), resource, line_num)?;

        let template = AttributeTemplate::with_flags(
            vendor_id, attr_type, tokens[2], tokens[4], encrypt, has_tag,
        );
        dict.insert_template(template)
            .map_err(|reason| DictionaryError::parse(resource, line_num, reason))
    }

    fn parse_value(
        &self,
        dict: &mut Dictionary,
        tokens: &[&str],
        resource: &str,
        line_num: usize,
    ) -> Result<(), DictionaryError> {
        if tokens.len() < 4 {
            return Err(DictionaryError::parse(
                resource,
                line_num,
                "VALUE needs <attr-name> <value-name> <int>",
            ));
        }
        let value = parse_int(tokens[3], resource, line_num)?;
        match dict.template_mut(tokens[1]) {
            Some(template) => {
                template.add_value(tokens[2], value);
                Ok(())
            }
            None => {
                warn!(attribute = tokens[1], resource, line_num, "VALUE for unknown attribute, skipping");
                Ok(())
            }
        }
    }

    fn parse_vendor(
        &self,
        dict: &mut Dictionary,
        tokens: &[&str],
        resource: &str,
        line_num: usize,
    ) -> Result<(), DictionaryError> {
        if tokens.len() < 3 {
            return Err(DictionaryError::parse(
                resource,
                line_num,
                "VENDOR needs <vendor-id> <vendor-name>",
            ));
        }
        let vendor_id = parse_int(tokens[1], resource, line_num)? as i32;

        let (type_size, length_size) = match tokens.get(3) {
            Some(option) => match option.strip_prefix("format=").and_then(|f| f.split_once(',')) {
                Some((t, l)) => (
                    parse_int(t, resource, line_num)? as u8,
                    parse_int(l, resource, line_num)? as u8,
                ),
                None => {
                    return Err(DictionaryError::parse(
                        resource,
                        line_num,
                        format!("bad vendor option {option}, expected format=<t>,<l>"),
                    ))
                }
            },
            None => (1, 1),
        };

        let vendor = Vendor::with_format(vendor_id, tokens[2], type_size, length_size)
            .map_err(|e| DictionaryError::parse(resource, line_num, e.to_string()))?;
        dict.insert_vendor(vendor)
            .map_err(|reason| DictionaryError::parse(resource, line_num, reason))
    }
}

fn require<'a>(
    tokens: &[&'a str],
    index: usize,
    resource: &str,
    line_num: usize,
    what: &str,
) -> Result<&'a str, DictionaryError> {
    tokens
        .get(index)
        .copied()
        .ok_or_else(|| DictionaryError::parse(resource, line_num, format!("missing {what}")))
}

fn parse_int(token: &str, resource: &str, line_num: usize) -> Result<u32, DictionaryError> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        token.parse()
    };
    parsed.map_err(|_| DictionaryError::parse(resource, line_num, format!("bad integer {token}")))
}

/// Returns `(encrypt_flag, has_tag)`.
fn parse_flags(
    flags: Option<&str>,
    resource: &str,
    line_num: usize,
) -> Result<(u8, bool), DictionaryError> {
    let mut encrypt = 0u8;
    let mut has_tag = false;

    if let Some(flags) = flags {
        for flag in flags.split(',') {
            match flag.trim() {
                "" => {}
                "has_tag" => has_tag = true,
                other => match other.strip_prefix("encrypt=") {
                    Some(v) => {
                        encrypt = v.parse().map_err(|_| {
                            DictionaryError::parse(resource, line_num, format!("bad encrypt flag {other}"))
                        })?
                    }
                    None => {
                        return Err(DictionaryError::parse(
                            resource,
                            line_num,
                            format!("unknown flag {other}"),
                        ))
                    }
                },
            }
        }
    }
    Ok((encrypt, has_tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::codec::CodecType;
    use crate::attr::value::DataType;

    #[test]
    fn test_parse_attribute_and_value() {
        let dict = DictionaryParser::new()
            .parse_str(
                "test",
                "ATTRIBUTE Service-Type 6 integer\nVALUE Service-Type Login-User 1\n",
            )
            .unwrap();
        let template = dict.template_by_name("Service-Type").unwrap();
        assert_eq!(template.attr_type(), 6);
        assert_eq!(template.data_type(), DataType::Integer);
        assert_eq!(template.value_of("Login-User"), Some(1));
    }

    #[test]
    fn test_parse_comments_and_blank_lines() {
        let dict = DictionaryParser::new()
            .parse_str(
                "test",
                "# header comment\n\nATTRIBUTE User-Name 1 string  # trailing\n",
            )
            .unwrap();
        assert!(dict.template_by_name("User-Name").is_some());
    }

    #[test]
    fn test_parse_vendor_with_format() {
        let dict = DictionaryParser::new()
            .parse_str(
                "test",
                "VENDOR 429 USR format=4,0\nVENDORATTR 429 USR-Last-Number-Dialed-Out 0x6012 string\n",
            )
            .unwrap();
        let vendor = dict.vendor_by_name("USR").unwrap();
        assert_eq!(vendor.type_size(), 4);
        assert_eq!(vendor.length_size(), 0);
        assert_eq!(
            dict.template(429, 0x6012).unwrap().name(),
            "USR-Last-Number-Dialed-Out"
        );
    }

    #[test]
    fn test_begin_end_vendor_block() {
        let dict = DictionaryParser::new()
            .parse_str(
                "test",
                "VENDOR 14122 WISPr\nBEGIN-VENDOR WISPr\nATTRIBUTE WISPr-Location-ID 1 string\nEND-VENDOR WISPr\nATTRIBUTE User-Name 1 string\n",
            )
            .unwrap();
        assert_eq!(dict.template(14122, 1).unwrap().name(), "WISPr-Location-ID");
        assert_eq!(dict.template(-1, 1).unwrap().name(), "User-Name");
    }

    #[test]
    fn test_flags() {
        let dict = DictionaryParser::new()
            .parse_str("test", "ATTRIBUTE Cisco-Thing 200 string has_tag,encrypt=2\n")
            .unwrap();
        let template = dict.template_by_name("Cisco-Thing").unwrap();
        assert!(template.tagged());
        assert_eq!(template.codec(), CodecType::TunnelPassword);
    }

    #[test]
    fn test_duplicate_name_is_error() {
        let err = DictionaryParser::new()
            .parse_str(
                "dup",
                "ATTRIBUTE User-Name 1 string\nATTRIBUTE User-Name 17 string\n",
            )
            .unwrap_err();
        assert!(matches!(err, DictionaryError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_duplicate_type_is_error() {
        let err = DictionaryParser::new()
            .parse_str(
                "dup",
                "ATTRIBUTE User-Name 1 string\nATTRIBUTE Other-Name 1 string\n",
            )
            .unwrap_err();
        assert!(matches!(err, DictionaryError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_malformed_line_is_error() {
        let err = DictionaryParser::new()
            .parse_str("bad", "ATTRIBUTE User-Name\n")
            .unwrap_err();
        assert!(matches!(err, DictionaryError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_begin_vendor_unknown_is_error() {
        assert!(DictionaryParser::new()
            .parse_str("bad", "BEGIN-VENDOR Nobody\n")
            .is_err());
    }

    #[test]
    fn test_include_cycle_and_relative_resolution() {
        let dir = std::env::temp_dir().join(format!("radius-dict-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("main.dict"),
            "ATTRIBUTE User-Name 1 string\n$INCLUDE extra.dict\n$INCLUDE missing.dict\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("extra.dict"),
            "ATTRIBUTE Reply-Message 18 string\n$INCLUDE main.dict\n",
        )
        .unwrap();

        let dict = DictionaryParser::new().parse_file(dir.join("main.dict")).unwrap();
        assert!(dict.template_by_name("User-Name").is_some());
        assert!(dict.template_by_name("Reply-Message").is_some());

        std::fs::remove_dir_all(&dir).ok();
    }
}
