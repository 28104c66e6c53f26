//! GN list literals and `@FileArg(...)` expansion.
//!
//! Build actions receive list-valued flags either as a single path or as a
//! GN list literal such as `["a.jar", "b.jar"]`. Values may also reference a
//! key inside a JSON build config with `@FileArg(path:key:subkey)`.

use crate::error::ToolError;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

const FILE_ARG_PREFIX: &str = "@FileArg(";

/// Parse one flag value into a list of strings.
///
/// An empty value is an empty list, a value starting with `[` is parsed as a
/// GN list literal, anything else is a single element.
pub fn parse_gn_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if !trimmed.starts_with('[') {
        return Ok(vec![value.to_string()]);
    }
    GnListParser::new(trimmed).parse()
}

/// Parse and flatten every occurrence of a repeated flag.
pub fn parse_gn_lists<S: AsRef<str>>(values: &[S]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for value in values {
        out.extend(parse_gn_list(value.as_ref())?);
    }
    Ok(out)
}

/// Format a list the way GN prints it.
pub fn to_gn_string(items: &[String]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|item| {
            let escaped = item
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('$', "\\$");
            format!("\"{}\"", escaped)
        })
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Replace every `@FileArg(file:key:...)` reference with the value it names.
pub fn expand_file_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<String>> {
    let mut cache: HashMap<String, Value> = HashMap::new();
    let mut out = Vec::with_capacity(args.len());

    for arg in args {
        let arg = arg.as_ref();
        let Some(start) = arg.find(FILE_ARG_PREFIX) else {
            out.push(arg.to_string());
            continue;
        };
        let inner_start = start + FILE_ARG_PREFIX.len();
        let end = arg[inner_start..]
            .find(')')
            .map(|i| inner_start + i)
            .ok_or_else(|| ToolError::FileArg {
                arg: arg.to_string(),
                reason: "missing closing parenthesis".to_string(),
            })?;

        let mut lookup = arg[inner_start..end].split(':');
        let file_path = lookup.next().unwrap_or_default().to_string();
        if !cache.contains_key(&file_path) {
            let content = std::fs::read_to_string(Path::new(&file_path))?;
            cache.insert(file_path.clone(), serde_json::from_str(&content)?);
        }

        let mut expansion = &cache[&file_path];
        for key in lookup {
            expansion = expansion.get(key).ok_or_else(|| ToolError::FileArg {
                arg: arg.to_string(),
                reason: format!("key {} not found", key),
            })?;
        }

        let rendered = match expansion {
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(value_to_plain).collect();
                to_gn_string(&items)
            }
            other => value_to_plain(other),
        };
        out.push(format!("{}{}{}", &arg[..start], rendered, &arg[end + 1..]));
    }

    Ok(out)
}

fn value_to_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct GnListParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> GnListParser<'a> {
    fn new(input: &'a str) -> Self {
        GnListParser {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn error(&self, reason: &str) -> ToolError {
        ToolError::InvalidGnList(format!("{}: {}", reason, self.input))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn parse(mut self) -> Result<Vec<String>> {
        match self.chars.next() {
            Some((_, '[')) => {}
            _ => return Err(self.error("expected '['")),
        }
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.chars.peek().copied() {
                Some((_, ']')) => {
                    self.chars.next();
                    break;
                }
                Some((_, '"')) => {
                    self.chars.next();
                    items.push(self.parse_string()?);
                    self.skip_whitespace();
                    match self.chars.peek().copied() {
                        Some((_, ',')) => {
                            self.chars.next();
                        }
                        Some((_, ']')) => {}
                        _ => return Err(self.error("expected ',' or ']'")),
                    }
                }
                _ => return Err(self.error("expected string")),
            }
        }
        self.skip_whitespace();
        if self.chars.next().is_some() {
            return Err(self.error("trailing characters"));
        }
        Ok(items)
    }

    fn parse_string(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '"' => return Ok(out),
                '\\' => match self.chars.next() {
                    Some((_, esc @ ('"' | '\\' | '$'))) => out.push(esc),
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => break,
                },
                other => out.push(other),
            }
        }
        Err(self.error("unterminated string"))
    }
}
