//! Single ignore-file line: parsing and glob-to-regex translation

use regex::Regex;

/// One parsed ignore line before translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternLine {
    /// Glob body with the `!`, leading `/` and trailing `/` markers removed
    pub body: String,
    pub negate: bool,
    pub dir_only: bool,
    pub anchored: bool,
}

impl PatternLine {
    /// Parse a raw line. Returns `None` for blank lines and comments.
    pub fn parse(raw: &str) -> Option<Self> {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }

        let line = strip_trailing_whitespace(line);

        let (negate, mut body) = if let Some(rest) = line.strip_prefix('!') {
            (true, rest)
        } else if line.starts_with("\\!") || line.starts_with("\\#") {
            (false, &line[1..])
        } else {
            (false, line.as_str())
        };

        let dir_only = body.ends_with('/') && !body.ends_with("\\/");
        if dir_only {
            body = body.trim_end_matches('/');
        }

        let anchored = body.starts_with('/');
        if anchored {
            body = body.trim_start_matches('/');
        } else if let Some(rest) = body.strip_prefix("**/") {
            body = rest;
        }

        if body.is_empty() {
            return None;
        }

        Some(Self {
            body: body.to_string(),
            negate,
            dir_only,
            anchored,
        })
    }
}

impl std::fmt::Display for PatternLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negate {
            f.write_str("!")?;
        }
        if self.anchored {
            f.write_str("/")?;
        }
        f.write_str(&self.body)?;
        if self.dir_only {
            f.write_str("/")?;
        }
        Ok(())
    }
}

/// Remove trailing spaces and tabs unless the last one is backslash-escaped.
fn strip_trailing_whitespace(line: &str) -> String {
    let trimmed = line.trim_end_matches([' ', '\t']);
    if trimmed.len() == line.len() {
        return line.to_string();
    }
    let backslashes = trimmed.chars().rev().take_while(|c| *c == '\\').count();
    if backslashes % 2 == 1 {
        // The first stripped character was escaped; keep it.
        let kept = &line[trimmed.len()..trimmed.len() + 1];
        format!("{}{}", trimmed, kept)
    } else {
        trimmed.to_string()
    }
}

/// A compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    negate: bool,
    dir_only: bool,
    /// Matches the path itself; absent for `dir/**`, which only matches beneath `dir`
    self_re: Option<Regex>,
    /// Matches anything beneath a path the pattern selects
    desc_re: Regex,
}

impl Pattern {
    pub fn compile(line: &PatternLine) -> Result<Self, regex::Error> {
        let prefix = if line.anchored { "^" } else { "^(?:.*/)?" };

        let mut segments: Vec<&str> = line.body.split('/').collect();
        let descendants_only = segments.len() > 1 && segments.last() == Some(&"**");
        if descendants_only {
            segments.pop();
        }
        let body = translate_segments(&segments);

        let self_re = if descendants_only {
            None
        } else {
            Some(Regex::new(&format!("{prefix}{body}$"))?)
        };
        let desc_tail = if descendants_only { "/.+$" } else { "/.*$" };
        let desc_re = Regex::new(&format!("{prefix}{body}{desc_tail}"))?;

        Ok(Self {
            source: line.to_string(),
            negate: line.negate,
            dir_only: line.dir_only,
            self_re,
            desc_re,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_negation(&self) -> bool {
        self.negate
    }

    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// Whether this pattern selects `path` (normalized, root-relative).
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.desc_re.is_match(path) {
            return true;
        }
        match &self.self_re {
            Some(re) => (is_dir || !self.dir_only) && re.is_match(path),
            None => false,
        }
    }
}

fn translate_segments(segments: &[&str]) -> String {
    let mut out = String::new();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if i == last {
                out.push_str(".*");
            } else {
                out.push_str("(?:[^/]+/)*");
            }
            continue;
        }
        translate_glob(segment, &mut out);
        if i != last {
            out.push('/');
        }
    }
    out
}

/// Translate one path segment of glob syntax into regex syntax.
fn translate_glob(segment: &str, out: &mut String) {
    let chars: Vec<char> = segment.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                while i + 1 < chars.len() && chars[i + 1] == '*' {
                    i += 1;
                }
                out.push_str("[^/]*");
            }
            '?' => out.push_str("[^/]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    translate_class(&chars[i + 1..end], out);
                    i = end;
                }
                None => out.push_str("\\["),
            },
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push_str(&regex::escape(&next.to_string()));
                    i += 1;
                }
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
}

/// Index of the `]` closing the class opened at `start`, if any. A `]`
/// directly after the opening (or after a negation mark) is literal.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            ']' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn translate_class(inner: &[char], out: &mut String) {
    out.push('[');
    let mut i = 0;
    if matches!(inner.first(), Some('!') | Some('^')) {
        out.push('^');
        i = 1;
    }
    while i < inner.len() {
        let c = inner[i];
        match c {
            '\\' => {
                if let Some(next) = inner.get(i + 1) {
                    if next.is_alphanumeric() {
                        out.push(*next);
                    } else {
                        out.push('\\');
                        out.push(*next);
                    }
                    i += 1;
                }
            }
            '[' | ']' | '&' | '~' | '^' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out.push(']');
}
