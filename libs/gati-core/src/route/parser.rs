use std::collections::HashMap;

use regex::Regex;

/// Options controlling how a [`Pattern`] is compiled and matched.
#[derive(Debug, Clone, Copy)]
pub struct PatternOptions {
    pub case_sensitive: bool,
    pub strict_slash: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            strict_slash: false,
        }
    }
}

/// Normalizes a raw path per the parser's normalization rules:
/// empty becomes `/`, a leading `/` is added if missing, runs of `/` are
/// collapsed, and a trailing `/` is stripped unless the path is just `/`.
pub fn normalize_path(raw: &str) -> String {
    let mut s = if raw.is_empty() { "/".to_string() } else { raw.to_string() };
    if !s.starts_with('/') {
        s = format!("/{s}");
    }

    let mut collapsed = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        collapsed.push(c);
    }

    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed
}

/// A compiled route pattern: an anchored regex plus the ordered list of
/// parameter names bound to its capture groups.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
    param_names: Vec<String>,
    strict_slash: bool,
}

impl Pattern {
    /// Compiles a user-written path pattern (e.g. `/users/:id/posts/:postId`).
    pub fn compile(pattern: &str, opts: PatternOptions) -> Result<Self, PatternError> {
        let normalized = normalize_path(pattern);
        let mut param_names = Vec::new();
        let mut regex_body = String::new();

        for segment in normalized.trim_start_matches('/').split('/') {
            if segment.is_empty() {
                continue;
            }
            regex_body.push('/');
            if let Some(name) = segment.strip_prefix(':') {
                validate_param_name(name)?;
                param_names.push(name.to_string());
                regex_body.push_str("([^/]+)");
            } else {
                regex_body.push_str(&regex::escape(segment));
            }
        }
        if regex_body.is_empty() {
            regex_body.push('/');
        }

        let anchored = if opts.strict_slash {
            format!("^{regex_body}/?$")
        } else {
            format!("^{regex_body}$")
        };
        let anchored = if opts.case_sensitive {
            anchored
        } else {
            format!("(?i){anchored}")
        };

        let regex = Regex::new(&anchored).map_err(|e| PatternError::Regex(e.to_string()))?;

        Ok(Self {
            source: normalized,
            regex,
            param_names,
            strict_slash: opts.strict_slash,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Tests whether a path matches this pattern, without extracting params.
    pub fn matches(&self, path: &str) -> bool {
        let normalized = if self.strict_slash {
            path.to_string()
        } else {
            normalize_path(path)
        };
        self.regex.is_match(&normalized)
    }

    /// Matches `path` and, on success, percent-decodes each captured segment
    /// into a name→value map preserving the pattern's parameter order.
    pub fn extract_params(&self, path: &str) -> Option<HashMap<String, String>> {
        let normalized = if self.strict_slash {
            path.to_string()
        } else {
            normalize_path(path)
        };
        let caps = self.regex.captures(&normalized)?;
        let mut params = HashMap::with_capacity(self.param_names.len());
        for (idx, name) in self.param_names.iter().enumerate() {
            let raw = caps.get(idx + 1)?.as_str();
            if raw.is_empty() {
                return None;
            }
            let decoded = urlencoding::decode(raw).ok()?.into_owned();
            params.insert(name.clone(), decoded);
        }
        Some(params)
    }
}

fn validate_param_name(name: &str) -> Result<(), PatternError> {
    let mut chars = name.chars();
    let ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PatternError::InvalidParamName(name.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid parameter name `:{0}`")]
    InvalidParamName(String),
    #[error("failed to compile route regex: {0}")]
    Regex(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_empty_path() {
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn normalizes_missing_leading_slash() {
        assert_eq!(normalize_path("users"), "/users");
    }

    #[test]
    fn collapses_repeated_slashes() {
        assert_eq!(normalize_path("//users///1"), "/users/1");
    }

    #[test]
    fn strips_trailing_slash_except_root() {
        assert_eq!(normalize_path("/users/"), "/users");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn compiles_and_matches_literal_and_params() {
        let p = Pattern::compile("/users/:id", PatternOptions::default()).unwrap();
        assert!(p.matches("/users/42"));
        assert!(!p.matches("/users"));
        let params = p.extract_params("/users/42").unwrap();
        assert_eq!(params.get("id").unwrap(), "42");
    }

    #[test]
    fn empty_capture_does_not_match() {
        let p = Pattern::compile("/users/:id", PatternOptions::default()).unwrap();
        assert!(p.extract_params("/users/").is_none());
    }

    #[test]
    fn percent_decodes_param_values() {
        let p = Pattern::compile("/search/:term", PatternOptions::default()).unwrap();
        let params = p.extract_params("/search/hello%20world").unwrap();
        assert_eq!(params.get("term").unwrap(), "hello world");
    }

    #[test]
    fn preserves_param_order() {
        let p = Pattern::compile("/a/:x/b/:y", PatternOptions::default()).unwrap();
        let params = p.extract_params("/a/1/b/2").unwrap();
        assert_eq!(params.get("x").unwrap(), "1");
        assert_eq!(params.get("y").unwrap(), "2");
    }

    #[test]
    fn case_insensitive_when_configured() {
        let opts = PatternOptions {
            case_sensitive: false,
            strict_slash: false,
        };
        let p = Pattern::compile("/Users", opts).unwrap();
        assert!(p.matches("/users"));
    }
}
