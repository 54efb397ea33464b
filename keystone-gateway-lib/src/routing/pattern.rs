use crate::error::{GatewayError, Result};

/// Captured path parameters, in pattern order
pub type PathParams = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Route pattern for scripted routes
///
/// Supports literal segments, `{name}` parameters, and a trailing `/*`
/// wildcard: `/users/{id}/posts/*`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    wildcard: bool,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "Route pattern must start with '/': {pattern}"
            )));
        }

        let mut segments = Vec::new();
        let mut wildcard = false;
        let parts: Vec<&str> = pattern[1..].split('/').filter(|s| !s.is_empty()).collect();

        for (idx, part) in parts.iter().enumerate() {
            if *part == "*" {
                if idx != parts.len() - 1 {
                    return Err(GatewayError::Config(format!(
                        "Wildcard must be the last segment: {pattern}"
                    )));
                }
                wildcard = true;
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(GatewayError::Config(format!(
                        "Empty parameter name in pattern: {pattern}"
                    )));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal((*part).to_string()));
            }
        }

        Ok(Self { raw: pattern.to_string(), segments, wildcard })
    }

    /// Match a cleaned request path, returning captured parameters
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if self.wildcard {
            if parts.len() < self.segments.len() {
                return None;
            }
        } else if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.push((name.clone(), (*part).to_string()));
                }
            }
        }

        Some(params)
    }

    /// Whether this pattern, used as a middleware scope, covers a path.
    /// Scopes are prefix-like: "/admin" covers "/admin" and everything
    /// below it, and "/" covers every path.
    pub fn matches_scope(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if parts.len() < self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(parts.iter())
            .all(|(segment, part)| match segment {
                Segment::Literal(lit) => lit == part,
                Segment::Param(_) => true,
            })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}
