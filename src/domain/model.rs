use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde_json::Value;

// ---------------------------------------------------------------------------
// HTTP method
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub fn is_mutation(self) -> bool {
        !matches!(self, Self::Get)
    }
}

// ---------------------------------------------------------------------------
// Path templates
// ---------------------------------------------------------------------------

/// One piece of a parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Param(String),
}

/// A path template parsed once at load time so that resolution never has to
/// re-validate placeholder syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<TemplateSegment>,
}

impl PathTemplate {
    /// Parse a template string containing `{param}` placeholders.
    ///
    /// # Errors
    ///
    /// Returns a description of the first syntax problem: an unclosed or
    /// stray brace, an empty placeholder, or a placeholder name that is not
    /// an identifier (ASCII alphanumeric and `_`).
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    let rest = &raw[pos + 1..];
                    let Some(end) = rest.find('}') else {
                        return Err(format!("unclosed '{{' at offset {pos}"));
                    };
                    let name = &rest[..end];
                    if name.is_empty() {
                        return Err(format!("empty placeholder at offset {pos}"));
                    }
                    if !name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return Err(format!("invalid placeholder name '{name}'"));
                    }
                    if !literal.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(TemplateSegment::Param(name.to_owned()));
                    // Skip the placeholder body and the closing brace.
                    for _ in 0..=end {
                        chars.next();
                    }
                }
                '}' => return Err(format!("stray '}}' at offset {pos}")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(TemplateSegment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// Placeholder names in left-to-right order; duplicates preserved.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Param(name) => Some(name.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Endpoint descriptors
// ---------------------------------------------------------------------------

/// Cache policy of a cacheable endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
}

/// Binding from a mutation endpoint to the resource kind it invalidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBinding {
    pub kind: String,
    /// Name of the parameter carrying the mutated resource's id.
    pub id_param: String,
}

/// Static description of one logical upstream operation. Built once from
/// configuration and immutable thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub id: String,
    pub method: HttpMethod,
    /// Surface name (e.g. `client`, `upstream`) to path template.
    pub templates: HashMap<String, PathTemplate>,
    /// Required path parameters, in declaration order.
    pub path_params: Vec<String>,
    /// Optional parameters passed through as query string.
    pub query_params: Vec<String>,
    /// Absent means the endpoint is not cacheable.
    pub cache: Option<CachePolicy>,
    pub invalidates: Option<InvalidationBinding>,
}

impl EndpointDescriptor {
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.cache.is_some()
    }
}

/// Output of path resolution. Created per call, discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Concrete path, including the encoded query string if any.
    pub path: String,
    pub surface: String,
    /// Parameters that influenced the path or query, for diagnostics and
    /// cache key construction.
    pub consumed: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Cache observability
// ---------------------------------------------------------------------------

/// How a read was answered, exposed to clients via response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
        }
    }
}

/// Outcome of a read through the gateway.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub value: Value,
    pub cache: CacheStatus,
    pub ttl_remaining: Duration,
}

// ---------------------------------------------------------------------------
// Bulk operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkOpKind {
    Status,
    Assign,
    Tag,
}

impl BulkOpKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Assign => "assign",
            Self::Tag => "tag",
        }
    }
}

/// One item of a batch. Consumed exactly once by the coordinator.
#[derive(Debug, Clone)]
pub struct BulkOperation {
    pub target_id: String,
    pub kind: BulkOpKind,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Succeeded(Value),
    Failed(String),
}

impl ItemOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Per-item result, in the order the operations were submitted.
#[derive(Debug, Clone)]
pub struct ItemResult {
    pub target_id: String,
    pub outcome: ItemOutcome,
}

/// Aggregate report of a batch. `succeeded + failed == total` and
/// `items.len() == total` hold regardless of how many items failed.
#[derive(Debug, Clone)]
pub struct BulkReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<ItemResult>,
}

impl BulkReport {
    #[must_use]
    pub fn from_items(items: Vec<ItemResult>) -> Self {
        let total = items.len();
        let succeeded = items.iter().filter(|i| i.outcome.is_success()).count();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
            items,
        }
    }
}
