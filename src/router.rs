//! Path-template routing: each OpenAPI template compiles to an anchored
//! regular expression honoring `{name}` and `{name:pattern}` forms, compiled
//! templates are memoized process-wide, and requests are matched in the
//! declaration order of the document's `paths`.

use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, OnceLock};

/// The HTTP methods a path item may declare operations for.
pub(crate) const HTTP_METHODS: [&str; 8] =
    ["get", "put", "post", "delete", "options", "head", "patch", "trace"];

static TEMPLATE_CACHE: OnceLock<DashMap<String, Arc<CompiledTemplate>>> = OnceLock::new();

fn template_cache() -> &'static DashMap<String, Arc<CompiledTemplate>> {
    TEMPLATE_CACHE.get_or_init(DashMap::new)
}

/// Returns the memoized compilation of `template`. Racing compilations both
/// produce the same regex, so the insert is idempotent.
pub fn compiled_template(template: &str) -> Result<Arc<CompiledTemplate>, RouteError> {
    if let Some(hit) = template_cache().get(template) {
        return Ok(Arc::clone(hit.value()));
    }
    let compiled = Arc::new(CompiledTemplate::compile(template)?);
    template_cache().insert(template.to_string(), Arc::clone(&compiled));
    log::debug!("Compiled path template '{}'", template);
    Ok(compiled)
}

#[derive(Debug)]
pub struct CompiledTemplate {
    template: String,
    regex: Regex,
    /// Parameter names in brace order; capture group `i + 1` holds the value
    /// for `names[i]`.
    names: Vec<String>,
}

impl CompiledTemplate {
    pub fn compile(template: &str) -> Result<Self, RouteError> {
        let mut pattern = String::from("^");
        let mut names = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    let mut body = String::new();
                    let mut depth = 1usize;
                    loop {
                        match chars.next() {
                            Some('{') => {
                                depth += 1;
                                body.push('{');
                            }
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                body.push('}');
                            }
                            Some(inner) => body.push(inner),
                            None => {
                                return Err(RouteError::UnbalancedBraces {
                                    template: template.to_string(),
                                });
                            }
                        }
                    }

                    let (name, var_pattern) = match body.split_once(':') {
                        Some((name, custom)) => (name.to_string(), custom.to_string()),
                        None => (body.clone(), "[^/]+".to_string()),
                    };
                    if name.is_empty() {
                        return Err(RouteError::EmptyVariableName {
                            template: template.to_string(),
                        });
                    }
                    if has_capturing_group(&var_pattern) {
                        return Err(RouteError::CapturingPattern {
                            template: template.to_string(),
                            name,
                        });
                    }
                    names.push(name);
                    pattern.push('(');
                    pattern.push_str(&var_pattern);
                    pattern.push(')');
                }
                '}' => {
                    return Err(RouteError::UnbalancedBraces { template: template.to_string() });
                }
                other => literal.push(other),
            }
        }
        pattern.push_str(&regex::escape(&literal));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| RouteError::InvalidPattern {
            template: template.to_string(),
            detail: e.to_string(),
        })?;
        Ok(Self { template: template.to_string(), regex, names })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Matches a request path, returning the raw path variables in brace
    /// order on success.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let captures = self.regex.captures(path)?;
        Some(
            self.names
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let value = captures
                        .get(index + 1)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default();
                    (name.clone(), value)
                })
                .collect(),
        )
    }
}

/// True when `pattern` contains a capturing group, which would shift the
/// positional name mapping.
fn has_capturing_group(pattern: &str) -> bool {
    let mut chars = pattern.chars().peekable();
    let mut escaped = false;
    let mut in_class = false;
    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => in_class = true,
            ']' => in_class = false,
            '(' if !in_class => {
                if chars.peek() != Some(&'?') {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

#[derive(Debug, PartialEq, Eq)]
pub enum RouteError {
    UnbalancedBraces { template: String },
    EmptyVariableName { template: String },
    CapturingPattern { template: String, name: String },
    InvalidPattern { template: String, detail: String },
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteError::UnbalancedBraces { template } => {
                write!(f, "The path template '{}' has unbalanced braces", template)
            }
            RouteError::EmptyVariableName { template } => {
                write!(f, "The path template '{}' has a variable without a name", template)
            }
            RouteError::CapturingPattern { template, name } => write!(
                f,
                "The inline pattern for '{}' in template '{}' must not contain capturing groups",
                name, template
            ),
            RouteError::InvalidPattern { template, detail } => {
                write!(f, "The path template '{}' does not compile: {}", template, detail)
            }
        }
    }
}

impl std::error::Error for RouteError {}

/// One declared path with the methods its path item carries, in declaration
/// order.
#[derive(Debug, Clone)]
struct RouteEntry {
    template: String,
    methods: Vec<String>,
}

/// The declaration-ordered routing table for one document.
#[derive(Debug, Default)]
pub struct PathRouter {
    entries: Vec<RouteEntry>,
}

/// The routing decision for one request.
#[derive(Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Matched { template: String, vars: Vec<(String, String)> },
    /// Some template matched the URL, but its path item has no operation for
    /// the request method.
    MethodMissing { template: String },
    NotFound,
}

impl PathRouter {
    pub fn from_paths(paths: &Value) -> Self {
        let mut entries = Vec::new();
        if let Some(paths) = paths.as_object() {
            for (template, path_item) in paths {
                let methods = path_item
                    .as_object()
                    .map(|item| {
                        item.keys()
                            .filter(|key| HTTP_METHODS.contains(&key.as_str()))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                entries.push(RouteEntry { template: template.clone(), methods });
            }
        }
        Self { entries }
    }

    /// Routes a request URL and method. The first template whose regex
    /// matches and whose path item declares the method wins; templates that
    /// match only the URL produce `MethodMissing` when nothing better exists.
    pub fn route(&self, path: &str, method: &str) -> Result<RouteDecision, RouteError> {
        let method = method.to_lowercase();
        let mut method_missing: Option<&str> = None;

        for entry in &self.entries {
            let compiled = compiled_template(&entry.template)?;
            if let Some(vars) = compiled.matches(path) {
                if entry.methods.iter().any(|m| *m == method) {
                    log::debug!(
                        "Request '{} {}' routed to template '{}'",
                        method,
                        path,
                        entry.template
                    );
                    return Ok(RouteDecision::Matched { template: entry.template.clone(), vars });
                }
                method_missing.get_or_insert(entry.template.as_str());
            }
        }

        Ok(match method_missing {
            Some(template) => RouteDecision::MethodMissing { template: template.to_string() },
            None => RouteDecision::NotFound,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_template_matches_and_extracts() {
        let compiled = CompiledTemplate::compile("/pets/{petId}/toys/{toyId}").unwrap();
        let vars = compiled.matches("/pets/42/toys/ball").unwrap();
        assert_eq!(vars, vec![
            ("petId".to_string(), "42".to_string()),
            ("toyId".to_string(), "ball".to_string())
        ]);
        assert!(compiled.matches("/pets/42").is_none());
        assert!(compiled.matches("/pets/42/toys/ball/extra").is_none());
    }

    #[test]
    fn test_inline_pattern() {
        let compiled = CompiledTemplate::compile("/orders/{id:[0-9]+}/items/{itemId}").unwrap();
        let vars = compiled.matches("/orders/42/items/widget").unwrap();
        assert_eq!(vars[0], ("id".to_string(), "42".to_string()));
        assert_eq!(vars[1], ("itemId".to_string(), "widget".to_string()));
        assert!(compiled.matches("/orders/abc/items/x").is_none());
    }

    #[test]
    fn test_inline_pattern_with_braces() {
        let compiled = CompiledTemplate::compile("/codes/{code:[A-Z]{3}}").unwrap();
        assert!(compiled.matches("/codes/ABC").is_some());
        assert!(compiled.matches("/codes/AB").is_none());
    }

    #[test]
    fn test_literal_segments_are_quoted() {
        let compiled = CompiledTemplate::compile("/v1.0/pets+dogs/{id}").unwrap();
        assert!(compiled.matches("/v1.0/pets+dogs/7").is_some());
        // An unescaped '.' would match any character.
        assert!(compiled.matches("/v1x0/pets+dogs/7").is_none());
    }

    #[test]
    fn test_unbalanced_braces() {
        assert!(matches!(
            CompiledTemplate::compile("/pets/{id").unwrap_err(),
            RouteError::UnbalancedBraces { .. }
        ));
        assert!(matches!(
            CompiledTemplate::compile("/pets/id}").unwrap_err(),
            RouteError::UnbalancedBraces { .. }
        ));
    }

    #[test]
    fn test_capturing_patterns_rejected() {
        assert!(matches!(
            CompiledTemplate::compile("/pets/{id:([0-9]+)}").unwrap_err(),
            RouteError::CapturingPattern { .. }
        ));
        // Non-capturing groups and classes containing '(' are fine.
        assert!(CompiledTemplate::compile("/pets/{id:(?:[0-9]+)}").is_ok());
        assert!(CompiledTemplate::compile("/pets/{id:[(]+}").is_ok());
    }

    #[test]
    fn test_template_cache_memoizes() {
        let first = compiled_template("/cache-test/{x}").unwrap();
        let second = compiled_template("/cache-test/{x}").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    fn sample_router() -> PathRouter {
        PathRouter::from_paths(&json!({
            "/pets": { "get": {}, "post": {} },
            "/pets/{petId}": { "get": {}, "parameters": [] },
            "/orders/{id:[0-9]+}": { "get": {} }
        }))
    }

    #[test]
    fn test_route_declaration_order_first_match_wins() {
        let router = sample_router();
        match router.route("/pets/7", "GET").unwrap() {
            RouteDecision::Matched { template, vars } => {
                assert_eq!(template, "/pets/{petId}");
                assert_eq!(vars[0].1, "7");
            }
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_route_method_missing() {
        let router = sample_router();
        assert_eq!(
            router.route("/pets/7", "DELETE").unwrap(),
            RouteDecision::MethodMissing { template: "/pets/{petId}".to_string() }
        );
    }

    #[test]
    fn test_route_not_found() {
        let router = sample_router();
        assert_eq!(router.route("/unknown", "GET").unwrap(), RouteDecision::NotFound);
        // The inline pattern rejects non-numeric ids outright.
        assert_eq!(router.route("/orders/abc", "GET").unwrap(), RouteDecision::NotFound);
    }

    #[test]
    fn test_route_skips_url_match_in_favor_of_full_match() {
        // `/pets/special` matches both templates; only the literal one has
        // DELETE, and it is declared later. The earlier URL-only match must
        // not preempt it.
        let router = PathRouter::from_paths(&json!({
            "/pets/{petId}": { "get": {} },
            "/pets/special": { "delete": {} }
        }));
        assert_eq!(
            router.route("/pets/special", "DELETE").unwrap(),
            RouteDecision::Matched { template: "/pets/special".to_string(), vars: vec![] }
        );
    }
}
