use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use super::error::ResolveError;
use super::model::{EndpointDescriptor, ResolvedPath, TemplateSegment};
use super::registry::EndpointRegistry;

/// Resolves endpoint ids to concrete paths for a given surface.
///
/// Pure and synchronous: all validation that could fail for structural
/// reasons already happened when the registry was built.
#[derive(Debug, Clone)]
pub struct PathResolver {
    registry: Arc<EndpointRegistry>,
}

impl PathResolver {
    #[must_use]
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve `endpoint_id` for `surface`, substituting `params`.
    ///
    /// # Errors
    ///
    /// `UnknownEndpoint` / `UnknownSurface` for a missing descriptor or
    /// template, `MissingParameter` for the first absent or empty required
    /// parameter, `InvalidParameter` for a path value containing `/`.
    pub fn resolve(
        &self,
        endpoint_id: &str,
        surface: &str,
        params: &HashMap<String, String>,
    ) -> Result<ResolvedPath, ResolveError> {
        let descriptor = self.registry.get(endpoint_id)?;
        self.resolve_with(descriptor, surface, params)
    }

    /// Resolve against an already-looked-up descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`], minus `UnknownEndpoint`.
    pub fn resolve_with(
        &self,
        descriptor: &EndpointDescriptor,
        surface: &str,
        params: &HashMap<String, String>,
    ) -> Result<ResolvedPath, ResolveError> {
        let template =
            descriptor
                .templates
                .get(surface)
                .ok_or_else(|| ResolveError::UnknownSurface {
                    endpoint: descriptor.id.clone(),
                    surface: surface.to_owned(),
                })?;

        let mut path = String::with_capacity(template.raw().len());
        let mut consumed = BTreeMap::new();

        // Substitute placeholders left to right. Each occurrence of a
        // duplicated placeholder is replaced identically.
        for segment in template.segments() {
            match segment {
                TemplateSegment::Literal(s) => path.push_str(s),
                TemplateSegment::Param(name) => {
                    let value = params
                        .get(name)
                        .filter(|v| !v.is_empty())
                        .ok_or_else(|| ResolveError::MissingParameter { name: name.clone() })?;
                    // A '/' in a path value would inject extra path segments.
                    if value.contains('/') {
                        return Err(ResolveError::InvalidParameter {
                            name: name.clone(),
                            detail: "path parameter must not contain '/'".into(),
                        });
                    }
                    path.push_str(&urlencoding::encode(value));
                    consumed.insert(name.clone(), value.clone());
                }
            }
        }

        // Leftover parameters become query string if declared, otherwise
        // they are dropped. Callers may pass a superset.
        let mut query: Vec<(&str, &str)> = Vec::new();
        for (name, value) in params {
            if consumed.contains_key(name) {
                continue;
            }
            if descriptor.query_params.iter().any(|q| q == name) {
                query.push((name, value));
            } else {
                debug!(
                    endpoint = %descriptor.id,
                    param = %name,
                    "dropping undeclared parameter"
                );
            }
        }
        if !query.is_empty() {
            query.sort_by_key(|&(name, _)| name);
            let qs = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&query)
                .finish();
            path.push('?');
            path.push_str(&qs);
            for (name, value) in query {
                consumed.insert(name.to_owned(), value.to_owned());
            }
        }

        Ok(ResolvedPath {
            path,
            surface: surface.to_owned(),
            consumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{HttpMethod, PathTemplate};

    fn resolver() -> PathResolver {
        let descriptors = vec![
            EndpointDescriptor {
                id: "issues.get".into(),
                method: HttpMethod::Get,
                templates: HashMap::from([
                    (
                        "client".to_owned(),
                        PathTemplate::parse("/api/issues/{id}").unwrap(),
                    ),
                    (
                        "upstream".to_owned(),
                        PathTemplate::parse("/rest/v2/issues/{id}").unwrap(),
                    ),
                ]),
                path_params: vec!["id".into()],
                query_params: vec!["fields".into()],
                cache: None,
                invalidates: None,
            },
            EndpointDescriptor {
                id: "issues.list".into(),
                method: HttpMethod::Get,
                templates: HashMap::from([(
                    "upstream".to_owned(),
                    PathTemplate::parse("/rest/v2/projects/{project}/issues").unwrap(),
                )]),
                path_params: vec!["project".into()],
                query_params: vec!["page".into(), "state".into()],
                cache: None,
                invalidates: None,
            },
            EndpointDescriptor {
                id: "diff.get".into(),
                method: HttpMethod::Get,
                templates: HashMap::from([(
                    "upstream".to_owned(),
                    PathTemplate::parse("/rest/v2/diff/{rev}..{rev}").unwrap(),
                )]),
                path_params: vec!["rev".into()],
                query_params: vec![],
                cache: None,
                invalidates: None,
            },
        ];
        PathResolver::new(Arc::new(EndpointRegistry::new(descriptors).unwrap()))
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    #[test]
    fn resolves_per_surface() {
        let r = resolver();
        let p = params(&[("id", "123")]);
        assert_eq!(
            r.resolve("issues.get", "client", &p).unwrap().path,
            "/api/issues/123"
        );
        assert_eq!(
            r.resolve("issues.get", "upstream", &p).unwrap().path,
            "/rest/v2/issues/123"
        );
    }

    #[test]
    fn unknown_endpoint() {
        let err = resolver()
            .resolve("issues.nope", "upstream", &params(&[]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnknownEndpoint { .. }));
    }

    #[test]
    fn unknown_surface() {
        let err = resolver()
            .resolve("issues.list", "client", &params(&[("project", "p1")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::UnknownSurface { ref surface, .. } if surface == "client"
        ));
    }

    #[test]
    fn missing_parameter_is_named() {
        let err = resolver()
            .resolve("issues.list", "upstream", &params(&[("page", "2")]))
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingParameter {
                name: "project".into()
            }
        );
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let err = resolver()
            .resolve("issues.get", "upstream", &params(&[("id", "")]))
            .unwrap_err();
        assert_eq!(err, ResolveError::MissingParameter { name: "id".into() });
    }

    #[test]
    fn slash_in_path_value_rejected() {
        let err = resolver()
            .resolve("issues.get", "upstream", &params(&[("id", "1/../admin")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InvalidParameter { ref name, .. } if name == "id"
        ));
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let resolved = resolver()
            .resolve("issues.get", "upstream", &params(&[("id", "a b&c")]))
            .unwrap();
        assert_eq!(resolved.path, "/rest/v2/issues/a%20b%26c");
    }

    #[test]
    fn declared_extras_become_sorted_query() {
        let resolved = resolver()
            .resolve(
                "issues.list",
                "upstream",
                &params(&[("project", "p1"), ("state", "open"), ("page", "2")]),
            )
            .unwrap();
        assert_eq!(
            resolved.path,
            "/rest/v2/projects/p1/issues?page=2&state=open"
        );
        assert_eq!(resolved.consumed.len(), 3);
    }

    #[test]
    fn undeclared_extras_are_dropped() {
        let resolved = resolver()
            .resolve(
                "issues.get",
                "upstream",
                &params(&[("id", "7"), ("debug", "1")]),
            )
            .unwrap();
        assert_eq!(resolved.path, "/rest/v2/issues/7");
        assert!(!resolved.consumed.contains_key("debug"));
    }

    #[test]
    fn duplicate_placeholder_substituted_identically() {
        let resolved = resolver()
            .resolve("diff.get", "upstream", &params(&[("rev", "abc")]))
            .unwrap();
        assert_eq!(resolved.path, "/rest/v2/diff/abc..abc");
    }

    #[test]
    fn output_never_contains_braces() {
        let r = resolver();
        for (endpoint, p) in [
            ("issues.get", params(&[("id", "123"), ("fields", "all")])),
            ("issues.list", params(&[("project", "p1")])),
            ("diff.get", params(&[("rev", "abc")])),
        ] {
            for surface in ["client", "upstream"] {
                if let Ok(resolved) = r.resolve(endpoint, surface, &p) {
                    assert!(!resolved.path.contains(['{', '}']), "{}", resolved.path);
                }
            }
        }
    }
}
