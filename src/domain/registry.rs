use std::collections::HashMap;

use thiserror::Error;

use super::error::ResolveError;
use super::model::EndpointDescriptor;

/// Descriptor validation failures. All fatal at load time, before the
/// gateway serves a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate endpoint id '{id}'")]
    DuplicateEndpoint { id: String },

    #[error("endpoint '{id}' declares no templates")]
    NoTemplates { id: String },

    #[error(
        "endpoint '{id}' template for surface '{surface}' references undeclared placeholder '{name}'"
    )]
    UndeclaredPlaceholder {
        id: String,
        surface: String,
        name: String,
    },

    #[error(
        "endpoint '{id}' declares path parameter '{name}' absent from the template for surface '{surface}'"
    )]
    UnusedPathParam {
        id: String,
        surface: String,
        name: String,
    },
}

/// Immutable set of endpoint descriptors. Built once at process start and
/// shared by reference afterwards, so lookups need no locking.
#[derive(Debug)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, EndpointDescriptor>,
}

impl EndpointRegistry {
    /// Validate and index a set of descriptors.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: a duplicate id, a descriptor with
    /// no templates, a template placeholder missing from `path_params`, or a
    /// declared path parameter that some template never uses.
    pub fn new(descriptors: Vec<EndpointDescriptor>) -> Result<Self, RegistryError> {
        let mut endpoints = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            validate_descriptor(&descriptor)?;
            let id = descriptor.id.clone();
            if endpoints.insert(id.clone(), descriptor).is_some() {
                return Err(RegistryError::DuplicateEndpoint { id });
            }
        }
        Ok(Self { endpoints })
    }

    /// # Errors
    ///
    /// Returns `ResolveError::UnknownEndpoint` if no descriptor has this id.
    pub fn get(&self, id: &str) -> Result<&EndpointDescriptor, ResolveError> {
        self.endpoints
            .get(id)
            .ok_or_else(|| ResolveError::UnknownEndpoint { id: id.to_owned() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointDescriptor> {
        self.endpoints.values()
    }
}

fn validate_descriptor(descriptor: &EndpointDescriptor) -> Result<(), RegistryError> {
    if descriptor.templates.is_empty() {
        return Err(RegistryError::NoTemplates {
            id: descriptor.id.clone(),
        });
    }
    for (surface, template) in &descriptor.templates {
        for name in template.param_names() {
            if !descriptor.path_params.iter().any(|p| p == name) {
                return Err(RegistryError::UndeclaredPlaceholder {
                    id: descriptor.id.clone(),
                    surface: surface.clone(),
                    name: name.to_owned(),
                });
            }
        }
        for declared in &descriptor.path_params {
            if !template.param_names().any(|n| n == declared) {
                return Err(RegistryError::UnusedPathParam {
                    id: descriptor.id.clone(),
                    surface: surface.clone(),
                    name: declared.clone(),
                });
            }
        }
    }
    Ok(())
}
