//! Data functions for CareGaps.
//!
//! Tools are not implemented here; each one is a thin [`FunctionTool`] around
//! a function of the external execution service, described by the catalog
//! and registered under its flattened alias.

pub mod catalog;
pub mod executor;
pub mod service;

pub use catalog::{
    FUNCTION_ROSTER, FileCatalog, FunctionCatalog, NAMESPACE, ToolDescriptor, alias_for,
    default_function_names, qualified_for,
};
pub use executor::{ExecutorOptions, FunctionTool};
pub use service::{
    FixtureService, FunctionOutcome, FunctionService, HttpFunctionService, ServiceError,
};

use caregaps_config::AppConfig;
use caregaps_core::{EventBus, ToolError, ToolRegistry};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("function catalog unavailable: {0}")]
    CatalogUnavailable(#[from] ServiceError),

    #[error("invalid descriptor for {name}: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("{0}")]
    Duplicate(#[from] ToolError),

    #[error("no function source configured (set functions.service_url or functions.catalog_path)")]
    NotConfigured,
}

/// Build the registry for `names` (the whole roster when empty).
///
/// Descriptors the catalog returns for functions that were not asked for
/// are ignored; requested functions the catalog does not know are logged
/// and left out.
pub async fn build_registry(
    catalog: &dyn FunctionCatalog,
    names: &[String],
    service: Arc<dyn FunctionService>,
    options: &ExecutorOptions,
) -> Result<ToolRegistry, RegistryError> {
    let names = if names.is_empty() {
        default_function_names()
    } else {
        names.to_vec()
    };
    let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();

    let descriptors = catalog.describe(&names).await?;
    let mut registry = ToolRegistry::new();
    for descriptor in descriptors {
        let spec = descriptor.into_spec()?;
        if !wanted.contains(spec.qualified_name.as_str()) {
            tracing::debug!(function = %spec.qualified_name, "Skipping unrequested function");
            continue;
        }
        registry.register(Arc::new(FunctionTool::new(spec, service.clone(), options)))?;
    }

    let missing: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| registry.get(&alias_for(n)).is_none())
        .collect();
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Catalog has no descriptor for some functions");
    }

    tracing::info!(count = registry.len(), masking = options.masking, "Tool registry ready");
    Ok(registry)
}

/// Build the registry from configuration.
///
/// Descriptors come from `functions.catalog_path` when set, otherwise from
/// the service. Results come from `functions.fixtures_path` when set,
/// otherwise from the service.
pub async fn registry_from_config(
    config: &AppConfig,
    events: Arc<EventBus>,
) -> Result<ToolRegistry, RegistryError> {
    let functions = &config.functions;
    let timeout = Duration::from_secs(functions.timeout_secs);

    let remote = match &functions.service_url {
        Some(url) => Some(Arc::new(HttpFunctionService::new(
            url.clone(),
            config.api_key.clone(),
            timeout,
        )?)),
        None => None,
    };

    let catalog: Arc<dyn FunctionCatalog> = match (&functions.catalog_path, &remote) {
        (Some(path), _) => Arc::new(FileCatalog::new(path)),
        (None, Some(remote)) => remote.clone(),
        (None, None) => return Err(RegistryError::NotConfigured),
    };
    let service: Arc<dyn FunctionService> = match (&functions.fixtures_path, &remote) {
        (Some(path), _) => Arc::new(FixtureService::from_file(path)?),
        (None, Some(remote)) => remote.clone(),
        (None, None) => return Err(RegistryError::NotConfigured),
    };

    let options = ExecutorOptions {
        masking: config.profile().phi_masking,
        timeout,
        events,
    };
    build_registry(catalog.as_ref(), &functions.names, service, &options).await
}
