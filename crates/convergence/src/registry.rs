//! Explicit provider registry.
//!
//! Resolution maps (resource type, platform) to a factory. There is no
//! implicit global registration: callers build a registry, register
//! each provider, and hand the registry to the runner, which keeps
//! resolution order explicit and testable.

use crate::error::ConvergeError;
use crate::provider::Provider;
use crate::resource::Resource;

/// Platforms a registration applies to.
#[derive(Debug, Clone)]
pub enum PlatformSupport {
    /// Every platform
    All,
    /// Only the listed platform tags
    Only(Vec<String>),
}

impl PlatformSupport {
    /// Convenience constructor for a single-platform registration.
    pub fn only(platform: impl Into<String>) -> Self {
        Self::Only(vec![platform.into()])
    }

    fn matches(&self, platform: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(platforms) => platforms.iter().any(|p| p == platform),
        }
    }
}

type Factory = Box<dyn Fn(&Resource) -> Box<dyn Provider>>;

struct Registration {
    resource_type: String,
    platforms: PlatformSupport,
    factory: Factory,
}

/// Registry resolving the provider for a resource on a platform.
///
/// The first matching registration wins, so platform-specific entries
/// should be registered before catch-alls for the same type.
#[derive(Default)]
pub struct ProviderRegistry {
    registrations: Vec<Registration>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider factory for a resource type on the given
    /// platforms.
    pub fn register(
        &mut self,
        resource_type: impl Into<String>,
        platforms: PlatformSupport,
        factory: impl Fn(&Resource) -> Box<dyn Provider> + 'static,
    ) {
        self.registrations.push(Registration {
            resource_type: resource_type.into(),
            platforms,
            factory: Box::new(factory),
        });
    }

    /// Build a provider bound to `resource` for `platform`.
    pub fn resolve(
        &self,
        resource: &Resource,
        platform: &str,
    ) -> Result<Box<dyn Provider>, ConvergeError> {
        self.registrations
            .iter()
            .find(|r| r.resource_type == resource.type_tag() && r.platforms.matches(platform))
            .map(|r| (r.factory)(resource))
            .ok_or_else(|| ConvergeError::NoProvider {
                resource_type: resource.type_tag().to_string(),
                platform: platform.to_string(),
            })
    }

    /// Resource types with at least one registration, sorted and
    /// deduplicated.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .registrations
            .iter()
            .map(|r| r.resource_type.as_str())
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}
