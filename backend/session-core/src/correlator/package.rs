//! Package-identifier to application-metadata lookup.
//!
//! The metadata source lives outside the session engine. [`NameOnlyResolver`]
//! is used when none is wired in.

use crate::error::package::PackageError;

use common::ErrorLocation;
use models::AppDescriptor;

use std::collections::HashMap;
use std::panic::Location;

use async_trait::async_trait;

#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// # Errors
    ///
    /// [`PackageError::PackageResolutionFailure`] if `package` has no metadata.
    async fn resolve(&self, package: &str) -> Result<AppDescriptor, PackageError>;
}

/// Descriptor built from the package identifier alone, never a system app.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameOnlyResolver;

#[async_trait]
impl PackageResolver for NameOnlyResolver {
    async fn resolve(&self, package: &str) -> Result<AppDescriptor, PackageError> {
        if package.trim().is_empty() {
            return Err(PackageError::PackageResolutionFailure {
                package: package.to_string(),
                message: String::from("Empty package identifier"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(AppDescriptor {
            package: package.to_string(),
            display_name: package.to_string(),
            icon: None,
            system: false,
        })
    }
}

/// Fixed catalog of known applications. Unknown packages fail to resolve.
#[derive(Debug, Default, Clone)]
pub struct CatalogResolver {
    entries: HashMap<String, AppDescriptor>,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, descriptor: AppDescriptor) -> Self {
        self.entries.insert(descriptor.package.clone(), descriptor);
        self
    }
}

impl FromIterator<AppDescriptor> for CatalogResolver {
    fn from_iter<I: IntoIterator<Item = AppDescriptor>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|d| (d.package.clone(), d))
                .collect(),
        }
    }
}

#[async_trait]
impl PackageResolver for CatalogResolver {
    async fn resolve(&self, package: &str) -> Result<AppDescriptor, PackageError> {
        self.entries
            .get(package)
            .cloned()
            .ok_or_else(|| PackageError::PackageResolutionFailure {
                package: package.to_string(),
                message: String::from("Package not in catalog"),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}
