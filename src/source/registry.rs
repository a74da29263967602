//! Source registry, indexed by region
//!
//! Populated once at startup through [`SourceRegistryBuilder`] and read-only afterwards, so
//! the aggregator can share it across concurrent queries behind a plain `Arc`.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::source::DocumentSource;
use crate::types::Region;

/// Registered sources grouped by region, each group ordered by ascending priority
///
/// Sources with equal priority keep their registration order.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    by_region: BTreeMap<Region, Vec<Arc<dyn DocumentSource>>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (region, sources) in &self.by_region {
            let names: Vec<&str> = sources.iter().map(|s| s.source_name()).collect();
            map.entry(region, &names);
        }
        map.finish()
    }
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for chained registration
    pub fn builder() -> SourceRegistryBuilder {
        SourceRegistryBuilder::default()
    }

    /// Add a source
    ///
    /// Fails with [`Error::DuplicateSourceRegistration`] if any registered source already uses
    /// the same name, and with [`Error::InvalidSourceMetadata`] if the name is blank.
    pub fn register(&mut self, source: Arc<dyn DocumentSource>) -> Result<()> {
        let name = source.source_name().to_string();
        let region = source.region();

        if name.trim().is_empty() {
            return Err(Error::InvalidSourceMetadata {
                source_name: name,
                reason: "source name must not be blank".to_string(),
            });
        }
        if self.source_by_name(&name).is_some() {
            return Err(Error::DuplicateSourceRegistration {
                source_name: name,
                region,
            });
        }

        let priority = source.priority();
        let group = self.by_region.entry(region).or_default();
        let position = group
            .iter()
            .position(|s| s.priority() > priority)
            .unwrap_or(group.len());
        group.insert(position, source);

        tracing::debug!(
            source = %name,
            region = %region,
            priority,
            "Registered document source"
        );
        Ok(())
    }

    /// Sources serving `region`, highest priority (lowest number) first
    pub fn sources_for(&self, region: Region) -> &[Arc<dyn DocumentSource>] {
        self.by_region
            .get(&region)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Regions with at least one source
    pub fn regions(&self) -> Vec<Region> {
        self.by_region
            .iter()
            .filter(|(_, sources)| !sources.is_empty())
            .map(|(region, _)| *region)
            .collect()
    }

    /// Look a source up by name
    pub fn source_by_name(&self, name: &str) -> Option<&Arc<dyn DocumentSource>> {
        self.all_sources().find(|s| s.source_name() == name)
    }

    /// Every source, grouped by region then priority
    pub fn all_sources(&self) -> impl Iterator<Item = &Arc<dyn DocumentSource>> {
        self.by_region.values().flatten()
    }

    /// Total number of sources
    pub fn len(&self) -> usize {
        self.by_region.values().map(Vec::len).sum()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Chained registration, consumed into a [`SourceRegistry`]
///
/// ```no_run
/// # use std::sync::Arc;
/// # use earnings_dl::source::{DocumentSource, SourceRegistry};
/// # fn sources() -> (Arc<dyn DocumentSource>, Arc<dyn DocumentSource>) { unimplemented!() }
/// # fn main() -> earnings_dl::Result<()> {
/// let (bse, screener) = sources();
/// let registry = SourceRegistry::builder()
///     .register(bse)?
///     .register(screener)?
///     .build();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SourceRegistryBuilder {
    registry: SourceRegistry,
}

impl SourceRegistryBuilder {
    /// Add a source; see [`SourceRegistry::register`]
    pub fn register(mut self, source: Arc<dyn DocumentSource>) -> Result<Self> {
        self.registry.register(source)?;
        Ok(self)
    }

    /// Add several sources, stopping at the first failure
    pub fn register_all(
        mut self,
        sources: impl IntoIterator<Item = Arc<dyn DocumentSource>>,
    ) -> Result<Self> {
        for source in sources {
            self.registry.register(source)?;
        }
        Ok(self)
    }

    /// Finish registration
    pub fn build(self) -> SourceRegistry {
        self.registry
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<SourceRegistry>> = OnceLock::new();

/// Install the process-wide registry
///
/// Call once at startup, after every source is registered. A second call fails with
/// [`Error::RegistryAlreadyInstalled`] and leaves the first registry in place.
pub fn install_global(registry: SourceRegistry) -> Result<Arc<SourceRegistry>> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(Arc::clone(&registry))
        .map_err(|_| Error::RegistryAlreadyInstalled)?;
    tracing::info!(
        sources = registry.len(),
        regions = registry.regions().len(),
        "Installed global source registry"
    );
    Ok(registry)
}

/// The process-wide registry, if installed
pub fn global() -> Option<Arc<SourceRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}
