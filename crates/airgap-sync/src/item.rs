//! Manifest items as pipeline inputs

use airgap_core::{ArtifactError, Category, ChartRef, DistributionRelease, ImageRef, Transfer};
use std::fmt;

/// One unit of work for a pipeline
pub trait ArtifactItem: Clone + Send + Sync + 'static {
    /// Category whose pipeline processes this item
    const CATEGORY: Category;

    /// Whether uploads of this category need a registry login first
    const REQUIRES_LOGIN: bool;

    /// Human-readable identifier used in events and plans
    fn id(&self) -> String;

    fn version(&self) -> &str;

    /// Checks that must pass before any client is created
    fn validate(&self) -> Result<(), ArtifactError> {
        Ok(())
    }
}

impl ArtifactItem for DistributionRelease {
    const CATEGORY: Category = Category::Distribution;
    // The bundle is only ever written to disk
    const REQUIRES_LOGIN: bool = false;

    fn id(&self) -> String {
        "rke2".to_string()
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.version.trim().is_empty() {
            return Err(ArtifactError::configuration(
                "distribution version is missing",
            ));
        }
        Ok(())
    }
}

impl ArtifactItem for ChartRef {
    const CATEGORY: Category = Category::Chart;
    const REQUIRES_LOGIN: bool = true;

    fn id(&self) -> String {
        self.chart_name().to_string()
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        ChartRef::validate(self)
    }
}

impl ArtifactItem for ImageRef {
    const CATEGORY: Category = Category::Image;
    const REQUIRES_LOGIN: bool = true;

    fn id(&self) -> String {
        self.name.clone()
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.name.trim().is_empty() {
            return Err(ArtifactError::configuration("image name is missing"));
        }
        Ok(())
    }
}

/// What a dry run would do for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub category: Category,
    pub item: String,
    pub version: String,
    pub source: String,
    pub target: String,
}

impl PlanEntry {
    pub fn new<I: ArtifactItem>(item: &I, transfer: Transfer) -> Self {
        Self {
            category: I::CATEGORY,
            item: item.id(),
            version: item.version().to_string(),
            source: transfer.source,
            target: transfer.target,
        }
    }
}

impl fmt::Display for PlanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {} -> {}",
            self.category, self.item, self.version, self.source, self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_identity() {
        let chart = ChartRef::new("sriov", "oci://registry.example/edge/sriov", "1.2.2");
        assert_eq!(chart.id(), "sriov");
        assert_eq!(<ChartRef as ArtifactItem>::CATEGORY, Category::Chart);

        let image = ImageRef::new("nginx", "1.19.6", "docker.io/library");
        assert_eq!(image.id(), "nginx");
        assert_eq!(ArtifactItem::version(&image), "1.19.6");

        let rke2 = DistributionRelease {
            version: "v1.28.9+rke2r1".to_string(),
        };
        assert_eq!(rke2.id(), "rke2");
        assert!(!DistributionRelease::REQUIRES_LOGIN);
    }

    #[test]
    fn test_item_validation() {
        let chart = ChartRef::new("rancher", "rancher", "2.8.0");
        assert!(matches!(
            ArtifactItem::validate(&chart),
            Err(ArtifactError::Configuration { .. })
        ));

        let empty = DistributionRelease {
            version: " ".to_string(),
        };
        assert!(ArtifactItem::validate(&empty).is_err());
    }

    #[test]
    fn test_plan_entry_display() {
        let image = ImageRef::new("nginx", "1.19.6", "docker.io/library");
        let entry = PlanEntry::new(
            &image,
            Transfer {
                source: "docker.io/library/nginx:1.19.6".to_string(),
                target: "/out/images/nginx".to_string(),
            },
        );
        assert_eq!(
            entry.to_string(),
            "[image] nginx 1.19.6: docker.io/library/nginx:1.19.6 -> /out/images/nginx"
        );
    }
}
