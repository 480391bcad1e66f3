pub mod finding;
pub mod verdict;

pub use finding::{Catalog, CatalogEntry, CatalogKey, Finding, RiskLabel};
pub use verdict::{DaemonFindings, DependencyFindings, Verdict};
