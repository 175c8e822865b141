pub mod canon;
pub mod catalog;
pub mod cohort;
pub mod compliance;
pub mod error;
pub mod hash;
pub mod persist;
pub mod types;

pub use catalog::{
    enrich, glob_aspect, AspectDescriptor, AspectGroup, AspectKind, DisplayMetadata,
    Environment, FingerprintCatalog, RegistryConfig,
};
pub use cohort::CohortAnalysis;
pub use error::{CoreError, CoreResult};
pub use persist::{PersistResult, PersistenceResult, SpiderFailure};
pub use types::*;
