pub mod analyze;
pub mod clone;
pub mod config;
pub mod error;
pub mod spider;

pub use analyze::{Analyzer, FileScanAnalyzer};
pub use clone::{mask_secrets, ClonedProject, Cloner, GitCommandCloner};
pub use config::{CloneConfig, SourceSpec, GITHUB_API_BASE};
pub use error::{SpiderError, SpiderResult};
pub use spider::Spider;
