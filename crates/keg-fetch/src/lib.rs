//! Resolve package sources to local artifacts.
//!
//! Release archives are downloaded (or read from `file://` URLs) and accepted
//! only when their SHA-256 digest matches the declared checksum. Version-control
//! sources are shallow-cloned and built by an external tool whose output is
//! captured and attached to [`BuildError::Failed`] when it exits non-zero.
//!
//! ```no_run
//! use keg_fetch::{Fetcher, ReqwestClient};
//! # fn demo(spec: &keg_resource::PackageSpec) -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(ReqwestClient::new()?)?;
//! let artifact = fetcher.fetch(spec, std::path::Path::new("/tmp/scratch"))?;
//! # Ok(())
//! # }
//! ```

mod artifact;
mod error;
mod fetcher;
mod http;
mod options;
mod vcs;

pub use artifact::Artifact;
pub use error::{BuildError, FetchError, Result};
pub use fetcher::Fetcher;
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{BoxStream, HttpClient};
pub use options::FetchOptions;
pub use vcs::check_build_tools;

pub use tokio_util::sync::CancellationToken;
