use std::future::Future;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use keg_resource::{PackageSpec, Source};
use keg_verify::{Checksum, Hasher, VerificationError, VerifiedReader};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::artifact::Artifact;
use crate::error::{FetchError, Result};
use crate::http::HttpClient;
use crate::options::FetchOptions;
use crate::vcs;

/// Resolves a [`PackageSpec`] source to a verified local [`Artifact`].
///
/// The fetcher is synchronous from the caller's point of view; network and
/// subprocess work runs on a private current-thread runtime so timeouts and
/// cancellation apply uniformly.
pub struct Fetcher<C: HttpClient> {
    client: C,
    runtime: Runtime,
    options: FetchOptions,
}

impl<C: HttpClient> Fetcher<C> {
    pub fn new(client: C) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(FetchError::Runtime)?;
        Ok(Self {
            client,
            runtime,
            options: FetchOptions::default(),
        })
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.options.cancel.clone()
    }

    /// Fetch the package payload. `scratch` is a caller-owned directory used
    /// for checkouts; it is not cleaned up here.
    pub fn fetch(&self, spec: &PackageSpec, scratch: &Path) -> Result<Artifact> {
        match &spec.source {
            Source::Archive {
                url,
                checksum,
                strip_components,
            } => {
                let bytes = self.download(url, checksum)?;
                Ok(Artifact::Archive {
                    bytes,
                    strip_components: *strip_components,
                })
            }
            Source::Vcs {
                repository,
                reference,
                build,
            } => {
                vcs::check_build_tools(spec)?;
                let checkout = scratch.join("checkout");
                self.block_on(
                    self.options.download_timeout,
                    vcs::clone(repository, reference, &checkout),
                )?;
                self.build(build, &checkout)
            }
        }
    }

    /// Run a build recipe inside an existing checkout and locate its output.
    pub fn build(&self, recipe: &keg_resource::BuildRecipe, checkout: &Path) -> Result<Artifact> {
        self.block_on(
            self.options.build_timeout,
            vcs::run_build(recipe, checkout),
        )?;
        vcs::locate_artifact(recipe, checkout)
    }

    /// Download `url` and accept the bytes only if they hash to `checksum`.
    pub fn download(&self, url: &str, checksum: &Checksum) -> Result<Bytes> {
        tracing::info!(%url, "fetching");
        let (bytes, digest) = match url.strip_prefix("file://") {
            Some(path) => self.block_on(self.options.download_timeout, read_local(PathBuf::from(path), checksum))?,
            None if url.starts_with("http://") || url.starts_with("https://") => {
                self.block_on(self.options.download_timeout, self.stream(url, checksum))?
            }
            None => return Err(FetchError::UnsupportedUrl(url.to_string())),
        };

        checksum.check(&digest).map_err(|e| match e {
            VerificationError::Mismatch { expected, actual } => FetchError::Integrity {
                url: url.to_string(),
                expected,
                actual,
            },
            other => FetchError::Integrity {
                url: url.to_string(),
                expected: checksum.to_hex(),
                actual: other.to_string(),
            },
        })?;

        tracing::debug!(%url, bytes = bytes.len(), "digest verified");
        Ok(bytes)
    }

    async fn stream(&self, url: &str, checksum: &Checksum) -> Result<(Bytes, Vec<u8>)> {
        let network = |e: C::Error| FetchError::Network {
            url: url.to_string(),
            source: Box::new(e),
        };

        let mut body = self.client.stream(url).await.map_err(network)?;
        let mut hasher = checksum.algorithm().hasher();
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(network)?;
            hasher.update(&chunk);
            buffer.extend_from_slice(&chunk);
        }
        Ok((buffer.freeze(), hasher.finalize()))
    }

    /// Drive `future` to completion unless the deadline passes or the token fires.
    fn block_on<T>(&self, timeout: Option<Duration>, future: impl Future<Output = Result<T>>) -> Result<T> {
        let cancel = self.options.cancel.clone();
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        self.runtime.block_on(async move {
            let limited = async {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, future)
                        .await
                        .map_err(|_| FetchError::Timeout(limit))?,
                    None => future.await,
                }
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = limited => result,
            }
        })
    }
}

/// Hash a local file while it is read, off the runtime thread.
async fn read_local(path: PathBuf, checksum: &Checksum) -> Result<(Bytes, Vec<u8>)> {
    let hasher = checksum.algorithm().hasher();
    let task_path = path.clone();
    let read = tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&task_path)?;
        let mut reader = VerifiedReader::new(BufReader::new(file), hasher);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok::<_, std::io::Error>((Bytes::from(data), reader.into_digest()))
    })
    .await
    .map_err(std::io::Error::other)
    .and_then(|read| read);
    read.map_err(|source| FetchError::Read { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNetwork;

    impl HttpClient for NoNetwork {
        type Error = std::io::Error;

        async fn stream(
            &self,
            url: &str,
        ) -> std::result::Result<crate::BoxStream<'static, std::result::Result<Bytes, Self::Error>>, Self::Error>
        {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, url.to_string()))
        }
    }

    #[test]
    fn rejects_unknown_scheme() {
        let fetcher = Fetcher::new(NoNetwork).unwrap();
        let err = fetcher
            .download("ftp://example.com/pkg.tar.gz", &Checksum::of(b""))
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedUrl(_)));
    }

    #[test]
    fn transport_errors_keep_the_url() {
        let fetcher = Fetcher::new(NoNetwork).unwrap();
        let err = fetcher
            .download("https://example.com/pkg.tar.gz", &Checksum::of(b""))
            .unwrap_err();
        match err {
            FetchError::Network { url, .. } => assert_eq!(url, "https://example.com/pkg.tar.gz"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn local_files_are_verified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.tar.gz");
        std::fs::write(&path, b"payload").unwrap();
        let url = format!("file://{}", path.display());

        let fetcher = Fetcher::new(NoNetwork).unwrap();
        let bytes = fetcher.download(&url, &Checksum::of(b"payload")).unwrap();
        assert_eq!(&bytes[..], b"payload");

        let err = fetcher.download(&url, &Checksum::of(b"other")).unwrap_err();
        assert!(matches!(err, FetchError::Integrity { .. }));
    }
}
