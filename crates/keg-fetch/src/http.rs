use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Minimal asynchronous transport used by [`Fetcher`](crate::Fetcher).
///
/// Implementations own redirects, retries and status mapping; a non-success
/// status must surface as an error rather than a body.
pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open `url` and return its body as a stream of chunks.
    fn stream(
        &self,
        url: &str,
    ) -> impl Future<
        Output = Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error>,
    > + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;

    /// [`HttpClient`] backed by `reqwest`.
    #[derive(Clone, Debug)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new() -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder()
                .user_agent(concat!("keg/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self { client })
        }

        pub fn from_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn stream(
            &self,
            url: &str,
        ) -> Result<BoxStream<'static, Result<Bytes, Self::Error>>, Self::Error> {
            let response = self.client.get(url).send().await?.error_for_status()?;
            Ok(Box::pin(response.bytes_stream()))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
