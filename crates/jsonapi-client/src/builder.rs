//! Building many callers with the same settings.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;

use crate::encoder::default_encoder;
use crate::endpoint::Endpoint;
use crate::sender::{default_parser, Caller, Parser};

/// Creates the endpoint of an API from its method and URL.
pub type Maker = Arc<dyn Fn(Method, &str) -> Endpoint + Send + Sync>;

/// Builds callers sharing a maker, a client and a parser.
///
/// The default builder produces the same callers as [`ep`](crate::ep).
/// It pays off with many endpoints, or when most of them need the same
/// extra header:
///
/// ```
/// use std::sync::Arc;
/// use jsonapi_client::{default_encoder, Builder};
/// use reqwest::header::HeaderValue;
/// use reqwest::Method;
///
/// let api = Builder::default().use_maker(Arc::new(|method: Method, url: &str| {
///     default_encoder().endpoint(method, url).with(|mut req| {
///         req.headers_mut().insert("x-auth-token", HeaderValue::from_static("secret"));
///         Ok(req)
///     })
/// }));
///
/// let list = api.ep(Method::GET, "http://127.0.0.1:8080/api/list");
/// let create = api.ep(Method::POST, "http://127.0.0.1:8080/api/create");
/// # let _ = (list, create);
/// ```
#[derive(Clone, Default)]
pub struct Builder {
    maker: Option<Maker>,
    sender: Option<reqwest::Client>,
    parser: Option<Parser>,
}

impl Builder {
    /// Returns a builder using `maker` to create endpoints.
    #[must_use]
    pub fn use_maker(mut self, maker: Maker) -> Self {
        self.maker = Some(maker);
        self
    }

    /// Returns a builder sending requests with `client`.
    #[must_use]
    pub fn use_sender(mut self, client: reqwest::Client) -> Self {
        self.sender = Some(client);
        self
    }

    /// Returns a builder parsing responses with `parser`.
    #[must_use]
    pub fn use_parser(mut self, parser: Parser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Creates the caller of one API.
    #[must_use]
    pub fn ep(&self, method: Method, url: &str) -> Caller {
        let endpoint = match &self.maker {
            Some(maker) => maker(method, url),
            None => default_encoder().endpoint(method, url),
        };
        let parser = self.parser.clone().unwrap_or_else(default_parser);
        endpoint.send_by(self.sender.clone()).parse_with(parser)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("maker", &self.maker.is_some())
            .field("sender", &self.sender)
            .field("parser", &self.parser.is_some())
            .finish()
    }
}
