//! Sending requests and parsing responses.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use jsonapi_core::{BoxFuture, CancelReason, Context, Envelope};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::error::CallError;

/// Turns a response into the returned data, if any.
pub type Parser = Arc<
    dyn Fn(reqwest::Response) -> BoxFuture<'static, Result<Option<Value>, CallError>>
        + Send
        + Sync,
>;

/// Parses the `{"data":...,"errors":[...]}` envelope.
///
/// - a body which is not an envelope is a [`CallError::Format`],
/// - a non-empty `errors` array is a [`CallError::Api`] built from its
///   first element,
/// - otherwise `data` is returned. `null` or a missing `data` yields `None`.
#[must_use]
pub fn default_parser() -> Parser {
    Arc::new(|resp| Box::pin(parse_envelope(resp)))
}

async fn parse_envelope(resp: reqwest::Response) -> Result<Option<Value>, CallError> {
    let body = resp.bytes().await.map_err(CallError::format)?;
    let envelope: Envelope = serde_json::from_slice(&body).map_err(CallError::format)?;

    match envelope.errors.first() {
        Some(obj) => Err(CallError::Api(obj.as_error())),
        None => Ok(envelope.data),
    }
}

/// Sends the requests built by an [`Endpoint`].
#[derive(Clone)]
pub struct Sender {
    endpoint: Endpoint,
    client: reqwest::Client,
}

impl Sender {
    pub(crate) fn new(endpoint: Endpoint, client: reqwest::Client) -> Self {
        Self { endpoint, client }
    }

    /// Builds the request for `param` and sends it.
    ///
    /// The call gives up as soon as `ctx` is canceled or its deadline passes.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Canceled`] when `ctx` ended, the endpoint error
    /// if the request cannot be built and [`CallError::Send`] if it cannot be
    /// delivered.
    pub async fn send(
        &self,
        ctx: &Context,
        param: Option<&Value>,
    ) -> Result<reqwest::Response, CallError> {
        if let Some(reason) = ctx.err() {
            return Err(CallError::Canceled(reason));
        }

        let req = self.endpoint.request(ctx, param)?;
        tracing::debug!(method = %req.method(), url = %req.url(), "calling api");

        tokio::select! {
            biased;
            () = ctx.done() => {
                Err(CallError::Canceled(ctx.err().unwrap_or(CancelReason::Canceled)))
            }
            resp = self.client.execute(req) => Ok(resp?),
        }
    }

    /// Creates a caller parsing the responses with `parser`.
    #[must_use]
    pub fn parse_with(&self, parser: Parser) -> Caller {
        Caller {
            sender: self.clone(),
            parser,
        }
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender").finish_non_exhaustive()
    }
}

/// Calls one API.
///
/// ```no_run
/// # async fn run() -> Result<(), jsonapi_client::CallError> {
/// use jsonapi_client::new_ep;
/// use jsonapi_core::Context;
/// use reqwest::Method;
///
/// let caller = new_ep(Method::POST, "http://127.0.0.1:8080/api/sum").default_caller();
/// let mut sum = 0;
/// caller.call(&Context::new(), Some(&[1, 2, 3]), &mut sum).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Caller {
    sender: Sender,
    parser: Parser,
}

impl Caller {
    /// Sends `param` and decodes the returned data into `result`.
    ///
    /// `result` is left untouched when the server returned no data.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Client`] if `param` cannot be encoded or the data
    /// does not fit `R`, and any error of sending or parsing.
    pub async fn call<P, R>(
        &self,
        ctx: &Context,
        param: Option<&P>,
        result: &mut R,
    ) -> Result<(), CallError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let param = param
            .map(serde_json::to_value)
            .transpose()
            .map_err(CallError::client)?;

        let resp = self.sender.send(ctx, param.as_ref()).await?;
        tracing::debug!(status = %resp.status(), url = %resp.url(), "api responded");

        if let Some(data) = (self.parser)(resp).await? {
            *result = serde_json::from_value(data).map_err(CallError::client)?;
        }
        Ok(())
    }

    /// Like [`call`](Self::call), without a parameter.
    ///
    /// # Errors
    ///
    /// See [`call`](Self::call).
    pub async fn fetch<R: DeserializeOwned>(
        &self,
        ctx: &Context,
        result: &mut R,
    ) -> Result<(), CallError> {
        self.call::<Value, R>(ctx, None, result).await
    }

    /// Converts into a [`TypedCaller`].
    #[must_use]
    pub fn typed<I, O>(self) -> TypedCaller<I, O> {
        typed(self)
    }
}

impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Caller").finish_non_exhaustive()
    }
}

/// A [`Caller`] bound to its parameter and result types.
pub struct TypedCaller<I, O> {
    caller: Caller,
    _types: PhantomData<fn(&I) -> O>,
}

/// Binds `caller` to a parameter and a result type.
#[must_use]
pub fn typed<I, O>(caller: Caller) -> TypedCaller<I, O> {
    TypedCaller {
        caller,
        _types: PhantomData,
    }
}

impl<I, O> TypedCaller<I, O>
where
    I: Serialize,
    O: DeserializeOwned + Default,
{
    /// Calls the API. Without returned data the result is `O::default()`.
    ///
    /// # Errors
    ///
    /// See [`Caller::call`].
    pub async fn call(&self, ctx: &Context, param: &I) -> Result<O, CallError> {
        let mut ret = O::default();
        self.caller.call(ctx, Some(param), &mut ret).await?;
        Ok(ret)
    }
}

impl<I, O> Clone for TypedCaller<I, O> {
    fn clone(&self) -> Self {
        typed(self.caller.clone())
    }
}

impl<I, O> fmt::Debug for TypedCaller<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedCaller").finish_non_exhaustive()
    }
}
