// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Startup Module
//!
//! This crate turns a [`RequestFilter`] into a running Pingora server. [`StartupConf`] and
//! [`StartupOpt`] hold the listening addresses and Pingora’s own server settings,
//! [`DefaultApp`] implements Pingora’s `ProxyHttp` trait by delegating to the handler.
//!
//! Requests that the handler leaves unhandled result in a 404 Not Found error, there is no
//! upstream to forward them to.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use preview_module_utils::pingora::{Error, SessionWrapper};
//! use preview_module_utils::{RequestFilter, RequestFilterResult};
//! use startup_module::{DefaultApp, StartupConf};
//!
//! #[derive(Debug)]
//! struct Handler;
//!
//! #[async_trait]
//! impl RequestFilter for Handler {
//!     type Conf = ();
//!     type CTX = ();
//!
//!     fn new_ctx() -> Self::CTX {}
//!
//!     async fn request_filter(
//!         &self,
//!         _session: &mut impl SessionWrapper,
//!         _ctx: &mut Self::CTX,
//!     ) -> Result<RequestFilterResult, Box<Error>> {
//!         Ok(RequestFilterResult::Unhandled)
//!     }
//! }
//!
//! let app = DefaultApp::new(Handler);
//! let server = StartupConf::default().into_server(app, None);
//!
//! // Do something with the server here, e.g. call server.run_forever()
//! ```

mod configuration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
pub use configuration::{StartupConf, StartupOpt, DEFAULT_LISTEN};
use http::Extensions;
use log::trace;
use preview_module_utils::pingora::{
    Error, ErrorType, HttpPeer, ProxyHttp, Session, SessionWrapper,
};
use preview_module_utils::{RequestFilter, RequestFilterResult};
use std::borrow::Cow;
use std::fmt::Debug;
use std::ops::{Deref, DerefMut};

struct NoDebug<T> {
    inner: T,
}

impl<T> Debug for NoDebug<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("skipped").finish()
    }
}

impl<T> From<T> for NoDebug<T> {
    fn from(value: T) -> Self {
        Self { inner: value }
    }
}

impl<T> Deref for NoDebug<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> DerefMut for NoDebug<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

/// Result of a test execution of the app
#[derive(Debug)]
pub struct AppResult {
    session: NoDebug<Session>,
    err: Option<Box<Error>>,
    extensions: Extensions,
    body: BytesMut,
}

impl AppResult {
    /// Produces the resulting session state of the request
    pub fn session(&mut self) -> impl SessionWrapper + '_ {
        SessionWrapperImpl::new(&mut self.session, &mut self.extensions, false)
    }

    /// Retrieves the error if any
    pub fn err(&self) -> &Option<Box<Error>> {
        &self.err
    }

    /// Retrieves the response body as string
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A basic Pingora app implementation, to be passed to [`StartupConf::into_server`]
///
/// This app will only handle the `request_filter` and `upstream_peer` phases. The former is
/// delegated to the [`RequestFilter`], the latter always fails with 404 Not Found.
#[derive(Debug)]
pub struct DefaultApp<H> {
    handler: H,
    capture_body: bool,
}

impl<H> DefaultApp<H> {
    /// Creates a new app from a [`RequestFilter`] instance.
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            capture_body: false,
        }
    }

    /// Creates a new app from a [`RequestFilter`] configuration.
    ///
    /// Any errors occurring when converting configuration to handler will be passed on.
    pub fn from_conf<C>(conf: C) -> Result<Self, Box<Error>>
    where
        H: RequestFilter<Conf = C> + TryFrom<C, Error = Box<Error>>,
    {
        Ok(Self::new(conf.try_into()?))
    }

    /// Handles all request phases for a request like Pingora would do it.
    ///
    /// This method is meant for testing. The response body is captured rather than sent, it can
    /// be retrieved from the result.
    pub async fn handle_request(&mut self, mut session: Session) -> AppResult
    where
        H: RequestFilter + Sync,
        H::CTX: Send + Sync,
    {
        self.capture_body = true;

        let mut ctx = self.new_ctx();

        let result = async {
            if !self.request_filter(&mut session, &mut ctx).await? {
                let peer = self.upstream_peer(&mut session, &mut ctx).await?;
                return Err(Error::explain(
                    ErrorType::InternalError,
                    format!("Got upstream peer {peer} but no handler for it"),
                ));
            }
            Ok(())
        }
        .await;

        self.capture_body = false;

        let body = ctx.extensions.remove::<BytesMut>().unwrap_or_default();

        AppResult {
            session: session.into(),
            err: result.err(),
            extensions: ctx.extensions,
            body,
        }
    }
}

/// Context for the default app
#[derive(Debug, Clone)]
pub struct DefaultCtx<C> {
    extensions: Extensions,
    handler: C,
}

#[async_trait]
impl<H> ProxyHttp for DefaultApp<H>
where
    H: RequestFilter + Sync,
    H::CTX: Send,
{
    type CTX = DefaultCtx<<H as RequestFilter>::CTX>;

    fn new_ctx(&self) -> Self::CTX {
        Self::CTX {
            extensions: Extensions::new(),
            handler: H::new_ctx(),
        }
    }

    async fn request_filter(
        &self,
        session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<bool, Box<Error>> {
        let mut session = SessionWrapperImpl::new(session, &mut ctx.extensions, self.capture_body);
        let result = self
            .handler
            .request_filter(&mut session, &mut ctx.handler)
            .await?;
        trace!("Request filter result: {result:?}");
        Ok(result == RequestFilterResult::ResponseSent)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>, Box<Error>> {
        Err(Error::new(ErrorType::HTTPStatus(404)))
    }
}

struct SessionWrapperImpl<'a> {
    inner: &'a mut Session,
    extensions: &'a mut Extensions,
    capture_body: bool,
}

impl<'a> SessionWrapperImpl<'a> {
    /// Creates a new session wrapper for the given Pingora session.
    fn new(inner: &'a mut Session, extensions: &'a mut Extensions, capture_body: bool) -> Self {
        Self {
            inner,
            extensions,
            capture_body,
        }
    }
}

#[async_trait]
impl SessionWrapper for SessionWrapperImpl<'_> {
    fn extensions(&self) -> &Extensions {
        self.extensions
    }

    fn extensions_mut(&mut self) -> &mut Extensions {
        self.extensions
    }

    async fn write_response_body(
        &mut self,
        data: Option<Bytes>,
        end_of_stream: bool,
    ) -> Result<(), Box<Error>> {
        if self.capture_body {
            if let Some(data) = data {
                self.extensions_mut()
                    .get_or_insert_default::<BytesMut>()
                    .extend_from_slice(&data);
            }
            Ok(())
        } else {
            self.deref_mut()
                .write_response_body(data, end_of_stream)
                .await
        }
    }
}

impl Deref for SessionWrapperImpl<'_> {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        self.inner
    }
}

impl DerefMut for SessionWrapperImpl<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::header;
    use preview_module_utils::pingora::{create_test_session, RequestHeader, ResponseHeader};
    use test_log::test;

    #[derive(Debug)]
    struct Handler {
        respond: bool,
    }

    #[async_trait]
    impl RequestFilter for Handler {
        type Conf = ();
        type CTX = ();

        fn new_ctx() -> Self::CTX {}

        async fn request_filter(
            &self,
            session: &mut impl SessionWrapper,
            _ctx: &mut Self::CTX,
        ) -> Result<RequestFilterResult, Box<Error>> {
            if !self.respond {
                return Ok(RequestFilterResult::Unhandled);
            }

            let mut header = ResponseHeader::build(200, Some(1))?;
            header.insert_header(header::CONTENT_LENGTH, 2)?;
            session.write_response_header(Box::new(header), false).await?;
            session
                .write_response_body(Some(Bytes::from_static(b"hi")), true)
                .await?;
            Ok(RequestFilterResult::ResponseSent)
        }
    }

    async fn make_session() -> Session {
        let header = RequestHeader::build("GET", b"/", None).unwrap();
        create_test_session(header).await
    }

    #[test(tokio::test)]
    async fn unhandled() {
        let mut app = DefaultApp::new(Handler { respond: false });
        let result = app.handle_request(make_session().await).await;
        assert_eq!(
            result.err().as_ref().map(|err| &err.etype),
            Some(&ErrorType::HTTPStatus(404))
        );
        assert_eq!(result.body_str(), "");
    }

    #[test(tokio::test)]
    async fn response_sent() {
        let mut app = DefaultApp::new(Handler { respond: true });
        let mut result = app.handle_request(make_session().await).await;
        assert!(result.err().is_none());
        assert_eq!(result.body_str(), "hi");
        assert_eq!(
            result.session().response_written().map(|r| r.status.as_u16()),
            Some(200)
        );
    }
}
