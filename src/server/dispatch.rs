//! Path-based request dispatch.
//!
//! Two tower services that pick one of two inner services per request:
//!
//! - [`Split`]: the mount root (`/`) goes to `root`, everything else to `rest`
//! - [`DirSplit`]: known directories go to `dirs`, everything else to `files`
//!
//! Both clean the request path first, so `//`, `/./` and percent-encoded
//! spellings dispatch the same way as their canonical form. Neither does any
//! I/O; membership comes from a [`DirectorySet`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::Response;
use tower::{Service, ServiceExt};

use crate::dirs::DirectorySet;
use crate::path::decode_and_clean;

type DispatchFuture = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

fn forward<S>(service: &S, req: Request) -> DispatchFuture
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    Box::pin(service.clone().oneshot(req))
}

// =============================================================================
// Split
// =============================================================================

/// Routes the exact mount root to one service and every other path to another.
#[derive(Debug, Clone)]
pub struct Split<A, B> {
    root: A,
    rest: B,
}

impl<A, B> Split<A, B> {
    pub fn new(root: A, rest: B) -> Self {
        Self { root, rest }
    }
}

impl<A, B> Service<Request> for Split<A, B>
where
    A: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    A::Future: Send + 'static,
    B: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    B::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // inner services are driven to readiness by oneshot
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        if decode_and_clean(req.uri().path()) == "/" {
            forward(&self.root, req)
        } else {
            forward(&self.rest, req)
        }
    }
}

// =============================================================================
// DirSplit
// =============================================================================

/// Routes known directories to one service and everything else to another.
pub struct DirSplit<D: ?Sized, A, B> {
    dirs: Arc<D>,
    listing: A,
    files: B,
}

impl<D: ?Sized, A, B> DirSplit<D, A, B> {
    pub fn new(dirs: Arc<D>, listing: A, files: B) -> Self {
        Self {
            dirs,
            listing,
            files,
        }
    }
}

impl<D: ?Sized, A: Clone, B: Clone> Clone for DirSplit<D, A, B> {
    fn clone(&self) -> Self {
        Self {
            dirs: Arc::clone(&self.dirs),
            listing: self.listing.clone(),
            files: self.files.clone(),
        }
    }
}

impl<D, A, B> Service<Request> for DirSplit<D, A, B>
where
    D: DirectorySet + ?Sized,
    A: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    A::Future: Send + 'static,
    B: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    B::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = DispatchFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let cleaned = decode_and_clean(req.uri().path());
        if self.dirs.contains(&cleaned) {
            forward(&self.listing, req)
        } else {
            forward(&self.files, req)
        }
    }
}
