//! Native function storage and callable trait.

use std::fmt;
use std::sync::Arc;

use crate::TypeHash;
use crate::error::CallError;

use super::{CallContext, Dynamic};

/// Type-erased native function.
///
/// This wraps any callable that implements `NativeCallable`, allowing
/// functions of different signatures to be stored uniformly. Pipeline
/// stages wrap one `NativeFn` inside another, so the inner callable is
/// shared through an `Arc` and cloning is cheap.
pub struct NativeFn {
    /// Identity of the function (see [`TypeHash::from_function`]).
    pub id: TypeHash,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    /// Create a new NativeFn from a callable with a specific ID.
    pub fn new<F>(id: TypeHash, f: F) -> Self
    where
        F: NativeCallable + Send + Sync + 'static,
    {
        Self {
            id,
            inner: Arc::new(f),
        }
    }

    /// Expose a method on a shared receiver as a plain function.
    ///
    /// Every call runs `f` against the same receiver.
    pub fn bind_instance<T, F>(id: TypeHash, receiver: Arc<T>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&T, &mut CallContext) -> Result<(), CallError> + Send + Sync + 'static,
    {
        Self::new(id, move |ctx: &mut CallContext| f(&receiver, ctx))
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext) -> Result<(), CallError> {
        self.inner.call(ctx)
    }

    /// Call with owned arguments and return the result value.
    pub fn invoke(&self, args: Vec<Dynamic>) -> Result<Dynamic, CallError> {
        let mut ctx = CallContext::new(args);
        self.call(&mut ctx)?;
        Ok(ctx.take_return())
    }

    /// Replace the ID, sharing the same callable.
    pub fn with_id(&self, id: TypeHash) -> Self {
        Self {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Clone this NativeFn, sharing the same underlying callable.
    pub fn clone_arc(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Clone for NativeFn {
    fn clone(&self) -> Self {
        self.clone_arc()
    }
}

/// Trait for callable native functions.
///
/// The `call` method receives a `CallContext` that provides access to
/// arguments and allows setting the return value.
pub trait NativeCallable {
    /// Call this function with the given context.
    fn call(&self, ctx: &mut CallContext) -> Result<(), CallError>;
}

// Implement NativeCallable for closures that take CallContext
impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext) -> Result<(), CallError>,
{
    fn call(&self, ctx: &mut CallContext) -> Result<(), CallError> {
        (self)(ctx)
    }
}
