//! Call context bridging the host and native Rust functions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::convert::{FromDynamic, IntoDynamic};
use crate::error::{CallError, ConversionError};

use super::{Completion, Dynamic};

/// Context for native function calls.
///
/// Holds the argument values for one call, the return slot, and (for calls
/// using the host's native async convention) the completion handle the
/// result must be delivered through.
///
/// ## Typed Argument Access
///
/// Use `arg::<T>()` for typed argument extraction with automatic conversion:
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// let y: f64 = ctx.arg(1)?;
/// ```
///
/// ## Return Values
///
/// Use `set_return()` for typed return values:
///
/// ```ignore
/// ctx.set_return(x + y);
/// ```
pub struct CallContext {
    args: Vec<Dynamic>,
    return_slot: Dynamic,
    completion: Option<Completion>,
}

impl CallContext {
    /// Create a new call context over the given arguments.
    pub fn new(args: Vec<Dynamic>) -> Self {
        Self {
            args,
            return_slot: Dynamic::Void,
            completion: None,
        }
    }

    /// Attach a host completion handle.
    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = Some(completion);
        self
    }

    /// Get the number of arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, CallError> {
        self.args
            .get(index)
            .ok_or(CallError::ArgumentIndexOutOfBounds {
                index,
                count: self.arg_count(),
            })
    }

    /// Get a mutable reference to an argument slot.
    pub fn arg_slot_mut(&mut self, index: usize) -> Result<&mut Dynamic, CallError> {
        let count = self.arg_count();
        self.args
            .get_mut(index)
            .ok_or(CallError::ArgumentIndexOutOfBounds { index, count })
    }

    /// Get a typed argument value.
    ///
    /// This uses the `FromDynamic` trait to convert the slot value to the
    /// requested type, with bounds checking for integers.
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, CallError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(CallError::Conversion)
    }

    /// Borrow an author value passed as an argument.
    pub fn native_arg<T: Any>(&self, index: usize) -> Result<&T, CallError> {
        let slot = self.arg_slot(index)?;
        slot.downcast_native::<T>().ok_or_else(|| {
            CallError::Conversion(ConversionError::mismatch(
                std::any::type_name::<T>(),
                slot.type_name(),
            ))
        })
    }

    /// Clone the shared handle of an author value passed as an argument.
    pub fn native_arc(&self, index: usize) -> Result<Arc<dyn Any + Send + Sync>, CallError> {
        match self.arg_slot(index)? {
            Dynamic::Native(value) => Ok(Arc::clone(value)),
            other => Err(CallError::Conversion(ConversionError::mismatch(
                "native",
                other.type_name(),
            ))),
        }
    }

    /// All argument values.
    pub fn args(&self) -> &[Dynamic] {
        &self.args
    }

    /// All argument values, mutably.
    pub fn args_mut(&mut self) -> &mut Vec<Dynamic> {
        &mut self.args
    }

    /// Consume the context, returning its arguments.
    pub fn into_args(self) -> Vec<Dynamic> {
        self.args
    }

    /// Set the return value from a raw slot.
    pub fn set_return_slot(&mut self, slot: Dynamic) {
        self.return_slot = slot;
    }

    /// Set a typed return value.
    pub fn set_return<T: IntoDynamic>(&mut self, value: T) {
        self.return_slot = value.into_dynamic();
    }

    /// The current return value.
    pub fn return_slot(&self) -> &Dynamic {
        &self.return_slot
    }

    /// Take the return value, leaving `Void`.
    pub fn take_return(&mut self) -> Dynamic {
        std::mem::replace(&mut self.return_slot, Dynamic::Void)
    }

    /// The host completion handle, for calls using native async.
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    /// Detach the host completion handle.
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("args", &self.args)
            .field("return_slot", &self.return_slot)
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}
