//! Parameter and return value conversions.
//!
//! A conversion rule looks at the current type of one parameter (or return
//! value) and either declines or yields a [`Conversion`]: a new current type
//! plus a runtime mapping between values of the two types.
//!
//! ## Direction
//!
//! A rule written `X -> Y` converts values of `X` into values of `Y`.
//!
//! - As a **parameter** rule it applies to a parameter whose current type is
//!   `Y` and leaves it at `X`: the host passes an `X`, the function receives
//!   a `Y`.
//! - As a **return** rule it applies to a return whose current type is `X`
//!   and leaves it at `Y`: the function produces an `X`, the host receives a
//!   `Y`.
//!
//! ## Ordering
//!
//! Each parameter and return value passes once through its rule list, in
//! registration order. A rule only sees the type left by the rules before
//! it, so chains are registered innermost first: for `string -> T1 -> T2`
//! on a `T2` parameter, register `T1 -> T2` and then `string -> T1`.
//!
//! ```
//! use hostbind_core::{DataType, Native};
//! use hostbind_pipeline::ConversionConfig;
//!
//! struct Celsius {
//!     degrees: f64,
//! }
//!
//! let config = ConversionConfig::new()
//!     .add_param_conversion(DataType::Float, DataType::native::<Celsius>(), |degrees: f64| {
//!         Native::new(Celsius { degrees })
//!     })
//!     .add_return_conversion(DataType::native::<Celsius>(), DataType::Float, |c: Native<Celsius>| {
//!         c.degrees
//!     });
//! assert_eq!(config.param_rules().len(), 1);
//! ```

mod resolver;
pub mod standard;

use std::fmt;
use std::sync::Arc;

use hostbind_core::{Attributes, ConversionError, DataType, Dynamic, FromDynamic, IntoDynamic};
use thiserror::Error;

pub(crate) use resolver::resolve_chain;

/// Runtime mapping applied to one value.
pub type ValueMap = Arc<dyn Fn(Dynamic) -> Result<Dynamic, ConversionError> + Send + Sync>;

/// A conversion rule.
pub type ConversionRule =
    Arc<dyn Fn(&DataType, &RuleContext<'_>) -> Result<Option<Conversion>, RuleError> + Send + Sync>;

/// Default bound on the number of rules applied to one parameter or return.
pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 16;

/// The result of an applicable rule.
#[derive(Clone)]
pub struct Conversion {
    /// The new current type.
    pub data_type: DataType,
    /// How values move between the old and new type.
    pub map: ValueMap,
}

impl Conversion {
    /// Create a conversion.
    pub fn new<F>(data_type: DataType, map: F) -> Self
    where
        F: Fn(Dynamic) -> Result<Dynamic, ConversionError> + Send + Sync + 'static,
    {
        Self {
            data_type,
            map: Arc::new(map),
        }
    }
}

impl fmt::Debug for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversion")
            .field("data_type", &self.data_type)
            .finish_non_exhaustive()
    }
}

/// What a rule may look at besides the current type.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// The function's attributes.
    pub function: &'a Attributes,
    /// The parameter's or return value's attributes.
    pub target: &'a Attributes,
    /// The parameter's default value, if any.
    pub default: Option<&'a Dynamic>,
}

/// A rule failed to build its mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuleError(pub String);

impl RuleError {
    /// Create a rule error.
    pub fn new(message: impl Into<String>) -> Self {
        RuleError(message.into())
    }
}

/// Ordered parameter and return conversion rules.
#[derive(Clone)]
pub struct ConversionConfig {
    param_rules: Vec<ConversionRule>,
    return_rules: Vec<ConversionRule>,
    max_chain_length: usize,
}

impl ConversionConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self {
            param_rules: Vec::new(),
            return_rules: Vec::new(),
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }

    /// Append a parameter rule.
    pub fn add_param_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&DataType, &RuleContext<'_>) -> Result<Option<Conversion>, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.param_rules.push(Arc::new(rule));
        self
    }

    /// Append a return rule.
    pub fn add_return_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&DataType, &RuleContext<'_>) -> Result<Option<Conversion>, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.return_rules.push(Arc::new(rule));
        self
    }

    /// Append a shared parameter rule.
    pub fn with_param_rule(mut self, rule: ConversionRule) -> Self {
        self.param_rules.push(rule);
        self
    }

    /// Append a shared return rule.
    pub fn with_return_rule(mut self, rule: ConversionRule) -> Self {
        self.return_rules.push(rule);
        self
    }

    /// Append a typed parameter conversion `from -> to`: applies to
    /// parameters of type `to` and exposes them to the host as `from`.
    pub fn add_param_conversion<A, B, F>(self, from: DataType, to: DataType, f: F) -> Self
    where
        A: FromDynamic + 'static,
        B: IntoDynamic + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let map = typed_map(f);
        self.add_param_rule(move |current: &DataType, _ctx: &RuleContext<'_>| {
            Ok((*current == to).then(|| Conversion {
                data_type: from.clone(),
                map: Arc::clone(&map),
            }))
        })
    }

    /// Append a typed return conversion `from -> to`: applies to returns of
    /// type `from` and hands the host a `to`.
    pub fn add_return_conversion<A, B, F>(self, from: DataType, to: DataType, f: F) -> Self
    where
        A: FromDynamic + 'static,
        B: IntoDynamic + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let map = typed_map(f);
        self.add_return_rule(move |current: &DataType, _ctx: &RuleContext<'_>| {
            Ok((*current == from).then(|| Conversion {
                data_type: to.clone(),
                map: Arc::clone(&map),
            }))
        })
    }

    /// Set the bound on applied rules per parameter or return.
    pub fn with_max_chain_length(mut self, limit: usize) -> Self {
        self.max_chain_length = limit;
        self
    }

    /// Parameter rules in order.
    pub fn param_rules(&self) -> &[ConversionRule] {
        &self.param_rules
    }

    /// Return rules in order.
    pub fn return_rules(&self) -> &[ConversionRule] {
        &self.return_rules
    }

    /// Bound on applied rules per parameter or return.
    pub fn max_chain_length(&self) -> usize {
        self.max_chain_length
    }

    /// Check if there are no rules at all.
    pub fn is_empty(&self) -> bool {
        self.param_rules.is_empty() && self.return_rules.is_empty()
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("param_rules", &self.param_rules.len())
            .field("return_rules", &self.return_rules.len())
            .field("max_chain_length", &self.max_chain_length)
            .finish()
    }
}

/// Wrap a closure as a shareable [`ConversionRule`].
pub fn conversion_rule<F>(rule: F) -> ConversionRule
where
    F: Fn(&DataType, &RuleContext<'_>) -> Result<Option<Conversion>, RuleError> + Send + Sync + 'static,
{
    Arc::new(rule)
}

/// Wrap a typed function as a [`ValueMap`].
pub fn typed_map<A, B, F>(f: F) -> ValueMap
where
    A: FromDynamic + 'static,
    B: IntoDynamic + 'static,
    F: Fn(A) -> B + Send + Sync + 'static,
{
    Arc::new(move |value: Dynamic| {
        let input = A::from_dynamic(&value)?;
        Ok(f(input).into_dynamic())
    })
}
