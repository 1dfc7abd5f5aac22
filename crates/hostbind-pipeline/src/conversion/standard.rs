//! Conversion rules shipped with the library.
//!
//! Value maps here use [`hostbind_core::coerce`], so rules stay independent
//! of any particular host.

use hostbind_core::{DataType, Dynamic, HostError, coerce};

use super::{Conversion, ConversionRule, RuleContext, conversion_rule};

/// `Optional(T)` parameters accept any host value.
///
/// A missing argument reaches the function as `Missing` (read as `None`).
/// An empty argument does too when `treat_empty_as_missing` is set;
/// otherwise it is coerced to `T` like any other value.
pub fn nullable(treat_empty_as_missing: bool) -> ConversionRule {
    conversion_rule(move |current: &DataType, _ctx: &RuleContext<'_>| {
        let DataType::Optional(inner) = current else {
            return Ok(None);
        };
        let inner = (**inner).clone();
        Ok(Some(Conversion::new(DataType::Object, move |value| {
            match value {
                Dynamic::Missing => Ok(Dynamic::Missing),
                Dynamic::Empty if treat_empty_as_missing => Ok(Dynamic::Missing),
                other => coerce(&other, &inner),
            }
        })))
    })
}

/// Parameters with a default value accept any host value and fall back to
/// the default when the argument is left out.
pub fn optional(treat_empty_as_missing: bool) -> ConversionRule {
    conversion_rule(move |current: &DataType, ctx: &RuleContext<'_>| {
        let Some(default) = ctx.default else {
            return Ok(None);
        };
        if matches!(current, DataType::Object) {
            return Ok(None);
        }
        let declared = current.clone();
        let default = default.clone();
        Ok(Some(Conversion::new(DataType::Object, move |value| {
            match value {
                Dynamic::Missing => Ok(default.clone()),
                Dynamic::Empty if treat_empty_as_missing => Ok(default.clone()),
                other => coerce(&other, &declared),
            }
        })))
    })
}

/// `string[]` parameters accept a host array, converting every element to
/// text.
pub fn string_array() -> ConversionRule {
    let strings = DataType::array(DataType::String);
    conversion_rule(move |current: &DataType, _ctx: &RuleContext<'_>| {
        if *current != strings {
            return Ok(None);
        }
        let strings = strings.clone();
        Ok(Some(Conversion::new(
            DataType::array(DataType::Object),
            move |value| coerce(&value, &strings),
        )))
    })
}

/// `Optional(T)` returns are handed to the host as `Object`, with an absent
/// value shown as `Empty`. `T` must already be a host type.
pub fn optional_return() -> ConversionRule {
    conversion_rule(|current: &DataType, _ctx: &RuleContext<'_>| {
        let DataType::Optional(inner) = current else {
            return Ok(None);
        };
        if !inner.is_host_native() {
            return Ok(None);
        }
        Ok(Some(Conversion::new(DataType::Object, |value| match value {
            Dynamic::Missing | Dynamic::Void => Ok(Dynamic::Empty),
            other => Ok(other),
        })))
    })
}

/// Return rule for `Object` results: shows "not available" as "still
/// getting data".
///
/// Hosts report a pending asynchronous result as `#N/A`; run this after the
/// async stage to show `#GETTING_DATA` instead. Every `Object` return is
/// affected, async or not.
pub fn not_available_as_getting_data() -> ConversionRule {
    conversion_rule(|current: &DataType, _ctx: &RuleContext<'_>| {
        if !matches!(current, DataType::Object) {
            return Ok(None);
        }
        Ok(Some(Conversion::new(DataType::Object, |value| match value {
            Dynamic::Error(HostError::NA) => Ok(Dynamic::Error(HostError::GettingData)),
            other => Ok(other),
        })))
    })
}
