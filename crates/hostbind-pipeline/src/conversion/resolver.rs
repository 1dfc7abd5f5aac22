//! Single-pass conversion chain resolution.

use hostbind_core::{BindError, ConversionTarget, DataType};

use super::{ConversionRule, RuleContext, ValueMap};

/// Outcome of resolving one parameter or return value.
pub(crate) struct ResolvedChain {
    /// Type left after every applicable rule.
    pub data_type: DataType,
    /// Maps in the order their rules were applied.
    pub maps: Vec<ValueMap>,
}

/// Run `rules` once, in order, starting from `start`.
///
/// A rule that moves back to a type already visited is a cycle. A rule that
/// keeps the type unchanged only rewrites values and is allowed.
pub(crate) fn resolve_chain(
    function: &str,
    target: ConversionTarget,
    start: &DataType,
    rules: &[ConversionRule],
    ctx: &RuleContext<'_>,
    limit: usize,
) -> Result<ResolvedChain, BindError> {
    let mut current = start.clone();
    let mut visited = vec![start.clone()];
    let mut maps = Vec::new();

    for rule in rules {
        let conversion = match rule(&current, ctx) {
            Ok(Some(conversion)) => conversion,
            Ok(None) => continue,
            Err(err) => {
                return Err(BindError::RuleFailed {
                    function: function.to_string(),
                    target,
                    message: err.0,
                });
            }
        };

        if maps.len() >= limit {
            return Err(BindError::ChainTooLong {
                function: function.to_string(),
                target,
                limit,
            });
        }

        if conversion.data_type != current {
            if visited.contains(&conversion.data_type) {
                visited.push(conversion.data_type.clone());
                return Err(BindError::ConversionCycle {
                    function: function.to_string(),
                    target,
                    data_type: conversion.data_type,
                    chain: visited,
                });
            }
            visited.push(conversion.data_type.clone());
        }

        tracing::trace!(
            function,
            %target,
            from = %current,
            to = %conversion.data_type,
            "applied conversion"
        );
        current = conversion.data_type;
        maps.push(conversion.map);
    }

    Ok(ResolvedChain {
        data_type: current,
        maps,
    })
}
