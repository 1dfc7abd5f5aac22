//! Variadic parameter adaptation.
//!
//! A trailing `PARAMS` parameter of type `E[]` is exposed to the host as a
//! variadic `object[]`. At call time the host's list is filtered and every
//! element is coerced back to `E`.

use std::sync::Arc;

use hostbind_core::{
    AdaptedStages, CallContext, DataType, Dynamic, FunctionDescriptor, NativeFn,
};

use crate::host::HostServices;

/// Rewrite one descriptor. Descriptors without an eligible trailing
/// parameter are marked and passed through; a `PARAMS` marker anywhere else
/// is left for the finalizer to reject.
pub(crate) fn adapt(desc: FunctionDescriptor, host: &Arc<dyn HostServices>) -> FunctionDescriptor {
    if desc.adapted().contains(AdaptedStages::PARAMS) {
        return desc;
    }

    let Some(last) = desc.params().last() else {
        return desc.mark_adapted(AdaptedStages::PARAMS);
    };
    if !last.is_params() {
        return desc.mark_adapted(AdaptedStages::PARAMS);
    }
    let Some(element) = last.data_type.element_type().cloned() else {
        return desc.mark_adapted(AdaptedStages::PARAMS);
    };

    let index = last.index;
    tracing::debug!(
        function = desc.name(),
        param = %last.name,
        element = %element,
        "adapting variadic parameter"
    );

    let inner = desc.native_fn().clone();
    let host = Arc::clone(host);
    let wrapper = NativeFn::new(inner.id, move |ctx: &mut CallContext| {
        if let Ok(slot) = ctx.arg_slot_mut(index) {
            let items = match std::mem::replace(slot, Dynamic::Void) {
                Dynamic::Array(items) => items,
                Dynamic::Missing => Vec::new(),
                scalar => vec![scalar],
            };
            let mut kept = Vec::with_capacity(items.len());
            for item in items.into_iter().filter(|item| !item.is_missing()) {
                if matches!(element, DataType::Object) {
                    kept.push(item);
                } else {
                    kept.push(host.coerce(&item, &element)?);
                }
            }
            *slot = Dynamic::Array(kept);
        }
        inner.call(ctx)
    });

    let mut desc = desc.with_native_fn(wrapper).mark_adapted(AdaptedStages::PARAMS);
    if let Some(param) = desc.params_mut().last_mut() {
        param.data_type = DataType::array(DataType::Object);
        param.variadic = true;
    }
    desc
}
