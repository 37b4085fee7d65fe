use crate::descriptor::ConfigBatch;
use crate::layered::{Channel, LayeredImageArray};
use crate::quality::TierTransition;

/// Extension points a host can observe or use to adjust a load.
///
/// Every method has a no-op default.
pub trait PatchHooks {
    /// Called with the batch before it is planned. Entries may be added,
    /// removed or rewritten.
    fn before_config_parse(&mut self, _batch: &mut ConfigBatch) {}

    /// Called after an array of `target` received a new backing store.
    fn after_array_allocated(&mut self, _target: &str, _channel: Channel, _array: &LayeredImageArray) {}

    /// Called for every observed tier change, before any re-patching.
    fn on_quality_tier_changed(&mut self, _transition: &TierTransition) {}
}

/// Hooks that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PatchHooks for NoopHooks {}
