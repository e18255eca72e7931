//! Outbound effect delivery port.

use std::sync::Arc;

use ledgerbot_types::error::DeliveryError;
use ledgerbot_types::event::Effect;

/// Delivers effects (texts, documents) to conversations.
///
/// Implemented by the transport adapter. Failures are logged by the
/// dispatcher and never undo the ledger write that triggered them.
pub trait EffectSink: Send + Sync {
    fn deliver(
        &self,
        effect: &Effect,
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

impl<T: EffectSink> EffectSink for Arc<T> {
    async fn deliver(&self, effect: &Effect) -> Result<(), DeliveryError> {
        (**self).deliver(effect).await
    }
}
