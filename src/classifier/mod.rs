pub mod http;

use crate::types::classification::Classification;
use crate::types::photo::PhotoSlot;
use std::future::Future;

pub use http::HttpClassifier;

/// Produces one classification per photo.
///
/// Implementations never fail: anything that goes wrong while classifying
/// must degrade to [`Classification::fallback`].
pub trait Classifier: Send + Sync {
    fn classify(&self, slot: &PhotoSlot) -> impl Future<Output = Classification> + Send;
}
