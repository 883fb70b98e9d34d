//! Immutable operation recommendations, the core's sole output type.

use crate::proto::{Offer, TaskInfo};
use crate::resource::Resource;

/// One operation the driver should apply against the master, always
/// scoped to the offer it was derived from (§5: "no cross-offer
/// operations").
#[derive(Clone, Debug, PartialEq)]
pub enum Recommendation {
    Reserve { offer_id: String, resource: Resource },
    Unreserve { offer_id: String, resource: Resource },
    Create { offer_id: String, resource: Resource },
    Destroy { offer_id: String, resource: Resource },
    Launch { offer_id: String, task: TaskInfo },
}

impl Recommendation {
    pub fn offer_id(&self) -> &str {
        match self {
            Recommendation::Reserve { offer_id, .. }
            | Recommendation::Unreserve { offer_id, .. }
            | Recommendation::Create { offer_id, .. }
            | Recommendation::Destroy { offer_id, .. }
            | Recommendation::Launch { offer_id, .. } => offer_id,
        }
    }

    pub fn reserve(offer: &Offer, resource: Resource) -> Self {
        Recommendation::Reserve {
            offer_id: offer.id.clone(),
            resource,
        }
    }

    pub fn unreserve(offer: &Offer, resource: Resource) -> Self {
        Recommendation::Unreserve {
            offer_id: offer.id.clone(),
            resource,
        }
    }

    pub fn create(offer: &Offer, resource: Resource) -> Self {
        Recommendation::Create {
            offer_id: offer.id.clone(),
            resource,
        }
    }

    pub fn destroy(offer: &Offer, resource: Resource) -> Self {
        Recommendation::Destroy {
            offer_id: offer.id.clone(),
            resource,
        }
    }

    pub fn launch(offer: &Offer, task: TaskInfo) -> Self {
        Recommendation::Launch {
            offer_id: offer.id.clone(),
            task,
        }
    }
}
