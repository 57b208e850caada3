use std::sync::Arc;

use tracing::{debug, error};

use chairside_service::ReservationService;
use chairside_types::events::ServerEvent;

use crate::registry::{Outbound, Registry};

/// Pushes the authoritative reservation list for a date to every member
/// of that date's room after a successful mutation. Always the full list,
/// never a delta — clients replace their local set wholesale, so the
/// originator is included too.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
    service: Arc<ReservationService>,
}

impl Broadcaster {
    pub fn new(registry: Registry, service: Arc<ReservationService>) -> Self {
        Self { registry, service }
    }

    /// One publish per successful mutation, no coalescing. Any failure is
    /// logged and swallowed; a broadcast must never fail its caller.
    pub async fn publish_for_date(&self, date: &str) {
        let reservations = match self.service.list_for_date(date).await {
            Ok(list) => list,
            Err(e) => {
                error!("Failed to load reservations for broadcast to {}: {}", date, e);
                return;
            }
        };

        let senders = self.registry.room_senders(date).await;
        debug!(
            "Publishing {} reservations for {} to {} connections",
            reservations.len(),
            date,
            senders.len()
        );

        let event = ServerEvent::ReservationsUpdated(reservations);
        for tx in senders {
            // A departed connection is a dropped channel, not an error.
            let _ = tx.send(Outbound::Event(event.clone()));
        }
    }
}
