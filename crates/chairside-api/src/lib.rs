pub mod error;
pub mod handwriting;
pub mod holidays;
pub mod middleware;
pub mod reservations;
pub mod users;

use std::sync::Arc;

use chairside_db::Database;
use chairside_gateway::broadcaster::Broadcaster;
use chairside_service::ReservationService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub service: Arc<ReservationService>,
    pub broadcaster: Broadcaster,
}
