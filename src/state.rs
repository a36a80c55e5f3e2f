use crate::{config::Secret, services::stamp_service::StampService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub stamps: StampService,

    /// Bearer token guarding `/api/admin/details`. `None` disables the route.
    pub admin_token: Option<Secret>,
}
