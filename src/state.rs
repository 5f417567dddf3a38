use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::token::TokenSigner;
use crate::config::Config;
use crate::store::Store;
use crate::tickets::{DownloadLink, TicketLinks};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn signer(&self) -> TokenSigner<'_> {
        TokenSigner::new(self.config.secret())
    }

    /// Fresh public info/download links for a ticket.
    pub fn ticket_links(&self, ticket_id: Uuid, now: DateTime<Utc>) -> TicketLinks {
        DownloadLink::issue(
            ticket_id,
            now,
            self.config.download_link_ttl,
            self.config.secret(),
        )
        .urls(&self.config.public_base_url, ticket_id)
    }
}
