//! Ticket identity: cryptic codes, QR payloads and public links.

pub mod code;
pub mod link;
pub mod qr;

pub use link::{DownloadLink, TicketLinks};
