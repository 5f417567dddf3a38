pub mod account;
pub mod event;
pub mod seller;
pub mod stats;
pub mod ticket;

pub use account::{Account, AccountRole, AdminRole, EventAdmin, NewAccount, MAX_ADMINS_PER_EVENT};
pub use event::{Event, NewEvent};
pub use seller::Seller;
pub use stats::{DashboardStats, EventStats, EventTotals, SellerSummary, StatusCounts};
pub use ticket::{Buyer, Ticket, TicketAction, TicketFilter, TicketStatus};
