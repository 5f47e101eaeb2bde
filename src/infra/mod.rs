// Adapters for the ports in `app::ports`

pub mod http_client;
pub mod keywords;
pub mod ledger;
pub mod venue_resolver;

pub use http_client::ReqwestHttp;
pub use keywords::TermListMatcher;
pub use ledger::{InMemoryLedger, SqliteLedger};
pub use venue_resolver::StaticVenueResolver;
