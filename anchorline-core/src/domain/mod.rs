//! Domain types for anchorline

pub mod bar;
pub mod signal;
pub mod state;
pub mod zone;

pub use bar::{is_chronological, PriceBar};
pub use signal::TradeSignal;
pub use state::{InstrumentState, Phase};
pub use zone::{ZoneColor, ZoneHistory, ZoneRecord};

/// Symbol type alias
pub type Symbol = String;
