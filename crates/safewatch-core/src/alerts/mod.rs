//! SMS Alerts Module - lifecycle, delivery and scheduled dispatch

mod delivery;
mod dispatcher;
mod gateway;
mod manager;

#[cfg(test)]
pub(crate) mod testing;

pub use delivery::{delivery_rate, summarize, total_cost};
pub use dispatcher::{AlertDispatcher, DispatchSummary};
pub use gateway::{DeliveryOutcome, HttpSmsGateway, SimulatedGateway, SmsGateway};
pub use manager::{
    parse_schedule, validate_message, AlertChanges, AlertDraft, AlertError, AlertManager,
    MAX_MESSAGE_CHARS,
};
