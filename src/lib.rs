//! mail-handoff: inbound email gateway for the booking agent.

pub mod config;
pub mod crypto;
pub mod error;
pub mod handoff;
pub mod inbound;
pub mod mailer;
pub mod pipeline;
pub mod scheduling;
pub mod store;
