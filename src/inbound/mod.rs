//! Inbound mail gateway: HTTP surface and submission parsing.

pub mod routes;
pub mod submission;

pub use routes::{gateway_routes, request_origin};
pub use submission::{Envelope, FormFields, InboundSubmission, ParsedMessage, parse_message};
