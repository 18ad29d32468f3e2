//! Send-side capture
//!
//! Produces the email records that webhook events are later correlated
//! against: every outbound message gets a tracking id header before it is
//! sent and an email row once the transport accepted it.

pub mod context;
pub mod intercept;
pub mod record;
pub mod transport;

pub use context::{EmailCapture, SendContext};
pub use intercept::{intercept, MailerLabels};
pub use record::{record_delivery, OwnerResolver};
pub use transport::{MailTransport, TrackingTransport};
