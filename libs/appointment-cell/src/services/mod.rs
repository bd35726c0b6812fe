pub mod billing_flow;
pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use billing_flow::BillingFlowService;
pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetector;
pub use lifecycle::AppointmentLifecycle;
