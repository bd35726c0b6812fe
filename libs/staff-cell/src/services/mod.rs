pub mod slots;
pub mod staff;

pub use slots::SlotGenerator;
pub use staff::StaffService;
