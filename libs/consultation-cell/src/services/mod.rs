pub mod booking;
pub mod lifecycle;
pub mod numbering;

pub use booking::ConsultationService;
pub use lifecycle::ConsultationLifecycleService;
pub use numbering::format_consultation_number;
