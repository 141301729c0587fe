pub mod schedule;
pub mod slots;
pub mod time_window;

pub use schedule::WeeklyScheduleService;
pub use slots::SlotService;
