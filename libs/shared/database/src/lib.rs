pub mod context;
pub mod identity;
pub mod memory;
pub mod postgrest;
pub mod store;
pub mod supabase;

pub use context::SchedulingContext;
pub use identity::resolve_actor;
pub use memory::InMemorySchedulingStore;
pub use postgrest::SupabaseSchedulingStore;
pub use store::{CommitOutcome, DoctorDirectory, SchedulingStore};
