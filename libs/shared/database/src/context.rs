use std::sync::Arc;

use tracing::{info, warn};

use shared_config::{AppConfig, StoreBackend};
use shared_models::scheduling::DoctorProfile;

use crate::memory::InMemorySchedulingStore;
use crate::postgrest::SupabaseSchedulingStore;
use crate::store::{DoctorDirectory, SchedulingStore};

/// Everything a scheduling handler needs, shared as axum router state.
#[derive(Clone)]
pub struct SchedulingContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
    pub directory: Arc<dyn DoctorDirectory>,
}

impl SchedulingContext {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn SchedulingStore>,
        directory: Arc<dyn DoctorDirectory>,
    ) -> Self {
        Self { config, store, directory }
    }

    /// Builds the store selected by `SCHEDULING_STORE`.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        match config.scheduling.store_backend {
            StoreBackend::Supabase => {
                info!("Using Supabase scheduling store at {}", config.supabase_url);
                let store = Arc::new(SupabaseSchedulingStore::new(&config));
                Self::new(config, store.clone(), store)
            }
            StoreBackend::Memory => {
                let doctors: Vec<DoctorProfile> = config.scheduling.seed_doctors
                    .iter()
                    .map(|seed| DoctorProfile {
                        id: seed.doctor_id,
                        user_id: seed.user_id,
                        consultation_fee: seed.consultation_fee,
                    })
                    .collect();

                if doctors.is_empty() {
                    warn!("In-memory store has no doctor profiles; set MEMORY_DOCTOR_PROFILES or doctor requests will be forbidden");
                } else {
                    info!("Using in-memory scheduling store with {} doctor profiles", doctors.len());
                }

                let store = Arc::new(InMemorySchedulingStore::with_doctors(doctors));
                Self::new(config, store.clone(), store)
            }
        }
    }

    /// In-memory context around an existing store, used by tests and local runs.
    pub fn in_memory(config: Arc<AppConfig>, store: Arc<InMemorySchedulingStore>) -> Self {
        Self::new(config, store.clone(), store)
    }
}
