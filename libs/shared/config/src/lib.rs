use std::env;
use std::str::FromStr;

use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub port: u16,
    pub scheduling: SchedulingConfig,
}

/// Which persistence backend the scheduling core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown scheduling store backend: {}", other)),
        }
    }
}

/// A doctor profile loaded into the in-memory store at startup, written as
/// `user_id:doctor_id:fee` in `MEMORY_DOCTOR_PROFILES`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedDoctorProfile {
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub consultation_fee: f64,
}

impl FromStr for SeedDoctorProfile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = value.trim().split(':').map(str::trim).collect();
        let [user_id, doctor_id, fee] = parts.as_slice() else {
            return Err(format!("expected user_id:doctor_id:fee, got '{}'", value));
        };

        let consultation_fee: f64 = fee
            .parse()
            .map_err(|_| format!("invalid consultation fee '{}'", fee))?;
        if !consultation_fee.is_finite() || consultation_fee < 0.0 {
            return Err(format!("consultation fee must be a non-negative number, got '{}'", fee));
        }

        Ok(Self {
            user_id: user_id.parse().map_err(|_| format!("invalid user id '{}'", user_id))?,
            doctor_id: doctor_id.parse().map_err(|_| format!("invalid doctor id '{}'", doctor_id))?,
            consultation_fee,
        })
    }
}

/// Comma separated profiles. Malformed entries are logged and skipped.
pub fn parse_seed_doctors(raw: &str) -> Vec<SeedDoctorProfile> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Ignoring MEMORY_DOCTOR_PROFILES entry: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub slot_batch_size: usize,
    pub consultation_number_prefix: String,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
    pub store_backend: StoreBackend,
    /// Only read by the in-memory backend; Supabase keeps profiles in `doctors`.
    pub seed_doctors: Vec<SeedDoctorProfile>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_batch_size: 200,
            consultation_number_prefix: "CONS".to_string(),
            default_page_limit: 10,
            max_page_limit: 50,
            store_backend: StoreBackend::Supabase,
            seed_doctors: Vec::new(),
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            slot_batch_size: parse_var("SLOT_BATCH_SIZE", defaults.slot_batch_size),
            consultation_number_prefix: env::var("CONSULTATION_NUMBER_PREFIX")
                .unwrap_or(defaults.consultation_number_prefix),
            default_page_limit: parse_var("DEFAULT_PAGE_LIMIT", defaults.default_page_limit),
            max_page_limit: parse_var("MAX_PAGE_LIMIT", defaults.max_page_limit),
            store_backend: parse_var("SCHEDULING_STORE", defaults.store_backend),
            seed_doctors: env::var("MEMORY_DOCTOR_PROFILES")
                .map(|raw| parse_seed_doctors(&raw))
                .unwrap_or_default(),
        };

        if config.slot_batch_size == 0 {
            warn!("SLOT_BATCH_SIZE must be positive, using default");
            return Self { slot_batch_size: defaults.slot_batch_size, ..config };
        }

        config
    }

    /// Page/limit normalisation shared by every paginated listing.
    pub fn clamp_page(&self, page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(self.default_page_limit)
            .clamp(1, self.max_page_limit.max(1));
        (page, limit)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            port: parse_var("PORT", 3000),
            scheduling: SchedulingConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let store_ready = match self.scheduling.store_backend {
            StoreBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_role_key.is_empty()
            }
            StoreBackend::Memory => true,
        };

        store_ready && !self.supabase_jwt_secret.is_empty()
    }
}
