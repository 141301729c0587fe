use tracing::{debug, error};
use uuid::Uuid;

use shared_models::auth::{Actor, Role, User};
use shared_models::error::AppError;

use crate::store::DoctorDirectory;

/// Maps an authenticated token user onto a scheduling actor. Doctor accounts
/// must have a doctor profile; the profile id travels with the actor.
pub async fn resolve_actor(directory: &dyn DoctorDirectory, user: &User) -> Result<Actor, AppError> {
    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

    let role = Role::from_claim(user.role.as_deref()).ok_or_else(|| {
        debug!("User {} has unsupported role {:?}", user_id, user.role);
        AppError::Forbidden("Role not permitted for scheduling".to_string())
    })?;

    match role {
        Role::Patient => Ok(Actor::Patient { user_id }),
        Role::Admin => Ok(Actor::Admin { user_id }),
        Role::Doctor => {
            let profile = directory
                .find_doctor_by_user(user_id)
                .await
                .map_err(|e| {
                    error!("Doctor profile lookup failed for user {}: {}", user_id, e);
                    AppError::Internal(e.to_string())
                })?
                .ok_or_else(|| AppError::Forbidden("Doctor profile not found".to_string()))?;

            Ok(Actor::Doctor { user_id, doctor_id: profile.id })
        }
    }
}
