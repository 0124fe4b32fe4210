use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::{model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub role: Role,

    /// Present only if this user is linked to a personnel record
    pub personnel_id: Option<u64>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        Some(AuthUser {
            user_id: claims.user_id,
            role: Role::from_id(claims.role)?,
            personnel_id: claims.personnel_id,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by auth_middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        match AuthUser::from_claims(claims) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ErrorUnauthorized("Invalid role"))),
        }
    }
}

impl AuthUser {
    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if self.role.is_supervisor() {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Admin only"))
        }
    }

    pub fn require_event_pusher(&self) -> actix_web::Result<()> {
        if self.role.can_push_events() {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Device bridge only"))
        }
    }

    /// Personnel id of the caller, required for self-service endpoints.
    pub fn require_personnel(&self) -> actix_web::Result<u64> {
        self.personnel_id
            .ok_or_else(|| actix_web::error::ErrorForbidden("No personnel profile"))
    }

    /// HR/Admin act on anyone; other users only on their own personnel record.
    pub fn require_self_or_supervisor(&self, personnel_id: u64) -> actix_web::Result<()> {
        if self.role.is_supervisor() || self.personnel_id == Some(personnel_id) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Not allowed for this personnel"))
        }
    }
}
