use actix_web::{
    Error as ActixError, FromRequest, HttpRequest, dev::Payload, error::ErrorUnauthorized,
    web::Data,
};
use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};

use crate::config::Config;
use crate::services::policy::Actor;

/// Session token issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user email
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: usize, // expiration time
}

impl Claims {
    pub fn email(&self) -> &str {
        &self.sub
    }

    pub fn into_actor(self) -> Actor {
        Actor::new(self.sub, self.roles)
    }
}

fn decode_claims(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(token_data.claims)
}

impl FromRequest for Claims {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        let Some(token) = token else {
            return ready(Err(ErrorUnauthorized(
                "Missing or invalid authorization header",
            )));
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            log::error!("Config missing from app data; cannot verify tokens");
            return ready(Err(ErrorUnauthorized("Authentication unavailable")));
        };

        match decode_claims(token, &config.jwt_secret) {
            Ok(claims) => ready(Ok(claims)),
            Err(e) => {
                log::debug!("Rejected bearer token: {}", e);
                ready(Err(ErrorUnauthorized("Invalid token")))
            }
        }
    }
}

impl FromRequest for Actor {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        ready(
            Claims::from_request(req, payload)
                .into_inner()
                .map(Claims::into_actor),
        )
    }
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct AuthService {
    config: Config,
}

impl AuthService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn generate_token(&self, email: &str, roles: &[&str]) -> Result<String> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::days(self.config.jwt_expiration_days))
            .ok_or_else(|| anyhow!("token expiration overflows"))?
            .timestamp() as usize;

        let claims = Claims {
            sub: email.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            exp: expiration,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_ref()),
        )?;

        Ok(token)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode_claims(token, &self.config.jwt_secret)
    }
}
