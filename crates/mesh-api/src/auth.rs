use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use mesh_db::models::NewUser;
use mesh_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Usernames are what `@mentions` resolve against, so they use the same
/// character set as the mention pattern.
pub fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::validation("Username must be 3-32 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::validation(
            "Username may only contain letters, digits and underscores",
        ));
    }
    Ok(())
}

/// Lower-cases and sanity-checks an email address.
pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::validation("Invalid email address")),
    }
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    let email = normalize_email(&req.email)?;
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let username = req.username.clone();

    blocking(&state, move |db| {
        if db.get_user_by_email(&email)?.is_some() {
            return Err(ApiError::Conflict("Email already exists".into()));
        }
        if db.get_user_by_username(&req.username)?.is_some() {
            return Err(ApiError::Conflict("Username already taken".into()));
        }

        db.create_user(&NewUser {
            id: &user_id.to_string(),
            username: &req.username,
            email: &email,
            password_hash: &password_hash,
            avatar: req.avatar.as_deref(),
        })
        .map_err(|e| ApiError::conflict_on_duplicate(e, "Username or email already exists"))
    })
    .await?;

    info!("Registered {} ({})", username, user_id);

    let token = create_token(&state.jwt_secret, user_id, &username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    let user = blocking(&state, move |db| Ok(db.get_user_by_email(&email)?))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn token_round_trips_through_middleware_decoder() {
        let id = Uuid::new_v4();
        let token = create_token("secret", id, "alice").unwrap();

        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "alice");
        assert!(decode_token("other-secret", &token).is_none());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("alice_99").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("dot.name").is_err());
    }

    #[test]
    fn email_is_lowercased() {
        assert_eq!(normalize_email(" Alice@Example.COM ").unwrap(), "alice@example.com");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@example.com").is_err());
    }
}
