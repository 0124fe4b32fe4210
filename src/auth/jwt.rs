use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Decodes an HS256 access token. Refresh tokens are refused here.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("Refresh tokens cannot be used to call the API".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub const SECRET: &str = "test-secret";

    pub fn token_for(role: u8, personnel_id: Option<u64>, token_type: TokenType) -> String {
        let exp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize
            + 600;
        let claims = Claims {
            user_id: 9,
            sub: "hr.manager".into(),
            role,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
            token_type,
            personnel_id,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    #[test]
    fn access_token_is_accepted() {
        let claims = verify_token(&token_for(2, Some(14), TokenType::Access), SECRET).unwrap();
        assert_eq!(claims.role, 2);
        assert_eq!(claims.personnel_id, Some(14));
    }

    #[test]
    fn refresh_token_is_refused() {
        assert!(verify_token(&token_for(2, None, TokenType::Refresh), SECRET).is_err());
    }

    #[test]
    fn wrong_secret_is_refused() {
        assert!(verify_token(&token_for(1, None, TokenType::Access), "other").is_err());
    }
}
