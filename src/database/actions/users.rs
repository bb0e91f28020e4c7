use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
        permissions::ActionType,
    },
    config::Config,
    error::{write_error, NotFoundError, QueryError, ValidationError},
    schema::{Id, PasswordForm, RegistrationForm, TokenForm, TokenResponse, User, UserView},
};

use potion::HtmlError;
use sqlx::{Pool, Postgres};

use super::relations::{relation_exists, RelationKind};

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn require_user(pool: &Pool<Postgres>, user_id: Id) -> Result<User, potion::Error> {
    match get_user_by_id(pool, user_id).await? {
        Some(user) => Ok(user),
        None => Err(NotFoundError::new("No user exists with specified id").into()),
    }
}

const PASSWORD_MIN_LENGTH: usize = 8;

/// Rules every stored password has to meet.
fn check_password(field: &str, password: &str, error: &mut ValidationError) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        error.push(
            field,
            &format!("Password must be at least {PASSWORD_MIN_LENGTH} characters"),
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        error.push(field, "Password cannot be entirely numeric");
    }
}

fn validate_registration(form: &RegistrationForm) -> Result<(), ValidationError> {
    let mut error = ValidationError::new();

    let email = form.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => error.push("email", "Enter a valid email address"),
    }
    if form.username.trim().is_empty()
        || !form
            .username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        error.push(
            "username",
            "Username may contain only letters, digits and @/./+/-/_",
        );
    }
    check_password("password", &form.password, &mut error);

    error.finish(())
}

/// Creates a user; the password is stored as an argon2 hash.
pub async fn register_user(
    form: &RegistrationForm,
    pool: &Pool<Postgres>,
) -> Result<UserView, potion::Error> {
    validate_registration(form)?;

    let password = hash_password(&form.password)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to hash password"))?;

    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *;
    ",
    )
    .bind(form.email.trim())
    .bind(form.username.trim())
    .bind(form.first_name.trim())
    .bind(form.last_name.trim())
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(|e| write_error(e, "User with this email or username already exists"))?;

    log::info!("Registered user {} ({})", user.username, user.id);

    Ok(UserView::from_user(user, false))
}

fn check_credentials(user: &User, password: &str) -> Result<(), potion::Error> {
    let authenticated = verify_password(password, &user.password)
        .map_err(|_| HtmlError::InternalServerError.new("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    Ok(())
}

/// Exchanges credentials for a session token.
pub async fn login_user(
    form: &TokenForm,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<TokenResponse, potion::Error> {
    let user = match get_user(pool, form.email.trim()).await? {
        Some(user) => user,
        None => return Err(HtmlError::InvalidRequest.new("Invalid credentials")),
    };
    check_credentials(&user, &form.password)?;

    let auth_token = generate_jwt_session(&user, &config.jwt_secret, config.token_lifetime_hours)?;

    Ok(TokenResponse { auth_token })
}

fn validate_password_change(form: &PasswordForm) -> Result<(), ValidationError> {
    let mut error = ValidationError::new();

    if form.current_password.is_empty() {
        error.push("current_password", "Current password is required");
    }
    check_password("new_password", &form.new_password, &mut error);

    error.finish(())
}

/// Replaces the session user's password after checking the current one.
pub async fn set_password(
    form: &PasswordForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnAccount)?;
    validate_password_change(form)?;

    let user = require_user(pool, session.user_id).await?;
    check_credentials(&user, &form.current_password)?;

    let password = hash_password(&form.new_password)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to hash password"))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("User {} changed their password", user.id);

    Ok(())
}

pub async fn is_subscribed(
    viewer: Option<&SessionData>,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    match viewer {
        Some(viewer) => {
            relation_exists(RelationKind::Subscription, viewer.user_id, author_id, pool).await
        }
        None => Ok(false),
    }
}

pub async fn get_user_view(
    user_id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserView, potion::Error> {
    let user = require_user(pool, user_id).await?;
    let subscribed = is_subscribed(viewer, user.id, pool).await?;

    Ok(UserView::from_user(user, subscribed))
}

/// Profile of the session user.
pub async fn get_me(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<UserView, potion::Error> {
    let user = require_user(pool, session.user_id).await?;

    Ok(UserView::from_user(user, false))
}

pub async fn list_users(
    viewer: Option<&SessionData>,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserView>, potion::Error> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT $1")
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let mut views = Vec::with_capacity(users.len());
    for user in users {
        let subscribed = is_subscribed(viewer, user.id, pool).await?;
        views.push(UserView::from_user(user, subscribed));
    }

    Ok(views)
}
