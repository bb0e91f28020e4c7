use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use crate::{
    constants::{
        COOKING_TIME_MAX, COOKING_TIME_MIN, INGREDIENT_AMOUNT_MAX, INGREDIENT_AMOUNT_MIN,
        REPORT_LINE_STEP, REPORT_X_POSITION, REPORT_Y_POSITION, REPORT_Y_THRESHOLD,
        TOKEN_LIFETIME_HOURS,
    },
    error::TypeError,
};

/// Inclusive bounds a recipe payload is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeLimits {
    pub cooking_time_min: i32,
    pub cooking_time_max: i32,
    pub amount_min: i32,
    pub amount_max: i32,
}

impl Default for RecipeLimits {
    fn default() -> Self {
        Self {
            cooking_time_min: COOKING_TIME_MIN,
            cooking_time_max: COOKING_TIME_MAX,
            amount_min: INGREDIENT_AMOUNT_MIN,
            amount_max: INGREDIENT_AMOUNT_MAX,
        }
    }
}

/// Vertical layout of the exported shopping list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    pub x_position: i32,
    pub y_position: i32,
    pub line_step: i32,
    pub y_threshold: i32,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            x_position: REPORT_X_POSITION,
            y_position: REPORT_Y_POSITION,
            line_step: REPORT_LINE_STEP,
            y_threshold: REPORT_Y_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub token_lifetime_hours: i64,
    pub limits: RecipeLimits,
    pub layout: ReportLayout,
}

impl Config {
    pub fn load() -> Result<Self, TypeError> {
        let limits = RecipeLimits {
            cooking_time_min: try_load("COOKING_TIME_MIN", COOKING_TIME_MIN),
            cooking_time_max: try_load("COOKING_TIME_MAX", COOKING_TIME_MAX),
            amount_min: try_load("INGREDIENT_AMOUNT_MIN", INGREDIENT_AMOUNT_MIN),
            amount_max: try_load("INGREDIENT_AMOUNT_MAX", INGREDIENT_AMOUNT_MAX),
        };
        check_limits(&limits)?;

        Ok(Self {
            database_url: try_load(
                "DATABASE_URL",
                String::from("postgres://postgres@localhost/foodgram"),
            ),
            redis_url: try_load("REDIS_URL", String::from("redis://127.0.0.1/")),
            jwt_secret: load_secret("JWT_SECRET")?,
            token_lifetime_hours: try_load("TOKEN_LIFETIME_HOURS", TOKEN_LIFETIME_HOURS),
            limits,
            layout: ReportLayout::default(),
        })
    }
}

fn check_limits(limits: &RecipeLimits) -> Result<(), TypeError> {
    if limits.cooking_time_min > limits.cooking_time_max {
        return Err(TypeError::new("COOKING_TIME_MIN exceeds COOKING_TIME_MAX"));
    }
    if limits.amount_min < 1 || limits.amount_min > limits.amount_max {
        return Err(TypeError::new(
            "INGREDIENT_AMOUNT_MIN must be positive and not exceed INGREDIENT_AMOUNT_MAX",
        ));
    }
    Ok(())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(value) => parse_or(key, &value, default),
        Err(_) => {
            log::info!("{key} not set, using default: {default}");
            default
        }
    }
}

fn parse_or<T>(key: &str, value: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    value.trim().parse().unwrap_or_else(|e| {
        log::warn!("Invalid {key} value: {e}, using default: {default}");
        default
    })
}

fn load_secret(secret_name: &str) -> Result<String, TypeError> {
    if let Ok(value) = env::var(secret_name) {
        return Ok(value);
    }

    let path = format!("/run/secrets/{secret_name}");
    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            log::warn!("Failed to read {secret_name} from file: {e}");
            TypeError::new("Secrets misconfigured")
        })
}
