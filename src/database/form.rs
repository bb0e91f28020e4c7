use std::{collections::HashMap, str::FromStr};

use serde_json::Value;

use super::{error::TypeError, schema::Id};

pub type FormData = HashMap<String, Value>;

/// Loosely typed query parameters, as decoded from a query string.
pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    pub fn from_query(query: HashMap<String, String>) -> Self {
        Self {
            inner: query
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(Value::Number(v)) => v
                .to_string()
                .parse()
                .map_err(|_e| TypeError::new("Invalid type conversion")),
            Some(value) => match value.as_str() {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_e| TypeError::new("Invalid type conversion")),
                None => Err(TypeError::new("Failed to parse value as str")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new("Invalid key")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    /// `1`/`0` and `true`/`false`; a missing key is `false`.
    pub fn get_flag(&self, key: &str) -> Result<bool, TypeError> {
        match self.inner.get(key) {
            Some(Value::Bool(v)) => Ok(*v),
            Some(Value::Number(v)) => Ok(v.as_i64().unwrap_or(0) != 0),
            Some(Value::String(v)) => match v.trim().to_lowercase().as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                _ => Err(TypeError::new("Invalid flag value")),
            },
            Some(_) => Err(TypeError::new("Invalid flag value")),
            None => Ok(false),
        }
    }

    /// Either a JSON array of strings or a comma separated string.
    pub fn get_list(&self, key: &str) -> Result<Vec<String>, TypeError> {
        match self.inner.get(key) {
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| {
                    value
                        .as_str()
                        .map(|v| v.to_string())
                        .ok_or_else(|| TypeError::new("Failed to parse value as str"))
                })
                .collect(),
            Some(Value::String(v)) => Ok(v
                .split(',')
                .map(|part| part.trim())
                .filter(|part| !part.is_empty())
                .map(|part| part.to_string())
                .collect()),
            Some(_) => Err(TypeError::new("Failed to parse value as list")),
            None => Ok(vec![]),
        }
    }
}

/// Recipe list filter. The favorite and cart flags are relative to the viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub limit: Option<i64>,
}

impl TryFrom<Form> for RecipeFilter {
    type Error = TypeError;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let author = match form.contains("author") {
            true => Some(form.get_number("author")?),
            false => None,
        };
        let limit = match form.contains("limit") {
            true => {
                let limit: i64 = form.get_number("limit")?;
                if limit <= 0 {
                    return Err(TypeError::new("Limit must be positive"));
                }
                Some(limit)
            }
            false => None,
        };

        Ok(Self {
            author,
            tags: form.get_list("tags")?,
            is_favorited: form.get_flag("is_favorited")?,
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
            limit,
        })
    }
}

/// Ingredient lookup filter, matched as a case-insensitive name prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

impl TryFrom<Form> for IngredientFilter {
    type Error = TypeError;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let name = match form.contains("name") {
            true => Some(form.get_str("name")?).filter(|name| !name.trim().is_empty()),
            false => None,
        };

        Ok(Self { name })
    }
}
