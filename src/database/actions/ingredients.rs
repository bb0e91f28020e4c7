use std::path::Path;

use crate::{
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    catalog::{parse_ingredient_records, IngredientRecord},
    error::{NotFoundError, QueryError, TypeError},
    form::IngredientFilter,
    schema::{Id, Ingredient},
};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres, QueryBuilder};

const IMPORT_CHUNK_SIZE: usize = 1000;

fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub async fn list_ingredients(
    filter: &IngredientFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let rows: Vec<Ingredient> = match &filter.name {
        Some(name) => sqlx::query_as(
            "SELECT * FROM ingredients WHERE LOWER(name) LIKE $1 ESCAPE '\\' ORDER BY name, id",
        )
        .bind(prefix_pattern(name))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

/// Ingredient lookup cached per lowercased prefix until the next import.
pub async fn fetch_ingredients(
    filter: &IngredientFilter,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Ingredient>, potion::Error> {
    let key = filter
        .name
        .as_deref()
        .map(|name| name.trim().to_lowercase())
        .unwrap_or_default();

    let p = pool.clone();
    let f = filter.clone();
    match RedisValue::get_or_list(CacheKeyType::Ingredients.new(key), cache, move || async move {
        list_ingredients(&f, &p).await
    })
    .await
    {
        Ok(value) => Ok(value.value),
        Err(e) => {
            log::error!("> Ingredient cache unavailable: {:?}", e.info);
            list_ingredients(filter, pool).await
        }
    }
}

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Ingredient, potion::Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    row.ok_or_else(|| NotFoundError::new("No ingredient exists with specified id").into())
}

/// Bulk inserts catalog records, skipping pairs that already exist.
/// Returns how many rows were inserted.
pub async fn import_ingredients(
    records: &[IngredientRecord],
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<u64, potion::Error> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let mut inserted = 0;
    for chunk in records.chunks(IMPORT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk.iter(), |mut b, record| {
            b.push_bind(&record.name).push_bind(&record.measurement_unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    if let Err(e) = CacheLifetime::BindIngredientCache.rotate(cache).await {
        log::error!("> Failed to invalidate ingredient cache: {:?}", e.info);
    }

    log::info!(
        "Imported {inserted} of {} ingredient records",
        records.len()
    );

    Ok(inserted)
}

pub async fn import_ingredients_from_file(
    path: impl AsRef<Path>,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<u64, potion::Error> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        TypeError::new(&format!("Failed to read {}: {e}", path.display()))
    })?;
    let records = parse_ingredient_records(&content)?;

    import_ingredients(&records, pool, cache).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_is_lowercased_and_escaped() {
        assert_eq!(prefix_pattern(" Сах"), "сах%");
        assert_eq!(prefix_pattern("50%_x"), "50\\%\\_x%");
        assert_eq!(prefix_pattern(""), "%");
    }
}
