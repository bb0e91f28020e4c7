use crate::{
    authentication::permissions::ActionType,
    cache::cache::{CacheKeyType, CacheLifetime, RedisValue},
    error::{write_error, NotFoundError, QueryError},
    jwt::SessionData,
    schema::{Id, Tag, TagForm},
    validation::validate_tag,
};

use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Tag catalog, served from cache until a tag is created.
pub async fn fetch_tags(
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Vec<Tag>, potion::Error> {
    let p = pool.clone();
    match RedisValue::get_or_list(CacheKeyType::Tags.new("all"), cache, move || async move {
        list_tags(&p).await
    })
    .await
    {
        Ok(value) => Ok(value.value),
        Err(e) => {
            log::error!("> Tag cache unavailable: {:?}", e.info);
            list_tags(pool).await
        }
    }
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    tag.ok_or_else(|| NotFoundError::new("No tag exists with specified id").into())
}

pub async fn create_tag(
    form: &TagForm,
    session: &SessionData,
    pool: &Pool<Postgres>,
    cache: &mut MultiplexedConnection,
) -> Result<Tag, potion::Error> {
    session.authenticate(ActionType::ManageCatalog)?;
    validate_tag(form)?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(form.name.trim())
    .bind(&form.color)
    .bind(&form.slug)
    .fetch_one(pool)
    .await
    .map_err(|e| write_error(e, "Tag with this name, color or slug already exists"))?;

    if let Err(e) = CacheLifetime::BindTagCache.rotate(cache).await {
        log::error!("> Failed to invalidate tag cache: {:?}", e.info);
    }

    log::info!("User {} created tag {}", session.user_id, tag.slug);

    Ok(tag)
}
