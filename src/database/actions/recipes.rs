use std::collections::HashSet;

use crate::{
    authentication::permissions::ActionType,
    config::RecipeLimits,
    error::{NotFoundError, QueryError, ValidationError},
    form::RecipeFilter,
    jwt::SessionData,
    schema::{Id, IngredientAmount, Recipe, RecipeForm, RecipeIngredientView, RecipeView, Tag},
    validation::validate_recipe,
};

use potion::HtmlError;
use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{
    relations::{relation_exists, RelationKind},
    users::get_user_view,
};

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn require_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Recipe, potion::Error> {
    match get_recipe(id, pool).await? {
        Some(recipe) => Ok(recipe),
        None => Err(NotFoundError::new("No recipe exists with specified id").into()),
    }
}

/// Authors may modify their own recipes, admins any recipe.
pub fn check_recipe_owner(recipe: &Recipe, session: &SessionData) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match session.authenticate(ActionType::ManageAllRecipes) {
        Ok(_) => Ok(()),
        Err(_) if recipe.author_id == session.user_id => Ok(()),
        Err(_) => Err(HtmlError::Unauthorized.new("Only the author can modify this recipe")),
    }
}

/// Locks a recipe the session is allowed to modify for the rest of the transaction.
async fn lock_recipe_mut(
    id: Id,
    session: &SessionData,
    tr: &mut Transaction<'_, Postgres>,
) -> Result<Recipe, potion::Error> {
    let recipe: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    let recipe =
        recipe.ok_or_else(|| NotFoundError::new("No recipe exists with specified id"))?;
    check_recipe_owner(&recipe, session)?;

    Ok(recipe)
}

pub async fn list_author_recipes(
    author_id: Id,
    limit: i64,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, potion::Error> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "SELECT * FROM recipes WHERE author_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(author_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn count_author_recipes(
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(count)
}

pub async fn list_recipe_tags(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn list_recipe_ingredients(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientView>, potion::Error> {
    let rows: Vec<RecipeIngredientView> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Ids among the form's references that exist, as `(tags, ingredients)`.
async fn load_references(
    tr: &mut Transaction<'_, Postgres>,
    form: &RecipeForm,
) -> Result<(HashSet<Id>, HashSet<Id>), potion::Error> {
    let ingredient_ids: Vec<Id> = form.ingredients.iter().map(|i| i.id).collect();

    let tags: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(&form.tags)
        .fetch_all(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    let ingredients: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(&ingredient_ids)
        .fetch_all(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok((
        tags.into_iter().map(|t| t.0).collect(),
        ingredients.into_iter().map(|i| i.0).collect(),
    ))
}

async fn insert_recipe_ingredients(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    ingredients: &[IngredientAmount],
) -> Result<(), potion::Error> {
    if ingredients.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(ingredients.iter(), |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_recipe_tags(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), potion::Error> {
    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Creates the recipe with its ingredient amounts and tags in one transaction.
pub async fn create_recipe(
    form: &RecipeForm,
    session: &SessionData,
    limits: &RecipeLimits,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, potion::Error> {
    session.authenticate(ActionType::CreateRecipes)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let (known_tags, known_ingredients) = load_references(&mut tr, form).await?;
    let recipe = validate_recipe(form, limits, &known_tags, &known_ingredients, true)?;
    let image = recipe
        .image
        .ok_or_else(|| ValidationError::field("image", "Image is required"))?;

    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, image_mime, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(&recipe.name)
    .bind(image.bytes)
    .bind(image.mime)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_ingredients(&mut tr, id, &recipe.ingredients).await?;
    insert_recipe_tags(&mut tr, id, &recipe.tags).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {} created recipe {id}", session.user_id);

    get_recipe_view(id, Some(session), pool).await
}

/// Replaces the recipe's fields, ingredient amounts and tags in one transaction.
/// The stored image is kept when the form carries none.
pub async fn update_recipe(
    id: Id,
    form: &RecipeForm,
    session: &SessionData,
    limits: &RecipeLimits,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, potion::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    lock_recipe_mut(id, session, &mut tr).await?;
    let (known_tags, known_ingredients) = load_references(&mut tr, form).await?;
    let recipe = validate_recipe(form, limits, &known_tags, &known_ingredients, false)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    insert_recipe_ingredients(&mut tr, id, &recipe.ingredients).await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;
    insert_recipe_tags(&mut tr, id, &recipe.tags).await?;

    let (image, image_mime) = match recipe.image {
        Some(image) => (Some(image.bytes), Some(image.mime)),
        None => (None, None),
    };

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3,
            image = COALESCE($4, image), image_mime = COALESCE($5, image_mime)
        WHERE id = $6
    ",
    )
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .bind(image)
    .bind(image_mime)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {} updated recipe {id}", session.user_id);

    get_recipe_view(id, Some(session), pool).await
}

/// Deletes a recipe; its ingredient amounts, tags and relations go with it.
pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    lock_recipe_mut(id, session, &mut tr).await?;
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(())
}

pub async fn build_recipe_view(
    recipe: Recipe,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, potion::Error> {
    let tags = list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_ingredients(recipe.id, pool).await?;
    let author = get_user_view(recipe.author_id, viewer, pool).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            relation_exists(RelationKind::Favorite, viewer.user_id, recipe.id, pool).await?,
            relation_exists(RelationKind::ShoppingCart, viewer.user_id, recipe.id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        image: recipe.image_url(),
        tags,
        author,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
        name: recipe.name,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn get_recipe_view(
    id: Id,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, potion::Error> {
    let recipe = require_recipe(id, pool).await?;
    build_recipe_view(recipe, viewer, pool).await
}

/// Lists recipes newest first. Favorite and cart filters select nothing for
/// an anonymous viewer.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeView>, potion::Error> {
    if (filter.is_favorited || filter.is_in_shopping_cart) && viewer.is_none() {
        return Ok(vec![]);
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.to_owned())
            .push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer.user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query_builder
                .push(
                    " AND EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ",
                )
                .push_bind(viewer.user_id)
                .push(")");
        }
    }

    query_builder.push(" ORDER BY r.created_at DESC, r.id DESC");
    if let Some(limit) = filter.limit {
        query_builder.push(" LIMIT ").push_bind(limit);
    }

    let rows: Vec<Recipe> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let mut views = Vec::with_capacity(rows.len());
    for recipe in rows {
        views.push(build_recipe_view(recipe, viewer, pool).await?);
    }

    Ok(views)
}
