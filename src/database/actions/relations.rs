use crate::{
    authentication::permissions::ActionType,
    constants::SUBSCRIPTION_RECIPES_LIMIT,
    error::{write_error, ConflictError, NotFoundError, QueryError, ValidationError},
    jwt::SessionData,
    schema::{Id, RecipeShort, Relation, SubscriptionView, User, UserView},
};

use sqlx::{Pool, Postgres};

use super::{
    recipes::{count_author_recipes, list_author_recipes, require_recipe},
    users::require_user,
};

/// The three `(user, target)` relations a user manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
    Subscription,
}

impl RelationKind {
    pub fn table(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
            RelationKind::Subscription => "subscriptions",
        }
    }

    pub fn target_column(&self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipe_id",
            RelationKind::Subscription => "author_id",
        }
    }

    fn target_table(&self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipes",
            RelationKind::Subscription => "users",
        }
    }

    fn conflict_message(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "Recipe is already in favorites",
            RelationKind::ShoppingCart => "Recipe is already in the shopping cart",
            RelationKind::Subscription => "You are already subscribed to this author",
        }
    }

    fn missing_message(&self) -> &'static str {
        match self {
            RelationKind::Favorite => "Recipe is not in favorites",
            RelationKind::ShoppingCart => "Recipe is not in the shopping cart",
            RelationKind::Subscription => "You are not subscribed to this author",
        }
    }

    fn target_missing_message(&self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => {
                "No recipe exists with specified id"
            }
            RelationKind::Subscription => "No user exists with specified id",
        }
    }

    /// Checks that hold regardless of stored state.
    pub fn check(&self, owner: Id, target: Id) -> Result<(), ValidationError> {
        match self {
            RelationKind::Subscription if owner == target => Err(ValidationError::field(
                "author",
                "You cannot subscribe to yourself",
            )),
            _ => Ok(()),
        }
    }
}

/// Creates the relation. An existing pair is a conflict, never a silent success.
pub async fn add_relation(
    kind: RelationKind,
    owner: Id,
    target: Id,
    pool: &Pool<Postgres>,
) -> Result<Relation, potion::Error> {
    kind.check(owner, target)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let found: Option<(Id,)> =
        sqlx::query_as(&format!("SELECT id FROM {} WHERE id = $1", kind.target_table()))
            .bind(target)
            .fetch_optional(&mut *tr)
            .await
            .map_err(QueryError::from)?;
    if found.is_none() {
        return Err(NotFoundError::new(kind.target_missing_message()).into());
    }

    let relation: Option<Relation> = sqlx::query_as(&format!(
        "
        INSERT INTO {table} (user_id, {column}) VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        RETURNING id, user_id, {column} AS target_id
    ",
        table = kind.table(),
        column = kind.target_column()
    ))
    .bind(owner)
    .bind(target)
    .fetch_optional(&mut *tr)
    .await
    .map_err(|e| write_error(e, kind.conflict_message()))?;

    let relation = match relation {
        Some(relation) => relation,
        None => return Err(ConflictError::new(kind.conflict_message()).into()),
    };

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {owner} added {kind:?} {target}");

    Ok(relation)
}

pub async fn remove_relation(
    kind: RelationKind,
    owner: Id,
    target: Id,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.target_column()
    ))
    .bind(owner)
    .bind(target)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(NotFoundError::new(kind.missing_message()).into());
    }

    log::info!("User {owner} removed {kind:?} {target}");

    Ok(())
}

pub async fn relation_exists(
    kind: RelationKind,
    owner: Id,
    target: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let (exists,): (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2)",
        kind.table(),
        kind.target_column()
    ))
    .bind(owner)
    .bind(target)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(exists)
}

pub async fn add_to_favorites(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    add_relation(RelationKind::Favorite, session.user_id, recipe_id, pool).await?;

    Ok(RecipeShort::from(&require_recipe(recipe_id, pool).await?))
}

pub async fn remove_from_favorites(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::Favorite, session.user_id, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    add_relation(RelationKind::ShoppingCart, session.user_id, recipe_id, pool).await?;

    Ok(RecipeShort::from(&require_recipe(recipe_id, pool).await?))
}

pub async fn remove_from_shopping_cart(
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::ShoppingCart, session.user_id, recipe_id, pool).await
}

/// Author summary with up to `recipes_limit` newest recipes, 3 by default.
async fn subscription_view(
    author: User,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, potion::Error> {
    let limit = recipes_limit
        .filter(|limit| *limit >= 0)
        .unwrap_or(SUBSCRIPTION_RECIPES_LIMIT);
    let recipes = list_author_recipes(author.id, limit, pool).await?;
    let recipes_count = count_author_recipes(author.id, pool).await?;

    Ok(SubscriptionView {
        author: UserView::from_user(author, true),
        recipes: recipes.iter().map(RecipeShort::from).collect(),
        recipes_count,
    })
}

pub async fn subscribe(
    author_id: Id,
    session: &SessionData,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    add_relation(RelationKind::Subscription, session.user_id, author_id, pool).await?;

    let author = require_user(pool, author_id).await?;
    subscription_view(author, recipes_limit, pool).await
}

pub async fn unsubscribe(
    author_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::Subscription, session.user_id, author_id, pool).await
}

/// Authors the session user follows, most recent subscription first.
pub async fn list_subscriptions(
    session: &SessionData,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionView>, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let authors: Vec<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id DESC
    ",
    )
    .bind(session.user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut views = Vec::with_capacity(authors.len());
    for author in authors {
        views.push(subscription_view(author, recipes_limit, pool).await?);
    }

    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_subscription_is_always_rejected() {
        for id in [1, 42, Id::MAX] {
            let error = RelationKind::Subscription.check(id, id).unwrap_err();
            assert!(error.has("author"));
        }
        assert!(RelationKind::Subscription.check(1, 2).is_ok());
    }

    #[test]
    fn recipe_relations_accept_any_pair() {
        assert!(RelationKind::Favorite.check(5, 5).is_ok());
        assert!(RelationKind::ShoppingCart.check(5, 5).is_ok());
    }

    #[test]
    fn relations_use_independent_tables() {
        assert_eq!(RelationKind::Favorite.table(), "favorites");
        assert_eq!(RelationKind::ShoppingCart.table(), "shopping_cart");
        assert_eq!(RelationKind::Subscription.table(), "subscriptions");
        assert_eq!(RelationKind::Subscription.target_column(), "author_id");
    }
}
