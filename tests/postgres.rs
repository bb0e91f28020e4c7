//! Scenarios against a live Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use foodgram_sdk::{
    actions::{
        add_to_favorites, add_to_shopping_cart, build_shopping_list, create_recipe,
        delete_recipe, fetch_recipes, get_me, get_recipe_view, list_recipe_ingredients,
        list_subscriptions, list_users, login_user, register_user, relation_exists,
        remove_from_favorites, set_password, subscribe, update_recipe, RelationKind,
    },
    form::RecipeFilter,
    jwt::{JwtSessionData, SessionData},
    schema::{
        Id, IngredientAmount, PasswordForm, RecipeForm, RegistrationForm, TokenForm, UserRole,
    },
    setup::{apply_schema, connect},
    Config, RecipeLimits, ReportLayout,
};
use sqlx::{Pool, Postgres};

const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

async fn pool() -> Pool<Postgres> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = connect(&url).await.ok().expect("database is reachable");
    apply_schema(&pool).await.ok().expect("schema applies");
    pool
}

fn unique(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}

fn registration(username: &str, email: &str) -> RegistrationForm {
    RegistrationForm {
        email: email.to_string(),
        username: username.to_string(),
        first_name: String::from("Test"),
        last_name: String::from("Cook"),
        password: String::from("correct horse"),
    }
}

async fn user(pool: &Pool<Postgres>) -> SessionData {
    let username = unique("cook");
    let view = register_user(
        &registration(&username, &format!("{username}@example.com")),
        pool,
    )
    .await
    .ok()
    .expect("user registers");

    SessionData::from(JwtSessionData::new(view.id, username, UserRole::User, 1))
}

async fn ingredient(name: &str, unit: &str, pool: &Pool<Postgres>) -> Id {
    let (id,): (Id,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(unique(name))
    .bind(unit)
    .fetch_one(pool)
    .await
    .expect("ingredient inserts");
    id
}

async fn tag(pool: &Pool<Postgres>) -> Id {
    let slug = unique("tag");
    let color = format!("#{:06X}", uuid::Uuid::new_v4().as_u128() as u32 & 0xFFFFFF);
    let (id,): (Id,) = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&slug)
    .bind(color)
    .bind(&slug)
    .fetch_one(pool)
    .await
    .expect("tag inserts");
    id
}

fn recipe_form(tags: Vec<Id>, ingredients: Vec<(Id, i32)>) -> RecipeForm {
    RecipeForm {
        name: String::from("Soup"),
        image: Some(PNG.to_string()),
        text: String::from("Boil everything."),
        cooking_time: 30,
        tags,
        ingredients: ingredients
            .into_iter()
            .map(|(id, amount)| IngredientAmount { id, amount })
            .collect(),
    }
}

#[tokio::test]
#[ignore]
async fn created_recipe_has_exactly_its_associations() {
    let pool = pool().await;
    let author = user(&pool).await;
    let salt = ingredient("salt", "g", &pool).await;
    let pepper = ingredient("pepper", "g", &pool).await;
    let soup = tag(&pool).await;

    let view = create_recipe(
        &recipe_form(vec![soup], vec![(salt, 10), (pepper, 5)]),
        &author,
        &RecipeLimits::default(),
        &pool,
    )
    .await
    .ok()
    .expect("recipe is created");

    assert_eq!(view.ingredients.len(), 2);
    assert_eq!(view.tags.len(), 1);
    assert_eq!(view.author.id, author.user_id);
    assert!(view.image.starts_with("data:image/png;base64,"));
    assert!(!view.is_favorited);
}

#[tokio::test]
#[ignore]
async fn updates_replace_ingredients_without_accumulating() {
    let pool = pool().await;
    let breakfast = tag(&pool).await;
    let author = user(&pool).await;
    let salt = ingredient("salt", "g", &pool).await;
    let pepper = ingredient("pepper", "g", &pool).await;
    let limits = RecipeLimits::default();

    let view = create_recipe(
        &recipe_form(vec![breakfast], vec![(salt, 10), (pepper, 5)]),
        &author,
        &limits,
        &pool,
    )
    .await
    .ok()
    .expect("recipe is created");

    let mut update = recipe_form(vec![breakfast], vec![(salt, 7)]);
    update.image = None;
    for _ in 0..2 {
        update_recipe(view.id, &update, &author, &limits, &pool)
            .await
            .ok()
            .expect("recipe updates");
    }

    let ingredients = list_recipe_ingredients(view.id, &pool)
        .await
        .ok()
        .expect("ingredients load");
    assert_eq!(ingredients.len(), 1);
    assert_eq!(ingredients[0].amount, 7);

    let view = get_recipe_view(view.id, None, &pool)
        .await
        .ok()
        .expect("recipe loads");
    assert!(view.image.starts_with("data:image/png"));
}

#[tokio::test]
#[ignore]
async fn invalid_recipe_leaves_nothing_behind() {
    let pool = pool().await;
    let breakfast = tag(&pool).await;
    let author = user(&pool).await;
    let salt = ingredient("salt", "g", &pool).await;

    let result = create_recipe(
        &recipe_form(vec![breakfast], vec![(salt, 10), (salt, 5)]),
        &author,
        &RecipeLimits::default(),
        &pool,
    )
    .await;
    let error = result.err().expect("duplicate ingredient is rejected");
    assert_eq!(error.code, 400);
    let info = error.info.unwrap_or_default();
    assert!(info.contains("ingredients"));
    assert!(!info.contains("tags"));

    let filter = RecipeFilter {
        author: Some(author.user_id),
        ..Default::default()
    };
    let recipes = fetch_recipes(&filter, None, &pool)
        .await
        .ok()
        .expect("recipes list");
    assert!(recipes.is_empty());
}

#[tokio::test]
#[ignore]
async fn only_the_author_may_delete() {
    let pool = pool().await;
    let breakfast = tag(&pool).await;
    let author = user(&pool).await;
    let stranger = user(&pool).await;
    let salt = ingredient("salt", "g", &pool).await;

    let view = create_recipe(
        &recipe_form(vec![breakfast], vec![(salt, 1)]),
        &author,
        &RecipeLimits::default(),
        &pool,
    )
    .await
    .ok()
    .expect("recipe is created");

    assert!(delete_recipe(view.id, &stranger, &pool).await.is_err());
    assert!(delete_recipe(view.id, &author, &pool).await.is_ok());
    assert_eq!(
        get_recipe_view(view.id, None, &pool).await.err().map(|e| e.code),
        Some(404)
    );

    let update = recipe_form(vec![breakfast], vec![(salt, 2)]);
    assert_eq!(
        update_recipe(view.id, &update, &author, &RecipeLimits::default(), &pool)
            .await
            .err()
            .map(|e| e.code),
        Some(404)
    );
    assert_eq!(
        delete_recipe(view.id, &author, &pool).await.err().map(|e| e.code),
        Some(404)
    );
}

#[tokio::test]
#[ignore]
async fn relations_conflict_on_second_add() {
    let pool = pool().await;
    let breakfast = tag(&pool).await;
    let author = user(&pool).await;
    let viewer = user(&pool).await;
    let salt = ingredient("salt", "g", &pool).await;

    let view = create_recipe(
        &recipe_form(vec![breakfast], vec![(salt, 1)]),
        &author,
        &RecipeLimits::default(),
        &pool,
    )
    .await
    .ok()
    .expect("recipe is created");

    assert!(add_to_favorites(view.id, &viewer, &pool).await.is_ok());
    assert_eq!(
        add_to_favorites(view.id, &viewer, &pool).await.err().map(|e| e.code),
        Some(409)
    );
    assert!(
        relation_exists(RelationKind::Favorite, viewer.user_id, view.id, &pool)
            .await
            .ok()
            .expect("relation query")
    );
    assert!(
        !relation_exists(RelationKind::ShoppingCart, viewer.user_id, view.id, &pool)
            .await
            .ok()
            .expect("relation query")
    );

    assert!(remove_from_favorites(view.id, &viewer, &pool).await.is_ok());
    assert_eq!(
        remove_from_favorites(view.id, &viewer, &pool)
            .await
            .err()
            .map(|e| e.code),
        Some(404)
    );
}

#[tokio::test]
#[ignore]
async fn subscriptions_reject_self_and_list_authors() {
    let pool = pool().await;
    let author = user(&pool).await;
    let follower = user(&pool).await;

    assert_eq!(
        subscribe(author.user_id, &author, None, &pool)
            .await
            .err()
            .map(|e| e.code),
        Some(400)
    );

    let view = subscribe(author.user_id, &follower, Some(3), &pool)
        .await
        .ok()
        .expect("subscription is created");
    assert!(view.author.is_subscribed);
    assert_eq!(view.recipes_count, 0);

    let list = list_subscriptions(&follower, None, &pool)
        .await
        .ok()
        .expect("subscriptions list");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].author.id, author.user_id);
}

#[tokio::test]
#[ignore]
async fn cart_aggregates_across_recipes() {
    let pool = pool().await;
    let breakfast = tag(&pool).await;
    let author = user(&pool).await;
    let shopper = user(&pool).await;
    let salt = ingredient("salt", "g", &pool).await;
    let pepper = ingredient("pepper", "g", &pool).await;
    let limits = RecipeLimits::default();

    let first = create_recipe(
        &recipe_form(vec![breakfast], vec![(salt, 10), (pepper, 5)]),
        &author,
        &limits,
        &pool,
    )
    .await
    .ok()
    .expect("recipe is created");
    let second = create_recipe(
        &recipe_form(vec![breakfast], vec![(salt, 15)]),
        &author,
        &limits,
        &pool,
    )
        .await
        .ok()
        .expect("recipe is created");

    add_to_shopping_cart(first.id, &shopper, &pool)
        .await
        .ok()
        .expect("carted");
    add_to_shopping_cart(second.id, &shopper, &pool)
        .await
        .ok()
        .expect("carted");

    let list = build_shopping_list(&shopper, &pool)
        .await
        .ok()
        .expect("shopping list builds");
    let amounts: Vec<(usize, i64)> = list.iter().map(|row| (row.number, row.amount)).collect();
    assert_eq!(amounts, vec![(1, 25), (2, 5)]);
}

#[tokio::test]
#[ignore]
async fn emails_are_unique_regardless_of_case() {
    let pool = pool().await;
    let local = unique("cook");

    assert!(register_user(
        &registration(&unique("a"), &format!("{local}@x.com")),
        &pool
    )
    .await
    .is_ok());

    let duplicate = register_user(
        &registration(&unique("b"), &format!("{}@X.com", local.to_uppercase())),
        &pool,
    )
    .await;
    assert_eq!(duplicate.err().map(|e| e.code), Some(409));
}

fn config() -> Config {
    Config {
        database_url: String::new(),
        redis_url: String::new(),
        jwt_secret: String::from("postgres-scenario-secret"),
        token_lifetime_hours: 1,
        limits: RecipeLimits::default(),
        layout: ReportLayout::default(),
    }
}

#[tokio::test]
#[ignore]
async fn changed_password_replaces_the_old_one() {
    let pool = pool().await;
    let cook = user(&pool).await;
    let me = get_me(&cook, &pool).await.ok().expect("profile loads");
    assert_eq!(me.id, cook.user_id);

    let wrong = set_password(
        &PasswordForm {
            current_password: String::from("not my password"),
            new_password: String::from("brand new secret"),
        },
        &cook,
        &pool,
    )
    .await;
    assert!(wrong.is_err());

    set_password(
        &PasswordForm {
            current_password: String::from("correct horse"),
            new_password: String::from("brand new secret"),
        },
        &cook,
        &pool,
    )
    .await
    .ok()
    .expect("password changes");

    let login = |password: &str| TokenForm {
        email: me.email.to_uppercase(),
        password: password.to_string(),
    };
    assert!(login_user(&login("correct horse"), &config(), &pool).await.is_err());
    let token = login_user(&login("brand new secret"), &config(), &pool)
        .await
        .ok()
        .expect("new password logs in");
    assert!(!token.auth_token.is_empty());
}

#[tokio::test]
#[ignore]
async fn user_list_marks_followed_authors() {
    let pool = pool().await;
    let author = user(&pool).await;
    let follower = user(&pool).await;
    subscribe(author.user_id, &follower, None, &pool)
        .await
        .ok()
        .expect("subscription is created");

    let users = list_users(Some(&follower), None, &pool)
        .await
        .ok()
        .expect("users list");
    let flags: Vec<(Id, bool)> = users
        .iter()
        .filter(|u| u.id == author.user_id || u.id == follower.user_id)
        .map(|u| (u.id, u.is_subscribed))
        .collect();
    assert_eq!(
        flags,
        vec![(author.user_id, true), (follower.user_id, false)]
    );
}
