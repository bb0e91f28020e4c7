use std::collections::HashSet;

use crate::{
    config::RecipeLimits,
    constants::{RECIPE_NAME_MAX_LENGTH, TAG_NAME_MAX_LENGTH, TAG_SLUG_MAX_LENGTH},
    error::ValidationError,
    media::RecipeImage,
    schema::{Id, IngredientAmount, RecipeForm, TagForm},
};

/// A recipe payload that passed every composition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecipe {
    pub name: String,
    pub image: Option<RecipeImage>,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Id>,
    pub ingredients: Vec<IngredientAmount>,
}

/// Checks a recipe payload against the configured bounds and the ids known to exist.
///
/// `known_tags` and `known_ingredients` only need to contain the ids referenced
/// by the form. Tag ids may repeat in the payload; they are deduplicated in order.
pub fn validate_recipe(
    form: &RecipeForm,
    limits: &RecipeLimits,
    known_tags: &HashSet<Id>,
    known_ingredients: &HashSet<Id>,
    image_required: bool,
) -> Result<ValidRecipe, ValidationError> {
    let mut error = ValidationError::new();

    let name = form.name.trim();
    if name.is_empty() {
        error.push("name", "Name is required");
    } else if name.chars().count() > RECIPE_NAME_MAX_LENGTH {
        error.push(
            "name",
            &format!("Name must be at most {RECIPE_NAME_MAX_LENGTH} characters"),
        );
    }

    if form.text.trim().is_empty() {
        error.push("text", "Text is required");
    }

    if form.cooking_time < limits.cooking_time_min || form.cooking_time > limits.cooking_time_max
    {
        error.push(
            "cooking_time",
            &format!(
                "Cooking time must be between {} and {} minutes",
                limits.cooking_time_min, limits.cooking_time_max
            ),
        );
    }

    let image = match form.image.as_deref() {
        Some(payload) => match RecipeImage::from_payload(payload) {
            Ok(image) => Some(image),
            Err(e) => {
                e.messages("image")
                    .iter()
                    .for_each(|message| error.push("image", message));
                None
            }
        },
        None => {
            if image_required {
                error.push("image", "Image is required");
            }
            None
        }
    };

    let mut tags: Vec<Id> = vec![];
    if form.tags.is_empty() {
        error.push("tags", "At least one tag is required");
    }
    for tag in form.tags.iter() {
        if !known_tags.contains(tag) {
            error.push("tags", &format!("Tag {tag} does not exist"));
        } else if !tags.contains(tag) {
            tags.push(*tag);
        }
    }

    let mut seen: HashSet<Id> = HashSet::new();
    if form.ingredients.is_empty() {
        error.push("ingredients", "At least one ingredient is required");
    }
    for ingredient in form.ingredients.iter() {
        if !known_ingredients.contains(&ingredient.id) {
            error.push(
                "ingredients",
                &format!("Ingredient {} does not exist", ingredient.id),
            );
        }
        if !seen.insert(ingredient.id) {
            error.push(
                "ingredients",
                &format!("Ingredient {} is listed more than once", ingredient.id),
            );
        }
        if ingredient.amount < limits.amount_min || ingredient.amount > limits.amount_max {
            error.push(
                "ingredients",
                &format!(
                    "Amount of ingredient {} must be between {} and {}",
                    ingredient.id, limits.amount_min, limits.amount_max
                ),
            );
        }
    }

    error.finish(ValidRecipe {
        name: name.to_string(),
        image,
        text: form.text.to_owned(),
        cooking_time: form.cooking_time,
        tags,
        ingredients: form.ingredients.to_owned(),
    })
}

pub fn validate_tag(form: &TagForm) -> Result<(), ValidationError> {
    let mut error = ValidationError::new();

    let name = form.name.trim();
    if name.is_empty() || name.chars().count() > TAG_NAME_MAX_LENGTH {
        error.push(
            "name",
            &format!("Name must be 1 to {TAG_NAME_MAX_LENGTH} characters"),
        );
    }

    let color = form.color.strip_prefix('#').unwrap_or("");
    if color.len() != 6 || !color.chars().all(|c| c.is_ascii_hexdigit()) {
        error.push("color", "Color must be a hex value like #E26C2D");
    }

    if form.slug.is_empty()
        || form.slug.len() > TAG_SLUG_MAX_LENGTH
        || !form
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        error.push(
            "slug",
            "Slug may only contain latin letters, digits, hyphens and underscores",
        );
    }

    error.finish(())
}
