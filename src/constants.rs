pub const COOKING_TIME_MIN: i32 = 1;
pub const COOKING_TIME_MAX: i32 = 32000;
pub const INGREDIENT_AMOUNT_MIN: i32 = 1;
pub const INGREDIENT_AMOUNT_MAX: i32 = 32000;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_NAME_MAX_LENGTH: usize = 200;
pub const TAG_SLUG_MAX_LENGTH: usize = 200;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 200;
pub const INGREDIENT_UNIT_MAX_LENGTH: usize = 200;

pub const SUBSCRIPTION_RECIPES_LIMIT: i64 = 3;

pub const TOKEN_LIFETIME_HOURS: i64 = 24;

// Shopping list layout, in page points
pub const REPORT_X_POSITION: i32 = 50;
pub const REPORT_Y_POSITION: i32 = 800;
pub const REPORT_LINE_STEP: i32 = 20;
pub const REPORT_Y_THRESHOLD: i32 = 50;

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const SHOPPING_LIST_TITLE: &str = "Shopping list:";
pub const SHOPPING_LIST_EMPTY: &str = "Shopping list is empty!";

pub const TAG_CACHE_KEY: &str = "tag-cache-key";
pub const INGREDIENT_CACHE_KEY: &str = "ingredient-cache-key";

pub const IMAGE_TYPES: &[(&str, &[u8])] = &[
    ("image/png", b"\x89PNG\r\n\x1a\n"),
    ("image/jpeg", b"\xff\xd8\xff"),
    ("image/gif", b"GIF8"),
    ("image/webp", b"RIFF"),
];
