use std::collections::HashMap;

use crate::{
    authentication::permissions::ActionType,
    config::ReportLayout,
    error::QueryError,
    jwt::SessionData,
    report::{render_report, ShoppingListDocument},
    schema::{CartIngredientRow, Id, ShoppingListRow},
};

use sqlx::{Pool, Postgres};

/// Every ingredient line of every recipe in the user's cart, in cart order.
pub async fn list_cart_ingredients(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartIngredientRow>, potion::Error> {
    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart sc
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        ORDER BY sc.id, ri.id
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Sums amounts per `(name, unit)` pair. Rows keep the order in which each
/// pair first appears and are numbered from 1.
pub fn aggregate_shopping_list(rows: Vec<CartIngredientRow>) -> Vec<ShoppingListRow> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut list: Vec<ShoppingListRow> = vec![];

    for row in rows {
        let key = (row.name, row.measurement_unit);
        match index.get(&key) {
            Some(&i) => list[i].amount += i64::from(row.amount),
            None => {
                index.insert(key.clone(), list.len());
                list.push(ShoppingListRow {
                    number: list.len() + 1,
                    name: key.0,
                    amount: i64::from(row.amount),
                    measurement_unit: key.1,
                });
            }
        }
    }

    list
}

pub async fn build_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListRow>, potion::Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    let rows = list_cart_ingredients(session.user_id, pool).await?;

    Ok(aggregate_shopping_list(rows))
}

pub async fn download_shopping_cart(
    session: &SessionData,
    layout: &ReportLayout,
    pool: &Pool<Postgres>,
) -> Result<ShoppingListDocument, potion::Error> {
    let list = build_shopping_list(session, pool).await?;
    log::info!(
        "User {} exported a shopping list of {} items",
        session.user_id,
        list.len()
    );

    Ok(render_report(&list, layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn sums_amounts_of_same_ingredient() {
        let list = aggregate_shopping_list(vec![row("Salt", "g", 10), row("Salt", "g", 15)]);

        assert_eq!(
            list,
            vec![ShoppingListRow {
                number: 1,
                name: String::from("Salt"),
                amount: 25,
                measurement_unit: String::from("g"),
            }]
        );
    }

    #[test]
    fn keeps_first_appearance_order_and_units_apart() {
        let list = aggregate_shopping_list(vec![
            row("Pepper", "g", 5),
            row("Milk", "ml", 200),
            row("Milk", "cup", 1),
            row("Pepper", "g", 5),
        ]);

        let lines: Vec<(usize, &str, i64, &str)> = list
            .iter()
            .map(|r| (r.number, r.name.as_str(), r.amount, r.measurement_unit.as_str()))
            .collect();
        assert_eq!(
            lines,
            vec![
                (1, "Pepper", 10, "g"),
                (2, "Milk", 200, "ml"),
                (3, "Milk", 1, "cup"),
            ]
        );
    }

    #[test]
    fn empty_cart_aggregates_to_nothing() {
        assert!(aggregate_shopping_list(vec![]).is_empty());
    }

    #[test]
    fn large_amounts_do_not_overflow() {
        let list = aggregate_shopping_list(vec![row("Flour", "g", i32::MAX), row("Flour", "g", i32::MAX)]);

        assert_eq!(list[0].amount, 2 * i64::from(i32::MAX));
    }
}
