use warp::{
    http::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE},
    reply::Response,
    Reply,
};

use crate::{
    config::ReportLayout,
    constants::{
        SHOPPING_LIST_CONTENT_TYPE, SHOPPING_LIST_EMPTY, SHOPPING_LIST_FILENAME,
        SHOPPING_LIST_TITLE,
    },
    schema::ShoppingListRow,
};

const PAGE_BREAK: &str = "\x0c";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub x: i32,
    pub y: i32,
    pub text: String,
}

/// Rendered shopping list, ready to be sent as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListDocument {
    pub filename: &'static str,
    pub content_type: &'static str,
    pub pages: Vec<Vec<ReportLine>>,
}

impl ShoppingListDocument {
    pub fn to_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| {
                page.iter()
                    .map(|line| line.text.as_str())
                    .collect::<Vec<&str>>()
                    .join("\n")
            })
            .collect::<Vec<String>>()
            .join(PAGE_BREAK)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_text().into_bytes()
    }
}

impl Reply for ShoppingListDocument {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        let mut response = Response::new(self.to_bytes().into());

        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(SHOPPING_LIST_CONTENT_TYPE),
        );
        match HeaderValue::from_str(&disposition) {
            Ok(value) => {
                headers.insert(CONTENT_DISPOSITION, value);
            }
            Err(_) => log::error!("Invalid export filename {}", self.filename),
        }

        response
    }
}

pub fn format_shopping_list_row(row: &ShoppingListRow) -> String {
    format!(
        "{}. {} - {} {}.",
        row.number, row.name, row.amount, row.measurement_unit
    )
}

/// Lays the list out top to bottom. A line that would land at or below the
/// bottom threshold opens a new page at the starting offset.
pub fn render_report(rows: &[ShoppingListRow], layout: &ReportLayout) -> ShoppingListDocument {
    let lines: Vec<String> = match rows.is_empty() {
        true => vec![SHOPPING_LIST_EMPTY.to_string()],
        false => std::iter::once(SHOPPING_LIST_TITLE.to_string())
            .chain(rows.iter().map(format_shopping_list_row))
            .collect(),
    };

    let mut pages: Vec<Vec<ReportLine>> = vec![vec![]];
    let mut y = layout.y_position;

    for text in lines {
        if y <= layout.y_threshold {
            pages.push(vec![]);
            y = layout.y_position;
        }
        if let Some(page) = pages.last_mut() {
            page.push(ReportLine {
                x: layout.x_position,
                y,
                text,
            });
        }
        y -= layout.line_step;
    }

    ShoppingListDocument {
        filename: SHOPPING_LIST_FILENAME,
        content_type: SHOPPING_LIST_CONTENT_TYPE,
        pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(count: usize) -> Vec<ShoppingListRow> {
        (1..=count)
            .map(|n| ShoppingListRow {
                number: n,
                name: format!("Item {n}"),
                amount: n as i64,
                measurement_unit: String::from("g"),
            })
            .collect()
    }

    #[test]
    fn empty_list_renders_placeholder() {
        let document = render_report(&[], &ReportLayout::default());

        assert_eq!(document.pages.len(), 1);
        assert_eq!(document.to_text(), "Shopping list is empty!");
        assert_eq!(document.filename, "shopping_list.txt");
    }

    #[test]
    fn renders_title_and_numbered_lines() {
        let rows = vec![ShoppingListRow {
            number: 1,
            name: String::from("Salt"),
            amount: 25,
            measurement_unit: String::from("g"),
        }];
        let document = render_report(&rows, &ReportLayout::default());

        assert_eq!(document.to_text(), "Shopping list:\n1. Salt - 25 g.");
        assert_eq!(document.pages[0][0].y, 800);
        assert_eq!(document.pages[0][1].y, 780);
        assert_eq!(document.pages[0][1].x, 50);
    }

    #[test]
    fn breaks_pages_at_threshold() {
        let layout = ReportLayout::default();

        // Title plus 37 rows fills offsets 800 down to 60.
        let document = render_report(&rows(37), &layout);
        assert_eq!(document.pages.len(), 1);

        let document = render_report(&rows(38), &layout);
        assert_eq!(document.pages.len(), 2);
        assert_eq!(document.pages[1].len(), 1);
        assert_eq!(document.pages[1][0].y, 800);
        assert_eq!(document.pages[1][0].text, "38. Item 38 - 38 g.");
        assert_eq!(document.to_text().matches('\x0c').count(), 1);
    }

    #[test]
    fn every_line_stays_above_threshold() {
        let layout = ReportLayout {
            x_position: 10,
            y_position: 100,
            line_step: 30,
            y_threshold: 20,
        };
        let document = render_report(&rows(10), &layout);

        assert!(document
            .pages
            .iter()
            .flatten()
            .all(|line| line.y > layout.y_threshold));
        assert_eq!(document.pages.iter().map(Vec::len).sum::<usize>(), 11);
    }

    #[test]
    fn reply_is_an_attachment() {
        let response = render_report(&rows(1), &ReportLayout::default()).into_response();

        assert_eq!(
            response.headers().get(CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"shopping_list.txt\""
        );
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
