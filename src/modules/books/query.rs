//! Typed query-string input for the search and filter endpoints.

use libris_db::{Filter, FindOptions, Sort, SortDirection};
use libris_http::error::AppError;
use serde::Deserialize;

use super::schema::{self, AUTHOR, GENRE, PUBLISHED_YEAR, TITLE};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Raw `/search` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

/// Free-text match over title, author and genre.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
}

impl SearchQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn filter(&self) -> Filter {
        Filter::Or(
            [TITLE, AUTHOR, GENRE]
                .into_iter()
                .map(|field| Filter::contains_ignore_case(field, self.text.clone()))
                .collect(),
        )
    }
}

impl TryFrom<SearchParams> for SearchQuery {
    type Error = AppError;

    fn try_from(params: SearchParams) -> Result<Self, Self::Error> {
        match params.query.filter(|text| !text.is_empty()) {
            Some(text) => Ok(Self { text }),
            None => Err(AppError::bad_request("Query parameter `query` is required")),
        }
    }
}

/// Raw `/filter` query string. Everything arrives as text so that empty
/// values can be treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub author: Option<String>,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
}

/// Validated structured filter with paging and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookQuery {
    pub author: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub page: u64,
    pub limit: u64,
    pub sort: Option<Sort>,
}

impl BookQuery {
    pub fn filter(&self) -> Filter {
        let mut clauses = Vec::with_capacity(3);
        if let Some(author) = &self.author {
            clauses.push(Filter::contains_ignore_case(AUTHOR, author.clone()));
        }
        if let Some(genre) = &self.genre {
            clauses.push(Filter::eq(GENRE, genre.clone()));
        }
        if let Some(year) = self.year {
            clauses.push(Filter::eq(PUBLISHED_YEAR, year));
        }
        Filter::And(clauses)
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn find_options(&self) -> FindOptions {
        let options = FindOptions::default().skip(self.skip()).limit(self.limit);
        match &self.sort {
            Some(sort) => options.sort(sort.clone()),
            None => options,
        }
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

impl TryFrom<FilterParams> for BookQuery {
    type Error = AppError;

    fn try_from(params: FilterParams) -> Result<Self, Self::Error> {
        let author = present(params.author);
        let genre = present(params.genre);
        let year = present(params.year)
            .map(|year| {
                year.trim().parse::<i64>().map_err(|_| {
                    AppError::bad_request(format!("`year` must be an integer, got '{year}'"))
                })
            })
            .transpose()?;

        if author.is_none() && genre.is_none() && year.is_none() {
            return Err(AppError::bad_request(
                "At least one of `author`, `genre` or `year` is required",
            ));
        }

        Ok(Self {
            author,
            genre,
            year,
            page: positive(params.page, "page", DEFAULT_PAGE)?,
            limit: positive(params.limit, "limit", DEFAULT_LIMIT)?,
            sort: present(params.sort).map(|sort| parse_sort(&sort)).transpose()?,
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn positive(value: Option<String>, name: &str, default: u64) -> Result<u64, AppError> {
    match present(value) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(AppError::bad_request(format!(
                "`{name}` must be a positive integer, got '{raw}'"
            ))),
        },
    }
}

/// `field` sorts ascending, `-field` descending.
fn parse_sort(raw: &str) -> Result<Sort, AppError> {
    let (name, direction) = match raw.strip_prefix('-') {
        Some(name) => (name, SortDirection::Descending),
        None => (raw, SortDirection::Ascending),
    };

    schema::sort_field(name)
        .map(|field| Sort::new(field, direction))
        .ok_or_else(|| AppError::bad_request(format!("Cannot sort by '{raw}'")))
}
