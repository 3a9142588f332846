//! Projection of API records into fixed-column tables.
//!
//! Every expected key must be present; a missing key fails the whole
//! conversion. A key present with JSON `null` becomes a null cell.

use crate::apis::tmdb::{RawMovie, RawMovieDetail};
use crate::error::{IngestError, Result};
use crate::table::{Cell, Column, ColumnType, Row, Table};
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

pub fn movie_columns() -> Vec<Column> {
    vec![
        Column::new("id", ColumnType::Int64),
        Column::new("title", ColumnType::Text),
        Column::new("original_language", ColumnType::Text),
        Column::new("popularity", ColumnType::Float64),
        Column::new("release_date", ColumnType::Date),
        Column::new("genre_ids", ColumnType::Int64List),
        Column::new("vote_average", ColumnType::Float64),
        Column::new("vote_count", ColumnType::Int64),
    ]
}

pub fn financial_columns() -> Vec<Column> {
    vec![
        Column::new("id", ColumnType::Int64),
        Column::new("revenue", ColumnType::Int64),
        Column::new("budget", ColumnType::Int64),
        Column::new("runtime", ColumnType::Int64),
    ]
}

pub fn genre_columns() -> Vec<Column> {
    vec![
        Column::new("genre_id", ColumnType::Int64),
        Column::new("genre_name", ColumnType::Text),
    ]
}

/// One row per listing record, columns as in [`movie_columns`].
pub fn movies_table(movies: &[RawMovie]) -> Result<Table> {
    let columns = movie_columns();
    let mut table = Table::new(columns.clone());
    for movie in movies {
        table.push_row(project(movie, &columns)?)?;
    }
    Ok(table)
}

/// `(id, revenue, budget, runtime)` from one detail record.
pub fn financial_row(detail: &RawMovieDetail) -> Result<Row> {
    project(detail, &financial_columns())
}

/// The `genres` array of one detail record as a `(genre_id, genre_name)` table.
pub fn genres_table(detail: &RawMovieDetail) -> Result<Table> {
    let columns = genre_columns();
    let genres = field(detail, "genres")?
        .as_array()
        .ok_or_else(|| IngestError::coercion("genres", field_text(detail, "genres")))?;

    let mut table = Table::new(columns);
    for genre in genres {
        let id = coerce(field(genre, "id")?, "genre_id", ColumnType::Int64)?;
        let name = coerce(field(genre, "name")?, "genre_name", ColumnType::Text)?;
        table.push_row(vec![id, name])?;
    }
    Ok(table)
}

fn project(record: &Value, columns: &[Column]) -> Result<Row> {
    columns
        .iter()
        .map(|c| coerce(field(record, &c.name)?, &c.name, c.column_type))
        .collect()
}

fn field<'a>(record: &'a Value, name: &str) -> Result<&'a Value> {
    record
        .get(name)
        .ok_or_else(|| IngestError::MissingField(format!("{name} not found")))
}

fn field_text(record: &Value, name: &str) -> String {
    record.get(name).map(Value::to_string).unwrap_or_default()
}

/// Convert one JSON value to a cell of `column_type`.
pub fn coerce(value: &Value, column: &str, column_type: ColumnType) -> Result<Cell> {
    if value.is_null() {
        return Ok(Cell::Null);
    }
    let bad = || IngestError::coercion(column, value);
    let cell = match column_type {
        ColumnType::Int64 => Cell::Int64(value.as_i64().ok_or_else(bad)?),
        ColumnType::Float64 => Cell::Float64(value.as_f64().ok_or_else(bad)?),
        ColumnType::Text => Cell::Text(value.as_str().ok_or_else(bad)?.to_string()),
        ColumnType::Date => {
            let text = value.as_str().ok_or_else(bad)?;
            match parse_date(column, text)? {
                Some(date) => Cell::Date(date),
                None => Cell::Null,
            }
        }
        ColumnType::Int64List => Cell::Int64List(
            value
                .as_array()
                .ok_or_else(bad)?
                .iter()
                .map(|v| v.as_i64().ok_or_else(bad))
                .collect::<Result<Vec<_>>>()?,
        ),
        ColumnType::Timestamp => return Err(bad()),
    };
    Ok(cell)
}

/// `YYYY-MM-DD` or an RFC 3339 timestamp. Blank text is an unknown date.
pub fn parse_date(column: &str, text: &str) -> Result<Option<NaiveDate>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(text)
        .map(|dt| Some(dt.date_naive()))
        .map_err(|_| IngestError::coercion(column, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listing_page_to_one_row() {
        let page = json!({"results":[{"id":1,"title":"A","original_language":"en","popularity":1.0,"release_date":"2020-01-01","genre_ids":[1,2],"vote_average":5.0,"vote_count":10}]});
        let movies = page["results"].as_array().unwrap().clone();

        let table = movies_table(&movies).unwrap();

        assert_eq!(table.num_rows(), 1);
        let row = &table.rows()[0];
        assert_eq!(row[0], Cell::Int64(1));
        assert_eq!(row[1], Cell::Text("A".into()));
        assert_eq!(row[3], Cell::Float64(1.0));
        assert_eq!(
            row[4],
            Cell::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
        );
        assert_eq!(row[5], Cell::Int64List(vec![1, 2]));
        assert_eq!(row[7], Cell::Int64(10));
    }

    #[test]
    fn test_empty_input_keeps_all_columns() {
        let table = movies_table(&[]).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(
            table.column_names(),
            vec![
                "id",
                "title",
                "original_language",
                "popularity",
                "release_date",
                "genre_ids",
                "vote_average",
                "vote_count"
            ]
        );
    }

    #[test]
    fn test_missing_field_fails_whole_table() {
        let movies = vec![
            json!({"id":1,"title":"A","original_language":"en","popularity":1.0,"release_date":"2020-01-01","genre_ids":[],"vote_average":5.0,"vote_count":10}),
            json!({"id":2,"title":"B","original_language":"en","popularity":1.0,"release_date":"2020-01-01","genre_ids":[],"vote_average":5.0}),
        ];
        let err = movies_table(&movies).unwrap_err();
        assert!(matches!(err, IngestError::MissingField(ref f) if f.contains("vote_count")));
    }

    #[test]
    fn test_blank_release_date_is_null() {
        let movies = vec![json!({"id":3,"title":"C","original_language":"fr","popularity":2.5,"release_date":"","genre_ids":[18],"vote_average":0,"vote_count":0})];
        let table = movies_table(&movies).unwrap();
        assert!(table.rows()[0][4].is_null());
        // Integer JSON numbers are accepted for float columns
        assert_eq!(table.rows()[0][6], Cell::Float64(0.0));
    }

    #[test]
    fn test_bad_date_is_coercion_error() {
        let movies = vec![json!({"id":4,"title":"D","original_language":"en","popularity":1.0,"release_date":"sometime in May","genre_ids":[],"vote_average":1.0,"vote_count":1})];
        let err = movies_table(&movies).unwrap_err();
        assert!(matches!(err, IngestError::Coercion { ref column, .. } if column == "release_date"));
    }

    #[test]
    fn test_rfc3339_date_keeps_date_part() {
        assert_eq!(
            parse_date("release_date", "2023-08-02T00:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2023, 8, 2)
        );
    }

    #[test]
    fn test_financial_row_with_null_runtime() {
        let detail = json!({"id": 615656, "revenue": 384056482, "budget": 129000000, "runtime": null, "title": "Meg 2: The Trench"});
        let row = financial_row(&detail).unwrap();
        assert_eq!(
            row,
            vec![
                Cell::Int64(615656),
                Cell::Int64(384056482),
                Cell::Int64(129000000),
                Cell::Null
            ]
        );
    }

    #[test]
    fn test_genres_table_from_detail() {
        let detail = json!({"id": 615656, "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}]});
        let table = genres_table(&detail).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.rows()[1], vec![Cell::Int64(878), Cell::Text("Science Fiction".into())]);
    }

    #[test]
    fn test_genres_must_be_array() {
        let detail = json!({"id": 1, "genres": "Action"});
        assert!(matches!(
            genres_table(&detail),
            Err(IngestError::Coercion { .. })
        ));
    }
}
