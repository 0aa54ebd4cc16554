use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use studyhall_types::Rejection;
use studyhall_types::api::CourseSummary;
use studyhall_types::models::Course;
use uuid::Uuid;

use crate::models::{CourseRow, ts};
use crate::{Database, Result};

fn map_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok(CourseRow {
        id: row.get(0)?,
        code: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Course codes are stored and matched upper-case ("cos 226" -> "COS 226").
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

pub fn create_course(
    conn: &Connection,
    code: &str,
    title: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Course> {
    let code = normalize_code(code);
    if get_course_by_code(conn, &code)?.is_some() {
        return Err(Rejection::conflict(format!("course {code} already exists")).into());
    }

    let course = Course {
        id: Uuid::new_v4(),
        code,
        title: title.trim().to_string(),
        description: description.map(str::trim).filter(|d| !d.is_empty()).map(String::from),
        created_at: now,
    };
    conn.execute(
        "INSERT INTO courses (id, code, title, description, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            course.id.to_string(),
            course.code,
            course.title,
            course.description,
            ts(now)
        ],
    )?;
    Ok(course)
}

pub fn get_course_by_code(conn: &Connection, code: &str) -> Result<Option<Course>> {
    conn.query_row(
        "SELECT id, code, title, description, created_at FROM courses WHERE code = ?1",
        [normalize_code(code)],
        map_course,
    )
    .optional()?
    .map(Course::try_from)
    .transpose()
}

/// Case-insensitive substring search over code and title, ordered by code.
/// Each course carries its number of groups that have not happened yet.
pub fn search_courses(
    conn: &Connection,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<CourseSummary>> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let mut stmt = conn.prepare(
        "SELECT c.id, c.code, c.title, c.description, c.created_at,
                (SELECT COUNT(*) FROM study_groups g
                  WHERE g.course_id = c.id AND g.scheduled_at >= ?1)
         FROM courses c
         WHERE ?2 IS NULL
            OR c.code LIKE ?2 ESCAPE '\\'
            OR c.title LIKE ?2 ESCAPE '\\'
         ORDER BY c.code",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![ts(now), pattern], |row| {
            Ok((map_course(row)?, row.get::<_, i64>(5)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(row, upcoming)| {
            Ok(CourseSummary {
                course: Course::try_from(row)?,
                upcoming_groups: u32::try_from(upcoming).unwrap_or(u32::MAX),
            })
        })
        .collect()
}

/// Removes the course together with its groups, posts, replies and votes.
pub fn delete_course(conn: &Connection, code: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM courses WHERE code = ?1", [normalize_code(code)])?;
    if deleted == 0 {
        return Err(Rejection::not_found("course").into());
    }
    Ok(())
}

impl Database {
    pub fn create_course(
        &self,
        code: &str,
        title: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Course> {
        self.with_tx(|tx| create_course(tx, code, title, description, now))
    }

    pub fn get_course_by_code(&self, code: &str) -> Result<Option<Course>> {
        self.with_conn(|conn| get_course_by_code(conn, code))
    }

    pub fn search_courses(&self, search: Option<&str>, now: DateTime<Utc>) -> Result<Vec<CourseSummary>> {
        self.with_conn(|conn| search_courses(conn, search, now))
    }

    pub fn delete_course(&self, code: &str) -> Result<()> {
        self.with_tx(|tx| delete_course(tx, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use studyhall_types::membership::Capacity;

    #[test]
    fn codes_are_upper_cased() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "cos 226");
        assert_eq!(course.code, "COS 226");
        assert!(db.get_course_by_code("Cos 226").unwrap().is_some());
        assert!(db.create_course("COS 226", "Again", None, Utc::now()).is_err());
    }

    #[test]
    fn search_matches_code_or_title_case_insensitively() {
        let db = fixtures::db();
        db.create_course("MAT 202", "Linear Algebra", None, Utc::now()).unwrap();
        db.create_course("COS 126", "Computer Science: An Interdisciplinary Approach", None, Utc::now())
            .unwrap();
        db.create_course("ECO 100", "Microeconomics", Some("  "), Utc::now()).unwrap();

        let codes = |search: Option<&str>| -> Vec<String> {
            db.search_courses(search, Utc::now())
                .unwrap()
                .into_iter()
                .map(|s| s.course.code)
                .collect()
        };

        assert_eq!(codes(None), ["COS 126", "ECO 100", "MAT 202"]);
        assert_eq!(codes(Some("algebra")), ["MAT 202"]);
        assert_eq!(codes(Some("cos")), ["COS 126"]);
        assert!(codes(Some("100%")).is_empty());
    }

    #[test]
    fn search_counts_upcoming_groups() {
        let db = fixtures::db();
        let course = fixtures::course(&db, "COS 226");
        let host = fixtures::user(&db, "host");
        fixtures::group(&db, &course, &host, Capacity::Limited(4));
        fixtures::group(&db, &course, &host, Capacity::Unlimited);

        let summaries = db.search_courses(None, Utc::now()).unwrap();
        assert_eq!(summaries[0].upcoming_groups, 2);

        let after = Utc::now() + chrono::Duration::days(3);
        assert_eq!(db.search_courses(None, after).unwrap()[0].upcoming_groups, 0);
    }

    #[test]
    fn deleting_missing_course_is_not_found() {
        let db = fixtures::db();
        assert!(db.delete_course("NOPE 101").is_err());
    }
}
