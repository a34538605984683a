// src/services/person_service.rs
use crate::{
    error::{AppError, AppResult},
    models::{
        attendance::{PopulationKind, Scope},
        person::{Person, PersonRow},
    },
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use std::collections::HashMap;

const PERSON_COLUMNS: &str = r#"
    id, sin_number, name, email, role, position_1, position_2,
    department, year, college, mentor, class_advisor, is_deleted
"#;

/// Looks up a non-deleted person by sin_number.
pub async fn find_person_by_sin<'e, E>(executor: E, sin_number: &str) -> AppResult<Option<Person>>
where
    E: SqliteExecutor<'e>,
{
    tracing::debug!("looking up person {}", sin_number);
    let row = sqlx::query_as::<_, PersonRow>(&format!(
        "SELECT {PERSON_COLUMNS} FROM users WHERE sin_number = ?1 AND is_deleted = 0"
    ))
    .bind(sin_number)
    .fetch_optional(executor)
    .await?;

    if row.is_none() {
        tracing::debug!("person {} not found", sin_number);
    }
    Ok(row.map(Person::from))
}

pub async fn get_person_by_sin(db_pool: &SqlitePool, sin_number: &str) -> AppResult<Person> {
    find_person_by_sin(db_pool, sin_number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("person {sin_number}")))
}

/// Non-deleted persons among `sin_numbers`, keyed by sin_number.
pub async fn find_persons_by_sins(
    db_pool: &SqlitePool,
    sin_numbers: &[String],
) -> AppResult<HashMap<String, Person>> {
    let mut persons = HashMap::new();
    for chunk in sin_numbers.chunks(500) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PERSON_COLUMNS} FROM users WHERE is_deleted = 0 AND sin_number IN ("
        ));
        let mut separated = qb.separated(", ");
        for sin in chunk {
            separated.push_bind(sin.clone());
        }
        separated.push_unseparated(")");

        for row in qb.build_query_as::<PersonRow>().fetch_all(db_pool).await? {
            persons.insert(row.sin_number.clone(), Person::from(row));
        }
    }
    Ok(persons)
}

/// Non-deleted persons matching the scope filters, narrowed to one population.
/// Role filtering happens after the fetch because roles are normalized in Rust.
pub async fn find_population(db_pool: &SqlitePool, scope: &Scope, kind: PopulationKind) -> AppResult<Vec<Person>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {PERSON_COLUMNS} FROM users WHERE is_deleted = 0"));

    match scope {
        Scope::Person { sin_number } => {
            qb.push(" AND sin_number = ").push_bind(sin_number.clone());
        }
        Scope::Department { department, year } => {
            qb.push(" AND department = ").push_bind(department.clone());
            if let Some(year) = year {
                qb.push(" AND year = ").push_bind(*year);
            }
        }
        Scope::College { college, department } => {
            qb.push(" AND college = ").push_bind(college.clone());
            if let Some(department) = department {
                qb.push(" AND department = ").push_bind(department.clone());
            }
        }
    }
    qb.push(" ORDER BY department ASC, year ASC, sin_number ASC");

    let rows = qb.build_query_as::<PersonRow>().fetch_all(db_pool).await?;
    let persons: Vec<Person> = rows
        .into_iter()
        .map(Person::from)
        .filter(|p| match kind {
            PopulationKind::Students => p.is_student(),
            PopulationKind::Staff => p.is_staff_like(),
        })
        .collect();

    tracing::debug!("population for {:?} ({:?}): {} persons", scope, kind, persons.len());
    Ok(persons)
}

/// Flags the person as deleted and copies the row into `deleted_users`.
pub async fn soft_delete_person(db_pool: &SqlitePool, sin_number: &str) -> AppResult<()> {
    tracing::info!("soft-deleting person {}", sin_number);
    let deleted_at = Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string();

    let mut tx = db_pool.begin().await?;

    let rows_affected = sqlx::query(
        "UPDATE users SET is_deleted = 1, deleted_at = ?1 WHERE sin_number = ?2 AND is_deleted = 0",
    )
    .bind(&deleted_at)
    .bind(sin_number)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if rows_affected == 0 {
        tracing::warn!("soft delete failed: person {} not found", sin_number);
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("person {sin_number}")));
    }

    sqlx::query(
        r#"
        INSERT OR REPLACE INTO deleted_users
            (id, sin_number, name, email, role, position_1, position_2,
             department, year, college, mentor, class_advisor, deleted_at)
        SELECT id, sin_number, name, email, role, position_1, position_2,
               department, year, college, mentor, class_advisor, deleted_at
        FROM users
        WHERE sin_number = ?1 AND is_deleted = 1 AND deleted_at = ?2
        "#,
    )
    .bind(sin_number)
    .bind(&deleted_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("person {} soft-deleted", sin_number);
    Ok(())
}

/// Reverses a soft delete. Fails with a validation error if another active person
/// has taken the sin_number or email meanwhile.
pub async fn restore_person(db_pool: &SqlitePool, sin_number: &str) -> AppResult<()> {
    tracing::info!("restoring person {}", sin_number);
    let mut tx = db_pool.begin().await?;

    let shadow_id: Option<String> =
        sqlx::query_scalar("SELECT id FROM deleted_users WHERE sin_number = ?1 ORDER BY deleted_at DESC LIMIT 1")
            .bind(sin_number)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(id) = shadow_id else {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("deleted person {sin_number}")));
    };

    let restored = sqlx::query("UPDATE users SET is_deleted = 0, deleted_at = NULL WHERE id = ?1")
        .bind(&id)
        .execute(&mut *tx)
        .await;

    // Partial unique indexes reject the restore when the keys were reused
    if let Err(sqlx::Error::Database(db_err)) = &restored {
        if db_err.is_unique_violation() {
            tracing::warn!("restore of {} collides with an active person", sin_number);
            tx.rollback().await?;
            return Err(AppError::validation(
                "sin_number",
                "an active person already uses this sin_number or email",
            ));
        }
    }
    restored?;

    sqlx::query("DELETE FROM deleted_users WHERE id = ?1")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!("person {} restored", sin_number);
    Ok(())
}
