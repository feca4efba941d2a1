use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use staffdir_core::types::{Employee, NewEmployee, Salary};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to operate on employee records.
    pub fn employees(&self) -> EmployeeRepository {
        EmployeeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository responsible for the `employees` table.
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    /// Inserts a new employee row and returns the stored record.
    ///
    /// Identical payloads are never deduplicated; each call creates a
    /// distinct row under its own identifier.
    pub async fn insert(&self, record: NewEmployeeRecord<'_>) -> Result<Employee, EmployeeError> {
        sqlx::query(
            "INSERT INTO employees \
             (id, first_name, last_name, email, salary_cents, department, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.fields.first_name)
        .bind(&record.fields.last_name)
        .bind(&record.fields.email)
        .bind(record.fields.salary.cents())
        .bind(&record.fields.department)
        .bind(to_rfc3339(record.created_at))
        .bind(to_rfc3339(record.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(record.into_employee())
    }

    /// Loads a single employee by identifier.
    pub async fn fetch(&self, id: &str) -> Result<Option<Employee>, EmployeeError> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, first_name, last_name, email, salary_cents, department, \
             created_at, updated_at \
             FROM employees WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(EmployeeRow::into_domain))
    }

    /// Lists all employees ordered by creation time.
    pub async fn list(&self) -> Result<Vec<Employee>, EmployeeError> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            "SELECT id, first_name, last_name, email, salary_cents, department, \
             created_at, updated_at \
             FROM employees ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EmployeeRow::into_domain).collect())
    }
}

/// Data required to create a new row in `employees`.
pub struct NewEmployeeRecord<'a> {
    pub id: String,
    pub fields: &'a NewEmployee,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> NewEmployeeRecord<'a> {
    /// Builds a record with a freshly generated UUID and both timestamps
    /// set to the provided clock reading.
    pub fn generate(fields: &'a NewEmployee, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    fn into_employee(self) -> Employee {
        Employee {
            id: self.id,
            first_name: self.fields.first_name.clone(),
            last_name: self.fields.last_name.clone(),
            email: self.fields.email.clone(),
            salary: self.fields.salary,
            department: self.fields.department.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Representation of an employee row as stored in SQLite.
#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    salary_cents: i64,
    department: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EmployeeRow {
    fn into_domain(self) -> Employee {
        Employee {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            salary: Salary::from_cents(self.salary_cents),
            department: self.department,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Errors that can occur while operating on employee records.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
