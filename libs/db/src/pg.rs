//! PostgreSQL implementations of `WorkflowStore` and `RunStore`.
//!
//! Operates directly on the `workflows`, `steps`, `runs`, and `run_steps`
//! tables rather than an event log: each call reads or writes whole rows
//! with runtime `query_as` rather than the compile-time-checked `query!`
//! macro, since no `DATABASE_URL` is available at build time for this crate.

use async_trait::async_trait;
use sqlx::PgPool;

use glyph_domain::{
    Run, RunId, RunStep, RunStepId, RunStepStatus, RunStatus, StepType, WorkflowDefinition,
    WorkflowId,
};

use crate::error::StorageError;
use crate::store::{RunStore, WorkflowStore};

/// PostgreSQL-backed workflow definition store.
///
/// `put_workflow` overwrites the single row for a `workflow_id`; there is no
/// append-only version history kept alongside it (see `DESIGN.md`, Open
/// Question 3).
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn get_workflow(
        &self,
        id: &WorkflowId,
    ) -> Result<Option<WorkflowDefinition>, StorageError> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT workflow_id::text, version, name, start_step, definition, created_at
            FROM workflows
            WHERE workflow_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn put_workflow(&self, workflow: &WorkflowDefinition) -> Result<(), StorageError> {
        let definition = serde_json::to_value(workflow)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workflows (workflow_id, version, name, start_step, definition, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (workflow_id) DO UPDATE SET
                version = EXCLUDED.version,
                name = EXCLUDED.name,
                start_step = EXCLUDED.start_step,
                definition = EXCLUDED.definition
            "#,
        )
        .bind(workflow.id.as_uuid())
        .bind(workflow.version)
        .bind(&workflow.name)
        .bind(&workflow.start_step)
        .bind(&definition)
        .bind(workflow.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM steps WHERE workflow_id = $1")
            .bind(workflow.id.as_uuid())
            .execute(&mut *tx)
            .await?;

        for step in &workflow.steps {
            let config = serde_json::to_value(&step.config)?;
            sqlx::query(
                r#"
                INSERT INTO steps (workflow_id, step_id, type, name, next, config)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(workflow.id.as_uuid())
            .bind(&step.step_id)
            .bind(step.step_type.as_str())
            .bind(&step.name)
            .bind(&step.next)
            .bind(&config)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// PostgreSQL-backed run + run-step store.
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(&self, run: &Run) -> Result<(), StorageError> {
        let context = serde_json::to_value(&run.context)?;

        sqlx::query(
            r#"
            INSERT INTO runs (
                run_id, workflow_id, workflow_version, status, current_step,
                context, idempotency_key, started_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(run.id.as_uuid())
        .bind(run.workflow_id.as_uuid())
        .bind(run.workflow_version)
        .bind(run.status.as_str())
        .bind(&run.current_step)
        .bind(&context)
        .bind(&run.idempotency_key)
        .bind(run.started_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.constraint() == Some("runs_workflow_id_fkey") {
                    return StorageError::WorkflowNotFound(run.workflow_id);
                }
            }
            StorageError::Database(e)
        })?;

        Ok(())
    }

    async fn get_run(&self, id: &RunId) -> Result<Option<Run>, StorageError> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT run_id::text, workflow_id::text, workflow_version, status::text,
                   current_step, context, idempotency_key, started_at, updated_at
            FROM runs
            WHERE run_id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_run_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Run>, StorageError> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT run_id::text, workflow_id::text, workflow_version, status::text,
                   current_step, context, idempotency_key, started_at, updated_at
            FROM runs
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_run(&self, run: &Run) -> Result<(), StorageError> {
        let context = serde_json::to_value(&run.context)?;

        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = $2, current_step = $3, context = $4, updated_at = $5
            WHERE run_id = $1
            "#,
        )
        .bind(run.id.as_uuid())
        .bind(run.status.as_str())
        .bind(&run.current_step)
        .bind(&context)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::RunNotFound(run.id));
        }
        Ok(())
    }

    async fn append_run_step(&self, step: &RunStep) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO run_steps (
                run_step_id, run_id, step_id, type, status, output, error,
                started_at, ended_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(step.id.as_uuid())
        .bind(step.run_id.as_uuid())
        .bind(&step.step_id)
        .bind(step.step_type.as_str())
        .bind(step.status.as_str())
        .bind(&step.output)
        .bind(&step.error)
        .bind(step.started_at)
        .bind(step.ended_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.constraint() == Some("run_steps_run_id_fkey") {
                    return StorageError::RunNotFound(step.run_id);
                }
            }
            StorageError::Database(e)
        })?;

        Ok(())
    }

    async fn list_run_steps(&self, run_id: &RunId) -> Result<Vec<RunStep>, StorageError> {
        let rows = sqlx::query_as::<_, RunStepRow>(
            r#"
            SELECT run_step_id::text, run_id::text, step_id, type, status::text,
                   output, error, started_at, ended_at
            FROM run_steps
            WHERE run_id = $1
            ORDER BY started_at ASC
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn commit_step(&self, run: &Run, step: &RunStep) -> Result<(), StorageError> {
        let context = serde_json::to_value(&run.context)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE runs
            SET status = $2, current_step = $3, context = $4, updated_at = $5
            WHERE run_id = $1
            "#,
        )
        .bind(run.id.as_uuid())
        .bind(run.status.as_str())
        .bind(&run.current_step)
        .bind(&context)
        .bind(run.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::RunNotFound(run.id));
        }

        sqlx::query(
            r#"
            INSERT INTO run_steps (
                run_step_id, run_id, step_id, type, status, output, error,
                started_at, ended_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(step.id.as_uuid())
        .bind(step.run_id.as_uuid())
        .bind(&step.step_id)
        .bind(step.step_type.as_str())
        .bind(step.status.as_str())
        .bind(&step.output)
        .bind(&step.error)
        .bind(step.started_at)
        .bind(step.ended_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct WorkflowRow {
    workflow_id: String,
    version: i32,
    name: String,
    start_step: String,
    definition: serde_json::Value,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<WorkflowRow> for WorkflowDefinition {
    type Error = StorageError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        // `definition` already holds the whole serialized struct; the
        // `workflow_id`/`version`/`name`/`start_step` columns are kept
        // alongside it for indexed lookups but re-derived here from the
        // canonical JSON so the two never silently diverge.
        let mut def: Self = serde_json::from_value(row.definition)?;
        def.id = WorkflowId::from_uuid(parse_uuid(&row.workflow_id)?);
        def.version = row.version;
        def.name = row.name;
        def.start_step = row.start_step;
        def.created_at = row.created_at;
        Ok(def)
    }
}

#[derive(sqlx::FromRow)]
struct RunRow {
    run_id: String,
    workflow_id: String,
    workflow_version: i32,
    status: String,
    current_step: Option<String>,
    context: serde_json::Value,
    idempotency_key: Option<String>,
    started_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<RunRow> for Run {
    type Error = StorageError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let id = RunId::from_uuid(parse_uuid(&row.run_id)?);
        let workflow_id = WorkflowId::from_uuid(parse_uuid(&row.workflow_id)?);
        let status: RunStatus = row
            .status
            .parse()
            .map_err(|_| StorageError::RunNotFound(id))?;
        let context = serde_json::from_value(row.context)?;

        Ok(Self {
            id,
            workflow_id,
            workflow_version: row.workflow_version,
            status,
            current_step: row.current_step,
            context,
            idempotency_key: row.idempotency_key,
            started_at: row.started_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RunStepRow {
    run_step_id: String,
    run_id: String,
    step_id: String,
    r#type: String,
    status: String,
    output: Option<serde_json::Value>,
    error: Option<String>,
    started_at: chrono::DateTime<chrono::Utc>,
    ended_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<RunStepRow> for RunStep {
    type Error = StorageError;

    fn try_from(row: RunStepRow) -> Result<Self, Self::Error> {
        let id = RunStepId::from_uuid(parse_uuid(&row.run_step_id)?);
        let run_id = RunId::from_uuid(parse_uuid(&row.run_id)?);
        let step_type: StepType = row
            .r#type
            .parse()
            .map_err(|_| StorageError::RunNotFound(run_id))?;
        let status: RunStepStatus = row
            .status
            .parse()
            .map_err(|_| StorageError::RunNotFound(run_id))?;

        Ok(Self {
            id,
            run_id,
            step_id: row.step_id,
            step_type,
            status,
            output: row.output,
            error: row.error,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

fn parse_uuid(s: &str) -> Result<uuid::Uuid, StorageError> {
    s.parse().map_err(|e: uuid::Error| {
        StorageError::Serialization(serde_json::Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e.to_string(),
        )))
    })
}
