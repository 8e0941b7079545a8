//! Migration runner.
//!
//! This module applies the pending steps of a [`MigrationPlan`] against a
//! database. Each step runs in its own transaction together with its ledger
//! entry: either both land or neither does.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, error, info};

use crate::builder::Expression;
use crate::context::MigrationContext;
use crate::dialect::MigrationDialect;
use crate::error::{MigrateError, Result};
use crate::introspect::{Introspect, SchemaSnapshot};
use crate::ledger::MigrationLedger;
use crate::operations::MigrationOperation;
use crate::step::{MigrationPlan, MigrationStep};

/// Lifecycle of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepState {
    /// Not yet started.
    Pending,
    /// Executing inside its transaction.
    Running,
    /// Executed and recorded in the ledger.
    Applied,
    /// Already in the ledger; not executed again.
    Skipped,
    /// Rolled back; the run stopped here.
    Failed,
}

/// What happened to one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Step identifier.
    pub step: String,
    /// Final state.
    pub state: StepState,
    /// Number of statements executed.
    pub statements: usize,
}

/// Outcome of a successful run, one entry per step of the plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Outcomes in execution order.
    pub outcomes: Vec<StepOutcome>,
}

impl RunReport {
    /// Identifiers of the steps applied by this run.
    #[must_use]
    pub fn applied(&self) -> Vec<&str> {
        self.with_state(StepState::Applied)
    }

    /// Identifiers of the steps skipped because they were already recorded.
    #[must_use]
    pub fn skipped(&self) -> Vec<&str> {
        self.with_state(StepState::Skipped)
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn with_state(&self, state: StepState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.step.as_str())
            .collect()
    }
}

/// Applies migration steps against a database.
pub struct MigrationRunner<D: MigrationDialect> {
    pool: SqlitePool,
    dialect: D,
    ledger: MigrationLedger,
}

impl<D: MigrationDialect> MigrationRunner<D> {
    /// Creates a new runner.
    pub fn new(pool: SqlitePool, dialect: D) -> Self {
        let ledger = MigrationLedger::new(pool.clone());
        Self {
            pool,
            dialect,
            ledger,
        }
    }

    /// Ensures the ledger table exists.
    pub async fn init(&self) -> Result<()> {
        self.ledger.ensure_table().await
    }

    /// Returns the ledger.
    #[must_use]
    pub fn ledger(&self) -> &MigrationLedger {
        &self.ledger
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Returns the steps of `plan` not yet recorded, in execution order.
    pub async fn pending<'p>(&self, plan: &'p MigrationPlan) -> Result<Vec<&'p MigrationStep>> {
        let recorded = self.ledger.recorded_steps(plan.product()).await?;
        Ok(plan.pending(&recorded))
    }

    /// Applies every pending step of `plan`, in order.
    ///
    /// Stops at the first failure: that step is rolled back and the error,
    /// which names the step, is returned. Steps applied before it stay
    /// applied.
    pub async fn run(&self, plan: &MigrationPlan) -> Result<RunReport> {
        self.init().await?;
        let recorded = self.ledger.recorded_steps(plan.product()).await?;

        let mut report = RunReport::default();
        for step in plan.steps() {
            let id = step.id();
            if recorded.contains(&id) {
                debug!(step = %id, "Step already recorded, skipping");
                report.outcomes.push(StepOutcome {
                    step: id,
                    state: StepState::Skipped,
                    statements: 0,
                });
                continue;
            }

            let statements = self.apply(step).await?;
            report.outcomes.push(StepOutcome {
                step: id,
                state: StepState::Applied,
                statements,
            });
        }

        info!(
            product = plan.product(),
            applied = report.applied().len(),
            skipped = report.skipped().len(),
            "Migration run complete"
        );
        Ok(report)
    }

    /// Applies a single step unless it is already recorded.
    pub async fn run_step(&self, step: &MigrationStep) -> Result<StepState> {
        self.init().await?;
        if self.ledger.is_recorded(step.product, &step.id()).await? {
            debug!(step = %step.id(), "Step already recorded, skipping");
            return Ok(StepState::Skipped);
        }
        self.apply(step).await?;
        Ok(StepState::Applied)
    }

    async fn apply(&self, step: &MigrationStep) -> Result<usize> {
        let id = step.id();
        info!(step = %id, from = ?StepState::Pending, to = ?StepState::Running, "Running migration step");

        match self.execute(step, &id).await {
            Ok(statements) => {
                info!(step = %id, statements, state = ?StepState::Applied, "Migration step applied");
                Ok(statements)
            }
            Err(e) => {
                error!(step = %id, state = ?StepState::Failed, error = %e, "Migration step failed, rolled back");
                Err(e.in_step(&id))
            }
        }
    }

    // Dropping the transaction on any early return rolls it back.
    async fn execute(&self, step: &MigrationStep, id: &str) -> Result<usize> {
        let builder = step.build();
        let mut tx = self.pool.begin().await?;
        let mut executed = 0;

        for expression in builder.expressions() {
            let schema = if expression.needs_schema() {
                tx.introspect().await?
            } else {
                SchemaSnapshot::new()
            };

            if let Expression::Operation(op) = expression {
                if existing_object_allowed(op, &schema)? {
                    debug!(step = %id, operation = %op.description(), "Object exists, skipping");
                    continue;
                }
            }

            let ctx = MigrationContext::new(&self.dialect, schema, id);
            let statements = expression.render(&ctx)?;
            // Code expressions may return several statements in one block.
            let raw = matches!(expression, Expression::Code(_));

            for sql in statements {
                debug!(step = %id, sql = %sql, "Executing SQL");
                let result = if raw {
                    sqlx::raw_sql(&sql).execute(&mut *tx).await
                } else {
                    sqlx::query(&sql).execute(&mut *tx).await
                };
                result.map_err(|source| MigrateError::StepFailed {
                    step: id.to_string(),
                    statement: sql.clone(),
                    source,
                })?;
                executed += 1;
            }
        }

        self.ledger
            .record(&mut tx, step)
            .await
            .map_err(|source| MigrateError::LedgerWrite {
                step: id.to_string(),
                source,
            })?;

        tx.commit().await.map_err(|source| MigrateError::StepFailed {
            step: id.to_string(),
            statement: "COMMIT".to_string(),
            source,
        })?;
        Ok(executed)
    }

    /// Renders a step with this runner's dialect against the live schema,
    /// without executing it.
    pub async fn sql_for(&self, step: &MigrationStep) -> Result<Vec<String>> {
        self.sql_for_dialect(step, &self.dialect).await
    }

    /// Renders a step with another dialect against the live schema.
    pub async fn sql_for_dialect(
        &self,
        step: &MigrationStep,
        dialect: &dyn MigrationDialect,
    ) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        let schema = conn.introspect().await?;
        drop(conn);

        let id = step.id();
        let ctx = MigrationContext::new(dialect, schema, &id);
        step.build().statements(&ctx).map_err(|e| e.in_step(&id))
    }
}

/// Checks a create operation against the live schema.
///
/// Returns `Ok(true)` when the object exists and the operation allows that,
/// `Ok(false)` when the object is absent, and a conflict otherwise.
fn existing_object_allowed(op: &MigrationOperation, schema: &SchemaSnapshot) -> Result<bool> {
    let existing = match op {
        MigrationOperation::CreateTable {
            table,
            if_not_exists,
        } if schema.has_table(&table.name) => Some(("table", &table.name, *if_not_exists)),
        MigrationOperation::CreateIndex {
            index,
            if_not_exists,
        } if schema.has_index(&index.name) => Some(("index", &index.name, *if_not_exists)),
        MigrationOperation::AddColumn { table, column } if schema.has_column(table, &column.name) => {
            Some(("column", &column.name, false))
        }
        MigrationOperation::CreateForeignKey { foreign_key, .. }
            if schema.has_constraint(&foreign_key.name) =>
        {
            Some(("foreign key", &foreign_key.name, false))
        }
        MigrationOperation::CreatePrimaryKey { primary_key, .. }
            if schema.has_constraint(&primary_key.name) =>
        {
            Some(("primary key", &primary_key.name, false))
        }
        _ => None,
    };

    match existing {
        None => Ok(false),
        Some((_, _, true)) => Ok(true),
        Some((kind, name, false)) => Err(MigrateError::SchemaConflict {
            kind,
            name: name.clone(),
        }),
    }
}
