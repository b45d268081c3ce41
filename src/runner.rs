//! Runs one translated query at a time against the active backend and
//! records the outcome.

use std::fmt;
use std::io::Write;
use std::time::Instant;

use tracing::{debug, warn};

use crate::db::{Platform, SqlBackend};
use crate::error::{Error, Result};
use crate::input::TranslatedQuery;
use crate::ledger::ResultLedger;
use crate::naming::TableNaming;
use crate::statement::StatementBuilder;

/// Database holding every persisted result table.
pub const RESULTS_DATABASE: &str = "sempala_results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionMode {
    /// Drop the result table right after counting it.
    pub benchmark: bool,
    /// Only count the rows; never create a table.
    pub count_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub execution_time_ms: u64,
    pub row_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Pending,
    Executing,
    Counting,
    Recorded,
    Failed,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueryState::Pending => "pending",
            QueryState::Executing => "executing",
            QueryState::Counting => "counting",
            QueryState::Recorded => "recorded",
            QueryState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A query that ran to completion within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub file_name: String,
    pub table_name: String,
    pub outcome: ExecutionOutcome,
}

pub struct QueryRunner<'a> {
    backend: &'a dyn SqlBackend,
    statements: StatementBuilder,
    ledger: ResultLedger,
    state: QueryState,
}

impl<'a> QueryRunner<'a> {
    /// `platform` is the value recorded by the run's platform selector and
    /// must match the backend it was selected for.
    pub fn new(backend: &'a dyn SqlBackend, platform: Platform, ledger: ResultLedger) -> Result<Self> {
        if backend.platform() != platform {
            return Err(Error::Configuration(format!(
                "selected platform {} does not match the {} backend",
                platform,
                backend.platform()
            )));
        }
        Ok(Self {
            backend,
            statements: StatementBuilder::new(platform),
            ledger,
            state: QueryState::Pending,
        })
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn ledger(&self) -> &ResultLedger {
        &self.ledger
    }

    fn transition(&mut self, next: QueryState) {
        debug!("query state {} -> {}", self.state, next);
        self.state = next;
    }

    async fn settle(&self) {
        let delay = self.backend.settle_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Run `sql`, persisting into `RESULTS_DATABASE.table_name` unless
    /// counting only, and append the outcome to the ledger.
    ///
    /// Elapsed time covers only the timed statement: in the persist path the
    /// follow-up COUNT is excluded, in count-only mode the COUNT is the
    /// statement.
    pub async fn run(
        &mut self,
        sql: &str,
        table_name: &str,
        mode: ExecutionMode,
    ) -> Result<ExecutionOutcome> {
        self.transition(QueryState::Pending);
        let outcome = match self.execute(sql, table_name, mode).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.transition(QueryState::Failed);
                return Err(e);
            }
        };

        if let Err(e) = self.ledger.append(table_name, &outcome) {
            warn!("{}", e);
        }
        self.transition(QueryState::Recorded);
        Ok(outcome)
    }

    async fn execute(
        &mut self,
        sql: &str,
        table_name: &str,
        mode: ExecutionMode,
    ) -> Result<ExecutionOutcome> {
        self.settle().await;
        self.transition(QueryState::Executing);

        if mode.count_only {
            let count = self.statements.count_rows(sql);
            let start = Instant::now();
            let row_count = self.backend.execute_for_row_count(count.as_str()).await?;
            let execution_time_ms = elapsed_ms(start);
            self.settle().await;
            self.transition(QueryState::Counting);
            self.settle().await;
            return Ok(ExecutionOutcome {
                execution_time_ms,
                row_count,
            });
        }

        let target = StatementBuilder::qualify(RESULTS_DATABASE, table_name);
        let start = Instant::now();
        self.backend.execute_and_persist(sql, &target).await?;
        let execution_time_ms = elapsed_ms(start);
        self.settle().await;

        self.transition(QueryState::Counting);
        let count = self.statements.count_table(&target);
        let row_count = self.backend.execute_for_row_count(count.as_str()).await?;
        self.settle().await;

        if mode.benchmark {
            self.backend.drop_table(&target).await?;
        }

        Ok(ExecutionOutcome {
            execution_time_ms,
            row_count,
        })
    }

    /// Run every query in order, stopping at the first failure.
    ///
    /// A `<file>: <ms> ms <rows> pc` line goes to `progress` as soon as each
    /// query completes, so the lines and ledger entries of earlier queries
    /// survive a later failure.
    pub async fn run_batch<W: Write>(
        &mut self,
        queries: &[TranslatedQuery],
        naming: &TableNaming,
        mode: ExecutionMode,
        progress: &mut W,
    ) -> Result<Vec<QueryRecord>> {
        let mut records = Vec::with_capacity(queries.len());
        for query in queries {
            let table_name = naming.table_name(&query.file_name);
            let outcome = self.run(&query.sql, &table_name, mode).await?;
            let line = format!(
                "{}: {} ms {} pc",
                query.file_name, outcome.execution_time_ms, outcome.row_count
            );
            if let Err(e) = writeln!(progress, "{}", line).and_then(|_| progress.flush()) {
                warn!("Failed to report progress for {}: {}", query.file_name, e);
            }
            records.push(QueryRecord {
                file_name: query.file_name.clone(),
                table_name,
                outcome,
            });
        }
        Ok(records)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
