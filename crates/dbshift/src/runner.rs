//! Migration runner.
//!
//! One invocation runs these steps in order:
//!
//! 1. `--help` / `--version`: print and stop, touching nothing else
//! 2. Resolve the configuration
//! 3. Prompt for the password if needed
//! 4. Create and connect the driver client
//! 5. Run the migration engine
//! 6. Check the returned records
//! 7. Disconnect, whatever happened in 4 to 6
//!
//! Step 3 and steps 4 to 6 are raced against the cancellation token; a
//! cancelled run still disconnects before returning.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigResolver, Driver};
use crate::drivers::{ConnectionParams, DriverClient, QueryExecutor};
use crate::engine::{Action, MigrationEngine, MigrationRecord, MigrationRequest, SqlMigrationEngine};
use crate::error::{Result, ShiftError};
use crate::options::{help_text, version_text, CliArgs};
use crate::prompt::{needs_password, resolve_password, LineInput, TerminalInput};

/// Outcome of a run: `None` when only help or version text was printed.
pub type RunResult = Result<Option<Vec<MigrationRecord>>>;

/// A change in the driver client's connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(Driver),
    Disconnected(Driver),
}

/// Shared log of [`ConnectionEvent`]s, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTrace(Arc<Mutex<Vec<ConnectionEvent>>>);

impl ConnectionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: ConnectionEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// True when every connection opened was closed again.
    pub fn is_released(&self) -> bool {
        let events = self.events();
        let opened = events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::Connected(_)))
            .count();
        let closed = events.len() - opened;
        opened == closed && !matches!(events.last(), Some(ConnectionEvent::Connected(_)))
    }
}

/// Drives one migration invocation.
pub struct MigrationRunner {
    working_dir: PathBuf,
    engine: Arc<dyn MigrationEngine>,
    input: Arc<Mutex<Box<dyn LineInput>>>,
    output: Box<dyn Write + Send>,
    cancel: CancellationToken,
    trace: ConnectionTrace,
}

impl Default for MigrationRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationRunner {
    /// Runner rooted at the current directory, using the built-in SQL
    /// engine, terminal input and stdout.
    pub fn new() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            engine: Arc::new(SqlMigrationEngine::new()),
            input: Arc::new(Mutex::new(Box::new(TerminalInput))),
            output: Box::new(io::stdout()),
            cancel: CancellationToken::new(),
            trace: ConnectionTrace::new(),
        }
    }

    /// Directory the config file, relative patterns and SQLite paths resolve against.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_engine(mut self, engine: impl MigrationEngine + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn with_input(mut self, input: impl LineInput + 'static) -> Self {
        self.input = Arc::new(Mutex::new(Box::new(input)));
        self
    }

    /// Sink for help and version text.
    pub fn with_output(mut self, output: impl Write + Send + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Record connect and disconnect events into `trace`.
    pub fn with_connection_trace(mut self, trace: ConnectionTrace) -> Self {
        self.trace = trace;
        self
    }

    /// Parse a full argument vector (program name first) and run it.
    pub async fn run_args<I, T>(&mut self, argv: I) -> RunResult
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let args = CliArgs::parse_args(argv)?;
        self.run(&args).await
    }

    /// Run one invocation.
    pub async fn run(&mut self, args: &CliArgs) -> RunResult {
        if args.help {
            writeln!(self.output, "{}", help_text())?;
            return Ok(None);
        }
        if args.version {
            writeln!(self.output, "{}", version_text())?;
            return Ok(None);
        }

        let config = ConfigResolver::new(&self.working_dir).resolve(args)?;
        let config = self.prompt_for_password(config).await?;

        let request = MigrationRequest {
            migration_pattern: config.migration_pattern.clone(),
            schema_table: config.schema_table.clone(),
            validate_checksum: config.validate_checksum,
            target: config.target_version,
        };

        let mut client = DriverClient::create(config.driver, self.connection_params(&config));
        let engine = Arc::clone(&self.engine);

        info!(
            "Migrating {} database {} to {}",
            config.driver.display_name(),
            config.endpoint(),
            config.target_version
        );

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ShiftError::Cancelled),
            result = connect_and_migrate(&mut client, engine.as_ref(), &request, &self.trace) => result,
        };

        let was_connected = client.is_connected();
        match client.disconnect().await {
            Ok(()) if was_connected => self.trace.push(ConnectionEvent::Disconnected(config.driver)),
            Ok(()) => {}
            Err(e) => warn!("Disconnect failed: {}", e),
        }

        let records = outcome?;
        info!("Applied {} migration(s)", records.len());
        Ok(Some(records))
    }

    /// The prompt blocks a thread on terminal input, so it runs off the
    /// runtime and a cancellation abandons it instead of waiting for Enter.
    async fn prompt_for_password(&self, config: Config) -> Result<Config> {
        if !needs_password(&config) {
            return Ok(config);
        }

        let input = Arc::clone(&self.input);
        let prompt = tokio::task::spawn_blocking(move || -> Result<Config> {
            let mut input = input
                .lock()
                .map_err(|_| io::Error::other("password input is unavailable"))?;
            resolve_password(&config, &mut **input)
        });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ShiftError::Cancelled),
            joined = prompt => joined.map_err(io::Error::other)?,
        }
    }

    fn connection_params(&self, config: &Config) -> ConnectionParams {
        let mut params = ConnectionParams::from_config(config);
        if config.driver == Driver::Sqlite && params.database != ":memory:" {
            let path = Path::new(&params.database);
            if path.is_relative() {
                params.database = self.working_dir.join(path).to_string_lossy().into_owned();
            }
        }
        params
    }
}

async fn connect_and_migrate(
    client: &mut DriverClient,
    engine: &dyn MigrationEngine,
    request: &MigrationRequest,
    trace: &ConnectionTrace,
) -> Result<Vec<MigrationRecord>> {
    client.connect().await?;
    trace.push(ConnectionEvent::Connected(client.driver()));
    let records = engine.migrate(client, request).await?;
    validate_records(&records)?;
    debug!("Engine returned {} record(s)", records.len());
    Ok(records)
}

/// Records must carry positive versions, share one direction and be in
/// strict application order: ascending for `do`, descending for `undo`.
pub fn validate_records(records: &[MigrationRecord]) -> Result<()> {
    if let Some(bad) = records.iter().find(|r| r.version == 0) {
        return Err(ShiftError::MigrationExecution(format!(
            "Engine returned a {} record without a positive version",
            bad.action
        )));
    }

    let Some(first) = records.first() else {
        return Ok(());
    };
    if records.iter().any(|r| r.action != first.action) {
        return Err(ShiftError::MigrationExecution(
            "Engine returned records mixing do and undo".to_string(),
        ));
    }

    let ordered = records.windows(2).all(|w| match first.action {
        Action::Do => w[0].version < w[1].version,
        Action::Undo => w[0].version > w[1].version,
    });
    if !ordered {
        return Err(ShiftError::MigrationExecution(format!(
            "Engine returned {} records out of order",
            first.action
        )));
    }
    Ok(())
}
