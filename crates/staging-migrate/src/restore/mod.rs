//! Staging restore from a text SQL dump through an external database client.

use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{ConnectionParams, RestoreConfig};
use crate::error::{MigrateError, Result};

/// Loads a dump into the staging database.
#[async_trait]
pub trait DumpRestorer: Send + Sync {
    async fn restore(&self, dump_file: &Path) -> Result<()>;
}

/// Pipes the dump into the `mysql` command-line client.
///
/// The password reaches the child through its own `MYSQL_PWD`; the parent
/// environment is left alone and the password never appears in argv.
#[derive(Debug, Clone)]
pub struct MysqlClientRestore {
    client: String,
    params: ConnectionParams,
    timeout: Duration,
}

impl MysqlClientRestore {
    pub fn new(restore: &RestoreConfig, params: ConnectionParams) -> Self {
        Self {
            client: restore.client.clone(),
            params,
            timeout: Duration::from_secs(restore.timeout_secs),
        }
    }

    fn command(&self, dump: std::fs::File) -> Command {
        let mut cmd = Command::new(&self.client);
        cmd.arg(format!("--host={}", self.params.host))
            .arg(format!("--port={}", self.params.port))
            .arg(format!("--user={}", self.params.username))
            .arg(&self.params.database)
            .env("MYSQL_PWD", &self.params.password)
            .stdin(Stdio::from(dump));
        cmd
    }
}

#[async_trait]
impl DumpRestorer for MysqlClientRestore {
    async fn restore(&self, dump_file: &Path) -> Result<()> {
        if !dump_file.is_file() {
            return Err(MigrateError::ExternalProcess(format!(
                "Dump file not found: {}",
                dump_file.display()
            )));
        }
        let dump = std::fs::File::open(dump_file).map_err(|e| {
            MigrateError::ExternalProcess(format!("cannot open {}: {}", dump_file.display(), e))
        })?;

        info!(
            "Restoring {} into {} via {}",
            dump_file.display(),
            self.params.database,
            self.client
        );
        run_bounded(self.command(dump), self.timeout).await?;
        info!("Database restored successfully");
        Ok(())
    }
}

/// Run `cmd` to completion within `limit`, capturing its output.
///
/// Spawn failure, a non-zero exit, and running past `limit` are all
/// `ExternalProcess` errors. A child that runs past `limit` is killed.
pub async fn run_bounded(mut cmd: Command, limit: Duration) -> Result<Output> {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let child = cmd
        .spawn()
        .map_err(|e| MigrateError::ExternalProcess(format!("failed to start {}: {}", program, e)))?;

    // Dropping the timed-out future drops the child, which kills it.
    let output = tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| {
            MigrateError::ExternalProcess(format!(
                "{} timed out after {}s",
                program,
                limit.as_secs_f64()
            ))
        })?
        .map_err(|e| MigrateError::ExternalProcess(format!("{}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MigrateError::ExternalProcess(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    debug!("{} finished: {}", program, output.status);
    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Instant;
    use tempfile::TempDir;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_run_bounded_success_captures_stdout() {
        let out = run_bounded(sh("echo restored"), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "restored");
    }

    #[tokio::test]
    async fn test_run_bounded_nonzero_exit_carries_stderr() {
        let err = run_bounded(sh("echo 'access denied' >&2; exit 3"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::ExternalProcess(ref m) if m.contains("access denied")));
    }

    #[tokio::test]
    async fn test_run_bounded_timeout_kills_child() {
        let started = Instant::now();
        let err = run_bounded(sh("sleep 30"), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_run_bounded_missing_program() {
        let err = run_bounded(
            Command::new("definitely-not-a-mysql-client"),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }

    fn params() -> ConnectionParams {
        ConnectionParams {
            host: "localhost".to_string(),
            port: 3306,
            database: "staging".to_string(),
            username: "root".to_string(),
            password: "s3cret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mysql_client_restore_feeds_dump_on_stdin() {
        let dir = TempDir::new().unwrap();
        let dump = dir.path().join("dump.sql");
        std::fs::write(&dump, "CREATE TABLE orders (id INT);\n").unwrap();

        // Fake client: records its args, password, and stdin.
        let seen = dir.path().join("seen");
        let client = dir.path().join("fake-mysql");
        std::fs::write(
            &client,
            format!(
                "#!/bin/sh\necho \"$@\" > {0}.args\necho \"$MYSQL_PWD\" > {0}.pwd\ncat > {0}.sql\n",
                seen.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&client, std::fs::Permissions::from_mode(0o755)).unwrap();

        let restore = RestoreConfig {
            client: client.display().to_string(),
            timeout_secs: 5,
        };
        MysqlClientRestore::new(&restore, params())
            .restore(&dump)
            .await
            .unwrap();

        let read =
            |ext: &str| std::fs::read_to_string(format!("{}.{}", seen.display(), ext)).unwrap();
        assert_eq!(
            read("args").trim(),
            "--host=localhost --port=3306 --user=root staging"
        );
        assert_eq!(read("pwd").trim(), "s3cret");
        assert_eq!(read("sql"), "CREATE TABLE orders (id INT);\n");
        assert!(std::env::var("MYSQL_PWD").map_or(true, |v| v != "s3cret"));
    }

    #[tokio::test]
    async fn test_missing_dump_file() {
        let dir = TempDir::new().unwrap();
        let err = MysqlClientRestore::new(&RestoreConfig::default(), params())
            .restore(&dir.path().join("absent.sql"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::ExternalProcess(ref m) if m.contains("Dump file not found")
        ));
    }
}
