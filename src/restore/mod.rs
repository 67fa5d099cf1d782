//! Whole-database restore from a PostgreSQL dump.
//!
//! The restore is an ordered list of steps. A step with the `Continue`
//! policy logs its failure and lets the pipeline move on; an `Abort` step
//! ends it. The restore counts as successful only when the dump itself was
//! loaded.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::{NetBoxPaths, PostgresConfig};
use crate::process::{CommandRunner, CommandSpec, ProcessOutput};
use crate::utils::remove_empty_dirs;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const MEDIA_SUFFIX: &str = ".media.tar.gz";

const MIGRATE_PREFIX_DESCRIPTIONS: &str = "UPDATE ipam_prefix SET description = \
     (SELECT name from ipam_vrf WHERE id = ipam_prefix.vrf_id) \
     WHERE ((description = '') IS NOT FALSE) AND (vrf_id > 0)";
const STRIP_SECRETS: &str = "TRUNCATE auth_user CASCADE";

/// The snapshot to restore: `explicit` when it names a file, otherwise the
/// most recently modified `*.gz` dump in `preload_dir`
pub fn select_snapshot(explicit: Option<&Path>, preload_dir: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.is_file()) {
        return Some(path.to_path_buf());
    }

    let entries = std::fs::read_dir(preload_dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            name.ends_with(".gz") && !name.ends_with(MEDIA_SUFFIX)
        })
        .map(|p| {
            let modified = std::fs::metadata(&p).and_then(|m| m.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, p)| p)
}

/// `<snapshot minus its last extension>.media.tar.gz`
pub fn media_archive_for(snapshot: &Path) -> PathBuf {
    let stem = snapshot.with_extension("");
    PathBuf::from(format!("{}{}", stem.display(), MEDIA_SUFFIX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    Continue,
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    StopDependents,
    DropDatabase,
    CreateDatabase,
    GrantPrivileges,
    LoadSnapshot,
    MigratePrefixDescriptions,
    StripSecrets,
    StartDependents,
    RunMigrations,
    RecreateAdmin,
    RestoreMedia,
}

impl Step {
    pub const ALL: [Step; 11] = [
        Step::StopDependents,
        Step::DropDatabase,
        Step::CreateDatabase,
        Step::GrantPrivileges,
        Step::LoadSnapshot,
        Step::MigratePrefixDescriptions,
        Step::StripSecrets,
        Step::StartDependents,
        Step::RunMigrations,
        Step::RecreateAdmin,
        Step::RestoreMedia,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::StopDependents => "stop-dependents",
            Step::DropDatabase => "drop-database",
            Step::CreateDatabase => "create-database",
            Step::GrantPrivileges => "grant-privileges",
            Step::LoadSnapshot => "load-snapshot",
            Step::MigratePrefixDescriptions => "migrate-prefix-descriptions",
            Step::StripSecrets => "strip-secrets",
            Step::StartDependents => "start-dependents",
            Step::RunMigrations => "run-migrations",
            Step::RecreateAdmin => "recreate-admin",
            Step::RestoreMedia => "restore-media",
        }
    }

    pub fn policy(&self) -> StepPolicy {
        match self {
            Step::CreateDatabase | Step::LoadSnapshot => StepPolicy::Abort,
            _ => StepPolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Succeeded,
    Failed(String),
    /// Nothing to do, e.g. no media archive next to the dump
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub step: Step,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreOutcome {
    pub snapshot: PathBuf,
    pub steps: Vec<StepResult>,
    pub aborted_at: Option<Step>,
}

impl RestoreOutcome {
    pub fn status(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| &r.status)
    }

    pub fn succeeded(&self) -> bool {
        self.status(Step::LoadSnapshot) == Some(&StepStatus::Succeeded)
    }
}

pub struct RestorePipeline<'a> {
    runner: &'a dyn CommandRunner,
    postgres: &'a PostgresConfig,
    paths: &'a NetBoxPaths,
    snapshot: PathBuf,
}

impl<'a> RestorePipeline<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        postgres: &'a PostgresConfig,
        paths: &'a NetBoxPaths,
        snapshot: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            postgres,
            paths,
            snapshot: snapshot.into(),
        }
    }

    pub async fn run(&self) -> RestoreOutcome {
        tracing::info!("Restoring NetBox database from {}", self.snapshot.display());
        let mut outcome = RestoreOutcome {
            snapshot: self.snapshot.clone(),
            ..Default::default()
        };

        for step in Step::ALL {
            let status = match self.run_step(step).await {
                Ok(status) => status,
                Err(e) => StepStatus::Failed(format!("{:#}", e)),
            };

            let abort = match &status {
                StepStatus::Failed(reason) if step.policy() == StepPolicy::Abort => {
                    tracing::error!("{} failed, abandoning restore: {}", step.name(), reason);
                    true
                }
                StepStatus::Failed(reason) => {
                    tracing::error!("{} failed: {}", step.name(), reason);
                    false
                }
                StepStatus::Skipped => {
                    tracing::debug!("{} skipped", step.name());
                    false
                }
                StepStatus::Succeeded => {
                    tracing::debug!("{} done", step.name());
                    false
                }
            };
            outcome.steps.push(StepResult { step, status });
            if abort {
                outcome.aborted_at = Some(step);
                break;
            }
        }

        if outcome.succeeded() {
            tracing::info!("Restored {}", self.snapshot.display());
        }
        outcome
    }

    async fn run_step(&self, step: Step) -> Result<StepStatus> {
        match step {
            Step::StopDependents => self.supervise("stop").await?,
            Step::DropDatabase => {
                let spec = self.postgres_command("dropdb").arg("-f").arg(&self.postgres.db);
                check(self.runner.run(&spec).await?, false)?;
            }
            Step::CreateDatabase => {
                let spec = self.postgres_command("createdb").arg(&self.postgres.db);
                check(self.runner.run(&spec).await?, false)?;
            }
            Step::GrantPrivileges => {
                let sql = format!(
                    "GRANT ALL PRIVILEGES ON DATABASE {} TO {}",
                    self.postgres.db, self.postgres.user
                );
                self.psql(&sql).await?;
            }
            Step::LoadSnapshot => {
                let snapshot = self.snapshot.clone();
                let dump = tokio::task::spawn_blocking(move || read_dump(&snapshot))
                    .await
                    .context("Snapshot reader task failed")??;
                let spec = self.psql_command().stdin(dump);
                check(self.runner.run(&spec).await?, true)?;
            }
            Step::MigratePrefixDescriptions => self.psql(MIGRATE_PREFIX_DESCRIPTIONS).await?,
            Step::StripSecrets => self.psql(STRIP_SECRETS).await?,
            Step::StartDependents => self.supervise("start").await?,
            Step::RunMigrations => {
                let spec = self.manage_command().arg("migrate");
                check(self.runner.run(&spec).await?, true)?;
            }
            Step::RecreateAdmin => {
                let script = tokio::fs::read(&self.paths.superuser_script)
                    .await
                    .with_context(|| format!("Failed to read {}", self.paths.superuser_script.display()))?;
                let spec = self.manage_command().args(["shell", "--interface", "python"]).stdin(script);
                check(self.runner.run(&spec).await?, true)?;
            }
            Step::RestoreMedia => return self.restore_media().await,
        }
        Ok(StepStatus::Succeeded)
    }

    /// Stop or start every `netbox:*` program except the one running us
    async fn supervise(&self, action: &str) -> Result<()> {
        let script = format!(
            "supervisorctl status netbox:* | grep -v :initialization | awk '{{ print $1 }}' | xargs -r -L 1 -P 4 supervisorctl {}",
            action
        );
        let spec = CommandSpec::new("bash").arg("-c").arg(script);
        check(self.runner.run(&spec).await?, false)
    }

    fn postgres_command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program)
            .args(["-h", self.postgres.host.as_str(), "-U", self.postgres.user.as_str()])
            .env("PGPASSWORD", self.postgres.password.as_str())
    }

    fn psql_command(&self) -> CommandSpec {
        self.postgres_command("psql").arg("-d").arg(&self.postgres.db)
    }

    async fn psql(&self, sql: &str) -> Result<()> {
        let spec = self.psql_command().arg("-c").arg(sql);
        check(self.runner.run(&spec).await?, false)
    }

    fn manage_command(&self) -> CommandSpec {
        let manage = self
            .paths
            .manage_script()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "manage.py".to_string());
        CommandSpec::new(self.paths.venv_python().to_string_lossy())
            .arg(manage)
            .current_dir(self.paths.manage_dir())
    }

    async fn restore_media(&self) -> Result<StepStatus> {
        let archive = media_archive_for(&self.snapshot);
        let media_dir = self.paths.media_dir();
        if !archive.is_file() || !media_dir.is_dir() {
            return Ok(StepStatus::Skipped);
        }

        tokio::task::spawn_blocking(move || extract_media(&archive, &media_dir))
            .await
            .context("Media restore task failed")??;
        Ok(StepStatus::Succeeded)
    }
}

fn check(output: ProcessOutput, require_output: bool) -> Result<()> {
    if !output.success() {
        bail!("exit status {:?}: {:?}", output.code, output.lines);
    }
    if require_output && !output.has_output() {
        bail!("no output");
    }
    Ok(())
}

/// Dump contents, gunzipped when the file carries the gzip magic
fn read_dump(path: &Path) -> Result<Vec<u8>> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw);
    }
    let mut decoded = Vec::new();
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut decoded)
        .with_context(|| format!("Failed to decompress {}", path.display()))?;
    Ok(decoded)
}

fn extract_media(archive: &Path, media_dir: &Path) -> Result<()> {
    remove_empty_dirs(media_dir).with_context(|| format!("Failed to prune {}", media_dir.display()))?;
    let file = File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(media_dir)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    tracing::info!("Restored media from {}", archive.display());
    Ok(())
}
