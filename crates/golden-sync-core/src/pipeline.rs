//! The sync pipeline.
//!
//! ```text
//! INIT → AUTH_PLATFORM → PARSE_EVENT → LOAD_APP → AUTH_HOSTING → PREP_CLONE
//!      → CLONE → CONFIGURE → UPDATE_METADATA → COMMIT_PUSH → NOTIFY_SUCCESS → DONE
//! ```
//!
//! Any stage error moves the run to `FAILED`. Failures go through a single
//! handler that logs, sends the failure report when credentials exist, and
//! then releases the working copy. `DONE` releases it too. There are no
//! retries.

use crate::clone_url::{self, CloneTarget};
use crate::config::Settings;
use crate::context::ExecutionContext;
use crate::error::{Result, SyncError};
use crate::event;
use crate::hosting::{self, HostingClient};
use crate::metadata;
use crate::notify::{Level, Notifier, RunStatus};
use crate::platform::Platform;
use crate::publish;
use crate::secrets::SecretStore;
use crate::workspace::{CleanupRegistry, WorkingCopy};
use std::fmt;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    AuthPlatform,
    ParseEvent,
    LoadApp,
    AuthHosting,
    PrepClone,
    Clone,
    Configure,
    UpdateMetadata,
    CommitPush,
    NotifySuccess,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "INIT",
            Stage::AuthPlatform => "AUTH_PLATFORM",
            Stage::ParseEvent => "PARSE_EVENT",
            Stage::LoadApp => "LOAD_APP",
            Stage::AuthHosting => "AUTH_HOSTING",
            Stage::PrepClone => "PREP_CLONE",
            Stage::Clone => "CLONE",
            Stage::Configure => "CONFIGURE",
            Stage::UpdateMetadata => "UPDATE_METADATA",
            Stage::CommitPush => "COMMIT_PUSH",
            Stage::NotifySuccess => "NOTIFY_SUCCESS",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Stage::Init => "start",
            Stage::AuthPlatform => "authenticate platform",
            Stage::ParseEvent => "parse event",
            Stage::LoadApp => "load application",
            Stage::AuthHosting => "authenticate hosting provider",
            Stage::PrepClone => "prepare clone url",
            Stage::Clone => "clone repository",
            Stage::Configure => "configure commit identity",
            Stage::UpdateMetadata => "update metadata",
            Stage::CommitPush => "commit and push",
            Stage::NotifySuccess => "report success",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Inbound / RunReport
// ---------------------------------------------------------------------------

/// Values supplied by the trigger.
#[derive(Clone, Default)]
pub struct Inbound {
    pub api_key: Option<String>,
    pub nrn: Option<String>,
    pub callback_url: Option<String>,
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbound")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("nrn", &self.nrn)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

#[derive(Debug)]
pub struct RunReport {
    /// `Done` or `Failed`.
    pub stage: Stage,
    pub failed_at: Option<Stage>,
    pub error: Option<SyncError>,
    pub context: ExecutionContext,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    settings: Settings,
    platform: Box<dyn Platform>,
    secrets: Box<dyn SecretStore>,
    hosting: HostingClient,
    registry: CleanupRegistry,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        platform: Box<dyn Platform>,
        secrets: Box<dyn SecretStore>,
    ) -> Self {
        let hosting = HostingClient::new(settings.hosting_api_url.clone());
        Self {
            settings,
            platform,
            secrets,
            hosting,
            registry: CleanupRegistry::new(),
        }
    }

    /// Share a registry with an interrupt handler.
    pub fn with_registry(mut self, registry: CleanupRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Run every stage in order. Never panics on stage failure; the outcome
    /// is in the returned report, and the working copy is gone either way.
    pub fn run(&self, inbound: &Inbound) -> RunReport {
        let notifier = Notifier::new(inbound.callback_url.clone());
        let mut ctx = ExecutionContext::new();
        let mut stage = Stage::Init;
        let mut working_copy: Option<WorkingCopy> = None;

        let result = self.execute(inbound, &notifier, &mut ctx, &mut stage, &mut working_copy);
        let error = result.err();
        if let Some(e) = &error {
            self.handle_failure(&notifier, &ctx, stage, e);
        }
        drop(working_copy);

        match error {
            None => {
                info!(stage = %Stage::Done, "pipeline finished");
                RunReport {
                    stage: Stage::Done,
                    failed_at: None,
                    error: None,
                    context: ctx,
                }
            }
            Some(e) => RunReport {
                stage: Stage::Failed,
                failed_at: Some(stage),
                error: Some(e),
                context: ctx,
            },
        }
    }

    fn execute(
        &self,
        inbound: &Inbound,
        notifier: &Notifier,
        ctx: &mut ExecutionContext,
        stage: &mut Stage,
        working_copy: &mut Option<WorkingCopy>,
    ) -> Result<()> {
        enter(stage, Stage::AuthPlatform, notifier, ctx);
        self.authenticate_platform(inbound, ctx)?;

        enter(stage, Stage::ParseEvent, notifier, ctx);
        self.parse_event(inbound, ctx)?;

        enter(stage, Stage::LoadApp, notifier, ctx);
        self.load_application(ctx)?;

        enter(stage, Stage::AuthHosting, notifier, ctx);
        self.authenticate_hosting(ctx)?;

        enter(stage, Stage::PrepClone, notifier, ctx);
        self.prepare_clone(ctx)?;

        enter(stage, Stage::Clone, notifier, ctx);
        let copy = working_copy.insert(self.clone_repository(ctx)?);

        enter(stage, Stage::Configure, notifier, ctx);
        self.configure_identity(copy)?;

        enter(stage, Stage::UpdateMetadata, notifier, ctx);
        self.update_metadata(ctx)?;

        enter(stage, Stage::CommitPush, notifier, ctx);
        self.commit_and_push(ctx)?;

        enter(stage, Stage::NotifySuccess, notifier, ctx);
        notifier.report_status(ctx.platform_token.as_deref(), RunStatus::Success)
    }

    /// Reads: inbound api key. Writes: `platform_token`.
    pub fn authenticate_platform(
        &self,
        inbound: &Inbound,
        ctx: &mut ExecutionContext,
    ) -> Result<()> {
        let api_key = inbound
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SyncError::missing(Stage::AuthPlatform.description(), "api_key"))?;
        ctx.platform_token = Some(self.platform.exchange_api_key(api_key)?);
        Ok(())
    }

    /// Reads: inbound NRN. Writes: `app_id`.
    pub fn parse_event(&self, inbound: &Inbound, ctx: &mut ExecutionContext) -> Result<()> {
        let app_id = event::app_id_from_nrn(inbound.nrn.as_deref())?;
        info!(%app_id, "resolved application");
        ctx.app_id = Some(app_id);
        Ok(())
    }

    /// Reads: `platform_token`, `app_id`. Writes: `app`.
    pub fn load_application(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let step = Stage::LoadApp.description();
        let token = ctx.require_platform_token(step)?;
        let app_id = ctx.require_app_id(step)?;
        let attrs = self.platform.read_application(token, app_id)?;
        if attrs.repository_url().is_none() {
            return Err(SyncError::missing(step, crate::context::REPOSITORY_URL_KEY));
        }
        info!(attributes = attrs.len(), "loaded application attributes");
        ctx.app = attrs;
        Ok(())
    }

    /// Reads: repository url. Writes: `org`, `hosting_token`.
    pub fn authenticate_hosting(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let step = Stage::AuthHosting.description();
        let org = hosting::org_from_repository_url(ctx.require_repository_url(step)?)?;
        info!(%org, "resolved organization");
        ctx.org = Some(org);

        let secret = self.secrets.lookup(ctx.require_org(step)?)?;
        let now = chrono::Utc::now().timestamp();
        ctx.hosting_token = Some(self.hosting.installation_token(&secret, now)?);
        Ok(())
    }

    /// Reads: repository url, `hosting_token`. Writes: `clone_url`, `repo_path`.
    pub fn prepare_clone(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let step = Stage::PrepClone.description();
        let target = clone_url::build(
            ctx.require_repository_url(step)?,
            ctx.require_hosting_token(step)?,
        )?;
        info!(path = %target.path, "prepared clone url");
        ctx.clone_url = Some(target.url);
        ctx.repo_path = Some(target.path);
        Ok(())
    }

    /// Reads: `clone_url`, `repo_path`. Writes: `working_copy`.
    pub fn clone_repository(&self, ctx: &mut ExecutionContext) -> Result<WorkingCopy> {
        let step = Stage::Clone.description();
        let target = CloneTarget::from_parts(
            ctx.require_clone_url(step)?,
            ctx.repo_path.as_deref().unwrap_or_default(),
        )?;
        let copy = WorkingCopy::clone_into(&self.settings.workspace_dir, &target, &self.registry)?;
        info!(path = %copy.path().display(), "cloned repository");
        ctx.working_copy = Some(copy.path().to_path_buf());
        Ok(copy)
    }

    pub fn configure_identity(&self, copy: &WorkingCopy) -> Result<()> {
        copy.configure_identity(
            &self.settings.commit_author_name,
            &self.settings.commit_author_email,
        )
    }

    /// Reads: `platform_token`, `app_id`, `working_copy`. Writes: `metadata_timestamp`.
    pub fn update_metadata(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let step = Stage::UpdateMetadata.description();
        let token = ctx.require_platform_token(step)?;
        let app_id = ctx.require_app_id(step)?;
        let dir = ctx.require_working_copy(step)?;

        let document = self.platform.read_metadata(token, app_id)?;
        let timestamp = metadata::timestamp_now();
        let path = metadata::write(
            dir,
            &self.settings.metadata_file,
            &metadata::stamp(document, &timestamp),
        )?;
        info!(path = %path.display(), %timestamp, "wrote metadata");
        ctx.metadata_timestamp = Some(timestamp);
        Ok(())
    }

    /// Reads: `working_copy`, `metadata_timestamp`.
    pub fn commit_and_push(&self, ctx: &ExecutionContext) -> Result<()> {
        let dir = ctx.require_working_copy(Stage::CommitPush.description())?;
        publish::commit_and_push(
            dir,
            &self.settings.metadata_file,
            ctx.metadata_timestamp.as_deref(),
        )?;
        Ok(())
    }

    fn handle_failure(
        &self,
        notifier: &Notifier,
        ctx: &ExecutionContext,
        stage: Stage,
        err: &SyncError,
    ) {
        error!(stage = %stage, "{} failed: {err}", stage.description());

        if stage == Stage::NotifySuccess {
            // Reporting is what failed; do not report again.
            error!("success status could not be delivered");
            return;
        }

        let token = ctx.platform_token.as_deref();
        if !notifier.can_send(token) {
            warn!("failure not reported: callback url or platform token unavailable");
            return;
        }

        let message = format!("{} failed: {err}", stage.description());
        if let Err(e) = notifier.must_notify(token, Level::Error, &message) {
            warn!("failed to send failure message: {e}");
        }
        if let Err(e) = notifier.report_status(token, RunStatus::Failed) {
            warn!("failed to send failure status: {e}");
        }
    }
}

fn enter(stage: &mut Stage, next: Stage, notifier: &Notifier, ctx: &ExecutionContext) {
    *stage = next;
    info!(stage = %next, "{}", next.description());
    if next != Stage::NotifySuccess {
        notifier.try_notify(
            ctx.platform_token.as_deref(),
            Level::Info,
            &format!("golden repository sync: {}", next.description()),
        );
    }
}
