//! Application session
//!
//! Everything a front end shows lives here: the pipeline list, the selected
//! pipeline and its run history, and the definition being edited. Failed
//! operations raise an error notification and leave the previous state in
//! place; only a successful response replaces it.
//!
//! Operations take `&mut self`, so one session never has two requests in
//! flight and a late response cannot overwrite a newer one.

use conveyor_core::domain::pipeline::PipelineDefinition;
use conveyor_core::dto::pipeline::PipelineSummary;
use conveyor_core::error::ModelError;
use conveyor_core::history::{RunHistory, aggregate};
use conveyor_core::notification::{Notification, NotificationScheduler};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::pipelines::PipelineApi;
use crate::transport::Transport;

/// Whether the editor registers a new pipeline or updates an existing one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    /// Editing the pipeline registered as `name`; the name cannot change
    Edit { name: String },
}

/// Pipeline under edit
#[derive(Debug, Clone, PartialEq)]
pub struct Editor {
    pub mode: EditorMode,
    pub draft: PipelineDefinition,
}

impl Editor {
    /// Whether this editor updates the registered pipeline `name`
    pub fn is_editing(&self, name: &str) -> bool {
        matches!(&self.mode, EditorMode::Edit { name: n } if n == name)
    }
}

pub struct Session<T> {
    transport: T,
    notifications: NotificationScheduler,
    pipelines: Vec<PipelineSummary>,
    selected: Option<String>,
    runs: RunHistory,
    editor: Option<Editor>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, notifications: NotificationScheduler) -> Self {
        Self {
            transport,
            notifications,
            pipelines: Vec::new(),
            selected: None,
            runs: RunHistory::NoRuns,
            editor: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn notifications(&self) -> &NotificationScheduler {
        &self.notifications
    }

    pub fn pipelines(&self) -> &[PipelineSummary] {
        &self.pipelines
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn runs(&self) -> &RunHistory {
        &self.runs
    }

    pub fn editor(&self) -> Option<&Editor> {
        self.editor.as_ref()
    }

    fn notify_error(&self, context: &str, err: &ClientError) {
        warn!("{}: {}", context, err);
        self.notifications
            .display(Notification::error(format!("{}: {}", context, err)));
    }

    // =============================================================================
    // Pipeline list
    // =============================================================================

    /// Refresh the pipeline list
    ///
    /// # Returns
    /// `true` if the list was replaced
    pub async fn load_pipelines(&mut self) -> bool {
        match self.transport.list_pipelines().await {
            Ok(pipelines) => {
                debug!("Loaded {} pipelines", pipelines.len());
                self.pipelines = pipelines;
                true
            }
            Err(e) => {
                self.notify_error("An error occurred fetching pipelines", &e);
                false
            }
        }
    }

    /// Select a pipeline, or clear the selection with `None`
    ///
    /// The run history is cleared until [`Session::load_runs`] is called.
    pub fn select(&mut self, name: Option<&str>) {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if self.selected.as_deref() != name {
            self.runs = RunHistory::NoRuns;
        }
        self.selected = name.map(str::to_string);
    }

    /// Fetch the run history of the selected pipeline
    pub async fn load_runs(&mut self) -> bool {
        let Some(name) = self.selected.clone() else {
            self.runs = RunHistory::NoRuns;
            return true;
        };

        match self.transport.list_runs(&name).await {
            Ok(records) => {
                self.runs = aggregate(&records);
                true
            }
            Err(e) => {
                self.notify_error("An error occurred fetching pipeline runs", &e);
                false
            }
        }
    }

    // =============================================================================
    // Editor
    // =============================================================================

    /// Open the editor on a blank template
    pub fn begin_create(&mut self) {
        self.editor = Some(Editor {
            mode: EditorMode::Create,
            draft: PipelineDefinition::template(),
        });
    }

    /// Open the editor on the registered definition of `name`
    ///
    /// A successful response without a body leaves the editor closed.
    pub async fn begin_edit(&mut self, name: &str) -> bool {
        match self.transport.get_pipeline(name).await {
            Ok(Some(record)) => {
                self.editor = Some(Editor {
                    mode: EditorMode::Edit {
                        name: record.name.clone(),
                    },
                    draft: PipelineDefinition::from(record),
                });
                true
            }
            Ok(None) => {
                warn!("Pipeline '{}' has no definition to edit", name);
                false
            }
            Err(e) => {
                self.notify_error("An error occurred fetching the pipeline", &e);
                false
            }
        }
    }

    /// Apply an edit operation to the draft
    ///
    /// In edit mode the pipeline name is pinned to the registered one.
    /// Does nothing when no editor is open.
    ///
    /// # Example
    /// ```
    /// # use conveyor_client::{ConveyorClient, Session};
    /// # use conveyor_core::domain::StageField;
    /// # use conveyor_core::notification::NotificationScheduler;
    /// let mut session = Session::new(
    ///     ConveyorClient::new("http://localhost:8080"),
    ///     NotificationScheduler::default(),
    /// );
    /// session.begin_create();
    /// session.edit(|p| Ok(p.with_name("build")))?;
    /// session.edit(|p| p.set_stage_field(0, StageField::Task("make".into())))?;
    /// # Ok::<(), conveyor_core::ModelError>(())
    /// ```
    pub fn edit<F>(&mut self, op: F) -> Result<(), ModelError>
    where
        F: FnOnce(&PipelineDefinition) -> Result<PipelineDefinition, ModelError>,
    {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(());
        };

        let mut next = op(&editor.draft)?;
        if let EditorMode::Edit { name } = &editor.mode {
            if &next.name != name {
                debug!("Ignoring rename of '{}' in edit mode", name);
                next.name = name.clone();
            }
        }
        editor.draft = next;
        Ok(())
    }

    /// Validate and send the draft
    ///
    /// On success the editor closes and the list is refreshed. On failure the
    /// draft is kept as typed.
    pub async fn submit(&mut self) -> bool {
        let Some(editor) = self.editor.as_ref() else {
            return false;
        };

        let result = match editor.mode {
            EditorMode::Create => self.transport.create_pipeline(&editor.draft).await,
            EditorMode::Edit { .. } => self.transport.update_pipeline(&editor.draft).await,
        };

        match result {
            Ok(msg) => {
                info!("Saved pipeline '{}'", editor.draft.name);
                let msg = if msg.is_empty() {
                    format!("Pipeline '{}' saved", editor.draft.name)
                } else {
                    msg
                };
                self.notifications.display(Notification::success(msg));
                self.editor = None;
                self.load_pipelines().await;
                true
            }
            Err(ClientError::Invalid(e)) => {
                self.notifications
                    .display(Notification::error(e.to_string()));
                false
            }
            Err(e) => {
                self.notify_error("An error occurred saving the pipeline", &e);
                false
            }
        }
    }

    /// Discard the draft
    pub fn close_editor(&mut self) {
        self.editor = None;
    }

    /// Delete a registered pipeline
    ///
    /// Clears the selection and closes the editor if either refers to it.
    pub async fn delete(&mut self, name: &str) -> bool {
        match self.transport.delete_pipeline(name).await {
            Ok(msg) => {
                info!("Deleted pipeline '{}'", name);
                self.notifications.display(Notification::success(msg));
                if self.selected.as_deref() == Some(name) {
                    self.select(None);
                }
                if self.editor.as_ref().is_some_and(|e| e.is_editing(name)) {
                    self.editor = None;
                }
                self.load_pipelines().await;
                true
            }
            Err(e) => {
                self.notify_error("An error occurred deleting the pipeline", &e);
                false
            }
        }
    }

    // =============================================================================
    // Runs
    // =============================================================================

    /// Start a run of `name`
    pub async fn launch(&mut self, name: &str) -> bool {
        match self.transport.launch_pipeline(name).await {
            Ok(msg) => {
                self.notifications.display(Notification::info(msg));
                true
            }
            Err(e) => {
                self.notify_error("An error occurred launching the pipeline", &e);
                false
            }
        }
    }

    /// Cancel the active run of `name`
    pub async fn cancel(&mut self, name: &str) -> bool {
        match self.transport.cancel_pipeline(name).await {
            Ok(msg) => {
                self.notifications.display(Notification::warning(msg));
                true
            }
            Err(e) => {
                self.notify_error("An error occurred cancelling the pipeline", &e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Envelope;
    use crate::transport::fake::FakeTransport;
    use conveyor_core::domain::stage::StageField;
    use conveyor_core::notification::NotificationKind;
    use reqwest::Method;
    use serde_json::json;

    fn session(replies: Vec<Envelope>) -> Session<FakeTransport> {
        Session::new(FakeTransport::new(replies), NotificationScheduler::default())
    }

    fn summaries(names: &[&str]) -> Envelope {
        Envelope::ok(json!(
            names
                .iter()
                .map(|n| json!({"name": n, "status": "idle", "last_run": 0}))
                .collect::<Vec<_>>()
        ))
    }

    fn notice(session: &Session<FakeTransport>) -> Notification {
        session.notifications().current().expect("a notification")
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_list() {
        let mut s = session(vec![
            summaries(&["build", "deploy"]),
            Envelope::failed(Some(500), "database locked"),
        ]);

        assert!(s.load_pipelines().await);
        assert_eq!(s.pipelines().len(), 2);

        assert!(!s.load_pipelines().await);
        assert_eq!(s.pipelines().len(), 2);

        let n = notice(&s);
        assert_eq!(n.kind, NotificationKind::Error);
        assert!(n.message.contains("database locked"));
    }

    #[tokio::test]
    async fn test_select_and_load_runs() {
        let mut s = session(vec![
            Envelope::ok(json!([
                {"startedAt": "2024-01-01T00:00:00Z", "endedAt": "2024-01-01T00:02:05Z", "successful": true, "stages": []},
                {"startedAt": "2024-01-02T00:00:00Z", "endedAt": "0001-01-01T00:00:00Z", "successful": false, "stages": null}
            ])),
            Envelope::ok(serde_json::Value::Null),
        ]);

        s.select(Some("build"));
        assert!(s.load_runs().await);
        let RunHistory::Runs(runs) = s.runs() else {
            panic!("expected runs");
        };
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].duration.as_deref(), Some("2m 5s"));
        assert!(runs[1].duration.is_none());

        s.select(Some("deploy"));
        assert!(s.runs().is_empty());
        assert!(s.load_runs().await);
        assert!(s.runs().is_empty());
        assert_eq!(s.transport().calls()[1].path, "/api/pipelines/deploy/runs");
    }

    #[tokio::test]
    async fn test_load_runs_without_selection_sends_nothing() {
        let mut s = session(vec![]);
        s.select(Some("   "));
        assert!(s.selected().is_none());
        assert!(s.load_runs().await);
        assert!(s.transport().calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_submit_keeps_draft_and_sends_nothing() {
        let mut s = session(vec![]);
        s.begin_create();
        s.edit(|p| Ok(p.with_name("build"))).unwrap();

        assert!(!s.submit().await);
        assert!(s.transport().calls().is_empty());
        assert_eq!(s.editor().unwrap().draft.name, "build");
        assert_eq!(notice(&s).message, "Stage name cannot be empty");
    }

    #[tokio::test]
    async fn test_create_submit_closes_editor_and_refreshes() {
        let mut s = session(vec![
            Envelope::ok(json!({"msg": "Pipeline registered"})),
            summaries(&["build"]),
        ]);
        s.begin_create();
        s.edit(|p| Ok(p.with_name("build"))).unwrap();
        s.edit(|p| p.set_stage_field(0, StageField::Name("compile".into())))
            .unwrap();
        s.edit(|p| p.set_stage_field(0, StageField::Task("make".into())))
            .unwrap();

        assert!(s.submit().await);
        assert!(s.editor().is_none());
        assert_eq!(s.pipelines()[0].name, "build");

        let n = notice(&s);
        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.message, "Pipeline registered");

        let calls = s.transport().calls();
        assert_eq!(calls[0].path, "/api/pipelines/register/json");
        assert_eq!(calls[1].method, Method::GET);
    }

    #[tokio::test]
    async fn test_edit_mode_pins_name_and_patches() {
        let mut s = session(vec![
            Envelope::ok(json!({
                "Name": "build",
                "Parallel": false,
                "Stages": [{"Name": "compile", "Task": "make", "Env": ["CC=clang"]}],
                "Variables": {"TARGET": "release"}
            })),
            Envelope::failed(Some(400), "stage 'compile' is running"),
        ]);

        assert!(s.begin_edit("build").await);
        s.edit(|p| Ok(p.with_name("renamed").with_parallel(true)))
            .unwrap();

        let editor = s.editor().unwrap();
        assert_eq!(editor.mode, EditorMode::Edit { name: "build".into() });
        assert_eq!(editor.draft.name, "build");
        assert!(editor.draft.parallel);
        assert_eq!(editor.draft.variables.len(), 1);

        assert!(!s.submit().await);
        assert!(s.editor().is_some());
        assert!(notice(&s).message.contains("stage 'compile' is running"));

        let call = &s.transport().calls()[1];
        assert_eq!(call.method, Method::PATCH);
        assert_eq!(call.path, "/api/pipelines/build");
    }

    #[tokio::test]
    async fn test_begin_edit_without_body_keeps_editor_closed() {
        let mut s = session(vec![Envelope::ok(serde_json::Value::Null)]);
        assert!(!s.begin_edit("ghost").await);
        assert!(s.editor().is_none());
        assert!(s.notifications().current().is_none());
    }

    #[tokio::test]
    async fn test_edit_error_leaves_draft() {
        let mut s = session(vec![]);
        s.begin_create();
        let before = s.editor().unwrap().draft.clone();

        assert!(s.edit(|p| p.remove_stage(4)).is_err());
        assert_eq!(s.editor().unwrap().draft, before);
    }

    #[tokio::test]
    async fn test_delete_clears_selection_and_editor() {
        let mut s = session(vec![
            Envelope::ok(json!({"Name": "build", "Stages": []})),
            Envelope::ok(json!({"msg": "Pipeline 'build' deleted"})),
            summaries(&[]),
        ]);
        s.select(Some("build"));
        assert!(s.begin_edit("build").await);

        assert!(s.delete("build").await);
        assert!(s.selected().is_none());
        assert!(s.editor().is_none());
        assert!(s.pipelines().is_empty());
        assert_eq!(notice(&s).message, "Pipeline 'build' deleted");
    }

    #[tokio::test]
    async fn test_failed_delete_changes_nothing() {
        let mut s = session(vec![Envelope::failed(None, "connection refused")]);
        s.select(Some("build"));

        assert!(!s.delete("build").await);
        assert_eq!(s.selected(), Some("build"));
        assert_eq!(s.transport().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_close_editor() {
        let mut s = session(vec![]);
        s.begin_create();
        s.close_editor();
        assert!(s.editor().is_none());
        assert!(s.edit(|p| Ok(p.with_name("x"))).is_ok());
    }
}
