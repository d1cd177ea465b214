//! Shared fixtures for integration tests
#![allow(dead_code)]

use actionpipe::core::record::{ObjectKind, Record};
use actionpipe::persistence::{InMemoryService, ModelService};
use actionpipe::{
    builder_for, ActionEngine, Authorization, Builder, ChannelQueue, DomainConfig, Factory,
    Pipeline, PipelineBehavior, PipelineError, PipelineResult, Request, RequestScope, Step, Task,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// A small social domain: profiles with rules, followers and folders, and
/// a folder page stream that can contain articles and photos
pub const DOMAIN: &str = r#"
name: fixture
markup:
  page: "<html><body>{{{ content }}}</body></html>"
  profile-view: "<h1>{{ object.displayName }}</h1>"
  rule-form: "<form class=\"rule\">{{ object.label }}</form>"
  follower-view: "<p class=\"follower\">{{ object.label }}</p>"
  folder-view: "<h2>{{ object.label }}</h2>"
  folder-confirm: "<p>Delete {{ object.label }}?</p>"
  message-view: "<p>{{ object.subject }}</p>"
  stream-view: "<article>{{ object.label }}</article>"
  stream-page: "<html><body><main>{{ object.label }}</main></body></html>"
  edit-form: "<form id=\"edit\">{{ object.label }}</form>"
  create-form: "<form id=\"create\">{{ template.id }}</form>"
  add-child-option: "<li data-template=\"{{ template.id }}\">{{ template.label }}</li>"
  add-child-chooser: "<ul class=\"chooser\">{{{ options }}}</ul>"

templates:
  - id: folder-page
    label: Folder Page
    containers: [article, photo]
    actions:
      view:
        roles: [anonymous]
        steps:
          - step: view-page
            file: stream-page
      edit:
        roles: [author]
        steps:
          - step: as-modal
            class: wide
            steps:
              - step: view-fragment
                file: edit-form
              - step: bind-form
                fields: [label]
              - step: save
                comment: renamed
      tip:
        roles: [anonymous]
        steps:
          - step: as-tooltip
            steps:
              - step: view-fragment
                file: stream-view
      edit-self:
        roles: [author]
        steps:
          - step: as-modal
            background: edit-self
            steps:
              - step: view-fragment
                file: edit-form
      add:
        roles: [author]
        steps:
          - step: add-child
      add-inline:
        roles: [author]
        steps:
          - step: add-child
            style: inline
      add-photo:
        roles: [author]
        steps:
          - step: add-child
            templates: [photo]

  - id: article
    label: Article
    states: [draft, published]
    actions:
      view:
        roles: [anonymous]
        steps:
          - step: view-fragment
            file: stream-view
      create:
        roles: [author]
        steps:
          - step: view-fragment
            file: create-form
          - step: set-data
            values:
              label: Untitled
          - step: bind-form
          - step: save
            comment: created

  - id: photo
    label: Photo
    actions:
      view:
        roles: [anonymous]
        steps:
          - step: view-fragment
            file: stream-view
      create:
        roles: [author]
        steps:
          - step: view-fragment
            file: create-form
          - step: bind-form
          - step: save

models:
  user:
    schema:
      fields:
        - name: displayName
    actions:
      view:
        roles: [anonymous]
        steps:
          - step: view-fragment
            file: profile-view
      rules:
        roles: [author]
        steps:
          - step: with-rule
            action: edit
            steps:
              - step: view-fragment
                file: rule-form
              - step: bind-form
              - step: save
      followers:
        roles: [anonymous]
        steps:
          - step: with-follower
            action: view
            steps:
              - step: view-fragment
                file: follower-view
      folders:
        roles: [author]
        steps:
          - step: with-folder
            steps:
              - step: view-fragment
                file: folder-view
              - step: bind-form
              - step: save
                comment: folder created
      add-stream:
        roles: [author]
        steps:
          - step: add-child
      headers:
        roles: [anonymous]
        steps:
          - step: set-header
            name: X-Mode
            value: result
          - step: set-header
            name: X-Mode
            value: direct
            direct: true
          - step: view-fragment
            file: profile-view
      broken:
        roles: [anonymous]
        steps:
          - step: teleport
            destination: mars

  rule:
    schema:
      fields:
        - name: label
          required: true
          max_length: 50
        - name: action
          allowed: [mute, block]
    actions:
      view:
        roles: [author]
        steps:
          - step: view-fragment
            file: rule-form
      edit:
        roles: [author]
        steps:
          - step: view-fragment
            file: rule-form
          - step: bind-form
          - step: save
      create:
        roles: [author]
        steps:
          - step: view-fragment
            file: rule-form
          - step: bind-form
          - step: save
            comment: rule created
          - step: trigger-event
            event: ruleSaved
          - step: set-status
            code: 201

  follower:
    schema:
      fields:
        - name: label
        - name: secret
    actions:
      view:
        roles: [author]
        steps:
          - step: view-fragment
            file: follower-view

  folder:
    schema:
      fields:
        - name: label
          required: true
    actions:
      view:
        roles: [author]
        steps:
          - step: view-fragment
            file: folder-view
      archive:
        roles: [author]
        steps:
          - step: publish-task
            task: archive-folder
            arguments:
              folderId: "{{ objectId }}"
              requestedBy: "{{ user.id }}"
      delete:
        roles: [author]
        steps:
          - step: delete
            comment: removed
            confirm: folder-confirm
          - step: redirect-to
            url: "/user/{{ object.parentId }}"

  message:
    actions:
      view:
        roles: [author]
        steps:
          - step: view-fragment
            file: message-view
      mark-read:
        roles: [author]
        steps:
          - step: set-state
            state: read
          - step: save
      publish:
        roles: [author]
        steps:
          - step: set-state
            state: published
"#;

/// A stream template whose backgrounds point at each other. Validation
/// rejects it, so it only loads unchecked.
pub const BACKGROUND_CYCLE: &str = r#"
templates:
  - id: looping
    actions:
      view:
        roles: [anonymous]
        steps:
          - step: as-modal
            background: other
      other:
        roles: [anonymous]
        steps:
          - step: as-tooltip
            background: view
"#;

/// Records every fixture starts with
pub fn seed_records() -> Vec<Record> {
    let mut message = Record::new(ObjectKind::Message, "m1")
        .with_parent("inbox")
        .with_owner("alice")
        .with_field("subject", "Hello");
    message.state = "unread".to_string();

    vec![
        Record::new(ObjectKind::User, "alice")
            .with_owner("alice")
            .with_field("displayName", "Alice"),
        Record::new(ObjectKind::User, "bob")
            .with_owner("bob")
            .with_field("displayName", "Bob"),
        Record::new(ObjectKind::Folder, "inbox")
            .with_parent("alice")
            .with_owner("alice")
            .with_field("label", "Inbox"),
        message,
        Record::new(ObjectKind::Follower, "fw1")
            .with_parent("alice")
            .with_owner("alice")
            .with_field("label", "Carol")
            .with_field("secret", "s3cret"),
        Record::new(ObjectKind::Rule, "r1")
            .with_parent("alice")
            .with_owner("alice")
            .with_field("label", "Mute spam")
            .with_field("action", "mute"),
        Record::new(ObjectKind::Rule, "r-bob")
            .with_parent("bob")
            .with_owner("bob")
            .with_field("label", "Bob rule"),
        Record::new(ObjectKind::Stream, "home")
            .with_parent("alice")
            .with_owner("alice")
            .with_template("folder-page")
            .with_field("label", "Home"),
    ]
}

/// In-memory service that counts lookups
pub struct CountingService {
    inner: InMemoryService,
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelService for CountingService {
    fn kind(&self) -> ObjectKind {
        self.inner.kind()
    }

    async fn load(&self, id: &str) -> Result<Option<Record>, PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(id).await
    }

    async fn save(&self, record: &mut Record, note: &str) -> Result<(), PipelineError> {
        self.inner.save(record, note).await
    }

    async fn delete(&self, record: &Record, note: &str) -> Result<(), PipelineError> {
        self.inner.delete(record, note).await
    }

    async fn query_children(&self, parent_id: &str) -> Result<Vec<Record>, PipelineError> {
        self.inner.query_children(parent_id).await
    }
}

pub struct Fixture {
    pub factory: Arc<Factory>,
    pub tasks: UnboundedReceiver<Task>,
    /// Lookups made against the folder service
    pub folder_loads: Arc<AtomicUsize>,
}

/// Build a factory over the fixture domain with seeded services
pub async fn fixture() -> Fixture {
    let config = DomainConfig::from_yaml(DOMAIN).expect("fixture domain is valid");
    fixture_with(config, seed_records()).await
}

/// Fixture over the background cycle, loaded without validation
pub async fn cycle_fixture() -> Fixture {
    let config: DomainConfig = serde_yaml::from_str(BACKGROUND_CYCLE).expect("cycle domain parses");
    assert!(config.validate().is_err());

    let home = Record::new(ObjectKind::Stream, "home")
        .with_owner("alice")
        .with_template("looping")
        .with_field("label", "Home");
    fixture_with(config, vec![home]).await
}

pub async fn fixture_with(config: DomainConfig, records: Vec<Record>) -> Fixture {
    let (queue, tasks) = ChannelQueue::new();
    let mut factory = Factory::from_config(&config, Arc::new(queue)).expect("factory builds");

    let mut by_kind: HashMap<ObjectKind, Vec<Record>> = HashMap::new();
    for record in records {
        by_kind.entry(record.kind).or_default().push(record);
    }

    let folder_loads = Arc::new(AtomicUsize::new(0));
    for kind in ObjectKind::ALL {
        let service = InMemoryService::new(kind);
        service.seed(by_kind.remove(&kind).unwrap_or_default()).await;
        factory = if kind == ObjectKind::Folder {
            factory.with_service(Arc::new(CountingService {
                inner: service,
                loads: folder_loads.clone(),
            }))
        } else {
            factory.with_service(Arc::new(service))
        };
    }

    Fixture {
        factory: Arc::new(factory),
        tasks,
        folder_loads,
    }
}

impl Fixture {
    pub fn scope(&self, request: Request, authorization: Authorization) -> RequestScope {
        RequestScope::new(self.factory.clone(), request, authorization)
    }

    pub async fn load(&self, kind: ObjectKind, id: &str) -> Option<Record> {
        self.factory
            .service(kind)
            .expect("service registered")
            .load(id)
            .await
            .expect("load succeeds")
    }

    pub async fn children(&self, kind: ObjectKind, parent_id: &str) -> Vec<Record> {
        self.factory
            .service(kind)
            .expect("service registered")
            .query_children(parent_id)
            .await
            .expect("query succeeds")
    }

    /// Authorized builder for a seeded record
    pub async fn builder(
        &self,
        kind: ObjectKind,
        id: &str,
        action: &str,
        request: Request,
        authorization: Authorization,
    ) -> Box<dyn Builder> {
        let record = self.load(kind, id).await.expect("seeded record");
        match builder_for(self.scope(request, authorization), record, action) {
            Ok(builder) => builder,
            Err(e) => panic!("builder for {} '{}' rejected: {}", kind, id, e),
        }
    }

    /// Builder for the action's own pipeline, run in the request's phase
    pub async fn run_action(
        &self,
        kind: ObjectKind,
        id: &str,
        action: &str,
        request: Request,
        authorization: Authorization,
    ) -> (PipelineResult, String, Box<dyn Builder>) {
        let phase = request.phase();
        let mut builder = self.builder(kind, id, action, request, authorization).await;
        let pipeline = builder.action().pipeline.clone();
        let mut sink = String::new();
        let result = pipeline.execute(phase, builder.as_mut(), &mut sink).await;
        (result, sink, builder)
    }

    pub fn engine(&self) -> ActionEngine {
        ActionEngine::new(self.factory.clone())
    }

    /// Tasks published so far
    pub fn drain_tasks(&mut self) -> Vec<Task> {
        let mut tasks = Vec::new();
        while let Ok(task) = self.tasks.try_recv() {
            tasks.push(task);
        }
        tasks
    }
}

/// Step with a fixed verdict that counts how often it runs
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    name: &'static str,
    behavior: PipelineBehavior,
    output: &'static str,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStep {
    pub fn new(name: &'static str, behavior: PipelineBehavior) -> Self {
        Self {
            name,
            behavior,
            output: "",
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Also write `output` to the sink when invoked
    pub fn writing(mut self, output: &'static str) -> Self {
        self.output = output;
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn invoke(&self, sink: &mut String) -> PipelineBehavior {
        self.calls.fetch_add(1, Ordering::SeqCst);
        sink.push_str(self.output);
        self.behavior.clone()
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn kind(&self) -> &str {
        self.name
    }

    async fn get(&self, _builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.invoke(sink)
    }

    async fn post(&self, _builder: &mut dyn Builder, sink: &mut String) -> PipelineBehavior {
        self.invoke(sink)
    }
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Pipeline of scripted steps
pub fn scripted(steps: Vec<ScriptedStep>) -> Pipeline {
    Pipeline::new(
        steps
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn Step>)
            .collect(),
    )
}

/// Compile a YAML list of step records
pub fn compile(yaml: &str) -> Pipeline {
    let configs: Vec<actionpipe::StepConfig> = serde_yaml::from_str(yaml).expect("steps parse");
    Pipeline::compile(&configs)
}

/// Run `pipeline` in `phase` against alice's own profile
pub async fn run_on_profile(
    fixture: &Fixture,
    pipeline: &Pipeline,
    request: Request,
) -> (PipelineResult, String) {
    let phase = request.phase();
    let mut builder = fixture
        .builder(
            ObjectKind::User,
            "alice",
            "view",
            request,
            Authorization::user("alice"),
        )
        .await;
    let mut sink = String::new();
    let result = pipeline.execute(phase, builder.as_mut(), &mut sink).await;
    (result, sink)
}

pub fn assert_error_status(result: &PipelineResult, status: u16) {
    match &result.error {
        Some(error) => assert_eq!(
            error.status_code(),
            status,
            "unexpected error classification: {}",
            error
        ),
        None => panic!("expected an error with status {}, got {:?}", status, result),
    }
    assert!(result.halt, "an error must halt the pipeline");
}

pub fn assert_clean(result: &PipelineResult) {
    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
}
