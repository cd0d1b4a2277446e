//! In-memory collaborators for testing
//!
//! These stand in for the registry-backed clients so pipelines and the
//! manager can be exercised without network or filesystem access.

use airgap_core::{
    ArtifactClient, ArtifactError, Authenticator, ClientFactory, Destination, RegistryTarget,
    Transfer,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::events::{ProgressReporter, SyncEvent};
use crate::item::ArtifactItem;

/// Operation recorded by a mock client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Download(String),
    Verify(String),
    Upload(String),
}

impl Call {
    pub fn item(&self) -> &str {
        match self {
            Call::Download(item) | Call::Verify(item) | Call::Upload(item) => item,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Create,
    Download,
    Verify,
    Upload,
}

#[derive(Default)]
struct FactoryState {
    calls: Vec<Call>,
    created: usize,
    failures: HashMap<(String, Op), ArtifactError>,
    panics: HashSet<String>,
    delay: Option<Duration>,
}

/// Factory producing clients that record calls and fail on demand
///
/// Works for every item type; items are keyed by [`ArtifactItem::id`].
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Arc<RwLock<FactoryState>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(self, item: &str, op: Op, error: ArtifactError) -> Self {
        self.state
            .write()
            .unwrap()
            .failures
            .insert((item.to_string(), op), error);
        self
    }

    pub fn fail_create(self, item: &str, error: ArtifactError) -> Self {
        self.fail(item, Op::Create, error)
    }

    pub fn fail_download(self, item: &str, error: ArtifactError) -> Self {
        self.fail(item, Op::Download, error)
    }

    pub fn fail_verify(self, item: &str, error: ArtifactError) -> Self {
        self.fail(item, Op::Verify, error)
    }

    pub fn fail_upload(self, item: &str, error: ArtifactError) -> Self {
        self.fail(item, Op::Upload, error)
    }

    /// Panic inside `download` of `item`
    pub fn panic_on(self, item: &str) -> Self {
        self.state.write().unwrap().panics.insert(item.to_string());
        self
    }

    /// Sleep before every operation
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.write().unwrap().delay = Some(delay);
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.read().unwrap().calls.clone()
    }

    /// Number of clients created
    pub fn created(&self) -> usize {
        self.state.read().unwrap().created
    }
}

impl<I: ArtifactItem> ClientFactory<I> for MockFactory {
    fn create(
        &self,
        item: &I,
        _destination: &Destination,
    ) -> Result<Box<dyn ArtifactClient>, ArtifactError> {
        let id = item.id();
        let mut state = self.state.write().unwrap();
        if let Some(error) = state.failures.get(&(id.clone(), Op::Create)) {
            return Err(error.clone());
        }
        state.created += 1;
        Ok(Box::new(MockClient {
            item: id,
            state: self.state.clone(),
        }))
    }

    fn transfer(&self, item: &I, destination: &Destination) -> Transfer {
        Transfer {
            source: format!("mock://{}:{}", item.id(), item.version()),
            target: format!("{}/{}", destination, item.id()),
        }
    }
}

struct MockClient {
    item: String,
    state: Arc<RwLock<FactoryState>>,
}

impl MockClient {
    async fn perform(&self, op: Op, call: Call) -> Result<(), ArtifactError> {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        state.calls.push(call);
        if op == Op::Download && state.panics.contains(&self.item) {
            drop(state);
            panic!("mock client for {} panicked", self.item);
        }
        match state.failures.get(&(self.item.clone(), op)) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ArtifactClient for MockClient {
    async fn download(&mut self) -> Result<(), ArtifactError> {
        self.perform(Op::Download, Call::Download(self.item.clone()))
            .await
    }

    async fn verify(&mut self) -> Result<(), ArtifactError> {
        self.perform(Op::Verify, Call::Verify(self.item.clone())).await
    }

    async fn upload(&mut self) -> Result<(), ArtifactError> {
        self.perform(Op::Upload, Call::Upload(self.item.clone())).await
    }
}

#[derive(Default)]
struct AuthState {
    logins: usize,
    registries: Vec<String>,
    failure: Option<ArtifactError>,
}

/// Authenticator counting logins
#[derive(Clone, Default)]
pub struct MockAuthenticator {
    state: Arc<RwLock<AuthState>>,
}

impl MockAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every login fails with `error`
    pub fn failing(error: ArtifactError) -> Self {
        let auth = Self::default();
        auth.state.write().unwrap().failure = Some(error);
        auth
    }

    pub fn logins(&self) -> usize {
        self.state.read().unwrap().logins
    }

    /// Registry hosts logged in to, in call order
    pub fn registries(&self) -> Vec<String> {
        self.state.read().unwrap().registries.clone()
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn login(&self, target: &RegistryTarget) -> Result<(), ArtifactError> {
        let mut state = self.state.write().unwrap();
        state.logins += 1;
        state.registries.push(target.host().to_string());
        match &state.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Reporter keeping every event
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<RwLock<Vec<SyncEvent>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.read().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: &SyncEvent) {
        self.events.write().unwrap().push(event.clone());
    }
}
