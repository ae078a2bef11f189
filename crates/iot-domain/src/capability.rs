//! Capability traits: the out-of-scope collaborators the core depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
}

#[derive(Clone, Debug)]
pub struct AccessGrant {
    pub subject: String,
    pub role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Viewer,
    Editor,
    Root,
}

impl Role {
    pub fn allows(self, action: Action) -> bool {
        match (self, action) {
            (Role::Root, _) => true,
            (Role::Editor, _) => true,
            (Role::Viewer, Action::View) => true,
            (Role::Viewer, Action::Edit) => false,
        }
    }
}

/// Per-thing delivery/publish configuration, rebound onto a task's action
/// by `reschedule` without touching the task's schedule. Carries the bits
/// of "where/how to deliver" that live outside the task record itself.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct ThingConfig {
    /// Overrides the default `<protocol>.<thing_id>.<task_id>` publish
    /// subject prefix when set.
    #[serde(default)]
    pub publish_prefix: Option<String>,
    /// Merged into the downlink task's request headers; ignored by Modbus.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

/// Resolves a caller's access to things/groups and their relationships.
/// Production deployments back this with the platform's real IdP; this
/// trait exists so the scheduler core never depends on that directly.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize_thing(
        &self,
        token: &str,
        thing_id: &Uuid,
        action: Action,
    ) -> Result<AccessGrant>;
    async fn authorize_group(
        &self,
        token: &str,
        group_id: &Uuid,
        action: Action,
    ) -> Result<AccessGrant>;
    async fn authorize_root(&self, token: &str) -> Result<AccessGrant>;
    async fn group_id_by_thing(&self, thing_id: &Uuid) -> Result<Uuid>;
    async fn thing_ids_by_profile(&self, profile_id: &Uuid) -> Result<Vec<Uuid>>;
    async fn get_config_by_thing(&self, thing_id: &Uuid) -> Result<ThingConfig>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Issues outbound HTTP requests on behalf of the downlink task closure.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &HashMap<String, String>,
        body: &[u8],
        deadline: std::time::Duration,
    ) -> Result<HttpResponse>;
}

/// Emits a message to the platform bus. Out of scope for real persistence;
/// this repo's implementation fans out to a local broadcast channel plus a
/// structured log line.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, message: serde_json::Value) -> Result<()>;
}

/// Wall-clock and timezone loading, abstracted so tests can fix `now()`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
