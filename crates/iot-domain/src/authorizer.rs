use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::capability::{AccessGrant, Action, Authorizer, Role, ThingConfig};
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize)]
pub struct TokenEntry {
    pub subject: String,
    #[serde(default)]
    pub root: bool,
    /// thing_id -> role, for non-root tokens.
    #[serde(default)]
    pub things: HashMap<Uuid, Role>,
    /// group_id -> role, for non-root tokens.
    #[serde(default)]
    pub groups: HashMap<Uuid, Role>,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "root" => Ok(Role::Root),
            other => Err(serde::de::Error::custom(format!("unknown role: {other}"))),
        }
    }
}

/// Static in-memory registry satisfying the `Authorizer` contract, loaded
/// from configuration fixtures. Good enough to exercise every gating rule
/// without a real identity provider in the loop.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct StaticAuthorizer {
    tokens: HashMap<String, TokenEntry>,
    /// thing_id -> group_id
    #[serde(default)]
    thing_groups: HashMap<Uuid, Uuid>,
    /// profile_id -> thing_ids
    #[serde(default)]
    profile_things: HashMap<Uuid, Vec<Uuid>>,
    /// thing_id -> delivery/publish configuration
    #[serde(default)]
    thing_configs: HashMap<Uuid, ThingConfig>,
}

impl StaticAuthorizer {
    fn entry(&self, token: &str) -> Result<&TokenEntry> {
        self.tokens.get(token).ok_or(Error::Authentication)
    }
}

#[async_trait]
impl Authorizer for StaticAuthorizer {
    async fn authorize_thing(
        &self,
        token: &str,
        thing_id: &Uuid,
        action: Action,
    ) -> Result<AccessGrant> {
        let entry = self.entry(token)?;
        if entry.root {
            return Ok(AccessGrant {
                subject: entry.subject.clone(),
                role: Role::Root,
            });
        }
        let role_via_thing = entry.things.get(thing_id).copied();
        let role_via_group = self
            .thing_groups
            .get(thing_id)
            .and_then(|g| entry.groups.get(g))
            .copied();
        let role = role_via_thing
            .or(role_via_group)
            .ok_or(Error::Authorization)?;
        if !role.allows(action) {
            return Err(Error::Authorization);
        }
        Ok(AccessGrant {
            subject: entry.subject.clone(),
            role,
        })
    }

    async fn authorize_group(
        &self,
        token: &str,
        group_id: &Uuid,
        action: Action,
    ) -> Result<AccessGrant> {
        let entry = self.entry(token)?;
        if entry.root {
            return Ok(AccessGrant {
                subject: entry.subject.clone(),
                role: Role::Root,
            });
        }
        let role = entry
            .groups
            .get(group_id)
            .copied()
            .ok_or(Error::Authorization)?;
        if !role.allows(action) {
            return Err(Error::Authorization);
        }
        Ok(AccessGrant {
            subject: entry.subject.clone(),
            role,
        })
    }

    async fn authorize_root(&self, token: &str) -> Result<AccessGrant> {
        let entry = self.entry(token)?;
        if !entry.root {
            return Err(Error::Authorization);
        }
        Ok(AccessGrant {
            subject: entry.subject.clone(),
            role: Role::Root,
        })
    }

    async fn group_id_by_thing(&self, thing_id: &Uuid) -> Result<Uuid> {
        self.thing_groups
            .get(thing_id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no group for thing {thing_id}")))
    }

    async fn thing_ids_by_profile(&self, profile_id: &Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .profile_things
            .get(profile_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_config_by_thing(&self, thing_id: &Uuid) -> Result<ThingConfig> {
        Ok(self
            .thing_configs
            .get(thing_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_thing_gets_default_config() {
        let auth = StaticAuthorizer::default();
        let config = auth.get_config_by_thing(&Uuid::new_v4()).await.unwrap();
        assert!(config.publish_prefix.is_none());
        assert!(config.extra_headers.is_empty());
    }

    #[tokio::test]
    async fn configured_thing_returns_its_config() {
        let thing_id = Uuid::new_v4();
        let mut auth = StaticAuthorizer::default();
        auth.thing_configs.insert(
            thing_id,
            ThingConfig {
                publish_prefix: Some("custom".into()),
                extra_headers: HashMap::new(),
            },
        );
        let config = auth.get_config_by_thing(&thing_id).await.unwrap();
        assert_eq!(config.publish_prefix.as_deref(), Some("custom"));
    }
}
