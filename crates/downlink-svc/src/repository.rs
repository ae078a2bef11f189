//! In-process, JSON-snapshotted repository for downlinks.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use iot_domain::error::{Error, Result};
use iot_domain::page::{Page, PageMetadata};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::Downlink;

#[async_trait]
pub trait DownlinkRepository: Send + Sync {
    async fn save(&self, downlinks: Vec<Downlink>) -> Result<Vec<Downlink>>;
    async fn update(&self, downlink: Downlink) -> Result<Downlink>;
    async fn retrieve_by_id(&self, id: Uuid) -> Result<Downlink>;
    async fn retrieve_by_thing(
        &self,
        thing_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<Downlink>>;
    async fn retrieve_by_group(
        &self,
        group_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<Downlink>>;
    async fn retrieve_all(&self) -> Result<Vec<Downlink>>;
    async fn remove(&self, ids: &[Uuid]) -> Result<()>;
    async fn remove_by_thing(&self, thing_id: Uuid) -> Result<Vec<Uuid>>;
    async fn remove_by_group(&self, group_id: Uuid) -> Result<Vec<Uuid>>;
}

pub struct InMemoryDownlinkRepository {
    inner: RwLock<HashMap<Uuid, Downlink>>,
    persist_path: PathBuf,
}

impl InMemoryDownlinkRepository {
    pub fn new(state_dir: &std::path::Path) -> Self {
        let persist_path = state_dir.join("downlinks.json");
        let mut map = HashMap::new();
        if let Ok(data) = std::fs::read_to_string(&persist_path) {
            if let Ok(items) = serde_json::from_str::<Vec<Downlink>>(&data) {
                for d in items {
                    map.insert(d.id, d);
                }
            }
        }
        tracing::info!(count = map.len(), "loaded downlinks from disk");
        Self {
            inner: RwLock::new(map),
            persist_path,
        }
    }

    async fn persist(&self, map: &HashMap<Uuid, Downlink>) {
        let items: Vec<&Downlink> = map.values().collect();
        if let Ok(json) = serde_json::to_string_pretty(&items) {
            let path = self.persist_path.clone();
            let _ = tokio::task::spawn_blocking(move || {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!(error = %e, "failed to persist downlinks");
                }
            })
            .await;
        }
    }

    fn paginate(items: Vec<Downlink>, page: &PageMetadata) -> Page<Downlink> {
        let mut filtered: Vec<Downlink> = match &page.name {
            Some(n) => items
                .into_iter()
                .filter(|d| d.name.to_lowercase().contains(&n.to_lowercase()))
                .collect(),
            None => items,
        };
        filtered.sort_by(|a, b| a.name.cmp(&b.name));
        if !page.ascending() {
            filtered.reverse();
        }
        let total = filtered.len();
        let page_items = filtered
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        Page::new(page_items, total, page)
    }
}

#[async_trait]
impl DownlinkRepository for InMemoryDownlinkRepository {
    async fn save(&self, downlinks: Vec<Downlink>) -> Result<Vec<Downlink>> {
        let mut map = self.inner.write().await;
        for d in &downlinks {
            if map
                .values()
                .any(|existing| existing.thing_id == d.thing_id && existing.name == d.name)
            {
                return Err(Error::Conflict(format!(
                    "downlink name already exists: {}",
                    d.name
                )));
            }
        }
        for d in &downlinks {
            map.insert(d.id, d.clone());
        }
        self.persist(&map).await;
        Ok(downlinks)
    }

    async fn update(&self, downlink: Downlink) -> Result<Downlink> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&downlink.id) {
            return Err(Error::NotFound(format!("downlink {}", downlink.id)));
        }
        map.insert(downlink.id, downlink.clone());
        self.persist(&map).await;
        Ok(downlink)
    }

    async fn retrieve_by_id(&self, id: Uuid) -> Result<Downlink> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("downlink {id}")))
    }

    async fn retrieve_by_thing(
        &self,
        thing_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<Downlink>> {
        let items: Vec<Downlink> = self
            .inner
            .read()
            .await
            .values()
            .filter(|d| d.thing_id == thing_id)
            .cloned()
            .collect();
        Ok(Self::paginate(items, page))
    }

    async fn retrieve_by_group(
        &self,
        group_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<Downlink>> {
        let items: Vec<Downlink> = self
            .inner
            .read()
            .await
            .values()
            .filter(|d| d.group_id == group_id)
            .cloned()
            .collect();
        Ok(Self::paginate(items, page))
    }

    async fn retrieve_all(&self) -> Result<Vec<Downlink>> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn remove(&self, ids: &[Uuid]) -> Result<()> {
        let mut map = self.inner.write().await;
        for id in ids {
            map.remove(id);
        }
        self.persist(&map).await;
        Ok(())
    }

    async fn remove_by_thing(&self, thing_id: Uuid) -> Result<Vec<Uuid>> {
        let mut map = self.inner.write().await;
        let ids: Vec<Uuid> = map
            .values()
            .filter(|d| d.thing_id == thing_id)
            .map(|d| d.id)
            .collect();
        for id in &ids {
            map.remove(id);
        }
        self.persist(&map).await;
        Ok(ids)
    }

    async fn remove_by_group(&self, group_id: Uuid) -> Result<Vec<Uuid>> {
        let mut map = self.inner.write().await;
        let ids: Vec<Uuid> = map
            .values()
            .filter(|d| d.group_id == group_id)
            .map(|d| d.id)
            .collect();
        for id in &ids {
            map.remove(id);
        }
        self.persist(&map).await;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iot_domain::scheduler_spec::{Frequency, SchedulerSpec};

    fn sample(thing: Uuid, name: &str) -> Downlink {
        Downlink {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            thing_id: thing,
            name: name.into(),
            url: "https://example.com".into(),
            method: crate::model::HttpMethod::Get,
            payload: Vec::new(),
            headers: Default::default(),
            scheduler: SchedulerSpec {
                time_zone: "UTC".into(),
                frequency: Frequency::Minutely,
                date_time: None,
                week: None,
                day_time: None,
                hour: None,
                minute: Some(1),
            },
            time_filter: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn save_and_retrieve_by_thing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryDownlinkRepository::new(dir.path());
        let thing = Uuid::new_v4();
        repo.save(vec![sample(thing, "a")]).await.unwrap();

        let page = PageMetadata {
            offset: 0,
            limit: 10,
            order: None,
            dir: None,
            name: None,
        };
        let result = repo.retrieve_by_thing(thing, &page).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryDownlinkRepository::new(dir.path());
        let thing = Uuid::new_v4();
        repo.save(vec![sample(thing, "a")]).await.unwrap();
        let err = repo.save(vec![sample(thing, "a")]).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn remove_by_thing_clears_all() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryDownlinkRepository::new(dir.path());
        let thing = Uuid::new_v4();
        repo.save(vec![sample(thing, "a"), sample(thing, "b")])
            .await
            .unwrap();
        repo.remove_by_thing(thing).await.unwrap();
        let page = PageMetadata {
            offset: 0,
            limit: 10,
            order: None,
            dir: None,
            name: None,
        };
        let result = repo.retrieve_by_thing(thing, &page).await.unwrap();
        assert_eq!(result.total, 0);
    }
}
