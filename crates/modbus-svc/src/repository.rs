use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use iot_domain::error::{Error, Result};
use iot_domain::page::{Page, PageMetadata};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::ModbusClient;

#[async_trait]
pub trait ModbusClientRepository: Send + Sync {
    async fn save(&self, clients: Vec<ModbusClient>) -> Result<Vec<ModbusClient>>;
    async fn update(&self, client: ModbusClient) -> Result<ModbusClient>;
    async fn retrieve_by_id(&self, id: Uuid) -> Result<ModbusClient>;
    async fn retrieve_by_thing(
        &self,
        thing_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<ModbusClient>>;
    async fn retrieve_by_group(
        &self,
        group_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<ModbusClient>>;
    async fn retrieve_all(&self) -> Result<Vec<ModbusClient>>;
    async fn remove(&self, ids: &[Uuid]) -> Result<()>;
    async fn remove_by_thing(&self, thing_id: Uuid) -> Result<Vec<Uuid>>;
    async fn remove_by_group(&self, group_id: Uuid) -> Result<Vec<Uuid>>;
}

pub struct InMemoryModbusClientRepository {
    inner: RwLock<HashMap<Uuid, ModbusClient>>,
    persist_path: PathBuf,
}

impl InMemoryModbusClientRepository {
    pub fn new(state_dir: &std::path::Path) -> Self {
        let persist_path = state_dir.join("modbus_clients.json");
        let mut map = HashMap::new();
        if let Ok(data) = std::fs::read_to_string(&persist_path) {
            if let Ok(items) = serde_json::from_str::<Vec<ModbusClient>>(&data) {
                for c in items {
                    map.insert(c.id, c);
                }
            }
        }
        tracing::info!(count = map.len(), "loaded modbus clients from disk");
        Self {
            inner: RwLock::new(map),
            persist_path,
        }
    }

    async fn persist(&self, map: &HashMap<Uuid, ModbusClient>) {
        let items: Vec<&ModbusClient> = map.values().collect();
        if let Ok(json) = serde_json::to_string_pretty(&items) {
            let path = self.persist_path.clone();
            let _ = tokio::task::spawn_blocking(move || {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(&path, json) {
                    tracing::warn!(error = %e, "failed to persist modbus clients");
                }
            })
            .await;
        }
    }

    fn paginate(items: Vec<ModbusClient>, page: &PageMetadata) -> Page<ModbusClient> {
        let mut filtered: Vec<ModbusClient> = match &page.name {
            Some(n) => items
                .into_iter()
                .filter(|c| c.name.to_lowercase().contains(&n.to_lowercase()))
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
impl ModbusClientRepository for InMemoryModbusClientRepository {
    async fn save(&self, clients: Vec<ModbusClient>) -> Result<Vec<ModbusClient>> {
        let mut map = self.inner.write().await;
        for c in &clients {
            if map
                .values()
                .any(|existing| existing.thing_id == c.thing_id && existing.name == c.name)
            {
                return Err(Error::Conflict(format!(
                    "client name already exists: {}",
                    c.name
                )));
            }
        }
        for c in &clients {
            map.insert(c.id, c.clone());
        }
        self.persist(&map).await;
        Ok(clients)
    }

    async fn update(&self, client: ModbusClient) -> Result<ModbusClient> {
        let mut map = self.inner.write().await;
        if !map.contains_key(&client.id) {
            return Err(Error::NotFound(format!("modbus client {}", client.id)));
        }
        map.insert(client.id, client.clone());
        self.persist(&map).await;
        Ok(client)
    }

    async fn retrieve_by_id(&self, id: Uuid) -> Result<ModbusClient> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("modbus client {id}")))
    }

    async fn retrieve_by_thing(
        &self,
        thing_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<ModbusClient>> {
        let items: Vec<ModbusClient> = self
            .inner
            .read()
            .await
            .values()
            .filter(|c| c.thing_id == thing_id)
            .cloned()
            .collect();
        Ok(Self::paginate(items, page))
    }

    async fn retrieve_by_group(
        &self,
        group_id: Uuid,
        page: &PageMetadata,
    ) -> Result<Page<ModbusClient>> {
        let items: Vec<ModbusClient> = self
            .inner
            .read()
            .await
            .values()
            .filter(|c| c.group_id == group_id)
            .cloned()
            .collect();
        Ok(Self::paginate(items, page))
    }

    async fn retrieve_all(&self) -> Result<Vec<ModbusClient>> {
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
            .filter(|c| c.thing_id == thing_id)
            .map(|c| c.id)
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
            .filter(|c| c.group_id == group_id)
            .map(|c| c.id)
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
    use crate::model::{DataField, FieldType, FunctionCode};
    use iot_domain::scheduler_spec::{Frequency, SchedulerSpec};

    fn client(thing_id: Uuid, name: &str) -> ModbusClient {
        ModbusClient {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            thing_id,
            name: name.into(),
            ip_address: "10.0.0.5".parse().unwrap(),
            port: 502,
            slave_id: 1,
            function_code: FunctionCode::ReadHoldingRegisters,
            scheduler: SchedulerSpec {
                time_zone: "UTC".into(),
                frequency: Frequency::Minutely,
                date_time: None,
                week: None,
                day_time: None,
                hour: None,
                minute: None,
            },
            data_fields: vec![DataField {
                name: "temperature".into(),
                field_type: FieldType::Float32,
                unit: None,
                scale: None,
                byte_order: None,
                address: 0,
                length: 2,
            }],
            metadata: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn save_and_retrieve_by_thing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryModbusClientRepository::new(dir.path());
        let thing_id = Uuid::new_v4();
        repo.save(vec![client(thing_id, "plc-1")]).await.unwrap();

        let page = PageMetadata {
            offset: 0,
            limit: 10,
            order: None,
            dir: None,
            name: None,
        };
        let page = repo.retrieve_by_thing(thing_id, &page).await.unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryModbusClientRepository::new(dir.path());
        let thing_id = Uuid::new_v4();
        repo.save(vec![client(thing_id, "plc-1")]).await.unwrap();
        let err = repo
            .save(vec![client(thing_id, "plc-1")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn remove_by_thing_clears_all() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemoryModbusClientRepository::new(dir.path());
        let thing_id = Uuid::new_v4();
        repo.save(vec![client(thing_id, "plc-1"), client(thing_id, "plc-2")])
            .await
            .unwrap();
        let removed = repo.remove_by_thing(thing_id).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(repo.retrieve_all().await.unwrap().is_empty());
    }
}
