use std::sync::Arc;

use async_trait::async_trait;
use iot_domain::capability::{Action, Authorizer, Clock, Publisher};
use iot_domain::error::Result;
use iot_domain::events::EventReactor;
use iot_domain::page::{Page, PageMetadata};
use iot_scheduler::Scheduler;
use uuid::Uuid;

use crate::model::ModbusClient;
use crate::pool::ModbusConnPool;
use crate::rate_limiter::RateLimiterRegistry;
use crate::repository::ModbusClientRepository;
use crate::{task, validation};

pub struct ModbusService {
    repository: Arc<dyn ModbusClientRepository>,
    scheduler: Arc<Scheduler>,
    authorizer: Arc<dyn Authorizer>,
    pool: Arc<ModbusConnPool>,
    rate_limiter: Arc<RateLimiterRegistry>,
    publisher: Arc<dyn Publisher>,
    cancel: tokio_util::sync::CancellationToken,
    clock: Arc<dyn Clock>,
}

const ALLOWED_ORDER: &[&str] = &["name"];

impl ModbusService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn ModbusClientRepository>,
        scheduler: Arc<Scheduler>,
        authorizer: Arc<dyn Authorizer>,
        pool: Arc<ModbusConnPool>,
        rate_limiter: Arc<RateLimiterRegistry>,
        publisher: Arc<dyn Publisher>,
        cancel: tokio_util::sync::CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            scheduler,
            authorizer,
            pool,
            rate_limiter,
            publisher,
            cancel,
            clock,
        }
    }

    async fn schedule(&self, c: &ModbusClient) -> Result<()> {
        let config = self.authorizer.get_config_by_thing(&c.thing_id).await?;
        let action = task::build(
            c.clone(),
            config,
            self.pool.clone(),
            self.rate_limiter.clone(),
            self.publisher.clone(),
            self.cancel.clone(),
        );
        if c.scheduler.frequency == iot_domain::scheduler_spec::Frequency::Once {
            self.scheduler.schedule_one_shot(c.id, &c.scheduler, action)
        } else {
            self.scheduler
                .schedule_recurring(c.id, &c.scheduler, action)
        }
    }

    pub async fn create(
        &self,
        token: &str,
        thing_id: Uuid,
        mut clients: Vec<ModbusClient>,
    ) -> Result<Vec<ModbusClient>> {
        self.authorizer
            .authorize_thing(token, &thing_id, Action::Edit)
            .await?;
        let group_id = self.authorizer.group_id_by_thing(&thing_id).await?;
        let now = self.clock.now();

        for c in &mut clients {
            c.id = Uuid::new_v4();
            c.thing_id = thing_id;
            c.group_id = group_id;
            c.derive_field_lengths();
            validation::validate_modbus_client(c, now)?;
        }

        let saved = self.repository.save(clients).await?;
        for c in &saved {
            self.schedule(c).await?;
        }
        Ok(saved)
    }

    pub async fn list_by_thing(
        &self,
        token: &str,
        thing_id: Uuid,
        page: PageMetadata,
    ) -> Result<Page<ModbusClient>> {
        self.authorizer
            .authorize_thing(token, &thing_id, Action::View)
            .await?;
        let page = page.normalize(100, ALLOWED_ORDER)?;
        self.repository.retrieve_by_thing(thing_id, &page).await
    }

    pub async fn list_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        page: PageMetadata,
    ) -> Result<Page<ModbusClient>> {
        self.authorizer
            .authorize_group(token, &group_id, Action::View)
            .await?;
        let page = page.normalize(100, ALLOWED_ORDER)?;
        self.repository.retrieve_by_group(group_id, &page).await
    }

    pub async fn view(&self, token: &str, id: Uuid) -> Result<ModbusClient> {
        let c = self.repository.retrieve_by_id(id).await?;
        self.authorizer
            .authorize_thing(token, &c.thing_id, Action::View)
            .await?;
        Ok(c)
    }

    pub async fn update(&self, token: &str, mut client: ModbusClient) -> Result<ModbusClient> {
        let existing = self.repository.retrieve_by_id(client.id).await?;
        self.authorizer
            .authorize_thing(token, &existing.thing_id, Action::Edit)
            .await?;

        client.thing_id = existing.thing_id;
        client.group_id = existing.group_id;
        client.derive_field_lengths();
        validation::validate_modbus_client(&client, self.clock.now())?;

        self.scheduler.unschedule(client.id);
        let saved = self.repository.update(client).await?;
        self.schedule(&saved).await?;
        Ok(saved)
    }

    pub async fn remove(&self, token: &str, ids: Vec<Uuid>) -> Result<()> {
        for id in &ids {
            let c = self.repository.retrieve_by_id(*id).await?;
            self.authorizer
                .authorize_thing(token, &c.thing_id, Action::Edit)
                .await?;
            self.scheduler.unschedule(*id);
        }
        self.repository.remove(&ids).await
    }

    pub async fn remove_by_thing(&self, thing_id: Uuid) -> Result<()> {
        let ids = self.repository.remove_by_thing(thing_id).await?;
        for id in ids {
            self.scheduler.unschedule(id);
        }
        Ok(())
    }

    pub async fn remove_by_group(&self, group_id: Uuid) -> Result<()> {
        let ids = self.repository.remove_by_group(group_id).await?;
        for id in ids {
            self.scheduler.unschedule(id);
        }
        Ok(())
    }

    pub async fn reschedule(&self, profile_id: Uuid) -> Result<()> {
        let thing_ids = self.authorizer.thing_ids_by_profile(&profile_id).await?;
        for thing_id in thing_ids {
            let page = PageMetadata {
                offset: 0,
                limit: usize::MAX,
                order: None,
                dir: None,
                name: None,
            };
            let clients = self.repository.retrieve_by_thing(thing_id, &page).await?;
            for c in clients.items {
                self.scheduler.unschedule(c.id);
                self.schedule(&c).await?;
            }
        }
        Ok(())
    }

    pub async fn load_and_schedule_at_boot(&self) -> Result<()> {
        let now = self.clock.now();
        let all = self.repository.retrieve_all().await?;
        let mut scheduled = 0usize;
        let mut skipped = 0usize;
        for c in all {
            if c.scheduler.frequency == iot_domain::scheduler_spec::Frequency::Once {
                if let Some(dt) = c.scheduler.date_time {
                    if dt <= now {
                        skipped += 1;
                        continue;
                    }
                }
            }
            self.schedule(&c).await?;
            scheduled += 1;
        }
        tracing::info!(scheduled, skipped, "loaded modbus clients at boot");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.scheduler.stop();
    }
}

#[async_trait]
impl EventReactor for ModbusService {
    async fn remove_by_thing(&self, thing_id: Uuid) -> Result<()> {
        ModbusService::remove_by_thing(self, thing_id).await
    }

    async fn remove_by_group(&self, group_id: Uuid) -> Result<()> {
        ModbusService::remove_by_group(self, group_id).await
    }

    async fn reschedule(&self, profile_id: Uuid) -> Result<()> {
        ModbusService::reschedule(self, profile_id).await
    }
}
