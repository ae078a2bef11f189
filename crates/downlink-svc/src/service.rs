use std::sync::Arc;

use async_trait::async_trait;
use iot_domain::capability::{AccessGrant, Action, Authorizer, Clock, HttpFetcher, Publisher};
use iot_domain::error::Result;
use iot_domain::events::EventReactor;
use iot_domain::page::{Page, PageMetadata};
use iot_scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Downlink;
use crate::repository::DownlinkRepository;
use crate::{task, validation};

pub struct DownlinkService {
    repository: Arc<dyn DownlinkRepository>,
    scheduler: Arc<Scheduler>,
    authorizer: Arc<dyn Authorizer>,
    fetcher: Arc<dyn HttpFetcher>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

const ALLOWED_ORDER: &[&str] = &["name"];

impl DownlinkService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn DownlinkRepository>,
        scheduler: Arc<Scheduler>,
        authorizer: Arc<dyn Authorizer>,
        fetcher: Arc<dyn HttpFetcher>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            scheduler,
            authorizer,
            fetcher,
            publisher,
            clock,
        }
    }

    async fn schedule(&self, d: &Downlink) -> Result<()> {
        let config = self.authorizer.get_config_by_thing(&d.thing_id).await?;
        let action = task::build(
            d.clone(),
            config,
            self.fetcher.clone(),
            self.publisher.clone(),
        );
        if d.scheduler.frequency == iot_domain::scheduler_spec::Frequency::Once {
            self.scheduler.schedule_one_shot(d.id, &d.scheduler, action)
        } else {
            self.scheduler
                .schedule_recurring(d.id, &d.scheduler, action)
        }
    }

    pub async fn create(
        &self,
        token: &str,
        thing_id: Uuid,
        mut downlinks: Vec<Downlink>,
    ) -> Result<Vec<Downlink>> {
        self.authorizer
            .authorize_thing(token, &thing_id, Action::Edit)
            .await?;
        let group_id = self.authorizer.group_id_by_thing(&thing_id).await?;
        let now = self.clock.now();

        for d in &mut downlinks {
            d.id = Uuid::new_v4();
            d.thing_id = thing_id;
            d.group_id = group_id;
            validation::validate_downlink(d, now)?;
        }

        let saved = self.repository.save(downlinks).await?;
        for d in &saved {
            self.schedule(d).await?;
        }
        Ok(saved)
    }

    pub async fn list_by_thing(
        &self,
        token: &str,
        thing_id: Uuid,
        page: PageMetadata,
    ) -> Result<Page<Downlink>> {
        self.authorizer
            .authorize_thing(token, &thing_id, Action::View)
            .await?;
        let page = page.normalize(200, ALLOWED_ORDER)?;
        self.repository.retrieve_by_thing(thing_id, &page).await
    }

    pub async fn list_by_group(
        &self,
        token: &str,
        group_id: Uuid,
        page: PageMetadata,
    ) -> Result<Page<Downlink>> {
        self.authorizer
            .authorize_group(token, &group_id, Action::View)
            .await?;
        let page = page.normalize(200, ALLOWED_ORDER)?;
        self.repository.retrieve_by_group(group_id, &page).await
    }

    pub async fn view(&self, token: &str, id: Uuid) -> Result<Downlink> {
        let d = self.repository.retrieve_by_id(id).await?;
        self.authorizer
            .authorize_thing(token, &d.thing_id, Action::View)
            .await?;
        Ok(d)
    }

    pub async fn update(&self, token: &str, mut downlink: Downlink) -> Result<Downlink> {
        let existing = self.repository.retrieve_by_id(downlink.id).await?;
        self.authorizer
            .authorize_thing(token, &existing.thing_id, Action::Edit)
            .await?;

        downlink.thing_id = existing.thing_id;
        downlink.group_id = existing.group_id;
        validation::validate_downlink(&downlink, self.clock.now())?;

        self.scheduler.unschedule(downlink.id);
        let saved = self.repository.update(downlink).await?;
        self.schedule(&saved).await?;
        Ok(saved)
    }

    pub async fn remove(&self, token: &str, ids: Vec<Uuid>) -> Result<()> {
        for id in &ids {
            let d = self.repository.retrieve_by_id(*id).await?;
            self.authorizer
                .authorize_thing(token, &d.thing_id, Action::Edit)
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

    /// Rebind every task belonging to `profile_id`'s things to fresh
    /// delivery configuration — the schedule itself is unchanged.
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
            let tasks = self.repository.retrieve_by_thing(thing_id, &page).await?;
            for d in tasks.items {
                self.scheduler.unschedule(d.id);
                self.schedule(&d).await?;
            }
        }
        Ok(())
    }

    pub async fn load_and_schedule_at_boot(&self) -> Result<()> {
        let now = self.clock.now();
        let all = self.repository.retrieve_all().await?;
        let mut scheduled = 0usize;
        let mut skipped = 0usize;
        for d in all {
            if d.scheduler.frequency == iot_domain::scheduler_spec::Frequency::Once {
                if let Some(dt) = d.scheduler.date_time {
                    if dt <= now {
                        skipped += 1;
                        continue;
                    }
                }
            }
            self.schedule(&d).await?;
            scheduled += 1;
        }
        tracing::info!(scheduled, skipped, "loaded downlinks at boot");
        Ok(())
    }

    pub fn shutdown(&self) {
        self.scheduler.stop();
    }

    pub async fn backup(&self, token: &str) -> Result<Backup> {
        self.authorizer
            .authorize_root(token)
            .await
            .map(|g: AccessGrant| g)?;
        let downlinks = self.repository.retrieve_all().await?;
        Ok(Backup { downlinks })
    }

    pub async fn restore(&self, token: &str, backup: Backup) -> Result<Vec<Downlink>> {
        self.authorizer.authorize_root(token).await?;
        let saved = self.repository.save(backup.downlinks).await?;
        for d in &saved {
            self.schedule(d).await?;
        }
        Ok(saved)
    }
}

#[derive(Serialize, Deserialize)]
pub struct Backup {
    pub downlinks: Vec<Downlink>,
}

#[async_trait]
impl EventReactor for DownlinkService {
    async fn remove_by_thing(&self, thing_id: Uuid) -> Result<()> {
        DownlinkService::remove_by_thing(self, thing_id).await
    }

    async fn remove_by_group(&self, group_id: Uuid) -> Result<()> {
        DownlinkService::remove_by_group(self, group_id).await
    }

    async fn reschedule(&self, profile_id: Uuid) -> Result<()> {
        DownlinkService::reschedule(self, profile_id).await
    }
}
