//! Service catalog: the bookable services each organization offers.
//! Mutations publish on the service topic, mirroring appointments.

use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;

use super::queries::clamp_page;
use super::validate::{build_service, check_body_id, check_patch_id, merge_service};
use super::{Engine, EngineError, ValidationError};

impl Engine {
    pub async fn create_service(&self, input: ServiceInput) -> Result<Service, EngineError> {
        debug!(?input, "request to create service");
        self.observed("create_service", async move {
            if input.id.is_some() {
                return Err(ValidationError::IdPresent.into());
            }
            let service = self.services.insert_service(build_service(input)?).await?;
            info!(id = %service.id, organization_id = service.organization_id, "service created");
            self.publish(ChangeKind::Created, ServicePayload::from(&service))
                .await?;
            Ok(service)
        })
        .await
    }

    pub async fn update_service(&self, id: Ulid, input: ServiceInput) -> Result<Service, EngineError> {
        debug!(%id, ?input, "request to update service");
        self.observed("update_service", async move {
            check_body_id(id, input.id)?;
            if self.services.find_service(id).await?.is_none() {
                return Err(EngineError::NotFound(id));
            }
            let replacement = build_service(input)?.with_id(id);
            let service = self.services.replace_service(replacement).await?;
            info!(%id, "service updated");
            self.publish(ChangeKind::Updated, ServicePayload::from(&service))
                .await?;
            Ok(service)
        })
        .await
    }

    pub async fn partial_update_service(
        &self,
        id: Ulid,
        patch: ServicePatch,
    ) -> Result<Service, EngineError> {
        debug!(%id, ?patch, "request to partially update service");
        self.observed("partial_update_service", async move {
            check_patch_id(id, patch.id)?;
            let current = self
                .services
                .find_service(id)
                .await?
                .ok_or(EngineError::NotFound(id))?;
            let service = self
                .services
                .replace_service(merge_service(&current, patch)?)
                .await?;
            info!(%id, "service partially updated");
            self.publish(ChangeKind::Updated, ServicePayload::from(&service))
                .await?;
            Ok(service)
        })
        .await
    }

    pub async fn get_service(&self, id: Ulid) -> Result<Service, EngineError> {
        debug!(%id, "request to get service");
        self.observed("get_service", async move {
            self.services
                .find_service(id)
                .await?
                .ok_or(EngineError::NotFound(id))
        })
        .await
    }

    pub async fn list_services(&self, page: PageRequest) -> Result<Page<Service>, EngineError> {
        debug!(?page, "request to list services");
        self.observed("list_services", async move {
            Ok(self.services.find_all_services(clamp_page(page)).await?)
        })
        .await
    }

    pub async fn list_services_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Service>, EngineError> {
        debug!(organization_id, "request to list services of organization");
        self.observed("list_services_for_organization", async move {
            Ok(self
                .services
                .find_services_by_organization(organization_id)
                .await?)
        })
        .await
    }

    /// Idempotent, like appointment deletion.
    pub async fn delete_service(&self, id: Ulid) -> Result<(), EngineError> {
        debug!(%id, "request to delete service");
        self.observed("delete_service", async move {
            let payload = match self.services.find_service(id).await? {
                Some(existing) => ServicePayload::from(&existing),
                None => ServicePayload::tombstone(id),
            };
            self.publish(ChangeKind::Deleted, payload).await?;
            let existed = self.services.delete_service(id).await?;
            info!(%id, existed, "service deleted");
            Ok(())
        })
        .await
    }
}
