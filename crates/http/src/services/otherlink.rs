//! OtherLink page endpoints

use super::{page_query, segment, unwrap_envelope};
use crate::client::{ApiClient, error::ClientError};
use crate::envelope::Envelope;
use otherlink_core::{EntityId, Link, Otherlink, OtherlinkDraft, Pagination};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OtherlinkPage {
    #[serde(default)]
    pub otherlinks: Vec<Otherlink>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
struct OtherlinkDetail {
    otherlink: Otherlink,
}

/// Public landing page payload
#[derive(Debug, Clone, Deserialize)]
pub struct PublicOtherlink {
    pub otherlink: Otherlink,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayNameCheck {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone)]
pub struct OtherlinkService {
    client: ApiClient,
}

impl OtherlinkService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Filters are passed through as query pairs (`active`, `search`)
    pub async fn list(
        &self,
        page: u32,
        limit: u32,
        filters: &[(&str, &str)],
    ) -> Result<OtherlinkPage, ClientError> {
        let request = self
            .client
            .request(Method::GET, "/otherlinks")
            .query(&page_query(page, limit, filters));
        unwrap_envelope(self.client.execute::<Envelope<OtherlinkPage>>(request).await?)
    }

    pub async fn recent(&self, limit: u32) -> Result<OtherlinkPage, ClientError> {
        let request = self
            .client
            .request(Method::GET, "/otherlinks/recent")
            .query(&[("limit", limit)]);
        unwrap_envelope(self.client.execute::<Envelope<OtherlinkPage>>(request).await?)
    }

    pub async fn get(&self, id: &EntityId) -> Result<Otherlink, ClientError> {
        let envelope: Envelope<OtherlinkDetail> = self
            .client
            .get(&format!("/otherlinks/{}", segment(id.as_str())))
            .await?;
        Ok(unwrap_envelope(envelope)?.otherlink)
    }

    /// Public landing page lookup by display name; no token needed
    pub async fn by_display_name(&self, display_name: &str) -> Result<PublicOtherlink, ClientError> {
        let envelope: Envelope<PublicOtherlink> = self
            .client
            .get(&format!("/otherlinks/public/{}", segment(display_name)))
            .await?;
        unwrap_envelope(envelope)
    }

    pub async fn check_display_name(
        &self,
        display_name: &str,
    ) -> Result<DisplayNameCheck, ClientError> {
        let envelope: Envelope<DisplayNameCheck> = self
            .client
            .get(&format!(
                "/otherlinks/check-display-name/{}",
                segment(display_name)
            ))
            .await?;
        unwrap_envelope(envelope)
    }

    pub async fn create(&self, draft: &OtherlinkDraft) -> Result<Otherlink, ClientError> {
        let envelope: Envelope<OtherlinkDetail> = self.client.post("/otherlinks", draft).await?;
        Ok(unwrap_envelope(envelope)?.otherlink)
    }

    pub async fn update(
        &self,
        id: &EntityId,
        draft: &OtherlinkDraft,
    ) -> Result<Otherlink, ClientError> {
        let envelope: Envelope<OtherlinkDetail> = self
            .client
            .put(&format!("/otherlinks/{}", segment(id.as_str())), draft)
            .await?;
        Ok(unwrap_envelope(envelope)?.otherlink)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<(), ClientError> {
        let _: Value = self
            .client
            .delete(&format!("/otherlinks/{}", segment(id.as_str())))
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<Value, ClientError> {
        self.client.get("/otherlinks/stats/summary").await
    }

    pub async fn collaborators(&self, id: &EntityId) -> Result<Value, ClientError> {
        self.client
            .get(&format!("/otherlinks/{}/collaborators", segment(id.as_str())))
            .await
    }

    pub async fn add_collaborator(
        &self,
        id: &EntityId,
        user_id: &EntityId,
    ) -> Result<Value, ClientError> {
        self.client
            .post(
                &format!("/otherlinks/{}/collaborators", segment(id.as_str())),
                &json!({ "user_id": user_id }),
            )
            .await
    }

    pub async fn remove_collaborator(
        &self,
        id: &EntityId,
        user_id: &EntityId,
    ) -> Result<Value, ClientError> {
        self.client
            .delete(&format!(
                "/otherlinks/{}/collaborators/{}",
                segment(id.as_str()),
                segment(user_id.as_str())
            ))
            .await
    }

    /// Links of one page; same endpoint as [`super::LinkService::list`]
    pub async fn links(
        &self,
        id: &EntityId,
        page: u32,
        limit: u32,
        filters: &[(&str, &str)],
    ) -> Result<super::LinkPage, ClientError> {
        super::LinkService::new(self.client.clone())
            .list(id, page, limit, filters)
            .await
    }
}
