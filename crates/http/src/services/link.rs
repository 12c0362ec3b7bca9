//! Link endpoints, all scoped to one OtherLink page

use super::{page_query, segment, unwrap_envelope};
use crate::client::{ApiClient, error::ClientError};
use crate::envelope::Envelope;
use otherlink_core::{EntityId, Link, LinkDraft, Pagination};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkPage {
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
struct LinkDetail {
    link: Link,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortcodeCheck {
    #[serde(default)]
    pub shortcode: Option<String>,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GeneratedShortcode {
    shortcode: String,
}

#[derive(Debug, Clone)]
pub struct LinkService {
    client: ApiClient,
}

fn base(otherlink_id: &EntityId) -> String {
    format!("/links/otherlink/{}", segment(otherlink_id.as_str()))
}

impl LinkService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(
        &self,
        otherlink_id: &EntityId,
        page: u32,
        limit: u32,
        filters: &[(&str, &str)],
    ) -> Result<LinkPage, ClientError> {
        let request = self
            .client
            .request(Method::GET, &base(otherlink_id))
            .query(&page_query(page, limit, filters));
        unwrap_envelope(self.client.execute::<Envelope<LinkPage>>(request).await?)
    }

    pub async fn recent(&self, otherlink_id: &EntityId, limit: u32) -> Result<LinkPage, ClientError> {
        let request = self
            .client
            .request(Method::GET, &format!("{}/recent", base(otherlink_id)))
            .query(&[("limit", limit)]);
        unwrap_envelope(self.client.execute::<Envelope<LinkPage>>(request).await?)
    }

    pub async fn get(&self, otherlink_id: &EntityId, link_id: &EntityId) -> Result<Link, ClientError> {
        let envelope: Envelope<LinkDetail> = self
            .client
            .get(&format!("{}/{}", base(otherlink_id), segment(link_id.as_str())))
            .await?;
        Ok(unwrap_envelope(envelope)?.link)
    }

    pub async fn create(&self, otherlink_id: &EntityId, draft: &LinkDraft) -> Result<Link, ClientError> {
        let envelope: Envelope<LinkDetail> = self.client.post(&base(otherlink_id), draft).await?;
        Ok(unwrap_envelope(envelope)?.link)
    }

    pub async fn update(
        &self,
        otherlink_id: &EntityId,
        link_id: &EntityId,
        draft: &LinkDraft,
    ) -> Result<Link, ClientError> {
        let envelope: Envelope<LinkDetail> = self
            .client
            .put(
                &format!("{}/{}", base(otherlink_id), segment(link_id.as_str())),
                draft,
            )
            .await?;
        Ok(unwrap_envelope(envelope)?.link)
    }

    /// Partial update toggling only `active`
    pub async fn set_active(
        &self,
        otherlink_id: &EntityId,
        link_id: &EntityId,
        active: bool,
    ) -> Result<Link, ClientError> {
        let envelope: Envelope<LinkDetail> = self
            .client
            .put(
                &format!("{}/{}", base(otherlink_id), segment(link_id.as_str())),
                &json!({ "active": active }),
            )
            .await?;
        Ok(unwrap_envelope(envelope)?.link)
    }

    pub async fn delete(&self, otherlink_id: &EntityId, link_id: &EntityId) -> Result<(), ClientError> {
        let _: Value = self
            .client
            .delete(&format!("{}/{}", base(otherlink_id), segment(link_id.as_str())))
            .await?;
        Ok(())
    }

    /// `exclude` skips the link being edited
    pub async fn check_shortcode(
        &self,
        otherlink_id: &EntityId,
        shortcode: &str,
        exclude: Option<&EntityId>,
    ) -> Result<ShortcodeCheck, ClientError> {
        let mut request = self.client.request(
            Method::GET,
            &format!("{}/check-shortcode/{}", base(otherlink_id), segment(shortcode)),
        );
        if let Some(exclude) = exclude {
            request = request.query(&[("exclude", exclude.as_str())]);
        }
        unwrap_envelope(self.client.execute::<Envelope<ShortcodeCheck>>(request).await?)
    }

    pub async fn generate_shortcode(&self, otherlink_id: &EntityId) -> Result<String, ClientError> {
        let envelope: Envelope<GeneratedShortcode> = self
            .client
            .post(
                &format!("{}/generate-shortcode", base(otherlink_id)),
                &json!({}),
            )
            .await?;
        Ok(unwrap_envelope(envelope)?.shortcode)
    }

    pub async fn stats(&self, otherlink_id: &EntityId) -> Result<Value, ClientError> {
        self.client
            .get(&format!("{}/stats", base(otherlink_id)))
            .await
    }
}
