//! OtherLink page and link handlers
//!
//! Resource responses use the `{ status, data }` envelope.

use super::bearer;
use crate::error::{MockError, MockResult};
use crate::state::{MockState, OwnedOtherlink};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use otherlink_core::validation::generate_shortcode as random_shortcode;
use otherlink_core::{EntityId, Link, LinkType, Otherlink};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

fn ok(data: impl Serialize) -> Json<Value> {
    Json(json!({ "status": true, "data": data }))
}

fn page_not_found() -> MockError {
    MockError::NotFound("OtherLink not found".into())
}

async fn owner_id(state: &MockState, headers: &HeaderMap) -> MockResult<u64> {
    Ok(state.authenticate(bearer(headers)?).await?.id)
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

fn paginate<T: Clone>(items: &[T], query: &PageQuery) -> (Vec<T>, Value) {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).max(1);
    let start = (page - 1).saturating_mul(limit) as usize;
    let slice = items
        .iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();
    let total = items.len();
    let total_pages = total.div_ceil(limit as usize);
    (
        slice,
        json!({ "page": page, "limit": limit, "total": total, "totalPages": total_pages }),
    )
}

fn with_link_count(record: &Otherlink, links: &[Link]) -> Otherlink {
    let count = links
        .iter()
        .filter(|l| l.otherlink_id.as_ref() == Some(&record.id))
        .count();
    Otherlink {
        links_count: Some(count as u64),
        ..record.clone()
    }
}

pub async fn list_otherlinks(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> MockResult<Json<Value>> {
    let owner = owner_id(&state, &headers).await?;
    let store = state.read().await;
    let owned: Vec<Otherlink> = store
        .otherlinks
        .iter()
        .filter(|o| o.owner_id == owner)
        .map(|o| with_link_count(&o.record, &store.links))
        .collect();
    let (otherlinks, pagination) = paginate(&owned, &query);
    Ok(ok(json!({ "otherlinks": otherlinks, "pagination": pagination })))
}

pub async fn get_otherlink(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> MockResult<Json<Value>> {
    let owner = owner_id(&state, &headers).await?;
    let store = state.read().await;
    let record = store
        .otherlinks
        .iter()
        .find(|o| o.owner_id == owner && o.record.id.as_str() == id)
        .map(|o| with_link_count(&o.record, &store.links))
        .ok_or_else(page_not_found)?;
    Ok(ok(json!({ "otherlink": record })))
}

#[derive(Debug, Deserialize)]
pub struct OtherlinkRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

fn display_name_taken(otherlinks: &[OwnedOtherlink], name: &str, except: Option<&EntityId>) -> bool {
    otherlinks.iter().any(|o| {
        o.record.display_name.as_deref() == Some(name) && Some(&o.record.id) != except
    })
}

pub async fn create_otherlink(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<OtherlinkRequest>,
) -> MockResult<Json<Value>> {
    let owner = owner_id(&state, &headers).await?;
    if request.name.trim().is_empty() {
        return Err(MockError::BadRequest("Name is required".into()));
    }
    let id = EntityId::from(state.next_id());
    let display_name = request
        .display_name
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| format!("page-{id}"));

    let mut store = state.write().await;
    if display_name_taken(&store.otherlinks, &display_name, None) {
        return Err(MockError::Conflict("Display name is already taken".into()));
    }
    let now = Utc::now();
    let record = Otherlink {
        id,
        name: request.name,
        display_name: Some(display_name),
        description: Some(request.description),
        active: request.active,
        links_count: Some(0),
        created_at: Some(now),
        updated_at: Some(now),
    };
    store.otherlinks.insert(
        0,
        OwnedOtherlink {
            owner_id: owner,
            record: record.clone(),
        },
    );
    Ok(ok(json!({ "otherlink": record })))
}

pub async fn update_otherlink(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<OtherlinkRequest>,
) -> MockResult<Json<Value>> {
    let owner = owner_id(&state, &headers).await?;
    let mut store = state.write().await;
    let id = EntityId::new(id);
    if let Some(name) = request.display_name.as_deref()
        && display_name_taken(&store.otherlinks, name, Some(&id))
    {
        return Err(MockError::Conflict("Display name is already taken".into()));
    }

    let entry = store
        .otherlinks
        .iter_mut()
        .find(|o| o.owner_id == owner && o.record.id == id)
        .ok_or_else(page_not_found)?;
    entry.record.name = request.name;
    if request.display_name.is_some() {
        entry.record.display_name = request.display_name;
    }
    entry.record.description = Some(request.description);
    entry.record.active = request.active;
    entry.record.updated_at = Some(Utc::now());
    let record = entry.record.clone();

    Ok(ok(json!({ "otherlink": with_link_count(&record, &store.links) })))
}

pub async fn delete_otherlink(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> MockResult<Json<Value>> {
    let owner = owner_id(&state, &headers).await?;
    let mut store = state.write().await;
    let before = store.otherlinks.len();
    store
        .otherlinks
        .retain(|o| !(o.owner_id == owner && o.record.id.as_str() == id));
    if store.otherlinks.len() == before {
        return Err(page_not_found());
    }
    store
        .links
        .retain(|l| l.otherlink_id.as_ref().map(EntityId::as_str) != Some(id.as_str()));
    Ok(Json(json!({ "status": true, "message": "OtherLink deleted" })))
}

/// Landing page data; no token needed and only active links are listed
pub async fn public_otherlink(
    State(state): State<MockState>,
    Path(display_name): Path<String>,
) -> MockResult<Json<Value>> {
    let store = state.read().await;
    let record = store
        .otherlinks
        .iter()
        .find(|o| o.record.active && o.record.display_name.as_deref() == Some(display_name.as_str()))
        .map(|o| o.record.clone())
        .ok_or_else(page_not_found)?;
    let links: Vec<&Link> = store
        .links
        .iter()
        .filter(|l| l.active && l.otherlink_id.as_ref() == Some(&record.id))
        .collect();
    Ok(ok(json!({
        "otherlink": record,
        "links": links,
        "display_name": display_name,
    })))
}

pub async fn check_display_name(
    State(state): State<MockState>,
    Path(display_name): Path<String>,
) -> Json<Value> {
    let store = state.read().await;
    let available = !display_name_taken(&store.otherlinks, &display_name, None);
    ok(json!({ "display_name": display_name, "available": available }))
}

/// Resolve `otherlink_id` to a page owned by the bearer
async fn owned_page(state: &MockState, headers: &HeaderMap, otherlink_id: &str) -> MockResult<EntityId> {
    let owner = owner_id(state, headers).await?;
    state
        .read()
        .await
        .otherlinks
        .iter()
        .find(|o| o.owner_id == owner && o.record.id.as_str() == otherlink_id)
        .map(|o| o.record.id.clone())
        .ok_or_else(page_not_found)
}

pub async fn list_links(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(otherlink_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let store = state.read().await;
    let links: Vec<Link> = store
        .links
        .iter()
        .filter(|l| l.otherlink_id.as_ref() == Some(&page_id))
        .cloned()
        .collect();
    let (links, pagination) = paginate(&links, &query);
    Ok(ok(json!({ "links": links, "pagination": pagination })))
}

#[derive(Debug, Default, Deserialize)]
pub struct LinkRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub shortcode: Option<String>,
    pub url: Option<String>,
    pub link_type: Option<LinkType>,
    pub active: Option<bool>,
}

/// Newest first, `limit` defaults to 5
pub async fn recent_links(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(otherlink_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let store = state.read().await;
    let mut links: Vec<Link> = store
        .links
        .iter()
        .filter(|l| l.otherlink_id.as_ref() == Some(&page_id))
        .cloned()
        .collect();
    links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    links.truncate(query.limit.unwrap_or(5) as usize);
    Ok(ok(json!({ "links": links })))
}

pub async fn get_link(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path((otherlink_id, link_id)): Path<(String, String)>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let link_id = EntityId::new(link_id);
    let store = state.read().await;
    let link = store
        .links
        .iter()
        .find(|l| l.id == link_id && l.otherlink_id.as_ref() == Some(&page_id))
        .ok_or_else(|| MockError::NotFound("Link not found".into()))?;
    Ok(ok(json!({ "link": link })))
}

fn shortcode_taken(links: &[Link], page_id: &EntityId, shortcode: &str, except: Option<&EntityId>) -> bool {
    links.iter().any(|l| {
        l.otherlink_id.as_ref() == Some(page_id)
            && l.shortcode.eq_ignore_ascii_case(shortcode)
            && Some(&l.id) != except
    })
}

pub async fn create_link(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(otherlink_id): Path<String>,
    Json(request): Json<LinkRequest>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let (Some(name), Some(url)) = (request.name, request.url) else {
        return Err(MockError::BadRequest("Name and URL are required".into()));
    };
    let shortcode = request
        .shortcode
        .filter(|s| !s.is_empty())
        .unwrap_or_else(random_shortcode);

    let mut store = state.write().await;
    if shortcode_taken(&store.links, &page_id, &shortcode, None) {
        return Err(MockError::Conflict("Shortcode is already in use".into()));
    }
    let now = Utc::now();
    let link = Link {
        id: EntityId::from(state.next_id()),
        otherlink_id: Some(page_id),
        name,
        description: request.description,
        shortcode,
        url,
        link_type: request.link_type.unwrap_or_default(),
        active: request.active.unwrap_or(true),
        clicks: Some(0),
        created_at: Some(now),
        updated_at: Some(now),
    };
    store.links.insert(0, link.clone());
    Ok(ok(json!({ "link": link })))
}

/// Applies only the fields present, so `{active}` alone toggles a link
pub async fn update_link(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path((otherlink_id, link_id)): Path<(String, String)>,
    Json(request): Json<LinkRequest>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let link_id = EntityId::new(link_id);
    let mut store = state.write().await;
    if let Some(shortcode) = request.shortcode.as_deref()
        && shortcode_taken(&store.links, &page_id, shortcode, Some(&link_id))
    {
        return Err(MockError::Conflict("Shortcode is already in use".into()));
    }

    let link = store
        .links
        .iter_mut()
        .find(|l| l.id == link_id && l.otherlink_id.as_ref() == Some(&page_id))
        .ok_or_else(|| MockError::NotFound("Link not found".into()))?;
    if let Some(name) = request.name {
        link.name = name;
    }
    if let Some(description) = request.description {
        link.description = Some(description);
    }
    if let Some(shortcode) = request.shortcode {
        link.shortcode = shortcode;
    }
    if let Some(url) = request.url {
        link.url = url;
    }
    if let Some(link_type) = request.link_type {
        link.link_type = link_type;
    }
    if let Some(active) = request.active {
        link.active = active;
    }
    link.updated_at = Some(Utc::now());
    Ok(ok(json!({ "link": link.clone() })))
}

pub async fn delete_link(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path((otherlink_id, link_id)): Path<(String, String)>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let mut store = state.write().await;
    let before = store.links.len();
    store
        .links
        .retain(|l| !(l.id.as_str() == link_id && l.otherlink_id.as_ref() == Some(&page_id)));
    if store.links.len() == before {
        return Err(MockError::NotFound("Link not found".into()));
    }
    Ok(Json(json!({ "status": true, "message": "Link deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct ExcludeQuery {
    #[serde(default)]
    pub exclude: Option<String>,
}

pub async fn check_shortcode(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path((otherlink_id, shortcode)): Path<(String, String)>,
    Query(query): Query<ExcludeQuery>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let exclude = query.exclude.map(EntityId::new);
    let store = state.read().await;
    let available = !shortcode_taken(&store.links, &page_id, &shortcode, exclude.as_ref());
    Ok(ok(json!({ "shortcode": shortcode, "available": available })))
}

pub async fn generate_shortcode(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(otherlink_id): Path<String>,
) -> MockResult<Json<Value>> {
    let page_id = owned_page(&state, &headers, &otherlink_id).await?;
    let store = state.read().await;
    let shortcode = std::iter::repeat_with(random_shortcode)
        .find(|candidate| !shortcode_taken(&store.links, &page_id, candidate, None))
        .unwrap_or_else(random_shortcode);
    Ok(ok(json!({ "shortcode": shortcode })))
}
