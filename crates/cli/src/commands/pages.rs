//! OtherLink page and link commands

use anyhow::{Result, anyhow, bail};
use clap::Subcommand;
use otherlink_core::validation::generate_shortcode;
use otherlink_core::{EntityId, Link, LinkDraft, LinkType, Otherlink, OtherlinkDraft, Validate};
use otherlink_http::{LinkService, OtherlinkService};
use otherlink_session::Route;
use tracing::warn;

use super::{api_error, form_message, invalid_form, print_json, require_workspace};
use crate::config::AppContext;

#[derive(Subcommand)]
pub enum OtherlinkCommands {
    /// List your OtherLinks
    List,

    /// Create an OtherLink and select it
    Create {
        #[arg(long)]
        name: String,

        /// Public address, lowercase letters, numbers, `-` and `_`
        #[arg(long)]
        display_name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Create it hidden
        #[arg(long)]
        inactive: bool,
    },

    /// Select the OtherLink other commands work on
    Select { id: String },

    /// Change the selected (or given) OtherLink
    Update {
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        active: Option<bool>,
    },

    /// Delete an OtherLink and its links
    Delete {
        id: String,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Check whether a display name is free
    CheckName { display_name: String },

    /// Totals across your OtherLinks
    Stats,
}

#[derive(Subcommand)]
pub enum LinkCommands {
    /// List links of the selected OtherLink
    List {
        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        limit: u32,

        /// Filter by name, shortcode or URL
        #[arg(long)]
        search: Option<String>,
    },

    /// Add a link; a shortcode is generated when omitted
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        url: String,

        #[arg(long)]
        shortcode: Option<String>,

        #[arg(long = "type", default_value = "url")]
        link_type: LinkType,

        #[arg(long, default_value = "")]
        description: String,
    },

    /// Change a link
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        shortcode: Option<String>,

        #[arg(long = "type")]
        link_type: Option<LinkType>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Flip a link between active and inactive
    Toggle { id: String },

    /// Delete a link
    Delete { id: String },

    /// Check whether a shortcode is free on the selected OtherLink
    CheckShortcode {
        shortcode: String,

        /// Link being edited, which may keep its own shortcode
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Ask the backend for an unused shortcode
    GenerateShortcode,
}

fn print_otherlink(otherlink: &Otherlink, selected: bool) {
    let marker = if selected { "*" } else { " " };
    let status = if otherlink.active { "active" } else { "inactive" };
    println!(
        "{marker} [{}] {} (/{}) {status}, {} links",
        otherlink.id,
        otherlink.name,
        otherlink.display_name.as_deref().unwrap_or("-"),
        otherlink.links_count.unwrap_or(0)
    );
}

fn print_link(link: &Link) {
    let status = if link.active { "on " } else { "off" };
    println!(
        "[{}] {status} {:<12} {:<24} {} ({}, {} clicks)",
        link.id,
        link.shortcode,
        link.name,
        link.url,
        link.link_type.label(),
        link.clicks.unwrap_or(0)
    );
}

fn draft_from(otherlink: &Otherlink) -> OtherlinkDraft {
    OtherlinkDraft {
        name: otherlink.name.clone(),
        display_name: otherlink.display_name.clone(),
        description: otherlink.description.clone().unwrap_or_default(),
        active: otherlink.active,
    }
}

fn link_draft_from(link: &Link) -> LinkDraft {
    LinkDraft {
        name: link.name.clone(),
        description: link.description.clone().unwrap_or_default(),
        shortcode: link.shortcode.clone(),
        url: link.url.clone(),
        link_type: link.link_type,
        active: link.active,
    }
}

impl OtherlinkCommands {
    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        let current = match self {
            OtherlinkCommands::Create { .. } | OtherlinkCommands::CheckName { .. } => {
                Route::CreateOtherlink
            }
            _ => Route::Otherlinks,
        };
        require_workspace(ctx, current).await?;
        let service = ctx.workspace.service();

        match self {
            OtherlinkCommands::List => {
                let selected = ctx.workspace.selected_id();
                for otherlink in ctx.workspace.otherlinks() {
                    print_otherlink(&otherlink, selected.as_ref() == Some(&otherlink.id));
                }
            }
            OtherlinkCommands::Create {
                name,
                display_name,
                description,
                inactive,
            } => {
                let draft = OtherlinkDraft {
                    name,
                    display_name: Some(display_name.trim().to_string()),
                    description,
                    active: !inactive,
                };
                draft.validate().map_err(invalid_form)?;
                ensure_display_name_free(service, &draft, None).await?;

                let created = service
                    .create(&draft)
                    .await
                    .map_err(|e| api_error(e, "Failed to create OtherLink"))?;
                ctx.workspace.add(created.clone()).await;
                println!("Created and selected:");
                print_otherlink(&created, true);
            }
            OtherlinkCommands::Select { id } => {
                let id = EntityId::new(id);
                if !ctx.workspace.otherlinks().iter().any(|o| o.id == id) {
                    bail!("No OtherLink with id {id}");
                }
                ctx.workspace.select(id).await;
                match ctx.workspace.selected() {
                    Some(selected) => {
                        println!("Selected:");
                        print_otherlink(&selected, true);
                    }
                    None => bail!("Failed to load the OtherLink"),
                }
            }
            OtherlinkCommands::Update {
                id,
                name,
                display_name,
                description,
                active,
            } => {
                let id = id
                    .map(EntityId::new)
                    .or_else(|| ctx.workspace.selected_id())
                    .ok_or_else(|| anyhow!("No OtherLink selected"))?;
                let existing = ctx
                    .workspace
                    .otherlinks()
                    .into_iter()
                    .find(|o| o.id == id)
                    .ok_or_else(|| anyhow!("No OtherLink with id {id}"))?;

                let mut draft = draft_from(&existing);
                if let Some(name) = name {
                    draft.name = name;
                }
                if let Some(display_name) = display_name {
                    draft.display_name = Some(display_name.trim().to_string());
                }
                if let Some(description) = description {
                    draft.description = description;
                }
                if let Some(active) = active {
                    draft.active = active;
                }
                draft.validate().map_err(invalid_form)?;
                if draft.display_name != existing.display_name {
                    ensure_display_name_free(service, &draft, Some(&existing)).await?;
                }

                let updated = service
                    .update(&id, &draft)
                    .await
                    .map_err(|e| api_error(e, "Failed to update OtherLink"))?;
                ctx.workspace.update(updated.clone());
                println!("Updated:");
                print_otherlink(&updated, ctx.workspace.selected_id() == Some(updated.id.clone()));
            }
            OtherlinkCommands::Delete { id, yes } => {
                if !yes {
                    bail!("This deletes the OtherLink and all of its links. Re-run with --yes to confirm.");
                }
                let id = EntityId::new(id);
                service
                    .delete(&id)
                    .await
                    .map_err(|e| form_message(&e, "Failed to delete OtherLink"))?;
                ctx.workspace.remove(&id).await;
                println!("Deleted OtherLink {id}.");
                match ctx.workspace.selected() {
                    Some(selected) => print_otherlink(&selected, true),
                    None => println!("You have no OtherLinks left."),
                }
            }
            OtherlinkCommands::CheckName { display_name } => {
                let check = service
                    .check_display_name(display_name.trim())
                    .await
                    .map_err(|e| form_message(&e, "Failed to check display name"))?;
                if check.available {
                    println!("/{} is available.", display_name.trim());
                } else {
                    println!("/{} is already taken.", display_name.trim());
                }
            }
            OtherlinkCommands::Stats => {
                let body = service
                    .stats()
                    .await
                    .map_err(|e| form_message(&e, "Failed to load statistics"))?;
                print_json(&body)?;
            }
        }
        Ok(())
    }
}

async fn ensure_display_name_free(
    service: &OtherlinkService,
    draft: &OtherlinkDraft,
    existing: Option<&Otherlink>,
) -> Result<()> {
    let Some(name) = draft.display_name.as_deref() else {
        return Ok(());
    };
    if existing.and_then(|o| o.display_name.as_deref()) == Some(name) {
        return Ok(());
    }
    let check = service
        .check_display_name(name)
        .await
        .map_err(|e| form_message(&e, "Failed to check display name"))?;
    if !check.available {
        bail!("display_name: This display name is already taken");
    }
    Ok(())
}

impl LinkCommands {
    pub async fn execute(self, ctx: &AppContext) -> Result<()> {
        require_workspace(ctx, Route::Links).await?;
        let otherlink_id = ctx
            .workspace
            .selected_id()
            .ok_or_else(|| anyhow!("No OtherLink selected. Run `otherlink otherlinks select <ID>`."))?;
        let links = LinkService::new(ctx.session.client().clone());

        match self {
            LinkCommands::List {
                page,
                limit,
                search,
            } => {
                let filters: Vec<(&str, &str)> = search
                    .as_deref()
                    .map(|s| vec![("search", s)])
                    .unwrap_or_default();
                let result = links
                    .list(&otherlink_id, page, limit, &filters)
                    .await
                    .map_err(|e| form_message(&e, "Failed to load links"))?;
                if result.links.is_empty() {
                    println!("No links yet. Add one with `otherlink links create`.");
                }
                for link in &result.links {
                    print_link(link);
                }
                if let Some(pagination) = result.pagination {
                    println!(
                        "Page {} of {} ({} links)",
                        pagination.page,
                        pagination.total_pages.max(1),
                        pagination.total
                    );
                }
            }
            LinkCommands::Create {
                name,
                url,
                shortcode,
                link_type,
                description,
            } => {
                let shortcode = match shortcode {
                    Some(shortcode) => shortcode,
                    None => suggest_shortcode(&links, &otherlink_id).await,
                };
                let draft = LinkDraft {
                    name,
                    description,
                    shortcode,
                    url,
                    link_type,
                    active: true,
                };
                draft.validate().map_err(invalid_form)?;
                ensure_shortcode_free(&links, &otherlink_id, &draft.shortcode, None).await?;

                let link = links
                    .create(&otherlink_id, &draft)
                    .await
                    .map_err(|e| api_error(e, "Failed to create link"))?;
                println!("Created:");
                print_link(&link);
            }
            LinkCommands::Update {
                id,
                name,
                url,
                shortcode,
                link_type,
                description,
            } => {
                let id = EntityId::new(id);
                let existing = links
                    .get(&otherlink_id, &id)
                    .await
                    .map_err(|e| form_message(&e, "Failed to load link"))?;
                let mut draft = link_draft_from(&existing);
                if let Some(name) = name {
                    draft.name = name;
                }
                if let Some(url) = url {
                    draft.url = url;
                }
                if let Some(shortcode) = shortcode {
                    draft.shortcode = shortcode;
                }
                if let Some(link_type) = link_type {
                    draft.link_type = link_type;
                }
                if let Some(description) = description {
                    draft.description = description;
                }
                draft.validate().map_err(invalid_form)?;
                ensure_shortcode_free(&links, &otherlink_id, &draft.shortcode, Some(&id)).await?;

                let link = links
                    .update(&otherlink_id, &id, &draft)
                    .await
                    .map_err(|e| api_error(e, "Failed to update link"))?;
                println!("Updated:");
                print_link(&link);
            }
            LinkCommands::Toggle { id } => {
                let id = EntityId::new(id);
                let existing = links
                    .get(&otherlink_id, &id)
                    .await
                    .map_err(|e| form_message(&e, "Failed to load link"))?;
                let link = links
                    .set_active(&otherlink_id, &id, !existing.active)
                    .await
                    .map_err(|e| form_message(&e, "Failed to update link"))?;
                print_link(&link);
            }
            LinkCommands::Delete { id } => {
                let id = EntityId::new(id);
                links
                    .delete(&otherlink_id, &id)
                    .await
                    .map_err(|e| form_message(&e, "Failed to delete link"))?;
                println!("Deleted link {id}.");
            }
            LinkCommands::CheckShortcode { shortcode, exclude } => {
                let exclude = exclude.map(EntityId::new);
                let check = links
                    .check_shortcode(&otherlink_id, shortcode.trim(), exclude.as_ref())
                    .await
                    .map_err(|e| form_message(&e, "Failed to check shortcode"))?;
                if check.available {
                    println!("{} is available.", shortcode.trim());
                } else {
                    println!("{} is already in use.", shortcode.trim());
                }
            }
            LinkCommands::GenerateShortcode => {
                println!("{}", suggest_shortcode(&links, &otherlink_id).await);
            }
        }
        Ok(())
    }
}

/// Backend-generated shortcode, or a local random one when that fails
async fn suggest_shortcode(links: &LinkService, otherlink_id: &EntityId) -> String {
    match links.generate_shortcode(otherlink_id).await {
        Ok(shortcode) => shortcode,
        Err(e) => {
            warn!("Shortcode generation failed, using a local one: {e}");
            generate_shortcode()
        }
    }
}

async fn ensure_shortcode_free(
    links: &LinkService,
    otherlink_id: &EntityId,
    shortcode: &str,
    exclude: Option<&EntityId>,
) -> Result<()> {
    let check = links
        .check_shortcode(otherlink_id, shortcode, exclude)
        .await
        .map_err(|e| form_message(&e, "Failed to check shortcode"))?;
    if !check.available {
        bail!("shortcode: This shortcode is already in use");
    }
    Ok(())
}

/// Public landing page; needs no session
pub async fn landing_page(ctx: &AppContext, display_name: &str) -> Result<()> {
    let route = Route::Landing(display_name.trim().to_string());
    let public = ctx
        .workspace
        .service()
        .by_display_name(display_name.trim())
        .await
        .map_err(|e| match e.status() {
            Some(404) => anyhow!("No OtherLink lives at {route}"),
            _ => form_message(&e, "Failed to load the page"),
        })?;

    println!("{} ({route})", public.otherlink.name);
    if let Some(description) = public.otherlink.description.as_deref().filter(|d| !d.is_empty()) {
        println!("{description}");
    }
    let active: Vec<&Link> = public.links.iter().filter(|l| l.active).collect();
    if active.is_empty() {
        println!("No links yet.");
    }
    for link in active {
        println!("  {} -> {}", link.name, link.url);
    }
    Ok(())
}
