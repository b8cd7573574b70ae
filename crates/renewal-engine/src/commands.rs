//! Owner-facing commands.
//!
//! Each command is request/response from the caller's point of view and
//! always yields a reply string, including when the input is bad, the
//! registry has no record, or the store refuses a write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use renewal_channels::ExpiryResolver;
use renewal_core::{render_status, RenewalError, ResourceName, Urgency};
use renewal_store::{
    Conversation, DeliveryRecord, Patch, Store, StoreError, TrackedResource,
};
use tracing::{error, info, warn};

type CommandResult = renewal_core::Result<String>;

fn persistence(e: StoreError) -> RenewalError {
    RenewalError::Persistence(e.to_string())
}

pub struct CommandService {
    store: Arc<Store>,
    resolver: Arc<dyn ExpiryResolver>,
}

impl CommandService {
    pub fn new(store: Arc<Store>, resolver: Arc<dyn ExpiryResolver>) -> Self {
        Self { store, resolver }
    }

    /// Start tracking `name` for `owner`.
    pub async fn track(&self, name: &str, owner: &str) -> String {
        self.record_conversation(owner, "track");
        self.reply("track", self.try_track(name, owner, Utc::now()).await)
    }

    /// Every resource `owner` tracks, soonest expiry first.
    pub async fn list(&self, owner: &str) -> String {
        self.record_conversation(owner, "list");
        self.reply("list", self.try_list(owner, Utc::now()))
    }

    /// Live expiry and urgency for `name`. Changes nothing but conversation
    /// metadata.
    pub async fn status(&self, name: &str, owner: &str) -> String {
        self.record_conversation(owner, "status");
        self.reply("status", self.try_status(name, Utc::now()).await)
    }

    /// Stop tracking `name` for `owner` and drop its delivery history.
    pub async fn untrack(&self, name: &str, owner: &str) -> String {
        self.record_conversation(owner, "untrack");
        self.reply("untrack", self.try_untrack(name, owner))
    }

    async fn try_track(&self, name: &str, owner: &str, now: DateTime<Utc>) -> CommandResult {
        let owner = require_owner(owner)?;
        let name = ResourceName::parse(name)?;

        let expires_at = self.resolve(&name).await?;

        let existing = self
            .store
            .select::<TrackedResource>()
            .eq("resource_name", name.as_str())
            .eq("owner_address", owner)
            .limit(1)
            .resolve()
            .into_result()
            .map_err(persistence)?;
        if !existing.is_empty() {
            return Ok(format!(
                "You're already tracking {name}.\n{}",
                render_status(name.as_str(), Some(expires_at), now)
            ));
        }

        let row = self
            .store
            .insert(TrackedResource::new(name.as_str(), owner, Some(expires_at)))
            .map_err(persistence)?;
        info!(resource_id = row.id, name = %name, owner, "resource tracked");

        Ok(format!(
            "Now tracking {name}. It expires on {}.\n{}",
            expires_at.format("%Y-%m-%d"),
            render_status(name.as_str(), Some(expires_at), now)
        ))
    }

    fn try_list(&self, owner: &str, now: DateTime<Utc>) -> CommandResult {
        let owner = require_owner(owner)?;
        let rows = self
            .store
            .select::<TrackedResource>()
            .eq("owner_address", owner)
            .order("expires_at", true)
            .resolve()
            .into_result()
            .map_err(persistence)?;

        if rows.is_empty() {
            return Ok("You're not tracking any names yet. Send `track <name>` to start.".to_string());
        }

        let mut out = format!("You're tracking {} name(s):", rows.len());
        for row in &rows {
            out.push_str("\n• ");
            out.push_str(&render_status(&row.resource_name, row.expires_at, now));
        }
        Ok(out)
    }

    async fn try_status(&self, name: &str, now: DateTime<Utc>) -> CommandResult {
        let name = ResourceName::parse(name)?;
        let expires_at = self.resolve(&name).await?;
        let urgency = Urgency::from_days(renewal_core::days_until(expires_at, now));
        Ok(format!(
            "{}\nStatus: {urgency}",
            render_status(name.as_str(), Some(expires_at), now)
        ))
    }

    fn try_untrack(&self, name: &str, owner: &str) -> CommandResult {
        let owner = require_owner(owner)?;
        let name = ResourceName::parse(name)?;

        let rows = self
            .store
            .select::<TrackedResource>()
            .eq("resource_name", name.as_str())
            .eq("owner_address", owner)
            .resolve()
            .into_result()
            .map_err(persistence)?;
        if rows.is_empty() {
            return Ok(format!("You weren't tracking {name}."));
        }

        for row in &rows {
            self.store
                .delete::<DeliveryRecord>()
                .eq("resource_id", row.id)
                .execute()
                .map_err(persistence)?;
            self.store
                .delete::<TrackedResource>()
                .eq("id", row.id)
                .execute()
                .map_err(persistence)?;
        }
        info!(name = %name, owner, rows = rows.len(), "resource untracked");
        Ok(format!("Stopped tracking {name}."))
    }

    async fn resolve(&self, name: &ResourceName) -> renewal_core::Result<DateTime<Utc>> {
        self.resolver
            .resolve_expiry(name.as_str())
            .await
            .ok_or_else(|| RenewalError::ResourceNotFound {
                name: name.to_string(),
            })
    }

    /// Turn a command result into the reply text.
    fn reply(&self, command: &str, result: CommandResult) -> String {
        match result {
            Ok(text) => text,
            Err(e) => {
                if e.is_input_error() {
                    warn!(command, code = e.code(), error = %e, "command rejected");
                } else {
                    error!(command, code = e.code(), error = %e, "command failed");
                }
                error_reply(&e)
            }
        }
    }

    /// Upsert the owner's conversation row. Failures only log.
    fn record_conversation(&self, owner: &str, command: &str) {
        let owner = owner.trim();
        if owner.is_empty() {
            return;
        }
        if let Err(e) = self.upsert_conversation(owner, command) {
            warn!(owner, command, error = %e, "conversation metadata not recorded");
        }
    }

    fn upsert_conversation(&self, owner: &str, command: &str) -> renewal_store::Result<()> {
        let existing = self
            .store
            .select::<Conversation>()
            .eq("owner_address", owner)
            .limit(1)
            .resolve()
            .into_result()?;

        let current = match existing.into_iter().next() {
            Some(row) => row,
            None => match self
                .store
                .insert_unique(Conversation::new(owner, command), &["owner_address"])
            {
                Ok(_) => return Ok(()),
                // Lost a race with a concurrent first command; fall through to update.
                Err(StoreError::Duplicate { .. }) => self
                    .store
                    .select::<Conversation>()
                    .eq("owner_address", owner)
                    .limit(1)
                    .resolve()
                    .into_result()?
                    .into_iter()
                    .next()
                    .ok_or(StoreError::Duplicate {
                        table: renewal_store::TableName::Conversations,
                        key: format!("owner_address={owner}"),
                    })?,
                Err(e) => return Err(e),
            },
        };

        self.store
            .update::<Conversation>(
                Patch::new()
                    .set("last_command", command)
                    .set("command_count", current.command_count + 1),
            )
            .eq("id", current.id)
            .execute()?;
        Ok(())
    }
}

fn require_owner(owner: &str) -> renewal_core::Result<&str> {
    let owner = owner.trim();
    if owner.is_empty() {
        Err(RenewalError::MissingOwner)
    } else {
        Ok(owner)
    }
}

fn error_reply(e: &RenewalError) -> String {
    match e {
        RenewalError::InvalidResourceName { name, reason } => {
            format!("'{name}' isn't a valid name: {reason}.")
        }
        RenewalError::MissingOwner => "I need an owner address to do that.".to_string(),
        RenewalError::ResourceNotFound { name } => format!(
            "I couldn't find {name} in the registry. Check the spelling and try again."
        ),
        RenewalError::Persistence(_) => {
            "Something went wrong saving your request. Please try again.".to_string()
        }
        other => format!("Something went wrong: {other}"),
    }
}
