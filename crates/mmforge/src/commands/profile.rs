//! Match profile submission.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde_json::Value;

use crate::cli::{ProfileAction, ProfileCommand};
use mmforge_core::types::Profile;
use mmforge_core::{CoordinationStore, ForgeConfig, ResultId, records};

pub async fn execute(cmd: ProfileCommand, config: &ForgeConfig) -> Result<()> {
    match cmd.action {
        ProfileAction::Submit {
            profile_id,
            file,
            match_object_id,
        } => submit(&profile_id, &file, match_object_id, config).await,
    }
}

async fn submit(
    profile_id: &str,
    file: &Path,
    match_object_id: Option<String>,
    config: &ForgeConfig,
) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read profile from {}", file.display()))?;
    let profile = parse_profile(profile_id, &content)?;
    let match_object_id =
        match_object_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

    let store = super::open_store(config).await?;
    let result_id = enqueue(store.as_ref(), config, profile, &match_object_id).await?;

    println!("{} Profile {} queued", "✓".green(), profile_id.cyan());
    println!("  Result ID: {}", result_id.to_string().bold());
    println!("  Check with: mmforge result get {}", result_id);
    Ok(())
}

/// Build a profile from a JSON document.
///
/// The whole document becomes the profile properties; `name`, `rosters` and
/// `pools` are lifted out of it when present.
fn parse_profile(profile_id: &str, content: &str) -> Result<Profile> {
    let doc: Value = serde_json::from_str(content).context("profile is not valid JSON")?;
    if !doc.is_object() {
        bail!("profile must be a JSON object");
    }

    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(profile_id)
        .to_string();
    let rosters = match doc.get("rosters") {
        Some(v) => serde_json::from_value(v.clone()).context("invalid rosters in profile")?,
        None => Vec::new(),
    };
    let pools = match doc.get("pools") {
        Some(v) => serde_json::from_value(v.clone()).context("invalid pools in profile")?,
        None => Vec::new(),
    };

    Ok(Profile {
        id: profile_id.to_string(),
        name,
        properties: content.trim().to_string(),
        rosters,
        pools,
    })
}

/// Store the profile record and add its match request to the profile queue.
async fn enqueue(
    store: &dyn CoordinationStore,
    config: &ForgeConfig,
    profile: Profile,
    match_object_id: &str,
) -> Result<ResultId> {
    let result_id = ResultId::new(match_object_id, &profile.id)?;
    records::put_profile(store, &profile.id, &profile).await?;
    store
        .set_add(&config.queues.profiles.name, &[result_id.to_string()])
        .await?;
    Ok(result_id)
}
