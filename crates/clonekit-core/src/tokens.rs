//! Design-token documents keyed by screen slug.

use crate::error::Result;
use crate::types::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Output of a UI walkthrough: one entry per visited screen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalkthroughSummary {
    #[serde(default)]
    pub screens: Vec<WalkthroughScreen>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalkthroughScreen {
    pub slug: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub hierarchy: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Layout metrics per screen slug, as produced by the hierarchy dumpers.
pub type LayoutSummary = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// DesignTokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub hierarchy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default = "empty_metrics")]
    pub metrics: serde_json::Value,
}

fn empty_metrics() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub screens: BTreeMap<String, ScreenTokens>,
}

impl DesignTokens {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::io::write_json(path, self)
    }
}

pub fn load_walkthrough(path: &Path) -> Result<WalkthroughSummary> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn load_layout(path: &Path) -> Result<LayoutSummary> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Merge a walkthrough and a layout summary into one token document.
///
/// Walkthrough entries with an empty slug are dropped; a repeated slug keeps
/// the last entry. Screens that only appear in the layout summary are kept
/// with their metrics alone.
pub fn merge(
    walkthrough: &WalkthroughSummary,
    layout: &LayoutSummary,
    platform: Option<Platform>,
) -> DesignTokens {
    let mut screens: BTreeMap<String, ScreenTokens> = BTreeMap::new();

    for screen in &walkthrough.screens {
        let slug = screen.slug.trim();
        if slug.is_empty() {
            continue;
        }
        screens.insert(
            slug.to_string(),
            ScreenTokens {
                name: screen.name.clone(),
                screenshot: screen.screenshot.clone(),
                hierarchy: screen.hierarchy.clone(),
                status: screen.status.clone(),
                metrics: empty_metrics(),
            },
        );
    }

    for (slug, metrics) in layout {
        let entry = screens.entry(slug.clone()).or_insert_with(|| ScreenTokens {
            name: None,
            screenshot: None,
            hierarchy: None,
            status: None,
            metrics: empty_metrics(),
        });
        entry.metrics = metrics.clone();
    }

    DesignTokens {
        platform,
        generated_at: Some(Utc::now()),
        screens,
    }
}

// ---------------------------------------------------------------------------
// Drift between two token documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenChange {
    pub screen: String,
    pub metrics_changed: bool,
    pub status_before: Option<String>,
    pub status_after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<ScreenChange>,
}

pub fn diff_tokens(previous: &DesignTokens, current: &DesignTokens) -> TokenDiff {
    let mut out = TokenDiff::default();
    for (slug, cur) in &current.screens {
        match previous.screens.get(slug) {
            None => out.added.push(slug.clone()),
            Some(prev) => {
                let metrics_changed = prev.metrics != cur.metrics;
                if metrics_changed || prev.status != cur.status {
                    out.changed.push(ScreenChange {
                        screen: slug.clone(),
                        metrics_changed,
                        status_before: prev.status.clone(),
                        status_after: cur.status.clone(),
                    });
                }
            }
        }
    }
    out.removed = previous
        .screens
        .keys()
        .filter(|s| !current.screens.contains_key(*s))
        .cloned()
        .collect();
    out
}
