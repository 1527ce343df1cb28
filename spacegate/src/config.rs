use std::env;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use spacegate_core::{GateApp, GateConfigSnapshot};

use crate::model::WorkspaceView;
use crate::services::GatewayParams;

pub const DEFAULT_API_GROUP: &str = "toolchain.dev.openshift.com";
pub const DEFAULT_API_VERSION: &str = "v1alpha1";

const DEFAULTS: &[(&str, &str)] = &[
    ("http.host", "127.0.0.1"),
    ("http.port", "8081"),
    ("api.group", DEFAULT_API_GROUP),
    ("api.version", DEFAULT_API_VERSION),
    ("auth.userHeader", spacegate_axum::rest::DEFAULT_USER_HEADER),
    ("store.timeoutMs", "2000"),
    ("forward.timeoutMs", "5000"),
    ("workspaces.listAvailableRoles", "false"),
];

/// Configure all gateway settings: defaults, explicit environment variables,
/// then `SPACEGATE__A__B` overrides.
pub fn config(app: &GateApp<WorkspaceView, GatewayParams>) -> Result<()> {
    defaults(app);
    configure_http(app);
    configure_api(app);
    configure_store(app);
    app.load_env("SPACEGATE");

    GatewaySettings::from_snapshot(&app.config_snapshot())?;
    Ok(())
}

/// Fill every key that has no value yet.
pub fn defaults(app: &GateApp<WorkspaceView, GatewayParams>) {
    for (key, value) in DEFAULTS {
        if app.get(key).is_none() {
            app.set(*key, *value);
        }
    }
}

fn configure_http(app: &GateApp<WorkspaceView, GatewayParams>) {
    if let Ok(host) = env::var("HTTP_HOST") {
        app.set("http.host", host);
    }
    if let Ok(port) = env::var("HTTP_PORT") {
        app.set("http.port", port);
    }
}

fn configure_api(app: &GateApp<WorkspaceView, GatewayParams>) {
    if let Ok(group) = env::var("SPACEGATE_API_GROUP") {
        app.set("api.group", group.trim());
    }
}

fn configure_store(app: &GateApp<WorkspaceView, GatewayParams>) {
    if let Ok(seed) = env::var("SPACEGATE_STORE_SEED") {
        app.set("store.seedFile", seed.trim());
    }
}

/// How list and get requests are confirmed against the hosting cluster.
/// Defaults to `Http` when any `clusters.*` key is set, else `Local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    /// Answer from the sharing graph alone.
    Off,
    /// In-process cluster over the gateway's own sharing graph.
    Local,
    /// Member cluster API servers from `clusters.*`.
    Http,
}

/// Typed view of the gateway's keys.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub group: String,
    pub version: String,
    pub seed_file: Option<String>,
    pub store_timeout: Duration,
    pub forward_timeout: Duration,
    pub forward_mode: ForwardMode,
    pub list_available_roles: bool,
}

impl GatewaySettings {
    pub fn from_snapshot(cfg: &GateConfigSnapshot) -> Result<Self> {
        let forward_mode = match cfg.get("forward.mode").map(str::trim) {
            None | Some("") => {
                if cfg.with_prefix("clusters").is_empty() {
                    ForwardMode::Local
                } else {
                    ForwardMode::Http
                }
            }
            Some("off") => ForwardMode::Off,
            Some("local") => ForwardMode::Local,
            Some("http") => ForwardMode::Http,
            Some(other) => return Err(anyhow!("forward.mode must be off, local or http, got {other}")),
        };

        Ok(Self {
            group: required(cfg, "api.group")?,
            version: required(cfg, "api.version")?,
            seed_file: cfg.get_string("store.seedFile").filter(|s| !s.is_empty()),
            store_timeout: millis(cfg, "store.timeoutMs")?,
            forward_timeout: millis(cfg, "forward.timeoutMs")?,
            forward_mode,
            list_available_roles: match cfg.get("workspaces.listAvailableRoles") {
                None => false,
                Some(_) => cfg
                    .get_bool("workspaces.listAvailableRoles")
                    .context("workspaces.listAvailableRoles must be true or false")?,
            },
        })
    }
}

fn required(cfg: &GateConfigSnapshot, key: &str) -> Result<String> {
    cfg.get_string(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("Missing {key}"))
}

fn millis(cfg: &GateConfigSnapshot, key: &str) -> Result<Duration> {
    let raw = cfg.get(key).ok_or_else(|| anyhow!("Missing {key}"))?;
    let ms = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a number of milliseconds, got {raw}"))?;
    if ms == 0 {
        return Err(anyhow!("{key} must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}
