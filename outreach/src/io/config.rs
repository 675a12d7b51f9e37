//! Campaign configuration stored in `outreach.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::core::cadence::CadenceConfig;
use crate::core::pacing::PacingPolicy;
use crate::io::composer::INITIAL_VARIANTS;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "outreach.toml";

/// Outreach configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values the campaign was tuned with. Secrets never live here: the SMTP
/// password is read from the environment variable named by `smtp.password_env`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OutreachConfig {
    pub store: StoreConfig,
    pub campaign: CampaignConfig,
    pub pacing: PacingConfig,
    pub smtp: SmtpConfig,
    pub tracking: TrackingConfig,
    pub signature: SignatureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl StoreConfig {
    /// Database path, with relative paths taken from the config file's directory.
    pub fn resolve_db_path(&self, config_path: &Path) -> PathBuf {
        if self.db_path.is_absolute() {
            return self.db_path.clone();
        }
        match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(&self.db_path),
            _ => self.db_path.clone(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("emails.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CampaignConfig {
    /// Maximum leads pulled per pass.
    pub batch_size: usize,
    pub resend_after_days: i64,
    pub followup_after_days: i64,
    pub max_followups: u32,
    /// Rotating initial-message variants per vertical.
    pub template_slots: u32,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            batch_size: 30,
            resend_after_days: 2,
            followup_after_days: 4,
            max_followups: 4,
            template_slots: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PacingConfig {
    pub delay_min_secs: u64,
    pub delay_max_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        let policy = PacingPolicy::default();
        Self {
            delay_min_secs: policy.min_secs,
            delay_max_secs: policy.max_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Environment variable holding the SMTP password.
    pub password_env: String,
    pub from_email: String,
    pub from_name: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password_env: "SMTP_PASSWORD".to_string(),
            from_email: String::new(),
            from_name: "Shoeb".to_string(),
        }
    }
}

impl SmtpConfig {
    /// Check the fields a real send needs.
    pub fn validate_for_send(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("smtp.host must be set"));
        }
        if self.username.trim().is_empty() {
            return Err(anyhow!("smtp.username must be set"));
        }
        if self.from_email.trim().is_empty() {
            return Err(anyhow!("smtp.from_email must be set"));
        }
        if self.password_env.trim().is_empty() {
            return Err(anyhow!("smtp.password_env must name an environment variable"));
        }
        Ok(())
    }

    /// Read the password from the configured environment variable.
    pub fn password(&self) -> Result<String> {
        std::env::var(&self.password_env)
            .with_context(|| format!("read SMTP password from ${}", self.password_env))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Base URL of the open-tracking pixel; `?tid=<tracking id>` is appended.
    pub pixel_base: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            pixel_base: "https://your-vercel-app.vercel.app/api/pixel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SignatureConfig {
    pub linkedin_url: String,
    pub x_url: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            linkedin_url: "https://www.linkedin.com/in/yourprofile".to_string(),
            x_url: "https://x.com/yourhandle".to_string(),
        }
    }
}

impl OutreachConfig {
    pub fn validate(&self) -> Result<()> {
        let campaign = &self.campaign;
        if campaign.batch_size == 0 {
            return Err(anyhow!("campaign.batch_size must be > 0"));
        }
        if campaign.template_slots == 0 {
            return Err(anyhow!("campaign.template_slots must be > 0"));
        }
        if campaign.template_slots as usize > INITIAL_VARIANTS {
            return Err(anyhow!(
                "campaign.template_slots ({}) must be <= {INITIAL_VARIANTS}",
                campaign.template_slots
            ));
        }
        if campaign.max_followups == 0 {
            return Err(anyhow!("campaign.max_followups must be > 0"));
        }
        if campaign.resend_after_days < 0 || campaign.followup_after_days < 0 {
            return Err(anyhow!("campaign thresholds must be >= 0 days"));
        }
        if self.pacing.delay_min_secs > self.pacing.delay_max_secs {
            return Err(anyhow!(
                "pacing.delay_min_secs ({}) must be <= pacing.delay_max_secs ({})",
                self.pacing.delay_min_secs,
                self.pacing.delay_max_secs
            ));
        }
        if self.tracking.pixel_base.trim().is_empty() {
            return Err(anyhow!("tracking.pixel_base must be non-empty"));
        }
        Ok(())
    }

    pub fn cadence(&self) -> CadenceConfig {
        CadenceConfig {
            resend_after: Duration::days(self.campaign.resend_after_days),
            followup_after: Duration::days(self.campaign.followup_after_days),
            max_followups: self.campaign.max_followups,
            template_slots: self.campaign.template_slots,
        }
    }

    pub fn pacing(&self) -> PacingPolicy {
        PacingPolicy {
            min_secs: self.pacing.delay_min_secs,
            max_secs: self.pacing.delay_max_secs,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `OutreachConfig::default()`.
pub fn load_config(path: &Path) -> Result<OutreachConfig> {
    if !path.exists() {
        let cfg = OutreachConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: OutreachConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &OutreachConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
