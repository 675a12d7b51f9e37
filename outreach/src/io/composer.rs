//! Message composer: subject lines and HTML bodies per vertical and slot.

use anyhow::{Context, Result};
use minijinja::value::Value;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::types::{RecipientFacts, Vertical};
use crate::io::config::OutreachConfig;

const LAYOUT: &str = include_str!("templates/layout.html");
const FOLLOWUP: &str = include_str!("templates/followup.html");

/// Template sources keyed by name. Initial variants are listed per vertical in
/// rotation order.
const TEMPLATES: [(&str, &str); 11] = [
    ("layout.html", LAYOUT),
    ("followup.html", FOLLOWUP),
    ("initial/sleep_1.html", include_str!("templates/initial/sleep_1.html")),
    ("initial/sleep_2.html", include_str!("templates/initial/sleep_2.html")),
    ("initial/sleep_3.html", include_str!("templates/initial/sleep_3.html")),
    ("initial/ai_1.html", include_str!("templates/initial/ai_1.html")),
    ("initial/ai_2.html", include_str!("templates/initial/ai_2.html")),
    ("initial/ai_3.html", include_str!("templates/initial/ai_3.html")),
    ("initial/local_1.html", include_str!("templates/initial/local_1.html")),
    ("initial/local_2.html", include_str!("templates/initial/local_2.html")),
    ("initial/local_3.html", include_str!("templates/initial/local_3.html")),
];

/// Number of initial-message variants available per vertical.
pub const INITIAL_VARIANTS: usize = 3;

/// Rotation order of initial templates for a vertical.
pub fn initial_variants(vertical: Vertical) -> [&'static str; INITIAL_VARIANTS] {
    match vertical {
        Vertical::Sleep => [
            "initial/sleep_1.html",
            "initial/sleep_2.html",
            "initial/sleep_3.html",
        ],
        Vertical::Ai => [
            "initial/ai_1.html",
            "initial/ai_2.html",
            "initial/ai_3.html",
        ],
        Vertical::Local => [
            "initial/local_1.html",
            "initial/local_2.html",
            "initial/local_3.html",
        ],
    }
}

/// Subject line for the initial message (and its resends).
pub fn initial_subject(vertical: Vertical, domain_name: &str) -> String {
    match vertical {
        Vertical::Sleep => format!("Quick question about {domain_name}"),
        Vertical::Ai => format!("Could {domain_name} work for your product?"),
        Vertical::Local => format!("About the domain {domain_name}"),
    }
}

/// Follow-up wording tier. Ordinals past the second collapse into `Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowupStage {
    First,
    Second,
    Final,
}

impl FollowupStage {
    pub fn from_ordinal(ordinal: u32) -> Self {
        match ordinal {
            0 | 1 => FollowupStage::First,
            2 => FollowupStage::Second,
            _ => FollowupStage::Final,
        }
    }

    pub fn subject(self, domain_name: &str) -> String {
        match self {
            FollowupStage::First => format!("Following up on {domain_name}"),
            FollowupStage::Second => format!("Still considering {domain_name}?"),
            FollowupStage::Final => format!("{domain_name}: should I close this out?"),
        }
    }
}

/// A rendered email ready for the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub html_body: String,
}

/// Sender details and tracking base shared by every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerSettings {
    pub sender_name: String,
    pub linkedin_url: String,
    pub x_url: String,
    pub pixel_base: String,
}

impl ComposerSettings {
    pub fn from_config(cfg: &OutreachConfig) -> Self {
        Self {
            sender_name: cfg.smtp.from_name.clone(),
            linkedin_url: cfg.signature.linkedin_url.clone(),
            x_url: cfg.signature.x_url.clone(),
            pixel_base: cfg.tracking.pixel_base.clone(),
        }
    }

    /// Tracking pixel URL for a lead.
    pub fn pixel_url(&self, tracking_id: &str) -> String {
        let separator = if self.pixel_base.contains('?') { '&' } else { '?' };
        format!("{}{separator}tid={tracking_id}", self.pixel_base)
    }
}

/// Template engine wrapper around minijinja.
pub struct MessageComposer {
    env: Environment<'static>,
    settings: ComposerSettings,
}

impl MessageComposer {
    pub fn new(settings: ComposerSettings) -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("register template {name}"))?;
        }
        Ok(Self { env, settings })
    }

    /// Render initial-message variant `slot` for `vertical`.
    pub fn render_initial(
        &self,
        vertical: Vertical,
        slot: u32,
        facts: RecipientFacts<'_>,
        tracking_id: &str,
    ) -> Result<Message> {
        let variants = initial_variants(vertical);
        let name = variants[slot as usize % INITIAL_VARIANTS];
        debug!(template = name, %vertical, slot, "rendering initial message");
        let html_body = self.render(name, facts, tracking_id, false)?;
        Ok(Message {
            subject: initial_subject(vertical, facts.domain_name),
            html_body,
        })
    }

    /// Render follow-up number `ordinal` (1-based).
    pub fn render_followup(
        &self,
        ordinal: u32,
        facts: RecipientFacts<'_>,
        tracking_id: &str,
    ) -> Result<Message> {
        let stage = FollowupStage::from_ordinal(ordinal);
        debug!(ordinal, ?stage, "rendering follow-up message");
        let html_body = self.render(
            "followup.html",
            facts,
            tracking_id,
            stage == FollowupStage::Final,
        )?;
        Ok(Message {
            subject: stage.subject(facts.domain_name),
            html_body,
        })
    }

    fn render(
        &self,
        name: &str,
        facts: RecipientFacts<'_>,
        tracking_id: &str,
        is_final: bool,
    ) -> Result<String> {
        let template = self.env.get_template(name)?;
        let greeting = facts
            .first_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Hi");
        let rendered = template
            .render(context! {
                greeting => greeting,
                domain_name => facts.domain_name,
                is_final => is_final,
                sender_name => self.settings.sender_name.as_str(),
                linkedin_url => Value::from_safe_string(self.settings.linkedin_url.clone()),
                x_url => Value::from_safe_string(self.settings.x_url.clone()),
                pixel_url => Value::from_safe_string(self.settings.pixel_url(tracking_id)),
            })
            .with_context(|| format!("render template {name}"))?;
        Ok(rendered)
    }
}
