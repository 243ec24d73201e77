//! Intent router: decides the reply for one inbound text.

use std::sync::Arc;

use crate::routing::launcher::Launcher;
use crate::routing::registry::CategoryRegistry;

/// Outcome of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingResult {
    pub reply_text: String,
    /// True iff a category prefix matched.
    pub matched_category: bool,
    /// Set when a launch was attempted, whether or not it succeeded.
    pub launched_item_type: Option<String>,
    pub launched_item_name: Option<String>,
}

/// Prefix-based router over a [`CategoryRegistry`].
pub struct IntentRouter {
    registry: Arc<CategoryRegistry>,
    launcher: Arc<dyn Launcher>,
}

impl IntentRouter {
    pub fn new(registry: Arc<CategoryRegistry>, launcher: Arc<dyn Launcher>) -> Self {
        Self { registry, launcher }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Route a message body. Never fails: launch errors become an apology.
    pub fn route(&self, message_body: &str, sender_id: &str, sender_name: &str) -> RoutingResult {
        let Some((rule, rest)) = self.registry.match_prefix(message_body) else {
            tracing::debug!(sender = %sender_id, "No category prefix, using general response");
            return RoutingResult {
                reply_text: general_response(message_body),
                matched_category: false,
                launched_item_type: None,
                launched_item_name: None,
            };
        };

        let item_name = rest.trim();
        if item_name.is_empty() {
            tracing::debug!(sender = %sender_id, prefix = %rule.prefix, "Category prefix without item name");
            return RoutingResult {
                reply_text: prompt_reply(&rule.item_type, &rule.prefix),
                matched_category: true,
                launched_item_type: None,
                launched_item_name: None,
            };
        }

        tracing::info!(
            sender = %sender_id,
            item_type = %rule.item_type,
            item_name = %item_name,
            "Category request detected"
        );

        let reply_text = match self.launcher.launch(&rule.item_type, &rule.target, item_name) {
            Ok(_handle) => confirmation_reply(sender_name, &rule.item_type, item_name),
            Err(e) => {
                tracing::error!(
                    sender = %sender_id,
                    item_type = %rule.item_type,
                    script = %rule.target.script.display(),
                    error = %e,
                    "Failed to launch lookup"
                );
                apology_reply(&rule.item_type)
            }
        };

        RoutingResult {
            reply_text,
            matched_category: true,
            launched_item_type: Some(rule.item_type.clone()),
            launched_item_name: Some(item_name.to_string()),
        }
    }
}

/// Reply for text that matched no category.
pub fn general_response(message_body: &str) -> String {
    message_body.to_uppercase()
}

fn confirmation_reply(sender_name: &str, item_type: &str, item_name: &str) -> String {
    format!(
        "¡Perfecto, **{sender_name}**! He iniciado la búsqueda de información para el **{item_type}**: **{item_name}**."
    )
}

fn apology_reply(item_type: &str) -> String {
    format!("Disculpa, ha ocurrido un error al iniciar el proceso de búsqueda para el {item_type}.")
}

fn prompt_reply(item_type: &str, prefix: &str) -> String {
    format!(
        "¿Qué **{item_type}** estás buscando? Por favor, escribe '{}' seguido del nombre.",
        capitalize(prefix)
    )
}

/// First character uppercased, the rest lowercased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
