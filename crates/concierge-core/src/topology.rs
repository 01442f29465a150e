//! The hotel concierge deployment: a knowledge backend unit feeding a bot unit.

use concierge_types::config::DeploymentConfig;
use concierge_types::dialog::{Intent, Locale, Message, FALLBACK_INTENT_SIGNATURE, QNA_INTENT_SIGNATURE};
use concierge_types::error::{DialogError, ProvisionError};
use concierge_types::unit::UnitId;

use crate::bot::{build_bot_unit, AliasHistory, BotUnitSpec, VersionStore};
use crate::knowledge::KnowledgeBackendSpec;
use crate::provision::UnitGraph;

pub const KNOWLEDGE_UNIT: &str = "HotelBedrockKBStack";
pub const BOT_UNIT: &str = "HotelLexStack";

pub const LOCALE_ID: &str = "en_US";
pub const CONFIDENCE_THRESHOLD: f64 = 0.40;
pub const WELCOME_MESSAGE: &str = "Welcome to the Hotel AI. How can I help you today?";

/// Greeting, fallback, and knowledge-QnA intents in one `en_US` locale.
pub fn concierge_locale() -> Result<Locale, DialogError> {
    Locale::new(LOCALE_ID, CONFIDENCE_THRESHOLD)?
        .with_intent(
            Intent::with_utterances("WelcomeIntent", ["Hi", "Hello"])
                .closing_with(Message::plain_text(WELCOME_MESSAGE)),
        )?
        .with_intent(
            Intent::builtin(FALLBACK_INTENT_SIGNATURE)
                .described("Default fallback that transitions to QnA/KnowledgeBase"),
        )?
        .with_intent(Intent::builtin(QNA_INTENT_SIGNATURE))
}

/// Register both units for `config`.
pub fn concierge_units(config: &DeploymentConfig) -> Result<UnitGraph, ProvisionError> {
    let knowledge_id = UnitId::from(KNOWLEDGE_UNIT);
    let knowledge = KnowledgeBackendSpec::from_config(knowledge_id.clone(), config).into_unit();

    let invalid_dialog = |cause| ProvisionError::InvalidDialog {
        unit: UnitId::from(BOT_UNIT),
        cause,
    };
    let spec = BotUnitSpec::new(BOT_UNIT)
        .consuming(&knowledge_id)
        .with_external_function(config.external_function_arn.clone());
    let bot = build_bot_unit(
        spec,
        concierge_locale().map_err(invalid_dialog)?,
        &mut VersionStore::new(),
        &mut AliasHistory::new(),
    )
    .map_err(invalid_dialog)?;

    UnitGraph::new().with_unit(knowledge)?.with_unit(bot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::pipeline::{BOOKING_FUNCTION, BOT_ALIAS};
    use concierge_types::resource::ResourceKind;

    #[test]
    fn test_locale_matches_concierge_dialog() {
        let locale = concierge_locale().unwrap();
        let names: Vec<_> = locale.intents().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["WelcomeIntent", "AMAZON.FallbackIntent", "AMAZON.QnAIntent"]);
        assert!(locale.supports_knowledge());
        assert_eq!(locale.confidence_threshold(), 0.40);
    }

    #[test]
    fn test_plan_builds_knowledge_first() {
        let graph = concierge_units(&DeploymentConfig::default()).unwrap();
        let plan = graph.plan().unwrap();
        assert_eq!(
            plan.order,
            vec![UnitId::from(KNOWLEDGE_UNIT), UnitId::from(BOT_UNIT)]
        );
        assert_eq!(plan.waves.len(), 2);
    }

    #[test]
    fn test_function_import_follows_config() {
        let graph = concierge_units(&DeploymentConfig::default()).unwrap();
        let bot = graph.unit(&UnitId::from(BOT_UNIT)).unwrap();
        assert!(bot.resources.iter().all(|r| r.kind != ResourceKind::ImportedFunction));

        let config = DeploymentConfig {
            external_function_arn: Some("arn:aws:lambda:us-east-1:123456789012:function:booking-func".into()),
            ..DeploymentConfig::default()
        };
        let graph = concierge_units(&config).unwrap();
        let bot = graph.unit(&UnitId::from(BOT_UNIT)).unwrap();
        assert!(bot.resource(BOOKING_FUNCTION).is_some());
        let alias = serde_json::to_string(bot.resource(BOT_ALIAS).unwrap()).unwrap();
        assert!(alias.contains("CodeHookSpecification"));
    }
}
