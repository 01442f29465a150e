//! Typestate pipeline for the conversational bot unit.
//!
//! `NoBot -> RoleReady -> LocaleAssembled -> Versioned -> Published`
//!
//! Each transition consumes the previous stage, so stages cannot be skipped
//! or replayed. Resources are appended to the unit as the pipeline advances,
//! which keeps their declared order identical to the build order.

use std::sync::Arc;

use concierge_types::dialog::{BotAlias, BotVersion, KnowledgeAssociation, Locale};
use concierge_types::error::DialogError;
use concierge_types::resource::{attr, PropertyValue, Resource, ResourceKind};
use concierge_types::unit::{Reference, Unit, UnitId, UnitInput};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::knowledge::{KNOWLEDGE_BASE_ARN, KNOWLEDGE_BASE_ID};
use crate::policy::{allow, assume_role_document, policy_document};

use super::version::{AliasHistory, VersionStore};

pub const BOOKING_FUNCTION: &str = "ImportedBookingLambda";
pub const BOT_ROLE: &str = "LexBotRole";
pub const BOT_ROLE_POLICY: &str = "LexBotRoleDefaultPolicy";
pub const BOT: &str = "HotelAIBot";
pub const BOT_VERSION: &str = "HotelBotVersion";
pub const BOT_ALIAS: &str = "ProdAlias";

pub const BOT_ID_OUTPUT: &str = "botId";
pub const BOT_VERSION_OUTPUT: &str = "botVersion";
pub const BOT_ALIAS_ID_OUTPUT: &str = "botAliasId";

const SERVICE_PRINCIPAL: &str = "lex.amazonaws.com";
const DRAFT_VERSION: &str = "DRAFT";

/// Inputs for the bot unit.
#[derive(Debug, Clone, PartialEq)]
pub struct BotUnitSpec {
    pub unit_id: UnitId,
    pub bot_name: String,
    pub alias_name: String,
    pub idle_session_ttl_secs: u64,
    pub child_directed: bool,
    /// Mandatory; an unbound reference fails planning.
    pub knowledge_base_id: Option<Reference>,
    /// Mandatory; an unbound reference fails planning.
    pub knowledge_base_arn: Option<Reference>,
    /// When absent the unit builds without a function import and the
    /// fallback path relies on knowledge retrieval alone.
    pub external_function_arn: Option<String>,
}

impl BotUnitSpec {
    pub fn new(unit_id: impl Into<UnitId>) -> Self {
        Self {
            unit_id: unit_id.into(),
            bot_name: "HotelConciergeAI".to_string(),
            alias_name: "Production".to_string(),
            idle_session_ttl_secs: 300,
            child_directed: false,
            knowledge_base_id: None,
            knowledge_base_arn: None,
            external_function_arn: None,
        }
    }

    /// Bind both knowledge inputs to `knowledge_unit`'s exports.
    pub fn consuming(mut self, knowledge_unit: &UnitId) -> Self {
        self.knowledge_base_id = Some(Reference::new(knowledge_unit.clone(), KNOWLEDGE_BASE_ID));
        self.knowledge_base_arn = Some(Reference::new(knowledge_unit.clone(), KNOWLEDGE_BASE_ARN));
        self
    }

    pub fn with_external_function(mut self, arn: Option<String>) -> Self {
        self.external_function_arn = arn;
        self
    }
}

/// Where a pipeline currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStage {
    NoBot,
    RoleReady,
    LocaleAssembled,
    Versioned,
    Published,
}

pub trait Stage {
    const STAGE: BotStage;
}

#[derive(Debug)]
pub struct NoBot;

#[derive(Debug)]
pub struct RoleReady {
    function_arn: Option<PropertyValue>,
}

#[derive(Debug)]
pub struct LocaleAssembled {
    function_arn: Option<PropertyValue>,
    locale: Locale,
}

#[derive(Debug)]
pub struct Versioned {
    function_arn: Option<PropertyValue>,
    draft: Locale,
    version: Arc<BotVersion>,
}

#[derive(Debug)]
pub struct Published {
    version: Arc<BotVersion>,
    alias: BotAlias,
}

impl Stage for NoBot {
    const STAGE: BotStage = BotStage::NoBot;
}
impl Stage for RoleReady {
    const STAGE: BotStage = BotStage::RoleReady;
}
impl Stage for LocaleAssembled {
    const STAGE: BotStage = BotStage::LocaleAssembled;
}
impl Stage for Versioned {
    const STAGE: BotStage = BotStage::Versioned;
}
impl Stage for Published {
    const STAGE: BotStage = BotStage::Published;
}

/// The bot unit under construction.
#[derive(Debug)]
pub struct BotPipeline<S> {
    spec: BotUnitSpec,
    unit: Unit,
    state: S,
}

impl<S: Stage> BotPipeline<S> {
    pub fn stage(&self) -> BotStage {
        S::STAGE
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    fn advance<T>(self, state: T) -> BotPipeline<T> {
        BotPipeline {
            spec: self.spec,
            unit: self.unit,
            state,
        }
    }
}

impl BotPipeline<NoBot> {
    /// Declare the unit, its inputs, and an explicit dependency on every
    /// producer it reads from.
    pub fn new(spec: BotUnitSpec) -> Self {
        let mut unit = Unit::new(spec.unit_id.clone())
            .with_input(KNOWLEDGE_BASE_ID, UnitInput::required(spec.knowledge_base_id.clone()))
            .with_input(KNOWLEDGE_BASE_ARN, UnitInput::required(spec.knowledge_base_arn.clone()));
        for reference in [&spec.knowledge_base_id, &spec.knowledge_base_arn].into_iter().flatten() {
            unit = unit.depends_on(reference.producing_unit.clone());
        }
        Self {
            spec,
            unit,
            state: NoBot,
        }
    }

    /// Import the optional function, then create the bot's role and its
    /// retrieval grant.
    pub fn prepare_role(mut self) -> BotPipeline<RoleReady> {
        let function_arn = match &self.spec.external_function_arn {
            Some(arn) => {
                self.unit = self.unit.with_resource(
                    Resource::new(BOOKING_FUNCTION, ResourceKind::ImportedFunction)
                        .with_property("FunctionArn", arn.clone()),
                );
                Some(PropertyValue::attribute(BOOKING_FUNCTION, attr::ARN))
            }
            None => {
                tracing::info!(
                    unit_id = %self.spec.unit_id,
                    "no external function configured, fallback relies on knowledge retrieval"
                );
                None
            }
        };

        let role = Resource::new(BOT_ROLE, ResourceKind::Role)
            .with_property("AssumeRolePolicyDocument", assume_role_document(SERVICE_PRINCIPAL));
        let policy = Resource::new(BOT_ROLE_POLICY, ResourceKind::RolePolicy)
            .with_property("PolicyName", BOT_ROLE_POLICY)
            .with_property(
                "Roles",
                PropertyValue::list([PropertyValue::attribute(BOT_ROLE, attr::ROLE_NAME)]),
            )
            .with_property(
                "PolicyDocument",
                policy_document([allow(
                    &["bedrock:Retrieve", "bedrock:RetrieveAndGenerate"],
                    [PropertyValue::input(KNOWLEDGE_BASE_ARN)],
                )]),
            );

        self.unit = self.unit.with_resource(role).with_resource(policy);
        self.advance(RoleReady { function_arn })
    }
}

impl BotPipeline<RoleReady> {
    pub fn assemble_locale(self, locale: Locale) -> Result<BotPipeline<LocaleAssembled>, DialogError> {
        if locale.intents().is_empty() {
            return Err(DialogError::EmptyLocale(locale.locale_id().to_string()));
        }
        let function_arn = self.state.function_arn.clone();
        Ok(self.advance(LocaleAssembled {
            function_arn,
            locale,
        }))
    }
}

impl BotPipeline<LocaleAssembled> {
    pub fn locale(&self) -> &Locale {
        &self.state.locale
    }

    /// Compile the draft into an immutable version and declare the bot and
    /// version resources from that snapshot.
    pub fn build_version(mut self, versions: &mut VersionStore) -> BotPipeline<Versioned> {
        let version = versions.snapshot(&self.state.locale, &self.spec.unit_id);

        let bot = Resource::new(BOT, ResourceKind::Bot)
            .with_property("Name", self.spec.bot_name.clone())
            .with_property("RoleArn", PropertyValue::attribute(BOT_ROLE, attr::ARN))
            .with_property(
                "DataPrivacy",
                PropertyValue::literal(json!({ "ChildDirected": self.spec.child_directed })),
            )
            .with_property("IdleSessionTTLInSeconds", self.spec.idle_session_ttl_secs)
            .with_property("AutoBuildBotLocales", false)
            .with_property(
                "BotLocales",
                PropertyValue::literal(Value::Array(vec![render_locale(&version.locale)])),
            );

        let bot_version = Resource::new(BOT_VERSION, ResourceKind::BotVersion)
            .with_property("BotId", PropertyValue::attribute(BOT, attr::BOT_ID))
            .with_property(
                "BotVersionLocaleSpecification",
                PropertyValue::literal(json!([{
                    "LocaleId": version.locale.locale_id(),
                    "BotVersionLocaleDetails": { "SourceBotVersion": DRAFT_VERSION }
                }])),
            );

        self.unit = self.unit.with_resource(bot).with_resource(bot_version);

        let LocaleAssembled {
            function_arn,
            locale,
        } = self.state;
        BotPipeline {
            spec: self.spec,
            unit: self.unit,
            state: Versioned {
                function_arn,
                draft: locale,
                version,
            },
        }
    }
}

impl BotPipeline<Versioned> {
    pub fn version(&self) -> &Arc<BotVersion> {
        &self.state.version
    }

    /// The draft stays editable; edits never reach the snapshot.
    pub fn draft_mut(&mut self) -> &mut Locale {
        &mut self.state.draft
    }

    /// Bind the alias to this version. Knowledge retrieval is associated
    /// only when the versioned locale declares knowledge support.
    pub fn publish(
        mut self,
        aliases: &mut AliasHistory,
        versions: &VersionStore,
    ) -> Result<BotPipeline<Published>, DialogError> {
        let version = Arc::clone(&self.state.version);
        let locale_id = version.locale.locale_id().to_string();
        let association = version.locale.supports_knowledge().then(|| KnowledgeAssociation {
            locale_id: locale_id.clone(),
            knowledge_base_id: PropertyValue::input(KNOWLEDGE_BASE_ID),
        });

        let alias = aliases.bind(&self.spec.alias_name, version.version, versions, association)?;

        let mut setting = vec![("Enabled", PropertyValue::from(true))];
        if let Some(function_arn) = self.state.function_arn.take() {
            setting.push((
                "CodeHookSpecification",
                PropertyValue::map([(
                    "LambdaCodeHook",
                    PropertyValue::map([
                        ("LambdaArn", function_arn),
                        ("CodeHookInterfaceVersion", PropertyValue::from("1.0")),
                    ]),
                )]),
            ));
        }
        let mut locale_settings = vec![
            ("LocaleId", PropertyValue::from(locale_id)),
            ("BotAliasLocaleSetting", PropertyValue::map(setting)),
        ];
        if let Some(association) = &alias.knowledge_association {
            locale_settings.push((
                "KnowledgeBaseSupport",
                PropertyValue::map([("KnowledgeBaseId", association.knowledge_base_id.clone())]),
            ));
        }

        let alias_resource = Resource::new(BOT_ALIAS, ResourceKind::BotAlias)
            .with_property("BotId", PropertyValue::attribute(BOT, attr::BOT_ID))
            .with_property("BotVersion", PropertyValue::attribute(BOT_VERSION, attr::BOT_VERSION))
            .with_property("BotAliasName", alias.name.clone())
            .with_property(
                "BotAliasLocaleSettings",
                PropertyValue::list([PropertyValue::map(locale_settings)]),
            );

        self.unit = self
            .unit
            .with_resource(alias_resource)
            .with_export(BOT_ID_OUTPUT, PropertyValue::attribute(BOT, attr::BOT_ID))
            .with_export(
                BOT_VERSION_OUTPUT,
                PropertyValue::attribute(BOT_VERSION, attr::BOT_VERSION),
            )
            .with_export(
                BOT_ALIAS_ID_OUTPUT,
                PropertyValue::attribute(BOT_ALIAS, attr::BOT_ALIAS_ID),
            );

        Ok(self.advance(Published { version, alias }))
    }
}

impl BotPipeline<Published> {
    pub fn version(&self) -> &Arc<BotVersion> {
        &self.state.version
    }

    pub fn alias(&self) -> &BotAlias {
        &self.state.alias
    }

    pub fn into_unit(self) -> Unit {
        self.unit
    }
}

/// Run the whole pipeline for `spec` with `locale`.
pub fn build_bot_unit(
    spec: BotUnitSpec,
    locale: Locale,
    versions: &mut VersionStore,
    aliases: &mut AliasHistory,
) -> Result<Unit, DialogError> {
    let published = BotPipeline::new(spec)
        .prepare_role()
        .assemble_locale(locale)?
        .build_version(versions)
        .publish(aliases, versions)?;
    Ok(published.into_unit())
}

fn render_locale(locale: &Locale) -> Value {
    let intents: Vec<Value> = locale
        .intents()
        .iter()
        .map(|intent| {
            let mut object = Map::new();
            object.insert("Name".into(), json!(intent.name));
            if !intent.sample_utterances.is_empty() {
                let utterances: Vec<Value> = intent
                    .sample_utterances
                    .iter()
                    .map(|u| json!({ "Utterance": u }))
                    .collect();
                object.insert("SampleUtterances".into(), Value::Array(utterances));
            }
            if let Some(signature) = &intent.parent_signature {
                object.insert("ParentIntentSignature".into(), json!(signature));
            }
            if let Some(description) = &intent.description {
                object.insert("Description".into(), json!(description));
            }
            if let Some(message) = &intent.closing_response {
                object.insert(
                    "IntentClosingSetting".into(),
                    json!({
                        "IsActive": true,
                        "ClosingResponse": {
                            "MessageGroupsList": [{
                                "Message": { "PlainTextMessage": { "Value": message.plain_text } }
                            }]
                        }
                    }),
                );
            }
            Value::Object(object)
        })
        .collect();

    json!({
        "LocaleId": locale.locale_id(),
        "NluConfidenceThreshold": locale.confidence_threshold(),
        "Intents": intents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::dialog::{Intent, Message, FALLBACK_INTENT_SIGNATURE, QNA_INTENT_SIGNATURE};

    fn spec() -> BotUnitSpec {
        BotUnitSpec::new("HotelLexStack").consuming(&UnitId::from("HotelBedrockKBStack"))
    }

    fn locale(with_qna: bool) -> Locale {
        let mut locale = Locale::new("en_US", 0.4)
            .unwrap()
            .with_intent(
                Intent::with_utterances("WelcomeIntent", ["Hi", "Hello"])
                    .closing_with(Message::plain_text("Welcome")),
            )
            .unwrap()
            .with_intent(Intent::builtin(FALLBACK_INTENT_SIGNATURE))
            .unwrap();
        if with_qna {
            locale.add_intent(Intent::builtin(QNA_INTENT_SIGNATURE)).unwrap();
        }
        locale
    }

    fn ids(unit: &Unit) -> Vec<&str> {
        unit.resources.iter().map(|r| r.logical_id.as_str()).collect()
    }

    #[test]
    fn test_stages_advance_in_order() {
        let mut versions = VersionStore::new();
        let mut aliases = AliasHistory::new();

        let pipeline = BotPipeline::new(spec());
        assert_eq!(pipeline.stage(), BotStage::NoBot);
        let pipeline = pipeline.prepare_role();
        assert_eq!(pipeline.stage(), BotStage::RoleReady);
        let pipeline = pipeline.assemble_locale(locale(true)).unwrap();
        assert_eq!(pipeline.stage(), BotStage::LocaleAssembled);
        let pipeline = pipeline.build_version(&mut versions);
        assert_eq!(pipeline.stage(), BotStage::Versioned);
        let pipeline = pipeline.publish(&mut aliases, &versions).unwrap();
        assert_eq!(pipeline.stage(), BotStage::Published);
        assert_eq!(pipeline.alias().generation, 1);

        let unit = pipeline.into_unit();
        assert_eq!(
            ids(&unit),
            vec![BOT_ROLE, BOT_ROLE_POLICY, BOT, BOT_VERSION, BOT_ALIAS]
        );
        assert!(unit.depends_on.contains(&UnitId::from("HotelBedrockKBStack")));
        assert_eq!(unit.exports.len(), 3);
    }

    #[test]
    fn test_without_function_there_is_no_import() {
        let mut versions = VersionStore::new();
        let mut aliases = AliasHistory::new();
        let unit = build_bot_unit(spec(), locale(true), &mut versions, &mut aliases).unwrap();

        assert!(unit.resources.iter().all(|r| r.kind != ResourceKind::ImportedFunction));
        let alias = serde_json::to_string(unit.resource(BOT_ALIAS).unwrap()).unwrap();
        assert!(!alias.contains("CodeHookSpecification"));
    }

    #[test]
    fn test_function_is_imported_and_hooked() {
        let mut versions = VersionStore::new();
        let mut aliases = AliasHistory::new();
        let spec = spec().with_external_function(Some(
            "arn:aws:lambda:us-east-1:123456789012:function:book-room".to_string(),
        ));
        let unit = build_bot_unit(spec, locale(true), &mut versions, &mut aliases).unwrap();

        assert_eq!(ids(&unit)[0], BOOKING_FUNCTION);
        let settings = unit.resource(BOT_ALIAS).unwrap().property("BotAliasLocaleSettings").unwrap();
        let refs = settings.attribute_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].resource, BOOKING_FUNCTION);
    }

    #[test]
    fn test_role_policy_reads_knowledge_base_arn() {
        let pipeline = BotPipeline::new(spec()).prepare_role();
        let policy = pipeline.unit().resource(BOT_ROLE_POLICY).unwrap();
        assert_eq!(
            policy.property("PolicyDocument").unwrap().inputs(),
            vec![KNOWLEDGE_BASE_ARN]
        );
    }

    #[test]
    fn test_knowledge_association_follows_locale_support() {
        let mut versions = VersionStore::new();
        let mut aliases = AliasHistory::new();

        let with_qna = build_bot_unit(spec(), locale(true), &mut versions, &mut aliases).unwrap();
        let settings = with_qna.resource(BOT_ALIAS).unwrap().property("BotAliasLocaleSettings").unwrap();
        assert_eq!(settings.inputs(), vec![KNOWLEDGE_BASE_ID]);

        let without = build_bot_unit(spec(), locale(false), &mut versions, &mut aliases).unwrap();
        let settings = without.resource(BOT_ALIAS).unwrap().property("BotAliasLocaleSettings").unwrap();
        assert!(settings.inputs().is_empty());
        assert_eq!(aliases.generations("Production").len(), 2);
        assert!(aliases.current("Production").unwrap().knowledge_association.is_none());
    }

    #[test]
    fn test_empty_locale_is_rejected() {
        let err = BotPipeline::new(spec())
            .prepare_role()
            .assemble_locale(Locale::new("en_US", 0.4).unwrap())
            .unwrap_err();
        assert_eq!(err, DialogError::EmptyLocale("en_US".to_string()));
    }

    #[test]
    fn test_draft_edits_after_versioning_do_not_leak() {
        let mut versions = VersionStore::new();
        let mut aliases = AliasHistory::new();
        let mut pipeline = BotPipeline::new(spec())
            .prepare_role()
            .assemble_locale(locale(true))
            .unwrap()
            .build_version(&mut versions);

        pipeline
            .draft_mut()
            .add_intent(Intent::with_utterances("BookRoom", ["Book a room"]))
            .unwrap();
        assert!(pipeline.version().locale.intent("BookRoom").is_none());

        let published = pipeline.publish(&mut aliases, &versions).unwrap();
        assert!(published.version().locale.intent("BookRoom").is_none());
        let unit = published.into_unit();
        let bot = serde_json::to_string(unit.resource(BOT).unwrap()).unwrap();
        assert!(!bot.contains("BookRoom"));
    }

    #[test]
    fn test_renders_builtin_intents_without_utterances() {
        let rendered = render_locale(&locale(true));
        let intents = rendered["Intents"].as_array().unwrap();
        assert_eq!(intents.len(), 3);
        assert_eq!(intents[0]["SampleUtterances"][0]["Utterance"], "Hello");
        assert_eq!(intents[1]["ParentIntentSignature"], FALLBACK_INTENT_SIGNATURE);
        assert!(intents[2].get("SampleUtterances").is_none());
        assert_eq!(rendered["NluConfidenceThreshold"], json!(0.4));
    }
}
