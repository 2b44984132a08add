//! Transcript-to-intent routing.
//!
//! A [`CommandRouter`] is an ordered list of rules; the first rule with a
//! keyword contained in the lower-cased transcript wins, and anything that
//! matches nothing becomes a web search.

use crate::config::Variant;

/// What the assistant should do with a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// "hello"
    Greeting,
    /// "who are you"
    Identity,
    /// "how are you"
    Status,
    /// "what is your name"
    Name,
    /// "bye"
    Farewell,
    /// "cane"
    ConnectCane,
    /// "emergency" or "help"
    Emergency,
    /// "location" or "nearby"
    Location,
    /// "home"
    Home,
    /// Anything else.
    WebSearch,
}

impl Intent {
    /// Fixed spoken reply for conversational intents.
    pub fn reply(&self) -> Option<&'static str> {
        match self {
            Self::Greeting => Some("Hello, Sir. How may I assist you?"),
            Self::Identity => Some("I am your virtual assistant, Healix."),
            Self::Status => Some("I am operating at optimal efficiency."),
            Self::Name => Some("I am Healix."),
            Self::Farewell => Some("Goodbye, Sir. Until next time."),
            _ => None,
        }
    }
}

/// One routing rule: fires when any keyword is a substring of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    keywords: &'static [&'static str],
    intent: Intent,
}

impl Rule {
    /// Create a rule.
    pub const fn new(keywords: &'static [&'static str], intent: Intent) -> Self {
        Self { keywords, intent }
    }

    /// Check a lower-cased message against this rule.
    pub fn matches(&self, message: &str) -> bool {
        self.keywords.iter().any(|k| message.contains(k))
    }

    /// Intent this rule resolves to.
    pub fn intent(&self) -> Intent {
        self.intent
    }
}

const GREETING: Rule = Rule::new(&["hello"], Intent::Greeting);
const IDENTITY: Rule = Rule::new(&["who are you"], Intent::Identity);
const STATUS: Rule = Rule::new(&["how are you"], Intent::Status);
const NAME: Rule = Rule::new(&["what is your name"], Intent::Name);
const FAREWELL: Rule = Rule::new(&["bye"], Intent::Farewell);
const CONNECT_CANE: Rule = Rule::new(&["cane"], Intent::ConnectCane);
const EMERGENCY: Rule = Rule::new(&["emergency", "help"], Intent::Emergency);
const LOCATION: Rule = Rule::new(&["location", "nearby"], Intent::Location);
const HOME: Rule = Rule::new(&["home"], Intent::Home);

/// Priority-ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRouter {
    rules: Vec<Rule>,
}

impl CommandRouter {
    /// Router for an assistant variant.
    ///
    /// Only the navigator knows the "home" command.
    pub fn for_variant(variant: Variant) -> Self {
        let mut rules = vec![
            GREETING,
            IDENTITY,
            STATUS,
            NAME,
            FAREWELL,
            CONNECT_CANE,
            EMERGENCY,
            LOCATION,
        ];
        if variant.has_home_command() {
            rules.push(HOME);
        }
        Self { rules }
    }

    /// Router with a custom rule list.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Resolve a transcript to exactly one intent.
    pub fn route(&self, transcript: &str) -> Intent {
        let message = transcript.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&message))
            .map(Rule::intent)
            .unwrap_or(Intent::WebSearch)
    }

    /// The rules in priority order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::for_variant(Variant::default())
    }
}
