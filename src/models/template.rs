//! # Message Templates
//!
//! Canonical template definitions (as approved by the provider and stored
//! locally) and the variable payload sent when a template message goes out.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Canonical template, keyed by (`name`, `language`)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateDefinition {
    pub name: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub components: Vec<TemplateComponent>,
}

/// A section of a template definition.
///
/// Sections that aren't rendered here (`CAROUSEL`, `LIMITED_TIME_OFFER`, ...)
/// are kept verbatim in [`TemplateComponent::Unsupported`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(from = "ComponentRepr", into = "ComponentRepr")]
pub enum TemplateComponent {
    Header(HeaderComponent),
    Body(TextComponent),
    Footer(TextComponent),
    Buttons(ButtonsComponent),
    Unsupported(Map<String, Value>),
}

#[derive(Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum KnownComponent {
    Header(HeaderComponent),
    Body(TextComponent),
    Footer(TextComponent),
    Buttons(ButtonsComponent),
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum ComponentRepr {
    Known(KnownComponent),
    Unsupported(Map<String, Value>),
}

impl From<ComponentRepr> for TemplateComponent {
    fn from(repr: ComponentRepr) -> Self {
        match repr {
            ComponentRepr::Known(KnownComponent::Header(c)) => TemplateComponent::Header(c),
            ComponentRepr::Known(KnownComponent::Body(c)) => TemplateComponent::Body(c),
            ComponentRepr::Known(KnownComponent::Footer(c)) => TemplateComponent::Footer(c),
            ComponentRepr::Known(KnownComponent::Buttons(c)) => TemplateComponent::Buttons(c),
            ComponentRepr::Unsupported(raw) => TemplateComponent::Unsupported(raw),
        }
    }
}

impl From<TemplateComponent> for ComponentRepr {
    fn from(component: TemplateComponent) -> Self {
        match component {
            TemplateComponent::Header(c) => ComponentRepr::Known(KnownComponent::Header(c)),
            TemplateComponent::Body(c) => ComponentRepr::Known(KnownComponent::Body(c)),
            TemplateComponent::Footer(c) => ComponentRepr::Known(KnownComponent::Footer(c)),
            TemplateComponent::Buttons(c) => ComponentRepr::Known(KnownComponent::Buttons(c)),
            TemplateComponent::Unsupported(raw) => ComponentRepr::Unsupported(raw),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeaderFormat {
    Text,
    Image,
    Video,
    Document,
    Location,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeaderComponent {
    pub format: HeaderFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<MediaObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<MediaObject>,
    /// Provider fields not interpreted here (e.g. `example`)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TextComponent {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ButtonsComponent {
    pub buttons: Vec<TemplateButton>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ButtonType {
    QuickReply,
    Url,
    PhoneNumber,
    CopyCode,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateButton {
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Media reference used by headers and media parameters
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MediaObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Template message request, sent as-is to the provider
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateRequest {
    pub name: String,
    pub language: TemplateLanguage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<TemplateVariables>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateLanguage {
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonSubType {
    QuickReply,
    Url,
    CopyCode,
    #[serde(other)]
    Other,
}

/// Positional parameters for one part of the template
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TemplateVariables {
    Header {
        #[serde(default)]
        parameters: Vec<TemplateParameter>,
    },
    Body {
        #[serde(default)]
        parameters: Vec<TemplateParameter>,
    },
    Button {
        sub_type: ButtonSubType,
        /// Position of the button in the template, sent as "0" or 0
        #[serde(deserialize_with = "button_index")]
        index: String,
        #[serde(default)]
        parameters: Vec<TemplateParameter>,
    },
}

fn button_index<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Index {
        Text(String),
        Number(u64),
    }

    Ok(match Index::deserialize(deserializer)? {
        Index::Text(text) => text.trim().to_string(),
        Index::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateParameter {
    Text { text: String },
    Payload { payload: String },
    Image { image: MediaObject },
    Video { video: MediaObject },
    Document { document: MediaObject },
    Currency { currency: Value },
    DateTime { date_time: Value },
}
