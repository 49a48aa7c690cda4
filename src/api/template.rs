//! # Template Rendering
//!
//! Fills the `{{n}}` placeholders of a stored template definition with the
//! variables of a send request. Used to keep a readable copy of every template
//! message that goes out. Rendering never touches the stored definition.

use crate::models::template::{
    ButtonSubType, ButtonType, HeaderComponent, HeaderFormat, TemplateButton, TemplateComponent,
    TemplateParameter, TemplateVariables,
};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\d+)\}\}").expect("placeholder pattern is a valid regex"));

const URL_PLACEHOLDER: &str = "{{1}}";

/// Returns the components of `definition` with `variables` applied.
///
/// Placeholders without a matching parameter are kept literally.
pub fn render_components(
    definition: &[TemplateComponent],
    variables: &[TemplateVariables],
) -> Vec<TemplateComponent> {
    definition
        .iter()
        .map(|component| match component {
            TemplateComponent::Header(header) => {
                TemplateComponent::Header(render_header(header, header_parameters(variables)))
            }
            TemplateComponent::Body(body) => {
                let mut body = body.clone();
                body.text = substitute(&body.text, body_parameters(variables));
                TemplateComponent::Body(body)
            }
            TemplateComponent::Buttons(buttons) => {
                let mut buttons = buttons.clone();
                for (index, button) in buttons.buttons.iter_mut().enumerate() {
                    render_url_button(button, index, variables);
                }
                TemplateComponent::Buttons(buttons)
            }
            TemplateComponent::Footer(_) | TemplateComponent::Unsupported(_) => component.clone(),
        })
        .collect()
}

fn header_parameters(variables: &[TemplateVariables]) -> &[TemplateParameter] {
    variables
        .iter()
        .find_map(|group| match group {
            TemplateVariables::Header { parameters } => Some(parameters.as_slice()),
            _ => None,
        })
        .unwrap_or_default()
}

fn body_parameters(variables: &[TemplateVariables]) -> &[TemplateParameter] {
    variables
        .iter()
        .find_map(|group| match group {
            TemplateVariables::Body { parameters } => Some(parameters.as_slice()),
            _ => None,
        })
        .unwrap_or_default()
}

fn render_header(header: &HeaderComponent, parameters: &[TemplateParameter]) -> HeaderComponent {
    let mut header = header.clone();

    match (header.format, parameters.first()) {
        (HeaderFormat::Text, _) => {
            header.text = header.text.map(|text| substitute(&text, parameters));
        }
        (HeaderFormat::Image, Some(TemplateParameter::Image { image })) => {
            header.image = Some(image.clone());
        }
        (HeaderFormat::Video, Some(TemplateParameter::Video { video })) => {
            header.video = Some(video.clone());
        }
        (HeaderFormat::Document, Some(TemplateParameter::Document { document })) => {
            header.document = Some(document.clone());
        }
        // media of another type than the header format is ignored
        _ => {}
    }

    header
}

fn render_url_button(button: &mut TemplateButton, index: usize, variables: &[TemplateVariables]) {
    if button.button_type != ButtonType::Url {
        return;
    }

    let Some(prefix) = button
        .url
        .as_deref()
        .and_then(|url| url.strip_suffix(URL_PLACEHOLDER))
    else {
        return;
    };

    let index = index.to_string();
    let value = variables.iter().find_map(|group| match group {
        TemplateVariables::Button {
            sub_type: ButtonSubType::Url,
            index: group_index,
            parameters,
        } if *group_index == index => parameters.first().and_then(|p| match p {
            TemplateParameter::Payload { payload } => Some(payload.as_str()),
            TemplateParameter::Text { text } => Some(text.as_str()),
            _ => None,
        }),
        _ => None,
    });

    if let Some(value) = value {
        button.url = Some(format!("{prefix}{value}"));
    }
}

/// Replaces `{{n}}` with the text of the n-th parameter (1-based)
fn substitute(text: &str, parameters: &[TemplateParameter]) -> String {
    PLACEHOLDER.replace_all(text, |caps: &Captures| {
        let literal = caps.get(0).map(|m| m.as_str()).unwrap_or_default();

        caps.get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .and_then(|position| position.checked_sub(1))
            .and_then(|index| parameters.get(index))
            .and_then(|parameter| match parameter {
                TemplateParameter::Text { text } if !text.is_empty() => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_else(|| literal.to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::{ButtonsComponent, MediaObject, TextComponent};
    use serde_json::{Map, json};

    fn text(value: &str) -> TemplateParameter {
        TemplateParameter::Text {
            text: value.to_string(),
        }
    }

    fn body(text: &str) -> TemplateComponent {
        TemplateComponent::Body(TextComponent {
            text: text.to_string(),
            extra: Map::new(),
        })
    }

    fn body_text(component: &TemplateComponent) -> &str {
        match component {
            TemplateComponent::Body(body) => &body.text,
            other => panic!("expected body, got {other:?}"),
        }
    }

    #[test]
    fn test_body_placeholders() {
        let rendered = render_components(
            &[body("Hello {{1}}, order {{2}}")],
            &[TemplateVariables::Body {
                parameters: vec![text("Alice"), text("#42")],
            }],
        );

        assert_eq!(body_text(&rendered[0]), "Hello Alice, order #42");
    }

    #[test]
    fn test_missing_parameter_stays_literal() {
        let rendered = render_components(
            &[body("Hello {{1}}, order {{2}}, ref {{0}}")],
            &[TemplateVariables::Body {
                parameters: vec![text("Alice")],
            }],
        );

        assert_eq!(body_text(&rendered[0]), "Hello Alice, order {{2}}, ref {{0}}");
    }

    #[test]
    fn test_header_text_and_media() {
        let definition: Vec<TemplateComponent> = serde_json::from_value(json!([
            {"type": "HEADER", "format": "TEXT", "text": "Hi {{1}}"},
            {"type": "HEADER", "format": "IMAGE"},
            {"type": "HEADER", "format": "VIDEO"}
        ]))
        .unwrap();
        let image = MediaObject {
            link: Some("https://cdn.test/a.png".to_string()),
            ..Default::default()
        };

        let rendered = render_components(
            &definition,
            &[TemplateVariables::Header {
                parameters: vec![TemplateParameter::Image {
                    image: image.clone(),
                }],
            }],
        );

        let headers: Vec<&HeaderComponent> = rendered
            .iter()
            .map(|c| match c {
                TemplateComponent::Header(h) => h,
                other => panic!("expected header, got {other:?}"),
            })
            .collect();

        // an image parameter is not text, the placeholder stays
        assert_eq!(headers[0].text.as_deref(), Some("Hi {{1}}"));
        assert_eq!(headers[1].image.as_ref(), Some(&image));
        assert_eq!(headers[2].video, None);
    }

    #[test]
    fn test_url_button_takes_payload_and_quick_reply_is_untouched() {
        let definition: Vec<TemplateComponent> = serde_json::from_value(json!([
            {"type": "BUTTONS", "buttons": [
                {"type": "QUICK_REPLY", "text": "Stop {{1}}"},
                {"type": "URL", "text": "Track", "url": "https://shop.test/t/{{1}}"}
            ]}
        ]))
        .unwrap();

        let rendered = render_components(
            &definition,
            &[
                TemplateVariables::Button {
                    sub_type: ButtonSubType::QuickReply,
                    index: "0".to_string(),
                    parameters: vec![TemplateParameter::Payload {
                        payload: "stop".to_string(),
                    }],
                },
                TemplateVariables::Button {
                    sub_type: ButtonSubType::Url,
                    index: "1".to_string(),
                    parameters: vec![TemplateParameter::Payload {
                        payload: "ORD-42".to_string(),
                    }],
                },
            ],
        );

        let TemplateComponent::Buttons(ButtonsComponent { buttons, .. }) = &rendered[0] else {
            panic!("expected buttons");
        };
        assert_eq!(buttons[0].text, "Stop {{1}}");
        assert_eq!(buttons[0].url, None);
        assert_eq!(buttons[1].url.as_deref(), Some("https://shop.test/t/ORD-42"));
    }

    #[test]
    fn test_definition_is_not_mutated() {
        let definition = vec![body("Hello {{1}}")];
        let before = definition.clone();

        render_components(
            &definition,
            &[TemplateVariables::Body {
                parameters: vec![text("Alice")],
            }],
        );

        assert_eq!(definition, before);
    }

    #[test]
    fn test_unsupported_components_pass_through() {
        let mut carousel = Map::new();
        carousel.insert("type".to_string(), json!("CAROUSEL"));
        carousel.insert("cards".to_string(), json!([{"card_index": 0}]));
        let definition = vec![body("Hi {{1}}"), TemplateComponent::Unsupported(carousel.clone())];

        let rendered = render_components(
            &definition,
            &[TemplateVariables::Body {
                parameters: vec![text("Bob")],
            }],
        );

        assert_eq!(body_text(&rendered[0]), "Hi Bob");
        assert_eq!(rendered[1], TemplateComponent::Unsupported(carousel));
    }
}
