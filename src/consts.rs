use std::time::Duration;

pub const SIGNATURE_HEADER_NAME: &str = "x-hub-signature-256";
pub const INTERNAL_SECRET_HEADER_NAME: &str = "X-Internal-Secret";

pub const MESSAGES_CHANGE_FIELD: &str = "messages";
pub const MESSAGING_PRODUCT: &str = "whatsapp";

/// Message types whose media is fetched from the provider on receipt
pub const DOWNLOADABLE_MEDIA_TYPES: [&str; 3] = ["image", "video", "document"];

/// Upper bound for a single dispatched button action (it may chain several http calls)
pub const ACTION_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

pub const OUTBOUND_FILE_MAX_SIZE_BYTES: usize = 16_000_000;

pub const SMART_PRICE_CONFIRMATION_TEXT: &str =
    "Спасибо, мы применили smart price для ваших товаров";

pub const ASSISTANT_MAX_TOKENS: u32 = 150;
pub const ASSISTANT_TEMPERATURE: f32 = 0.7;
pub const ASSISTANT_EMPTY_RESPONSE_TEXT: &str = "I'm sorry, I couldn't generate a response.";
pub const ASSISTANT_FALLBACK_TEXT: &str =
    "I apologize, but I'm having trouble processing your request right now. Please try again later.";

pub const DEFAULT_ASSISTANT_CONTEXT: &str = r#"You are the customer support assistant of an online marketplace seller program.
Answer briefly and politely in the language of the question.
Only answer questions about orders, returns, deliveries, payouts and the smart price feature.
If you do not know the answer, ask the seller to wait for a human operator."#;
