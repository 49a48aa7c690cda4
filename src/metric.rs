use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("wa_inbox_statds")
        .with_description("WhatsApp inbox statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: String, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

pub fn incr_webhook_event_statds(event: &str) {
    incr_statds("webhook_event".to_string(), event.into())
}

pub fn incr_message_status_statds(status: &str) {
    incr_statds("message_status".to_string(), status.into())
}

pub fn incr_action_statds(action: &str) {
    incr_statds("button_action".to_string(), action.into())
}

pub fn incr_outbound_message_statds(msg_type: &str) {
    incr_statds("outbound_message".to_string(), msg_type.into())
}
