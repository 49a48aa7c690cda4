pub const QUERY_INSERT_WEBHOOK_EVENT: &str = r#"
INSERT INTO webhook_event(event_id,payload,received_at) VALUES($1,$2,$3);
"#;

/// Last message times never move backwards, deliveries may arrive late
pub const QUERY_UPSERT_CONTACT: &str = r#"
INSERT INTO contact(
    wa_id,profile_name,last_message_at,last_message_received_at,in_chat,created_at
) VALUES($1,$2,$3,$3,1,$3)
ON CONFLICT(wa_id) DO UPDATE SET
    profile_name=excluded.profile_name,
    last_message_at=MAX(
        COALESCE(contact.last_message_at,excluded.last_message_at),
        excluded.last_message_at
    ),
    last_message_received_at=MAX(
        COALESCE(contact.last_message_received_at,excluded.last_message_received_at),
        excluded.last_message_received_at
    ),
    in_chat=1;
"#;

pub const QUERY_GET_CONTACT: &str = r#"
SELECT
    wa_id,profile_name,last_message_at,last_message_received_at,
    in_chat,unread_count,last_read_at,created_at
FROM contact
WHERE wa_id=$1;
"#;

pub const QUERY_TOUCH_CONTACT_LAST_MESSAGE: &str = r#"
UPDATE contact SET last_message_at=MAX(COALESCE(last_message_at,$2),$2) WHERE wa_id=$1;
"#;

pub const QUERY_REFRESH_UNREAD_COUNT: &str = r#"
UPDATE contact SET unread_count=(
    SELECT COUNT(*) FROM message AS m
    WHERE
        m.chat_id=contact.wa_id AND
        m.is_received=1 AND
        (contact.last_read_at IS NULL OR m.created_at>contact.last_read_at)
)
WHERE wa_id=$1;
"#;

/// Duplicated `wam_id`s are ignored, re-delivered messages are a no-op
pub const QUERY_INSERT_MESSAGE: &str = r#"
INSERT INTO message(
    wam_id,chat_id,msg_type,payload,is_received,media_url,created_at
) VALUES($1,$2,$3,$4,$5,$6,$7)
ON CONFLICT(wam_id) DO NOTHING;
"#;

pub const QUERY_GET_MESSAGE: &str = r#"
SELECT
    wam_id,chat_id,msg_type,payload,is_received,media_url,
    status,sent_at,delivered_at,read_at,failed_at,created_at
FROM message
WHERE wam_id=$1;
"#;

pub const QUERY_SET_MESSAGE_MEDIA_URL: &str = r#"
UPDATE message SET media_url=$2 WHERE wam_id=$1;
"#;

/// Rank of the current status, transitions only move to a higher rank
macro_rules! status_rank {
    () => {
        "(CASE status WHEN 'unsent' THEN 0 WHEN 'sent' THEN 1 WHEN 'delivered' THEN 2 WHEN 'read' THEN 3 WHEN 'failed' THEN 4 ELSE 0 END)"
    };
}

pub const QUERY_UPDATE_MESSAGE_SENT_STATUS: &str = concat!(
    "UPDATE message SET status='sent', sent_at=$2 WHERE wam_id=$1 AND ",
    status_rank!(),
    " < 1;"
);

pub const QUERY_UPDATE_MESSAGE_DELIVERED_STATUS: &str = concat!(
    "UPDATE message SET status='delivered', delivered_at=$2 WHERE wam_id=$1 AND ",
    status_rank!(),
    " < 2;"
);

pub const QUERY_UPDATE_MESSAGE_READ_STATUS: &str = concat!(
    "UPDATE message SET status='read', read_at=$2 WHERE wam_id=$1 AND ",
    status_rank!(),
    " < 3;"
);

pub const QUERY_UPDATE_MESSAGE_FAILED_STATUS: &str = concat!(
    "UPDATE message SET status='failed', failed_at=$2 WHERE wam_id=$1 AND ",
    status_rank!(),
    " < 4;"
);

pub const QUERY_GET_MESSAGE_TEMPLATE: &str = r#"
SELECT name,language,category,components
FROM message_template
WHERE name=$1 AND language=$2;
"#;

pub const QUERY_UPSERT_MESSAGE_TEMPLATE: &str = r#"
INSERT INTO message_template(name,language,category,components,updated_at)
VALUES($1,$2,$3,$4,$5)
ON CONFLICT(name,language) DO UPDATE SET
    category=excluded.category,
    components=excluded.components,
    updated_at=excluded.updated_at;
"#;

pub const QUERY_MARK_BROADCAST_REPLIED: &str = r#"
UPDATE broadcast_contact SET replied_at=$2 WHERE wam_id=$1 AND replied_at IS NULL;
"#;

pub const QUERY_BROADCAST_SENT: &str =
    "UPDATE broadcast_contact SET sent_at=$2 WHERE wam_id=$1 AND sent_at IS NULL;";

pub const QUERY_BROADCAST_DELIVERED: &str =
    "UPDATE broadcast_contact SET delivered_at=$2 WHERE wam_id=$1 AND delivered_at IS NULL;";

pub const QUERY_BROADCAST_READ: &str =
    "UPDATE broadcast_contact SET read_at=$2 WHERE wam_id=$1 AND read_at IS NULL;";

pub const QUERY_BROADCAST_FAILED: &str =
    "UPDATE broadcast_contact SET failed_at=$2 WHERE wam_id=$1 AND failed_at IS NULL;";
