use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use hearth_db::models::MessageRow;
use hearth_db::now_ts;
use hearth_types::api::{Claims, MessageResponse, SendMessageRequest};
use hearth_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::convert;
use crate::error::{blocking, ApiError};

const MAX_MESSAGE_LEN: usize = 4096;

/// `GET /conversations/{id}/messages` — ordered history. Fetching as the
/// receiver doubles as the read receipt: every incoming message not yet
/// marked is marked now, and the sender is notified.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let conv_id = conversation_id.to_string();
    let reader = claims.sub.to_string();

    let (conversation, rows, reads, newly_read) = blocking(move || {
        let Some(conversation) = db.get_conversation(&conv_id)? else {
            return Ok((None, vec![], vec![], vec![]));
        };
        if !conversation.has_participant(&reader) {
            return Ok((Some(conversation), vec![], vec![], vec![]));
        }

        // Read receipts fire on every history fetch; INSERT OR IGNORE below
        // keeps the repeat executions idempotent.
        let newly_read = db.mark_conversation_read(&conv_id, &reader, &now_ts())?;

        let rows = db.messages_in(&conv_id)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let reads = db.reads_for_messages(&ids)?;
        Ok((Some(conversation), rows, reads, newly_read))
    })
    .await?;

    let conversation = conversation.ok_or(ApiError::NotFound("conversation"))?;
    if !conversation.has_participant(&claims.sub.to_string()) {
        return Err(ApiError::Forbidden(
            "not a participant in this conversation".into(),
        ));
    }

    // Tell the counterpart their messages were seen
    if !newly_read.is_empty() {
        let other = conversation.other_participant(&claims.sub.to_string()).to_string();
        state
            .dispatcher
            .send_to_user(
                convert::parse_uuid(&other, "user id"),
                GatewayEvent::MessageRead {
                    conversation_id,
                    reader_id: claims.sub,
                    message_ids: newly_read
                        .iter()
                        .map(|id| convert::parse_uuid(id, "message id"))
                        .collect(),
                },
            )
            .await;
    }

    // Group receipts by message
    let mut read_map: HashMap<String, Vec<Uuid>> = HashMap::new();
    for (message_id, user_id) in reads {
        read_map
            .entry(message_id)
            .or_default()
            .push(convert::parse_uuid(&user_id, "user id"));
    }

    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(|row| {
            let read_by = read_map.remove(&row.id).unwrap_or_default();
            convert::message_response(row, read_by)
        })
        .collect();

    Ok(Json(messages))
}

/// `POST /conversations/{id}/messages` — append a message. The insert and
/// the conversation-summary refresh commit together; the live events go out
/// only after the commit.
pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = req.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::BadRequest("message body is empty".into()));
    }
    if body.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest("message body is too long".into()));
    }

    let db = state.db.clone();
    let conv_id = conversation_id.to_string();
    let conversation = blocking(move || db.get_conversation(&conv_id))
        .await?
        .ok_or(ApiError::NotFound("conversation"))?;

    let sender = claims.sub.to_string();
    if !conversation.has_participant(&sender) {
        return Err(ApiError::Forbidden(
            "not a participant in this conversation".into(),
        ));
    }
    let receiver = conversation.other_participant(&sender).to_string();

    let message_id = Uuid::new_v4();
    let created_at = now_ts();
    let row = MessageRow {
        id: message_id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender.clone(),
        receiver_id: receiver.clone(),
        body: body.clone(),
        created_at: created_at.clone(),
    };

    let db = state.db.clone();
    blocking(move || db.insert_message(&row)).await?;

    let event = GatewayEvent::MessageCreate {
        id: message_id,
        conversation_id,
        sender_id: claims.sub,
        sender_name: claims.name.clone(),
        receiver_id: convert::parse_uuid(&receiver, "user id"),
        body: body.clone(),
        timestamp: convert::parse_ts(&created_at),
    };

    // Deliver to both sides: the receiver gets the new message, the sender's
    // other sessions reconcile their optimistic echo.
    state
        .dispatcher
        .send_to_user(convert::parse_uuid(&receiver, "user id"), event.clone())
        .await;
    state.dispatcher.send_to_user(claims.sub, event).await;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            id: message_id,
            conversation_id,
            sender_id: claims.sub,
            receiver_id: convert::parse_uuid(&receiver, "user id"),
            body,
            created_at: convert::parse_ts(&created_at),
            read_by: vec![],
        }),
    ))
}
