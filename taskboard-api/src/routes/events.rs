/// Live task changes over Server-Sent Events
///
/// # Endpoint
///
/// ```text
/// GET /v1/events/tasks
/// Authorization: Bearer <access token>
/// Accept: text/event-stream
/// ```
///
/// Each committed insert, update or delete of a task the caller can see is
/// sent as one event named after the change:
///
/// ```text
/// event: update
/// data: {"entity":"task","change":"update","record":{...},"published_at":"..."}
/// ```
///
/// Visibility is checked against the row carried by the event, so a task
/// reassigned away from the caller stops appearing after that update.
///
/// A keep-alive comment is sent every 25 seconds.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use taskboard_shared::{
    auth::{
        authorization::{is_allowed, Actor, Operation, Target},
        middleware::AuthContext,
    },
    events::{ChangeEvent, ChangeKind},
    models::{task::Task, EntityKind},
};
use tokio_stream::{wrappers::ReceiverStream, StreamExt as _};

/// Interval between keep-alive comments
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(25);

/// Streams task changes visible to the caller
pub async fn task_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // task reads depend on participation only
    let actor = Actor::new(auth.identity_id, None);

    let subscription = state.store.notifier().subscribe(EntityKind::Task);
    tracing::debug!(actor = %actor.id, subscription = ?subscription.id(), "Task event stream opened");

    let stream = ReceiverStream::new(subscription.into_receiver())
        .filter(move |event| visible_to(&actor, event))
        .filter_map(|event| to_sse_event(&event).map(Ok));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

/// Whether the task row in `event` passes the read predicate
fn visible_to(actor: &Actor, event: &ChangeEvent) -> bool {
    event
        .record_as::<Task>()
        .is_some_and(|task| is_allowed(actor, Operation::Read, &Target::Task(&task)))
}

fn to_sse_event(event: &ChangeEvent) -> Option<Event> {
    let name = match event.change {
        ChangeKind::Insert => "insert",
        ChangeKind::Update => "update",
        ChangeKind::Delete => "delete",
    };

    match Event::default().event(name).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode change event");
            None
        }
    }
}
