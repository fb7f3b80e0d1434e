//! Pagination Tests
//!
//! Page requests run the unchanged pipeline and carry page size,
//! orderings, offset and cursors as execution options.

mod support;

use docpipe::execution::{Cursor, StreamEvent, PAGINATION_OPTION};
use docpipe::expr::{field, ExprMethods, Field};
use docpipe::pipeline::PipelineSource;
use docpipe::value::WireValue;

use support::*;

fn pagination_of(request: &docpipe::execution::ExecutePipelineRequest) -> WireValue {
    request.options[PAGINATION_OPTION].clone()
}

#[tokio::test]
async fn test_first_page_then_next_page_from_last_row() {
    let events = vec![
        batch(
            100,
            vec![
                row("posts/p1", vec![("ts", WireValue::Integer(30))]),
                row("posts/p2", vec![("ts", WireValue::Integer(20))]),
            ],
        ),
        StreamEvent::Complete,
    ];
    let transport = ScriptedTransport::new(events);
    let (executor, _) = executor(transport.clone());

    let pages = PipelineSource::collection("posts")
        .unwrap()
        .paginate(2, [field("ts").descending(), Field::document_id().descending()])
        .unwrap();

    let first = executor.execute(&pages.first_page()).await.unwrap();
    assert_eq!(first.len(), 2);

    let last = first.results().last().unwrap();
    let next = pages.start_after(last).unwrap();
    executor.execute(&next.first_page()).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);

    // The pipeline itself is unchanged; pagination is an option
    assert_eq!(requests[0].pipeline, requests[1].pipeline);
    assert_eq!(requests[0].pipeline.stages.len(), 1);

    let first_options = pagination_of(&requests[0]);
    let first_options = first_options.as_map().unwrap();
    assert_eq!(first_options["page_size"], WireValue::Integer(2));
    assert_eq!(first_options["direction"], WireValue::String("forward".into()));
    assert!(!first_options.contains_key("start_cursor"));

    let next_options = pagination_of(&requests[1]);
    let cursor = next_options.as_map().unwrap()["start_cursor"].clone();
    let cursor = cursor.as_map().unwrap();
    assert_eq!(cursor["inclusive"], WireValue::Boolean(false));
    assert_eq!(
        cursor["values"],
        WireValue::Array(vec![
            WireValue::Integer(20),
            WireValue::Reference("/posts/p2".into())
        ])
    );
}

#[tokio::test]
async fn test_last_page_scans_backward_with_end_cursor() {
    let transport = ScriptedTransport::new(vec![StreamEvent::Complete]);
    let (executor, _) = executor(transport.clone());

    let request = PipelineSource::collection("posts")
        .unwrap()
        .paginate(10, [field("ts").ascending()])
        .unwrap()
        .with_end_cursor(Cursor::at(vec![WireValue::Integer(500)]))
        .unwrap()
        .offset(3)
        .unwrap()
        .last_page();

    executor.execute(&request).await.unwrap();

    let options = pagination_of(&transport.requests()[0]);
    let options = options.as_map().unwrap();
    assert_eq!(options["direction"], WireValue::String("backward".into()));
    assert_eq!(options["offset"], WireValue::Integer(3));
    assert_eq!(
        options["end_cursor"].as_map().unwrap()["inclusive"],
        WireValue::Boolean(true)
    );
}

#[tokio::test]
async fn test_cursor_from_row_missing_ordering_field_is_rejected() {
    let events = vec![
        batch(100, vec![row("posts/p1", vec![("title", WireValue::from("x"))])]),
        StreamEvent::Complete,
    ];
    let (executor, _) = executor(ScriptedTransport::new(events));

    let pages = PipelineSource::collection("posts")
        .unwrap()
        .paginate(1, [field("ts").ascending()])
        .unwrap();
    let snapshot = executor.execute(&pages.first_page()).await.unwrap();

    let err = pages.start_after(&snapshot.results()[0]).unwrap_err();
    assert_eq!(err.field(), Some("ts"));
}

#[test]
fn test_negative_offset_rejected() {
    let pages = PipelineSource::collection("posts")
        .unwrap()
        .paginate(1, [field("ts").ascending()])
        .unwrap();
    assert!(pages.offset(-1).is_err());
    assert!(pages.offset(0).is_ok());
}
