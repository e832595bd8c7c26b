//! Emitter output fed through a bounded channel and scanned back.

use std::convert::Infallible;

use appads_core::{
    Declaration, DeclarationStatus, LookupResult, MatchInfo, MatchedLine, RunState, StoreType,
    TermResult,
};
use appads_stream::{
    scan_stream, CsvStreamEmitter, JsonStreamEmitter, ResultSink, ScanEvent, StreamRecord,
    CSV_HEADERS, HEARTBEAT,
};
use futures::StreamExt;
use tokio::sync::mpsc;

fn results(n: usize) -> Vec<LookupResult> {
    (0..n)
        .map(|i| LookupResult::failed(format!("com.app{i}"), format!("lookup \"{i}\" failed ✗")))
        .collect()
}

#[tokio::test]
async fn channel_backed_stream_scans_back_in_order() {
    let (tx, mut rx) = mpsc::channel::<Result<String, Infallible>>(2);
    let input = results(25);
    let expected: Vec<String> = input.iter().map(|r| r.identifier.clone()).collect();

    let producer = tokio::spawn(async move {
        let mut emitter = JsonStreamEmitter::new(tx, true);
        let mut state = RunState::new(input.len());
        emitter.open().await.unwrap();
        for (i, result) in input.iter().enumerate() {
            if i % 4 == 0 {
                emitter.heartbeat().await.unwrap();
            }
            emitter.accept(result).await.unwrap();
            state.record(result);
        }
        emitter.close(&state).await.unwrap();
    });

    let mut body = String::new();
    while let Some(Ok(frame)) = rx.recv().await {
        body.push_str(&frame);
    }
    producer.await.unwrap();
    assert_eq!(body.matches(HEARTBEAT).count(), 7);

    // Re-chunk at a prime stride so boundaries fall inside strings and code points.
    let chunks: Vec<Result<Vec<u8>, Infallible>> =
        body.as_bytes().chunks(13).map(|c| Ok(c.to_vec())).collect();
    let events: Vec<_> = scan_stream::<_, _, _, StreamRecord>(futures::stream::iter(chunks))
        .collect()
        .await;

    let mut seen = Vec::new();
    let mut trailer = None;
    for event in events {
        match event.expect("scan should succeed") {
            ScanEvent::Record(StreamRecord::Result(r)) => seen.push(r.identifier),
            ScanEvent::Record(StreamRecord::Interrupted(i)) => panic!("interrupted: {}", i.stream_error),
            ScanEvent::Finished(t) => trailer = Some(t),
        }
    }

    assert_eq!(seen, expected);
    let trailer = trailer.expect("trailer present");
    assert_eq!(trailer.total_processed, 25);
    assert_eq!(trailer.error_count, 25);
    assert!(trailer.reconciles());
}

#[tokio::test]
async fn dropped_receiver_reports_closed_sink() {
    let (tx, rx) = mpsc::channel::<Result<String, Infallible>>(1);
    drop(rx);

    let mut emitter = JsonStreamEmitter::new(tx, false);
    let err = emitter.open().await.unwrap_err();
    assert!(err.is_closed());
}

#[tokio::test]
async fn csv_fields_with_quotes_and_commas_read_back_unchanged() {
    let awkward = r#"say "hi", ok"#;
    let matched = LookupResult::resolved(
        "com.quoted",
        StoreType::GooglePlay,
        "quoted.example",
        Declaration {
            url: Some("https://quoted.example/app-ads.txt".into()),
            status: DeclarationStatus::Found {
                text: awkward.into(),
            },
        },
        Some(MatchInfo {
            count: 1,
            term_results: vec![TermResult {
                term: "domain: quoted.example".into(),
                matches: vec![MatchedLine {
                    line_number: 1,
                    content: awkward.into(),
                }],
            }],
        }),
    );
    let failed = LookupResult::failed("com.failed", awkward);

    let (tx, mut rx) = mpsc::channel::<Result<String, Infallible>>(4);
    let producer = tokio::spawn(async move {
        let mut emitter = CsvStreamEmitter::new(tx);
        let mut state = RunState::new(2);
        emitter.open().await.unwrap();
        for result in [&matched, &failed] {
            emitter.accept(result).await.unwrap();
            state.record(result);
        }
        emitter.close(&state).await.unwrap();
    });

    let mut body = String::new();
    while let Some(Ok(frame)) = rx.recv().await {
        body.push_str(&frame);
    }
    producer.await.unwrap();
    assert!(body.contains(r#""say ""hi"", ok""#));

    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers: Vec<String> = reader.headers().unwrap().iter().map(ToOwned::to_owned).collect();
    assert_eq!(headers, CSV_HEADERS);

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "com.quoted");
    assert_eq!(&rows[0][7], awkward);
    assert_eq!(&rows[1][0], "com.failed");
    assert_eq!(&rows[1][9], awkward);
}
