mod helpers;

use std::collections::HashSet;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use helpers::{collect_until_terminal, FakeExtractor, TestApp};
use video_translator::pipeline::{FailedStage, GENERIC_FAILURE};
use video_translator::{BroadcastEvent, JobOutcome, JobRequest, ParseError};

fn video_url(i: usize) -> String {
    format!("https://www.youtube.com/watch?v=video{:06}", i)
}

#[tokio::test]
async fn given_concurrent_jobs_when_all_finish_then_results_stay_separate() {
    let app = TestApp::new(FakeExtractor {
        delay: Duration::from_millis(20),
        ..Default::default()
    });
    let mut observer = app.hub.subscribe();

    let handles: Vec<_> = (0..5)
        .map(|i| assert_ok!(app.pipeline.start(JobRequest::new(video_url(i), Some("de".into())))))
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = assert_ok!(handle.wait().await);
        let JobOutcome::Completed { original_text, translated_text } = outcome else {
            panic!("job {} did not complete", i);
        };
        assert_eq!(original_text, format!("transcript of {}", video_url(i)));
        assert_eq!(translated_text, format!("[de] {}", original_text));
    }

    let events = collect_until_terminal(&mut observer, 5).await;
    assert_eq!(events.len(), 10);

    let finished: HashSet<_> = events.iter().filter(|e| e.is_terminal()).map(|e| e.job_id()).collect();
    assert_eq!(finished.len(), 5);

    let written = app.extractor.written.lock().unwrap().clone();
    let dirs: HashSet<_> = written.iter().map(|p| p.parent().unwrap().to_path_buf()).collect();
    assert_eq!(dirs.len(), 5);
    assert_eq!(app.leftover_entries(), 0);
    assert_eq!(app.pipeline.active_jobs(), 0);
}

#[tokio::test]
async fn given_unavailable_video_when_fetch_fails_then_generic_error_and_no_files() {
    let app = TestApp::new(FakeExtractor {
        fail: true,
        ..Default::default()
    });
    let mut observer = app.hub.subscribe();

    let handle = assert_ok!(app.pipeline.start(JobRequest::new(video_url(1), None)));
    let job_id = handle.job_id;
    let outcome = assert_ok!(handle.wait().await);

    assert!(matches!(outcome, JobOutcome::Failed { stage: FailedStage::Fetching, .. }));
    let events = collect_until_terminal(&mut observer, 1).await;
    assert_eq!(events.last(), Some(&BroadcastEvent::failed(job_id, GENERIC_FAILURE)));
    assert_eq!(app.leftover_entries(), 0);
}

#[tokio::test]
async fn given_unrecognized_url_when_started_then_rejected_synchronously() {
    let app = TestApp::new(FakeExtractor::default());

    let err = assert_err!(app.pipeline.start(JobRequest::new("https://vimeo.com/123456", None)));

    assert_eq!(err, ParseError::UnrecognizedVideoUrl);
    assert_eq!(app.pipeline.active_jobs(), 0);
}

#[tokio::test]
async fn given_no_observers_when_job_runs_then_it_still_completes() {
    let app = TestApp::new(FakeExtractor::default());

    let outcome = assert_ok!(app.pipeline.start(JobRequest::new(video_url(2), None)).unwrap().wait().await);

    assert!(outcome.is_success());
    assert_eq!(app.leftover_entries(), 0);
}

#[tokio::test]
async fn given_stopped_hub_when_job_finishes_then_observers_see_end_of_stream() {
    let app = TestApp::new(FakeExtractor {
        delay: Duration::from_millis(50),
        ..Default::default()
    });
    let mut observer = app.hub.subscribe();

    let handle = assert_ok!(app.pipeline.start(JobRequest::new(video_url(3), None)));
    let accepted = tokio::time::timeout(Duration::from_secs(5), observer.recv()).await.unwrap();
    assert!(matches!(accepted, Some(BroadcastEvent::Accepted { .. })));

    app.hub.stop();
    let outcome = assert_ok!(handle.wait().await);

    assert!(outcome.is_success());
    assert_eq!(observer.recv().await, None);
    assert_eq!(app.leftover_entries(), 0);
}
