use std::{sync::mpsc, thread};

use openfootprint::{
    CancelToken, IngestConfig, Ingestor, Publish, RecordStore, error::IngestionError, ingest_into,
};

fn csv(prefix: &str, n: usize) -> String {
    let mut text = String::from("full_plus_code,area_in_meters,confidence,geometry\n");
    for i in 0..n {
        text.push_str(&format!("{prefix}{i},250,0.8,\"POLYGON((11 10, 11.5 10, 11.5 10.5))\"\n"));
    }
    text
}

fn config(batch: usize) -> IngestConfig {
    IngestConfig { batch_size: Some(batch), ..IngestConfig::default() }
}

#[test]
fn stale_run_on_another_thread_is_discarded() {
    let store = RecordStore::new();
    let (started_tx, started_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();

    thread::scope(|s| {
        let store = &store;
        let old = s.spawn(move || {
            let ingestor = Ingestor::from_text(&csv("OLD", 50), config(10)).unwrap();
            let mut reports = 0;
            let result = ingest_into(store, ingestor, Publish::Progressive, |_| {
                reports += 1;
                if reports == 1 {
                    started_tx.send(()).unwrap();
                    resume_rx.recv().unwrap();
                }
            });
            (result, reports)
        });

        started_rx.recv().unwrap();
        let ingestor = Ingestor::from_text(&csv("NEW", 5), config(10)).unwrap();
        let newer = ingest_into(store, ingestor, Publish::Final, |_| {}).unwrap();
        assert_eq!(newer.len(), 5);
        resume_tx.send(()).unwrap();

        let (result, reports) = old.join().unwrap();
        assert!(matches!(result, Err(IngestionError::Superseded)));
        assert_eq!(reports, 1);
    });

    let current = store.snapshot();
    assert_eq!(current.len(), 5);
    assert!(current.iter().all(|r| r.id().starts_with("NEW")));
}

#[test]
fn cancelled_run_leaves_previous_set_published() {
    let store = RecordStore::new();
    ingest_into(&store, Ingestor::from_text(&csv("A", 3), config(10)).unwrap(), Publish::Final, |_| {}).unwrap();

    let token = CancelToken::new();
    let ingestor = Ingestor::from_text(&csv("B", 40), config(10)).unwrap().with_cancel(token.clone());
    let err = ingest_into(&store, ingestor, Publish::Final, |p| {
        if p.rows_read >= 20 { token.cancel() }
    }).unwrap_err();

    assert!(matches!(err, IngestionError::Cancelled { rows: 20 }));
    assert_eq!(store.snapshot().len(), 3);
}

#[test]
fn readers_share_the_published_set() {
    let store = RecordStore::new();
    let published = ingest_into(&store, Ingestor::from_text(&csv("A", 7), config(3)).unwrap(), Publish::Final, |_| {}).unwrap();
    let a = store.snapshot();
    let b = store.snapshot();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert!(std::sync::Arc::ptr_eq(&a, &published));
}
