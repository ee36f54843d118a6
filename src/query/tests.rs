use super::*;
use crate::persist::{QueryPersister, SqlitePersister};
use crate::query_key;
use color_eyre::eyre::eyre;
use color_eyre::Report;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn client() -> QueryClient {
  QueryClient::new(QueryDefaults {
    retry: RetryPolicy::none(),
    ..QueryDefaults::default()
  })
}

/// Fetcher that counts calls, waits `latency`, then returns `value`.
fn counting<T: Clone + Send + Sync + 'static>(
  calls: &Arc<AtomicUsize>,
  latency: Duration,
  value: T,
) -> impl Fn() -> BoxFuture<'static, color_eyre::Result<T>> + Clone + Send + Sync + 'static {
  let calls = Arc::clone(calls);
  move || {
    calls.fetch_add(1, Ordering::SeqCst);
    let value = value.clone();
    async move {
      sleep(latency).await;
      Ok(value)
    }
    .boxed()
  }
}

fn rows(names: &[&str]) -> Vec<String> {
  names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_observers_share_one_fetch() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let fetch = counting(&calls, Duration::from_millis(20), rows(&["Sapi Bali"]));
  let key = query_key!["item", "list", ""];

  let mut first = client.query(key.clone(), fetch.clone(), QueryOptions::default());
  let mut second = client.query(key, fetch, QueryOptions::default());
  assert!(first.is_loading());
  assert!(second.is_loading());

  let a = first.wait_settled().await;
  let b = second.wait_settled().await;

  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(a.data, Some(rows(&["Sapi Bali"])));
  assert_eq!(b.data, a.data);
  assert_eq!(client.entry_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_data_is_served_without_fetching() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let fetch = counting(&calls, Duration::from_millis(10), 5u32);
  let key = query_key!["payment_type", "list", ""];
  let options = QueryOptions::default().stale_time(Duration::from_secs(1));

  let mut first = client.query(key.clone(), fetch.clone(), options.clone());
  first.wait_settled().await;

  let second = client.query(key.clone(), fetch.clone(), options.clone());
  let state = second.state();
  assert!(state.is_success());
  assert!(!state.is_fetching);
  assert_eq!(state.data, Some(5));
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  sleep(Duration::from_secs(2)).await;

  // Stale: the data is shown while a background refresh runs
  let mut third = client.query(key, fetch, options);
  let state = third.state();
  assert!(state.is_success());
  assert!(state.is_fetching);
  assert_eq!(state.data, Some(5));

  third.wait_settled().await;
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refetch_supersedes_in_flight_fetch() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let fetch = move || {
    let n = counter.fetch_add(1, Ordering::SeqCst);
    async move {
      // The first request would finish first, but it was superseded
      let latency = if n == 0 { 10 } else { 100 };
      sleep(Duration::from_millis(latency)).await;
      Ok::<_, Report>(format!("response {}", n))
    }
  };

  let mut observer = client.query(
    query_key!["supplier", "list", ""],
    fetch,
    QueryOptions::default(),
  );
  sleep(Duration::from_millis(1)).await;
  observer.refetch();

  sleep(Duration::from_millis(50)).await;
  let state = observer.state();
  assert!(state.data.is_none());
  assert!(state.is_loading());

  let state = observer.wait_settled().await;
  assert_eq!(state.data.as_deref(), Some("response 1"));

  sleep(Duration::from_millis(200)).await;
  assert_eq!(observer.data().as_deref(), Some("response 1"));
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_refetches_observed_queries_once() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let fetch = counting(&calls, Duration::from_millis(10), rows(&["Sapi Bali"]));

  let mut list = client.query(query_key!["item", "list", ""], fetch, QueryOptions::default());
  list.wait_settled().await;
  client.set_query_data(query_key!["item", "detail", 1], rows(&["Sapi Bali"]));

  assert_eq!(client.invalidate_queries(&query_key!["item"]), 2);
  assert!(list.is_fetching());
  assert_eq!(client.invalidate_queries(&query_key!["item"]), 0);

  list.wait_settled().await;
  sleep(Duration::from_millis(100)).await;
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidating_unobserved_or_unknown_keys() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let key = query_key!["item", "list", "bali"];

  assert_eq!(client.invalidate_queries(&query_key!["supplier"]), 0);

  client.set_query_data(key.clone(), rows(&["old"]));
  assert_eq!(client.invalidate_queries(&key), 1);
  assert_eq!(client.invalidate_queries(&key), 0);
  assert_eq!(calls.load(Ordering::SeqCst), 0);

  // Data is within stale time but invalidated, so the next observer refetches
  let mut observer = client.query(
    key,
    counting(&calls, Duration::from_millis(10), rows(&["new"])),
    QueryOptions::default(),
  );
  assert!(observer.is_fetching());
  let state = observer.wait_settled().await;
  assert_eq!(state.data, Some(rows(&["new"])));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_after_failed_refetch_fetches_again() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let offline = Arc::new(AtomicBool::new(false));
  let fetch = {
    let calls = calls.clone();
    let offline = offline.clone();
    move || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      let offline = offline.load(Ordering::SeqCst);
      async move {
        sleep(Duration::from_millis(10)).await;
        if offline {
          Err(eyre!("connection reset"))
        } else {
          Ok(n)
        }
      }
    }
  };

  let mut list = client.query(query_key!["item", "list", ""], fetch, QueryOptions::default());
  assert_eq!(list.wait_settled().await.data, Some(0));

  offline.store(true, Ordering::SeqCst);
  assert_eq!(client.invalidate_queries(&query_key!["item"]), 1);
  let state = list.wait_settled().await;
  assert!(state.is_error());
  assert_eq!(state.data, Some(0));

  // The failed refetch must not swallow the next invalidation
  offline.store(false, Ordering::SeqCst);
  assert_eq!(client.invalidate_queries(&query_key!["item"]), 1);
  assert!(list.is_fetching());
  let state = list.wait_settled().await;
  assert!(state.is_success());
  assert_eq!(state.data, Some(2));
  assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_query_fetches_once_enabled() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let fetch = counting(&calls, Duration::from_millis(10), "Sapi Limosin".to_string());

  let mut detail = client.query(
    query_key!["item", "detail", None::<i64>],
    fetch.clone(),
    QueryOptions::default().enabled(false),
  );
  sleep(Duration::from_millis(100)).await;
  assert!(detail.state().is_idle());
  assert!(detail.wait_settled().await.is_idle());

  detail.refetch();
  client.invalidate_queries(&query_key!["item"]);
  sleep(Duration::from_millis(100)).await;
  assert_eq!(calls.load(Ordering::SeqCst), 0);

  detail.set_key(query_key!["item", "detail", Some(7)], fetch);
  sleep(Duration::from_millis(100)).await;
  assert_eq!(calls.load(Ordering::SeqCst), 0);

  detail.set_enabled(true);
  let state = detail.wait_settled().await;
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(state.data.as_deref(), Some("Sapi Limosin"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_refetch_keeps_previous_data() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let fetch = move || {
    let n = counter.fetch_add(1, Ordering::SeqCst);
    async move {
      if n == 0 {
        Ok(vec![1, 2])
      } else {
        Err(eyre!("502 Bad Gateway"))
      }
    }
  };

  let mut observer = client.query(query_key!["item", "list", ""], fetch, QueryOptions::default());
  assert_eq!(observer.wait_settled().await.data, Some(vec![1, 2]));

  observer.refetch();
  let state = observer.wait_settled().await;
  assert!(state.is_error());
  assert_eq!(state.error(), Some("502 Bad Gateway"));
  assert_eq!(state.data, Some(vec![1, 2]));
}

#[tokio::test(start_paused = true)]
async fn test_first_fetch_failure_is_state_not_panic() {
  let client = client();
  let mut observer = client.query(
    query_key!["supplier", "detail", 2],
    || async { Err::<String, _>(eyre!("connection refused")) },
    QueryOptions::default(),
  );

  let state = observer.wait_settled().await;
  assert!(state.is_error());
  assert!(state.data.is_none());
  assert_eq!(state.error(), Some("connection refused"));
}

#[tokio::test(start_paused = true)]
async fn test_panicking_fetch_settles_as_error() {
  let client = client();
  let mut observer = client.query(
    query_key!["item", "detail", 3],
    || async {
      let decoded: Option<u8> = None;
      Ok::<u8, Report>(decoded.expect("decoded row"))
    },
    QueryOptions::default(),
  );

  let state = tokio::time::timeout(Duration::from_secs(5), observer.wait_settled())
    .await
    .expect("entry settles after a panic");
  assert!(state.is_error());
  assert!(!state.is_fetching);
  assert_eq!(state.error(), Some("query function panicked"));

  let result = client
    .fetch_query(
      query_key!["item", "detail", 4],
      || async {
        let decoded: Option<u8> = None;
        Ok::<u8, Report>(decoded.expect("decoded row"))
      },
      QueryOptions::default(),
    )
    .await;
  assert_eq!(result.unwrap_err().message(), "query function panicked");
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_applies_to_fetches() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let fetch = move || {
    let n = counter.fetch_add(1, Ordering::SeqCst);
    async move {
      if n < 2 {
        Err(eyre!("503 Service Unavailable"))
      } else {
        Ok(42u32)
      }
    }
  };
  let retry = RetryPolicy {
    max_retries: 2,
    initial_backoff: Duration::from_millis(100),
    max_backoff: Duration::from_secs(1),
    backoff_multiplier: 2.0,
  };

  let mut observer = client.query(
    query_key!["item", "list", ""],
    fetch,
    QueryOptions::default().retry(retry),
  );

  // Still loading between attempts, with no error surfaced yet
  sleep(Duration::from_millis(50)).await;
  assert!(observer.is_loading());
  assert!(observer.state().error.is_none());

  let state = observer.wait_settled().await;
  assert_eq!(state.data, Some(42));
  assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unobserved_entry_is_evicted_after_retain_time() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let fetch = counting(&calls, Duration::from_millis(10), 1u8);
  let key = query_key!["item", "list", ""];
  let options = QueryOptions::default().retain_time(Duration::from_secs(1));

  let mut observer = client.query(key.clone(), fetch.clone(), options.clone());
  observer.wait_settled().await;
  drop(observer);
  assert_eq!(client.entry_count(), 1);

  // Coming back before the retain time reuses the cached entry
  sleep(Duration::from_millis(500)).await;
  let observer = client.query(key.clone(), fetch, options);
  assert!(!observer.is_fetching());
  assert_eq!(observer.data(), Some(1));

  sleep(Duration::from_secs(2)).await;
  assert_eq!(client.entry_count(), 1);

  drop(observer);
  sleep(Duration::from_millis(1100)).await;
  assert_eq!(client.entry_count(), 0);
  assert!(client.get_query_data::<u8>(&key).is_none());
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_data_set_without_observers_is_evicted() {
  let client = QueryClient::new(QueryDefaults {
    retain_time: Duration::from_millis(50),
    retry: RetryPolicy::none(),
    ..QueryDefaults::default()
  });
  let key = query_key!["item", "detail", 1];

  client.set_query_data(key.clone(), rows(&["Sapi Bali"]));
  sleep(Duration::from_millis(30)).await;
  // Writing again restarts the retain window
  client.set_query_data(key.clone(), rows(&["Sapi Bali", "Sapi Madura"]));
  sleep(Duration::from_millis(30)).await;
  assert_eq!(client.entry_count(), 1);

  sleep(Duration::from_secs(10)).await;
  assert_eq!(client.entry_count(), 0);
  assert!(client.get_query_data::<Vec<String>>(&key).is_none());

  // An observer attached in time keeps the entry alive
  client.set_query_data(key.clone(), rows(&["Kambing Etawa"]));
  let calls = Arc::new(AtomicUsize::new(0));
  let observer = client.query(
    key.clone(),
    counting(&calls, Duration::from_millis(10), rows(&["Kambing Etawa"])),
    QueryOptions::default(),
  );
  sleep(Duration::from_secs(1)).await;
  assert_eq!(client.entry_count(), 1);
  assert_eq!(observer.data(), Some(rows(&["Kambing Etawa"])));
}

#[tokio::test(start_paused = true)]
async fn test_keep_previous_data_until_new_key_resolves() {
  let client = client();
  let search = |term: &'static str| {
    move || async move {
      sleep(Duration::from_millis(50)).await;
      Ok::<_, Report>(vec![format!("{} result", term)])
    }
  };
  let options = QueryOptions::default().keep_previous_data(true);

  let mut list = client.query(query_key!["item", "list", "a"], search("a"), options);
  list.wait_settled().await;

  list.set_key(query_key!["item", "list", "ab"], search("ab"));
  let state = list.state();
  assert_eq!(state.data, Some(vec!["a result".to_string()]));
  assert!(state.is_previous_data);
  assert!(state.is_fetching);
  assert!(state.is_success());

  loop {
    let state = list.state();
    assert!(state.data.is_some(), "no empty state between keys");
    if !state.is_fetching {
      break;
    }
    list.changed().await;
  }

  let state = list.state();
  assert_eq!(state.data, Some(vec!["ab result".to_string()]));
  assert!(!state.is_previous_data);
}

#[tokio::test(start_paused = true)]
async fn test_key_change_without_keep_previous_data_shows_loading() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));

  let mut list = client.query(
    query_key!["item", "list", "a"],
    counting(&calls, Duration::from_millis(10), rows(&["a"])),
    QueryOptions::default(),
  );
  list.wait_settled().await;

  list.set_key(
    query_key!["item", "list", "b"],
    counting(&calls, Duration::from_millis(10), rows(&["b"])),
  );
  let state = list.state();
  assert!(state.is_loading());
  assert!(state.data.is_none());

  assert_eq!(list.wait_settled().await.data, Some(rows(&["b"])));
}

#[tokio::test(start_paused = true)]
async fn test_poll_reports_changes_once() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let mut observer = client.query(
    query_key!["item", "list", ""],
    counting(&calls, Duration::from_millis(10), 3u32),
    QueryOptions::default(),
  );

  assert!(observer.poll());
  assert!(!observer.poll());

  sleep(Duration::from_millis(20)).await;
  assert!(observer.poll());
  assert_eq!(observer.data(), Some(3));
  assert!(!observer.poll());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_query_uses_cache_when_fresh() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let fetch = counting(&calls, Duration::from_millis(10), rows(&["Cash", "Transfer"]));
  let key = query_key!["payment_type", "list", ""];

  let first = client
    .fetch_query(key.clone(), fetch.clone(), QueryOptions::default())
    .await
    .unwrap();
  let second = client
    .fetch_query(key.clone(), fetch, QueryOptions::default())
    .await
    .unwrap();

  assert_eq!(first, rows(&["Cash", "Transfer"]));
  assert_eq!(second, first);
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(client.get_query_data::<Vec<String>>(&key), Some(first));
  assert!(client.get_query_data::<u32>(&key).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_query_reports_errors() {
  let client = client();
  let result = client
    .fetch_query(
      query_key!["item", "detail", 1],
      || async { Err::<u32, _>(eyre!("404 Not Found")) },
      QueryOptions::default(),
    )
    .await;

  assert_eq!(result.unwrap_err().message(), "404 Not Found");
}

#[tokio::test(start_paused = true)]
async fn test_restored_snapshot_is_shown_then_refreshed() {
  let persister = Arc::new(SqlitePersister::open_in_memory().unwrap());
  let key = query_key!["item", "list", ""];
  persister.persist(&key, &json!(["stale row"])).unwrap();

  let client = QueryClient::with_persister(
    QueryDefaults {
      retry: RetryPolicy::none(),
      ..QueryDefaults::default()
    },
    persister.clone(),
  );
  let calls = Arc::new(AtomicUsize::new(0));
  let mut list = client.query(
    key.clone(),
    counting(&calls, Duration::from_millis(10), rows(&["fresh row"])),
    QueryOptions::default(),
  );

  let state = list.state();
  assert_eq!(state.data, Some(rows(&["stale row"])));
  assert!(state.is_restored);
  assert!(state.is_fetching);
  assert!(state.is_success());

  let state = list.wait_settled().await;
  assert_eq!(state.data, Some(rows(&["fresh row"])));
  assert!(!state.is_restored);
  assert_eq!(
    persister.restore(&key).unwrap().unwrap().value,
    json!(["fresh row"])
  );
}

#[tokio::test(start_paused = true)]
async fn test_restored_snapshot_survives_network_failure() {
  let persister = Arc::new(SqlitePersister::open_in_memory().unwrap());
  let key = query_key!["supplier", "list", ""];
  persister.persist(&key, &json!(["offline row"])).unwrap();

  let client = QueryClient::with_persister(
    QueryDefaults {
      retry: RetryPolicy::none(),
      ..QueryDefaults::default()
    },
    persister,
  );
  let mut list = client.query(
    key,
    || async { Err::<Vec<String>, _>(eyre!("connection refused")) },
    QueryOptions::default(),
  );

  let state = list.wait_settled().await;
  assert!(state.is_error());
  assert!(state.is_restored);
  assert_eq!(state.data, Some(rows(&["offline row"])));
}

#[tokio::test(start_paused = true)]
async fn test_remove_queries_drops_entries_and_snapshots() {
  let persister = Arc::new(SqlitePersister::open_in_memory().unwrap());
  let client = QueryClient::with_persister(QueryDefaults::default(), persister.clone());
  let list = query_key!["item", "list", ""];
  let detail = query_key!["item", "detail", 4];

  client.set_query_data(list.clone(), rows(&["a"]));
  client.set_query_data(detail.clone(), rows(&["b"]));
  client.set_query_data(query_key!["supplier", "list", ""], rows(&["c"]));
  assert!(persister.restore(&list).unwrap().is_some());

  assert_eq!(client.remove_queries(&query_key!["item"]), 2);
  assert_eq!(client.entry_count(), 1);
  assert!(persister.restore(&list).unwrap().is_none());
  assert!(persister.restore(&detail).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_mutation_success_refreshes_observed_list() {
  let client = client();
  let server = Arc::new(Mutex::new(rows(&["Sapi Bali"])));

  let list_server = server.clone();
  let mut list = client.query(
    query_key!["item", "list", ""],
    move || {
      let server = list_server.clone();
      async move {
        sleep(Duration::from_millis(10)).await;
        let rows = server.lock().unwrap().clone();
        Ok::<_, Report>(rows)
      }
    },
    QueryOptions::default(),
  );
  list.wait_settled().await;

  let create_server = server.clone();
  let create = client
    .mutation(move |name: String| {
      let server = create_server.clone();
      async move {
        sleep(Duration::from_millis(10)).await;
        server.lock().unwrap().push(name.clone());
        Ok::<_, Report>(name)
      }
    })
    .invalidates(query_key!["item"]);
  assert_eq!(create.state().status, MutationStatus::Idle);

  let created = create.mutate("Sapi Limosin".to_string()).await.unwrap();
  assert_eq!(created, "Sapi Limosin");
  assert!(create.state().is_success());
  assert!(list.is_fetching());

  let state = list.wait_settled().await;
  assert_eq!(state.data, Some(rows(&["Sapi Bali", "Sapi Limosin"])));
}

#[tokio::test(start_paused = true)]
async fn test_failed_mutation_does_not_invalidate() {
  let client = client();
  let calls = Arc::new(AtomicUsize::new(0));
  let mut list = client.query(
    query_key!["item", "list", ""],
    counting(&calls, Duration::from_millis(10), rows(&["Sapi Bali"])),
    QueryOptions::default(),
  );
  list.wait_settled().await;

  let delete = client
    .mutation(|_id: i64| async move { Err::<(), _>(eyre!("422 Unprocessable Entity")) })
    .invalidates(query_key!["item"]);

  let error = delete.mutate(3).await.unwrap_err();
  assert_eq!(error.message(), "422 Unprocessable Entity");
  let state = delete.state();
  assert!(state.is_error());
  assert_eq!(state.error, Some(error));

  sleep(Duration::from_millis(100)).await;
  assert!(!list.is_fetching());
  assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_mutation_state_tracks_latest_call() {
  let client = client();
  let mutation = client.mutation(|ms: u64| async move {
    sleep(Duration::from_millis(ms)).await;
    Ok::<_, Report>(ms)
  });

  let slow = mutation.spawn(100);
  sleep(Duration::from_millis(1)).await;
  let fast = mutation.spawn(10);

  assert_eq!(fast.await.unwrap().unwrap(), 10);
  assert_eq!(mutation.state().data, Some(10));
  assert_eq!(slow.await.unwrap().unwrap(), 100);
  assert_eq!(mutation.state().data, Some(10));
  assert!(mutation.state().is_success());

  mutation.reset();
  assert_eq!(mutation.state().status, MutationStatus::Idle);
}
