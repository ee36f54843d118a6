use color_eyre::{eyre::eyre, Report, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{ListPage, Resource};
use crate::api::{parse_record, Transport};
use crate::query::{Mutation, QueryClient, QueryKey, QueryObserver, QueryOptions};
use crate::query_key;

/// Cache-backed access to one entity's endpoints.
pub struct ResourceClient<R> {
  client: QueryClient,
  transport: Arc<dyn Transport>,
  _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceClient<R> {
  fn clone(&self) -> Self {
    Self {
      client: self.client.clone(),
      transport: Arc::clone(&self.transport),
      _resource: PhantomData,
    }
  }
}

impl<R: Resource> ResourceClient<R> {
  pub fn new(client: QueryClient, transport: Arc<dyn Transport>) -> Self {
    Self {
      client,
      transport,
      _resource: PhantomData,
    }
  }

  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  /// Prefix shared by every query of this entity.
  pub fn root_key() -> QueryKey {
    query_key![R::NAME]
  }

  pub fn list_key(search: &str) -> QueryKey {
    query_key![R::NAME, "list", search.trim()]
  }

  pub fn detail_key(id: Option<i64>) -> QueryKey {
    query_key![R::NAME, "detail", id]
  }

  /// Observe the rows matching `search`. Previous results stay visible
  /// while a new search loads.
  pub fn list(&self, search: &str) -> QueryObserver<ListPage<R>> {
    self.client.query(
      Self::list_key(search),
      self.list_fetcher(search),
      QueryOptions::default().keep_previous_data(true),
    )
  }

  /// Point a list observer at a new search term.
  pub fn search(&self, observer: &mut QueryObserver<ListPage<R>>, search: &str) {
    observer.set_key(Self::list_key(search), self.list_fetcher(search));
  }

  /// Observe one record. Without an id the observer stays idle.
  pub fn detail(&self, id: Option<i64>) -> QueryObserver<R> {
    self.client.query(
      Self::detail_key(id),
      self.detail_fetcher(id),
      QueryOptions::default().enabled(id.is_some()),
    )
  }

  /// Point a detail observer at another record, or at none.
  pub fn select(&self, observer: &mut QueryObserver<R>, id: Option<i64>) {
    // Disable before moving to the id-less key, enable only after moving off it
    if id.is_none() {
      observer.set_enabled(false);
    }
    observer.set_key(Self::detail_key(id), self.detail_fetcher(id));
    if id.is_some() {
      observer.set_enabled(true);
    }
  }

  /// Create a record from a JSON body.
  pub fn create(&self) -> Mutation<Value, R> {
    let transport = Arc::clone(&self.transport);
    self
      .client
      .mutation(move |body: Value| {
        let request = transport.post(R::PATH, body);
        async move {
          let value = request.await?;
          Ok::<_, Report>(R::normalize(parse_record(&value)))
        }
      })
      .invalidates(Self::root_key())
  }

  /// Update the record with the given id.
  pub fn update(&self) -> Mutation<(i64, Value), R> {
    let transport = Arc::clone(&self.transport);
    self
      .client
      .mutation(move |(id, body): (i64, Value)| {
        let request = transport.put(&record_path::<R>(id), body);
        async move {
          let value = request.await?;
          Ok::<_, Report>(R::normalize(parse_record(&value)))
        }
      })
      .invalidates(Self::root_key())
  }

  pub fn delete(&self) -> Mutation<i64, ()> {
    let transport = Arc::clone(&self.transport);
    self
      .client
      .mutation(move |id: i64| {
        let request = transport.delete(&record_path::<R>(id));
        async move {
          request.await?;
          Ok::<_, Report>(())
        }
      })
      .invalidates(Self::root_key())
  }

  fn list_fetcher(
    &self,
    search: &str,
  ) -> impl Fn() -> BoxFuture<'static, Result<ListPage<R>>> + Send + Sync + 'static {
    let transport = Arc::clone(&self.transport);
    let search = search.trim().to_string();
    move || {
      let query = if search.is_empty() {
        Vec::new()
      } else {
        vec![("search", search.clone())]
      };
      let request = transport.get(R::PATH, &query);
      async move {
        let value = request.await?;
        Ok(ListPage::from_value(&value, R::normalize))
      }
      .boxed()
    }
  }

  fn detail_fetcher(
    &self,
    id: Option<i64>,
  ) -> impl Fn() -> BoxFuture<'static, Result<R>> + Send + Sync + 'static {
    let transport = Arc::clone(&self.transport);
    move || {
      let Some(id) = id else {
        return async { Err(eyre!("No {} selected", R::NAME)) }.boxed();
      };
      let request = transport.get(&record_path::<R>(id), &[]);
      async move {
        let value = request.await?;
        Ok(R::normalize(parse_record(&value)))
      }
      .boxed()
    }
  }
}

fn record_path<R: Resource>(id: i64) -> String {
  format!("{}/{}", R::PATH, id)
}
