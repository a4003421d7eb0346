//! REST task API store.
//!
//! Expects a JSON resource collection rooted at `<base>/tasks`:
//!
//! | Operation    | Request                  | Success       |
//! |--------------|--------------------------|---------------|
//! | `find_all`   | `GET /tasks`             | 200 `[record]`|
//! | `find_by_id` | `GET /tasks/{id}`        | 200 `record`, 404 = absent |
//! | `create`     | `POST /tasks` + record    | 200/201 `record`, 409 = duplicate |
//! | `update`     | `PUT /tasks/{id}` + record| 200 `record`, 404 = missing |
//! | `delete`     | `DELETE /tasks/{id}`     | 200/204, 404 = missing |
//!
//! Timeouts and connection failures surface as `StorageUnavailable`; the
//! store never retries a write on its own.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::port::PersistencePort;
use crate::task::TaskRecord;

#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    tasks_url: Url,
}

impl RemoteStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut tasks_url = Url::parse(base_url.trim()).map_err(|err| {
            Error::InvalidConfig(format!("invalid store url '{base_url}': {err}"))
        })?;
        tasks_url
            .path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("store url cannot be a base: {base_url}")))?
            .pop_if_empty()
            .push("tasks");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::Unknown(format!("http client setup failed: {err}")))?;

        Ok(Self { client, tasks_url })
    }

    pub fn tasks_url(&self) -> &Url {
        &self.tasks_url
    }

    pub fn task_url(&self, id: &str) -> Url {
        let mut url = self.tasks_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }

    async fn send(&self, request: RequestBuilder, id: Option<&str>) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, id = id.unwrap_or("-"), "task api rejected request");
        Err(status_error(status, id, body.trim()))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|err| Error::StorageCorrupt(format!("unexpected task api payload: {err}")))
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Error::StorageUnavailable(format!("task api unreachable: {err}"))
    } else if err.is_decode() {
        Error::StorageCorrupt(format!("unexpected task api payload: {err}"))
    } else {
        Error::Unknown(err.to_string())
    }
}

/// Map a non-success HTTP status onto the storage error taxonomy.
pub fn status_error(status: StatusCode, id: Option<&str>, body: &str) -> Error {
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Error::NotFound(id.to_string()),
        (StatusCode::CONFLICT, Some(id)) => Error::DuplicateId(id.to_string()),
        // The collection itself is missing: wrong base url or api down.
        (StatusCode::NOT_FOUND, None) => {
            Error::StorageUnavailable(format!("task api returned {status}"))
        }
        (StatusCode::REQUEST_TIMEOUT, _) | (StatusCode::TOO_MANY_REQUESTS, _) => {
            Error::StorageUnavailable(format!("task api returned {status}"))
        }
        (s, _) if s.is_server_error() => {
            Error::StorageUnavailable(format!("task api returned {status}: {body}"))
        }
        _ => Error::Unknown(format!("task api returned {status}: {body}")),
    }
}

impl PersistencePort for RemoteStore {
    async fn find_all(&self) -> Result<Vec<TaskRecord>> {
        let response = self
            .send(self.client.get(self.tasks_url.clone()), None)
            .await?;
        decode(response).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        match self.send(self.client.get(self.task_url(id)), Some(id)).await {
            Ok(response) => decode(response).await.map(Some),
            Err(Error::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, record: TaskRecord) -> Result<TaskRecord> {
        let request = self.client.post(self.tasks_url.clone()).json(&record);
        let response = match self.send(request, Some(&record.id)).await {
            // Posting to a missing collection, not a missing task.
            Err(Error::NotFound(_)) => {
                return Err(Error::StorageUnavailable(format!(
                    "task api returned {}",
                    StatusCode::NOT_FOUND
                )))
            }
            other => other?,
        };
        decode(response).await
    }

    async fn update(&self, record: TaskRecord) -> Result<TaskRecord> {
        let request = self.client.put(self.task_url(&record.id)).json(&record);
        let response = self.send(request, Some(&record.id)).await?;
        decode(response).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send(self.client.delete(self.task_url(id)), Some(id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_rooted_at_tasks() {
        let store = RemoteStore::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.tasks_url().as_str(), "http://localhost:8080/api/tasks");
        assert_eq!(
            store.task_url("01hz").as_str(),
            "http://localhost:8080/api/tasks/01hz"
        );

        let bare = RemoteStore::new("http://localhost:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(bare.tasks_url().as_str(), "http://localhost:8080/tasks");
    }

    #[test]
    fn ids_are_escaped_as_one_segment() {
        let store = RemoteStore::new("http://localhost/api", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.task_url("a/b c").as_str(),
            "http://localhost/api/tasks/a%2Fb%20c"
        );
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let err = RemoteStore::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, Some("a"), ""),
            Error::NotFound(id) if id == "a"
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, Some("a"), ""),
            Error::DuplicateId(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, None, "down"),
            Error::StorageUnavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, None, ""),
            Error::StorageUnavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, None, "bad"),
            Error::Unknown(msg) if msg.contains("bad")
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, None, ""),
            Error::StorageUnavailable(msg) if msg.contains("404")
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, None, ""),
            Error::Unknown(_)
        ));
    }
}
