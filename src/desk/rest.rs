use std::collections::BTreeMap;

use async_trait::async_trait;
use hyper::StatusCode;
use serde::Deserialize;

use crate::{error::TransportError, protocols::https::DeskServerHttp};

use super::actuator::HeightTarget;

/// Height commands and readback against the desk server.
#[async_trait]
pub trait HeightClient: Send + Sync + 'static {
    /// Starts a move. Returns once the server has accepted the command, not
    /// once the desk has arrived.
    async fn set_height(&self, target: HeightTarget<'_>, height: u32) -> Result<(), TransportError>;

    async fn get_height(&self, desk_id: &str) -> Result<f64, TransportError>;
}

#[derive(Deserialize, Debug, Clone)]
pub struct DeskData {
    pub id: String,
    pub config_name: String,
    pub height: Option<f64>,
}

/// Group id to the ordered ids of the desks in it.
pub type GroupsResponse = BTreeMap<String, Vec<String>>;

#[derive(Clone)]
pub struct DeskServerClient {
    http: DeskServerHttp,
}

impl DeskServerClient {
    pub fn new(http: DeskServerHttp) -> Self {
        DeskServerClient { http }
    }

    pub async fn get_groups(&self) -> Result<GroupsResponse, TransportError> {
        self.http.mk_get_request("/groups").await
    }

    pub async fn get_desks(&self) -> Result<Vec<DeskData>, TransportError> {
        self.http.mk_get_request("/desks").await
    }

    pub async fn get_desk(&self, desk_id: &str) -> Result<DeskData, TransportError> {
        self.http.mk_get_request(&format!("/desks/{desk_id}")).await
    }
}

#[async_trait]
impl HeightClient for DeskServerClient {
    async fn set_height(&self, target: HeightTarget<'_>, height: u32) -> Result<(), TransportError> {
        self.http
            .mk_post_text_request(&target.path(), height.to_string(), StatusCode::ACCEPTED)
            .await
    }

    async fn get_height(&self, desk_id: &str) -> Result<f64, TransportError> {
        self.http
            .mk_get_request(&HeightTarget::Desk(desk_id).path())
            .await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use hyper::StatusCode;

    use super::HeightClient;
    use crate::{desk::actuator::HeightTarget, error::TransportError};

    /// Records every call and answers with a fixed height.
    #[derive(Default)]
    pub(crate) struct MockClient {
        pub moves: Mutex<Vec<(String, u32)>>,
        pub reads: Mutex<Vec<String>>,
        pub height: Mutex<f64>,
        pub fail: AtomicBool,
        pub stall: AtomicBool,
        /// How long the desk takes to accept a height command
        pub set_delay: Mutex<Duration>,
    }

    impl MockClient {
        pub fn moves(&self) -> Vec<(String, u32)> {
            self.moves.lock().unwrap().clone()
        }

        fn check(&self) -> Result<(), TransportError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Status {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    uri: "mock".to_string(),
                });
            }

            Ok(())
        }

        async fn maybe_stall(&self) {
            if self.stall.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
        }
    }

    #[async_trait]
    impl HeightClient for MockClient {
        async fn set_height(
            &self,
            target: HeightTarget<'_>,
            height: u32,
        ) -> Result<(), TransportError> {
            self.maybe_stall().await;

            let delay = *self.set_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.check()?;
            self.moves.lock().unwrap().push((target.path(), height));
            Ok(())
        }

        async fn get_height(&self, desk_id: &str) -> Result<f64, TransportError> {
            self.maybe_stall().await;
            self.check()?;
            self.reads.lock().unwrap().push(desk_id.to_string());
            Ok(*self.height.lock().unwrap())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_groups_in_member_order() {
        let groups: GroupsResponse =
            serde_json::from_str(r#"{"office": ["d2", "d1"], "lab": []}"#).unwrap();

        assert_eq!(groups["office"], vec!["d2", "d1"]);
        assert!(groups["lab"].is_empty());
    }

    #[test]
    fn parses_desk_without_height() {
        let desk: DeskData =
            serde_json::from_str(r#"{"id": "d1", "config_name": "Left"}"#).unwrap();

        assert_eq!(desk.config_name, "Left");
        assert!(desk.height.is_none());
    }
}
