//! Resource endpoints consumed by the application pages
//!
//! Shapes are owned by the backend and returned as opaque JSON.

use crate::error::Result;
use crate::gateway::{ApiRequest, RequestGateway};
use serde_json::{json, Value};
use std::fmt::Display;
use std::sync::Arc;

/// Typed paths over the request gateway
#[derive(Clone)]
pub struct CostanzaApi {
    gateway: Arc<RequestGateway>,
}

impl CostanzaApi {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    // Trails

    pub async fn trails(&self) -> Result<Value> {
        self.gateway.get("/trilhas/").await
    }

    pub async fn trail(&self, id: impl Display) -> Result<Value> {
        self.gateway.get(&format!("/trilhas/{id}/")).await
    }

    pub async fn complete_activity(&self, activity_id: i64) -> Result<Value> {
        self.gateway
            .post(&format!("/trilhas/atividades/{activity_id}/complete/"), json!({}))
            .await
    }

    // Stats, rankings, projects

    pub async fn user_stats(&self, user_id: impl Display) -> Result<Value> {
        self.gateway.get(&format!("/users/{user_id}/stats/")).await
    }

    pub async fn rankings(&self) -> Result<Value> {
        self.gateway.get("/rankings/").await
    }

    pub async fn projects(&self) -> Result<Value> {
        self.gateway.get("/projects/").await
    }

    // Badges

    pub async fn badges(&self, user_id: impl Display) -> Result<Value> {
        self.gateway.get(&format!("/users/{user_id}/badges/")).await
    }

    pub async fn my_badges(&self) -> Result<Value> {
        self.gateway.get("/users/badges/").await
    }

    // Profile

    pub async fn my_profile(&self) -> Result<Value> {
        self.gateway.get("/users/profile/me/").await
    }

    /// Partial update; only the given fields change
    pub async fn update_profile(&self, fields: Value) -> Result<Value> {
        self.gateway.patch("/users/profile/me/", fields).await
    }

    // Friends

    pub async fn friends(&self) -> Result<Value> {
        self.gateway.get("/friends/").await
    }

    pub async fn remove_friend(&self, user_id: i64) -> Result<Value> {
        self.gateway.delete(&format!("/friends/{user_id}/")).await
    }

    pub async fn friend_requests(&self) -> Result<Value> {
        self.gateway.get("/friends/request/").await
    }

    pub async fn send_friend_request(&self, to_user: i64) -> Result<Value> {
        self.gateway
            .post("/friends/request/", json!({ "to_user": to_user }))
            .await
    }

    pub async fn accept_friend_request(&self, request_id: i64) -> Result<Value> {
        self.gateway
            .put(&format!("/friends/request/{request_id}/accept/"), json!({}))
            .await
    }

    pub async fn reject_friend_request(&self, request_id: i64) -> Result<Value> {
        self.gateway
            .delete(&format!("/friends/request/{request_id}/"))
            .await
    }

    pub async fn search_users(&self, query: &str) -> Result<Value> {
        let request = ApiRequest::get("/users/users/").with_query("search", query);
        Ok(self.gateway.execute(request).await?.body)
    }
}
