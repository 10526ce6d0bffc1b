//! Per-request context handed to every resource operation

use axum::{
    async_trait,
    body::to_bytes,
    extract::{FromRequest, Query, Request},
    http::Method,
};
use safewatch_common::types::PageParams;
use safewatch_common::Error;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::{bearer_token, AuthContext};
use crate::response::ApiError;

/// Largest accepted JSON body
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Method, `action`, query string and parsed JSON body of one call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    query: HashMap<String, String>,
    body: Value,
    bearer: Option<String>,
    auth: Option<AuthContext>,
}

#[async_trait]
impl<S> FromRequest<S> for ApiRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .map_err(|_| Error::validation("Invalid query string"))?;

        let bytes = to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|_| Error::validation("Request body is too large or unreadable"))?;
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::validation(format!("Invalid JSON body: {}", e)))?
        };

        Ok(Self {
            method: parts.method,
            query,
            body,
            bearer: bearer_token(&parts.headers).map(str::to_string),
            auth: parts.extensions.get::<AuthContext>().cloned(),
        })
    }
}

impl ApiRequest {
    pub fn new(method: Method, query: HashMap<String, String>, body: Value) -> Self {
        Self {
            method,
            query,
            body,
            bearer: None,
            auth: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The `action` query parameter, if any
    pub fn action(&self) -> Option<&str> {
        self.param("action")
    }

    pub fn action_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.action().unwrap_or(default)
    }

    /// `action`, or the CRUD operation the method implies
    pub fn crud_action(&self) -> &str {
        let default = match self.method {
            Method::POST => "create",
            Method::PUT => "update",
            Method::DELETE => "delete",
            _ => "list",
        };
        self.action_or(default)
    }

    /// Error for an action the resource does not offer
    pub fn unknown_action(&self) -> ApiError {
        ApiError(Error::validation(format!(
            "Invalid action '{}' for {}",
            self.action().unwrap_or(""),
            self.method
        )))
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Caller identity set by the auth middleware
    pub fn auth(&self) -> Option<&AuthContext> {
        self.auth.as_ref()
    }

    /// Non-blank query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Query parameter parsed into a text enum; an unknown value is a validation error
    pub fn parse_param<T>(&self, name: &str) -> Result<Option<T>, Error>
    where
        T: FromStr<Err = String>,
    {
        self.param(name)
            .map(|v| v.parse::<T>().map_err(Error::validation))
            .transpose()
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(value) = self.param(name) {
            return Some(value.to_string());
        }
        match self.body.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// UUID from the query string or the body
    pub fn uuid(&self, name: &str) -> Result<Option<Uuid>, Error> {
        self.lookup(name)
            .map(|v| Uuid::parse_str(&v).map_err(|_| Error::validation(format!("Invalid {}", name))))
            .transpose()
    }

    pub fn require_uuid(&self, name: &str) -> Result<Uuid, Error> {
        self.uuid(name)?
            .ok_or_else(|| Error::validation(format!("{} is required", name)))
    }

    /// The `id` of the record the call targets
    pub fn id(&self) -> Result<Uuid, Error> {
        self.require_uuid("id")
    }

    /// `page` and `limit` with defaults and clamping
    pub fn page(&self) -> PageParams {
        let number = |name: &str| self.param(name).and_then(|v| v.parse::<i64>().ok());
        PageParams::new(number("page"), number("limit"))
    }

    /// Deserialize the body; an empty body reads as `{}`
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = match &self.body {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("Invalid request body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use safewatch_storage::models::AlertStatus;
    use serde_json::json;

    fn request(query: &[(&str, &str)], body: Value) -> ApiRequest {
        let query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiRequest::new(Method::GET, query, body)
    }

    #[test]
    fn test_action_defaults() {
        let req = request(&[("action", "  ")], Value::Null);
        assert_eq!(req.action(), None);
        assert_eq!(req.action_or("list"), "list");

        let req = request(&[("action", "detail")], Value::Null);
        assert_eq!(req.action_or("list"), "detail");

        let req = ApiRequest::new(Method::DELETE, HashMap::new(), Value::Null);
        assert_eq!(req.crud_action(), "delete");
        let req = ApiRequest::new(Method::POST, HashMap::new(), Value::Null);
        assert_eq!(req.crud_action(), "create");
    }

    #[test]
    fn test_ids_come_from_query_or_body() {
        let id = Uuid::new_v4();
        let req = request(&[], json!({ "alert_id": id.to_string() }));
        assert_eq!(req.require_uuid("alert_id").unwrap(), id);

        let req = request(&[("id", "not-a-uuid")], Value::Null);
        assert_eq!(req.id().unwrap_err().to_string(), "Invalid id");

        let req = request(&[], Value::Null);
        assert_eq!(req.id().unwrap_err().to_string(), "id is required");
    }

    #[test]
    fn test_page_and_enum_params() {
        let req = request(&[("page", "3"), ("limit", "abc"), ("status", "sent")], Value::Null);
        assert_eq!(req.page(), PageParams { page: 3, limit: 20 });
        assert_eq!(req.parse_param::<AlertStatus>("status").unwrap(), Some(AlertStatus::Sent));

        let req = request(&[("status", "lost")], Value::Null);
        assert!(req.parse_param::<AlertStatus>("status").is_err());
    }

    #[test]
    fn test_empty_body_reads_as_object() {
        #[derive(serde::Deserialize)]
        struct Optional {
            name: Option<String>,
        }
        let req = request(&[], Value::Null);
        assert_eq!(req.body::<Optional>().unwrap().name, None);
    }
}
