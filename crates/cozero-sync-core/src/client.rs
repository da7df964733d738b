//! Client for the Cozero locations API.
//!
//! The client owns the session for the lifetime of a run: authenticate first,
//! then resolve the current user and business unit. Calls that need a piece
//! of session state fail with a precondition error until it is resolved.

use std::fmt;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::dataset::{Cell, Dataset, Record};
use crate::error::{Result, SyncError};
use crate::validation::{ADDRESS, BUSINESS_UNIT_ID, DESCRIPTION, NAME, TAG, USER_ID};

pub const DEFAULT_BASE_URL: &str = "https://api.cozero.io/v1";
pub const ORGANIZATION_ID: &str = "12119";

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<i64>,
    pub business_unit_id: Option<i64>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("business_unit_id", &self.business_unit_id)
            .finish()
    }
}

/// Body of a location create request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationPayload {
    pub name: String,
    pub address: String,
    pub business_unit_id: i64,
    pub description: Cell,
    pub metadata: PayloadMetadata,
    pub responsible: PayloadResponsible,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayloadMetadata {
    pub tags: Vec<Cell>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PayloadResponsible {
    pub id: Cell,
}

impl LocationPayload {
    /// Builds the upload body for one prepared record. Name and address must
    /// be text and the business unit an integer; the optional columns are sent
    /// as-is, or as empty strings when the column does not exist.
    pub fn from_record(dataset: &Dataset, record: &Record) -> Result<Self> {
        let invalid = |message: String| SyncError::InvalidRecord {
            index: record.index,
            message,
        };
        let optional = |column: &str| {
            dataset
                .cell(record, column)
                .cloned()
                .unwrap_or_else(|| Cell::text(""))
        };

        let name = dataset
            .cell(record, NAME)
            .and_then(Cell::as_text)
            .ok_or_else(|| invalid(format!("'{NAME}' is not text")))?;
        let address = dataset
            .cell(record, ADDRESS)
            .and_then(Cell::as_text)
            .ok_or_else(|| invalid(format!("'{ADDRESS}' is not text")))?;
        let business_unit_id = dataset
            .cell(record, BUSINESS_UNIT_ID)
            .and_then(Cell::as_integer)
            .ok_or_else(|| invalid(format!("'{BUSINESS_UNIT_ID}' is not an integer")))?;

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            business_unit_id,
            description: optional(DESCRIPTION),
            metadata: PayloadMetadata {
                tags: vec![optional(TAG)],
            },
            responsible: PayloadResponsible {
                id: optional(USER_ID),
            },
        })
    }
}

/// A location as stored by the remote system.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLocation {
    pub id: i64,
    pub name: Option<String>,
    pub address: Option<String>,
    pub business_unit_id: Option<i64>,
    pub description: Option<String>,
    pub metadata: Option<RemoteMetadata>,
    pub responsible: Option<RemoteResponsible>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RemoteMetadata {
    #[serde(default)]
    pub tags: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteResponsible {
    pub id: Option<Value>,
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct UserProfile {
    id: Option<i64>,
}

#[derive(Deserialize)]
struct BusinessUnitNode {
    value: Option<i64>,
}

pub struct CozeroClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    session: Session,
}

impl fmt::Debug for CozeroClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CozeroClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("session", &self.session)
            .finish()
    }
}

impl CozeroClient {
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Result<Self> {
        let http = Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            http,
            base_url,
            credentials,
            session: Session::default(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Exchanges the credentials for a bearer token.
    #[instrument(skip(self), fields(email = %self.credentials.email))]
    pub async fn authenticate(&mut self) -> Result<()> {
        let path = "/auth/basic";
        let request = self
            .http
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(&AuthRequest {
                email: &self.credentials.email,
                password: &self.credentials.password,
            });

        let response = send(Method::POST, path, request).await?;
        let body: AuthResponse = decode(response).await?;
        let token = body.access_token.ok_or_else(|| SyncError::MissingField {
            path: path.to_string(),
            field: "accessToken",
        })?;

        self.session.token = Some(token);
        Ok(())
    }

    pub async fn get_user_id(&mut self) -> Result<i64> {
        let path = "/central/users/me";
        let request = self.authorized(Method::GET, path)?;

        let response = send(Method::GET, path, request).await?;
        let profile: UserProfile = decode(response).await?;
        let user_id = profile.id.ok_or_else(|| SyncError::MissingField {
            path: path.to_string(),
            field: "id",
        })?;

        debug!(user_id, "Resolved current user");
        self.session.user_id = Some(user_id);
        Ok(user_id)
    }

    /// Resolves the active business unit: the first root of the forest.
    pub async fn get_business_units(&mut self) -> Result<i64> {
        let path = "/central/business-units/user-business-units-forest";
        let request = self
            .authorized(Method::GET, path)?
            .query(&[("organizationId", ORGANIZATION_ID)]);

        let response = send(Method::GET, path, request).await?;
        let forest: Vec<BusinessUnitNode> = decode(response).await?;
        let first = forest
            .into_iter()
            .next()
            .ok_or(SyncError::NoBusinessUnits(ORGANIZATION_ID))?;
        let business_unit_id = first.value.ok_or_else(|| SyncError::MissingField {
            path: path.to_string(),
            field: "value",
        })?;

        debug!(business_unit_id, "Resolved business unit");
        self.session.business_unit_id = Some(business_unit_id);
        Ok(business_unit_id)
    }

    pub async fn upload_location(&self, payload: &LocationPayload) -> Result<RemoteLocation> {
        let path = "/central/locations";
        let request = self.authorized(Method::POST, path)?.json(payload);

        let response = send(Method::POST, path, request).await?;
        decode(response).await
    }

    /// Lists every location in the active business unit.
    pub async fn fetch_locations(&self) -> Result<Vec<RemoteLocation>> {
        let business_unit_id = self
            .session
            .business_unit_id
            .ok_or(SyncError::BusinessUnitNotResolved)?;

        let path = "/central/locations/search";
        let request = self
            .authorized(Method::POST, path)?
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[
                ("selectedBusinessUnitId", business_unit_id.to_string()),
                ("organizationId", ORGANIZATION_ID.to_string()),
            ]);

        let response = send(Method::POST, path, request).await?;
        decode(response).await
    }

    pub async fn delete_location(&self, location_id: i64) -> Result<()> {
        let user_id = self.session.user_id.ok_or(SyncError::UserNotResolved)?;

        let path = format!("/central/locations/{location_id}");
        let request = self
            .authorized(Method::DELETE, &path)?
            .header(header::CONTENT_TYPE, "application/json")
            .query(&[
                ("userId", user_id.to_string()),
                ("organizationId", ORGANIZATION_ID.to_string()),
            ]);

        send(Method::DELETE, &path, request).await?;
        info!(location_id, "Deleted location");
        Ok(())
    }

    /// Deletes every location in the active business unit, one at a time.
    /// The first failure stops the loop; earlier deletions stand.
    pub async fn delete_all_locations(&self) -> Result<usize> {
        let locations = self.fetch_locations().await?;
        for location in &locations {
            self.delete_location(location.id).await?;
        }
        info!(deleted = locations.len(), "All locations have been deleted");
        Ok(locations.len())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .session
            .token
            .as_deref()
            .ok_or(SyncError::NotAuthenticated)?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }
}

async fn send(method: Method, path: &str, request: RequestBuilder) -> Result<Response> {
    debug!(method = %method, path, "Sending request");
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Http {
            method: method.to_string(),
            path: path.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
