use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared::mac::MacAddress;
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use super::{
    DeviceFilter, DeviceRecord, DeviceRef, DeviceUpdate, InterfaceRecord, MacObject, NewDevice,
    Registry,
};

const DEVICES: &str = "/api/dcim/devices/";
const INTERFACES: &str = "/api/dcim/interfaces/";
const MAC_ADDRESSES: &str = "/api/dcim/mac-addresses/";
const STATUS: &str = "/api/status/";

const PAGE_SIZE: &str = "250";

/// Longest slice of an error body echoed back in a `RegistryError`
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NbDevice {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    site: Option<NbNamed>,
    #[serde(default)]
    status: Option<NbChoice>,
    #[serde(default)]
    custom_fields: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct NbNamed {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NbChoice {
    value: String,
}

#[derive(Debug, Deserialize)]
struct NbDeviceRef {
    id: u64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NbInterface {
    id: u64,
    #[serde(default)]
    device: Option<NbDeviceRef>,
}

#[derive(Debug, Deserialize)]
struct NbMacAddress {
    id: u64,
    /// Interface or VM interface; only the former carries `device`
    #[serde(default)]
    assigned_object: Option<NbInterface>,
}

impl NbDevice {
    fn into_record(self, port_field: &str, mac_field: &str) -> DeviceRecord {
        let fields = self.custom_fields.as_ref();
        let assigned_port = port_value(fields.and_then(|cf| cf.get(port_field)));
        let mac = mac_value(fields.and_then(|cf| cf.get(mac_field)));
        DeviceRecord {
            id: self.id,
            name: self.name.unwrap_or_default(),
            assigned_port,
            mac,
            site: self.site.and_then(|s| s.slug.or(s.name)),
            status: self.status.map(|s| s.value),
        }
    }
}

impl From<NbDeviceRef> for DeviceRef {
    fn from(device: NbDeviceRef) -> Self {
        DeviceRef {
            id: device.id,
            name: device.name.unwrap_or_default(),
        }
    }
}

impl From<NbInterface> for InterfaceRecord {
    fn from(interface: NbInterface) -> Self {
        InterfaceRecord {
            id: interface.id,
            device: interface.device.map(DeviceRef::from),
        }
    }
}

impl From<NbMacAddress> for MacObject {
    fn from(mac: NbMacAddress) -> Self {
        MacObject {
            id: mac.id,
            interface: mac.assigned_object.map(InterfaceRecord::from),
        }
    }
}

/// Only integers in 1..=65535 count as an assigned port.
fn port_value(value: Option<&Value>) -> Option<u16> {
    value
        .and_then(Value::as_u64)
        .and_then(|port| u16::try_from(port).ok())
        .filter(|port| *port > 0)
}

/// Free-text field; anything that does not normalize is treated as unset.
fn mac_value(value: Option<&Value>) -> Option<MacAddress> {
    value
        .and_then(Value::as_str)
        .and_then(|raw| MacAddress::normalize(raw).ok())
}

fn request_error(endpoint: &str, err: reqwest::Error) -> RegistryError {
    let endpoint = endpoint.to_string();
    if err.is_timeout() {
        RegistryError::Timeout { endpoint }
    } else if err.is_decode() {
        RegistryError::Decode {
            endpoint,
            message: err.without_url().to_string(),
        }
    } else {
        // the URL may carry filter values; the endpoint is enough to diagnose
        RegistryError::Transport {
            endpoint,
            message: err.without_url().to_string(),
        }
    }
}

/// 404/400 on an optional endpoint or filter means this NetBox does not have it.
fn unsupported_if_missing(err: RegistryError, what: &str) -> RegistryError {
    match err {
        RegistryError::Status { status: 404 | 400, .. } => RegistryError::Unsupported(what.to_string()),
        other => other,
    }
}

/// NetBox REST client.
///
/// Built once at startup and shared for the life of the process. Every request
/// carries the configured timeout.
pub struct NetBoxClient {
    client: Client,
    base_url: String,
    port_field: String,
    mac_field: String,
}

impl NetBoxClient {
    pub fn new(config: &RegistryConfig, port_field: &str, mac_field: &str) -> Result<Self, RegistryError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if !config.token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Token {}", config.token)).map_err(|_| {
                RegistryError::Transport {
                    endpoint: config.url.clone(),
                    message: "registry token contains characters not allowed in a header".to_string(),
                }
            })?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| request_error(&config.url, e))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            port_field: port_field.to_string(),
            mac_field: mac_field.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<reqwest::Response, RegistryError> {
        let response = request.send().await.map_err(|e| request_error(endpoint, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message: body.chars().take(MAX_ERROR_BODY).collect(),
        })
    }

    async fn json<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T, RegistryError> {
        self.send(endpoint, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| request_error(endpoint, e))
    }

    /// GET every page of a list endpoint, following `next` links.
    async fn list<T: DeserializeOwned>(&self, endpoint: &str, query: &[(String, String)]) -> Result<Vec<T>, RegistryError> {
        let first = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .query(&[("limit", PAGE_SIZE)]);
        let mut page: Page<T> = self.json(endpoint, first).await?;

        let mut results = Vec::new();
        loop {
            results.extend(page.results);
            match page.next {
                Some(next) => page = self.json(endpoint, self.client.get(next)).await?,
                None => break,
            }
        }
        Ok(results)
    }

    fn record(&self, device: NbDevice) -> DeviceRecord {
        device.into_record(&self.port_field, &self.mac_field)
    }

    fn port_fields(&self, port: Option<u16>) -> Value {
        let mut fields = Map::new();
        fields.insert(self.port_field.clone(), json!(port));
        Value::Object(fields)
    }
}

#[async_trait]
impl Registry for NetBoxClient {
    async fn ping(&self) -> Result<(), RegistryError> {
        self.send(STATUS, self.client.get(self.url(STATUS))).await?;
        Ok(())
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, RegistryError> {
        let query = match filter {
            DeviceFilter::All => Vec::new(),
            DeviceFilter::CustomField { name, value } => vec![(format!("cf_{}", name), value.clone())],
        };

        let devices: Vec<NbDevice> = self.list(DEVICES, &query).await.map_err(|e| match filter {
            DeviceFilter::All => e,
            DeviceFilter::CustomField { .. } => unsupported_if_missing(e, "device custom field filter"),
        })?;
        tracing::debug!("Listed {} devices ({:?})", devices.len(), filter);
        Ok(devices.into_iter().map(|d| self.record(d)).collect())
    }

    async fn get_device(&self, id: u64) -> Result<Option<DeviceRecord>, RegistryError> {
        let path = format!("{}{}/", DEVICES, id);
        match self.json::<NbDevice>(DEVICES, self.client.get(self.url(&path))).await {
            Ok(device) => Ok(Some(self.record(device))),
            Err(RegistryError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_device(&self, device: &NewDevice) -> Result<DeviceRecord, RegistryError> {
        let body = json!({
            "name": device.name,
            "device_type": { "slug": device.device_type },
            "role": { "slug": device.role },
            "site": { "slug": device.site },
            "status": device.status,
            "custom_fields": self.port_fields(Some(device.assigned_port)),
        });

        let created: NbDevice = self
            .json(DEVICES, self.client.post(self.url(DEVICES)).json(&body))
            .await?;
        Ok(self.record(created))
    }

    async fn update_device(&self, id: u64, update: &DeviceUpdate) -> Result<DeviceRecord, RegistryError> {
        let path = format!("{}{}/", DEVICES, id);
        let body = json!({ "custom_fields": self.port_fields(update.assigned_port) });

        let updated: NbDevice = self
            .json(DEVICES, self.client.patch(self.url(&path)).json(&body))
            .await?;
        Ok(self.record(updated))
    }

    async fn find_mac_objects(&self, mac: &MacAddress) -> Result<Vec<MacObject>, RegistryError> {
        let query = [("mac_address".to_string(), mac.to_string())];
        let objects: Vec<NbMacAddress> = self
            .list(MAC_ADDRESSES, &query)
            .await
            .map_err(|e| unsupported_if_missing(e, "MAC address objects"))?;
        Ok(objects.into_iter().map(MacObject::from).collect())
    }

    async fn find_interfaces(&self, mac: &MacAddress) -> Result<Vec<InterfaceRecord>, RegistryError> {
        let query = [("mac_address".to_string(), mac.to_string())];
        let interfaces: Vec<NbInterface> = self
            .list(INTERFACES, &query)
            .await
            .map_err(|e| unsupported_if_missing(e, "interface MAC filter"))?;
        Ok(interfaces.into_iter().map(InterfaceRecord::from).collect())
    }
}
