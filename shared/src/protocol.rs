/// Health endpoint, always answers 200
pub const HEALTH_PATH: &str = "/health";

/// Port request endpoint, takes `?mac=`
pub const REQUEST_PORT_PATH: &str = "/provision/request-port";

/// Lowest port handed out to probes unless configured otherwise
pub const DEFAULT_PORT_FLOOR: u16 = 10001;

/// Device custom field holding the reverse tunnel port
pub const DEFAULT_PORT_FIELD: &str = "automation_proxy_port";

/// Device custom field some records carry the probe MAC in
pub const DEFAULT_MAC_FIELD: &str = "mac_address";

/// Prefix of placeholder device names, followed by the bare hex MAC
pub const DEFAULT_NAME_PREFIX: &str = "probe-";

/// Environment variables read by the daemon
pub const ENV_REGISTRY_URL: &str = "NETBOX_URL";
pub const ENV_REGISTRY_TOKEN: &str = "NETBOX_TOKEN";
pub const ENV_REGISTRY_TIMEOUT: &str = "NETBOX_TIMEOUT_SECS";
pub const ENV_PORT_FLOOR: &str = "GATEKEEPER_PORT_FLOOR";
pub const ENV_PORT_FIELD: &str = "GATEKEEPER_PORT_FIELD";
pub const ENV_LISTEN_HOST: &str = "GATEKEEPER_HOST";
pub const ENV_LISTEN_PORT: &str = "GATEKEEPER_PORT";
pub const ENV_CONFIG_PATH: &str = "GATEKEEPER_CONFIG";
