use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ip_addresses::default_true;

/// Physical or logical link type of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Wifi,
    Bluetooth,
    Thunderbolt,
}

impl InterfaceKind {
    pub const ALL: [InterfaceKind; 4] = [
        InterfaceKind::Ethernet,
        InterfaceKind::Wifi,
        InterfaceKind::Bluetooth,
        InterfaceKind::Thunderbolt,
    ];

    /// Single-letter code stored in the database
    pub fn as_code(&self) -> &'static str {
        match self {
            InterfaceKind::Ethernet => "e",
            InterfaceKind::Wifi => "w",
            InterfaceKind::Bluetooth => "b",
            InterfaceKind::Thunderbolt => "t",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_code() == code)
    }
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InterfaceKind::Ethernet => "Ethernet",
            InterfaceKind::Wifi => "Wi-Fi",
            InterfaceKind::Bluetooth => "Bluetooth",
            InterfaceKind::Thunderbolt => "Thunderbolt",
        };
        f.write_str(label)
    }
}

/// NetworkInterface attaches a MAC (and optionally one IP address) to a computer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub id: i64,
    pub computer_id: i64,
    pub name: String,
    pub kind: InterfaceKind,
    pub mac_address: String,
    pub primary: bool,
    pub managed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// CreateNetworkInterfaceRequest for creating and updating interfaces.
/// On update, `computer_id` may move the interface to another computer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNetworkInterfaceRequest {
    pub computer_id: i64,
    pub name: String,
    pub kind: InterfaceKind,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CreateNetworkInterfaceRequest {
    /// Active, non-primary, unmanaged interface with no address
    pub fn new(computer_id: i64, name: impl Into<String>, kind: InterfaceKind) -> Self {
        Self {
            computer_id,
            name: name.into(),
            kind,
            mac_address: String::new(),
            primary: false,
            managed: false,
            ip_address: None,
            active: true,
        }
    }

    pub fn with_ip(mut self, address: impl Into<String>) -> Self {
        self.ip_address = Some(address.into());
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

impl From<&NetworkInterface> for CreateNetworkInterfaceRequest {
    fn from(iface: &NetworkInterface) -> Self {
        Self {
            computer_id: iface.computer_id,
            name: iface.name.clone(),
            kind: iface.kind,
            mac_address: iface.mac_address.clone(),
            primary: iface.primary,
            managed: iface.managed,
            ip_address: iface.ip_address.clone(),
            active: iface.active,
        }
    }
}

/// Optional restrictions for interface listings; `None` means "any"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceFilter {
    #[serde(default)]
    pub computer_id: Option<i64>,
    #[serde(default)]
    pub kind: Option<InterfaceKind>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub managed: Option<bool>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// One edit in a computer's interface batch
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum InterfaceBatchOp {
    Create(CreateNetworkInterfaceRequest),
    Update {
        id: i64,
        #[serde(flatten)]
        req: CreateNetworkInterfaceRequest,
    },
    Delete {
        id: i64,
    },
}
