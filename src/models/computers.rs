use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ip_addresses::default_true;

/// Computer represents a computer or other networked device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Computer {
    pub id: i64,
    pub common_name: String,
    pub hardware: String,
    pub host_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harddrive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturing_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_user: Option<String>,
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<i32>,
    /// Link to an asset record kept by the office inventory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub active: bool,
    /// Slugs of the flags attached to this computer
    pub flags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Computer {
    pub fn has_flag(&self, slug: &str) -> bool {
        self.flags.iter().any(|f| f == slug)
    }
}

/// CreateComputerRequest for creating and updating computers
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComputerRequest {
    pub common_name: String,
    pub hardware: String,
    #[serde(default)]
    pub host_id: String,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub processor: Option<String>,
    #[serde(default)]
    pub ram: Option<String>,
    #[serde(default)]
    pub harddrive: Option<String>,
    #[serde(default)]
    pub manufacturing_year: Option<i32>,
    #[serde(default)]
    pub admin_user: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: Option<i32>,
    #[serde(default)]
    pub asset_id: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CreateComputerRequest {
    /// Minimal request with the two required fields set
    pub fn new(common_name: impl Into<String>, hardware: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            hardware: hardware.into(),
            host_id: String::new(),
            operating_system: None,
            processor: None,
            ram: None,
            harddrive: None,
            manufacturing_year: None,
            admin_user: None,
            admin_password: None,
            ssh_port: default_ssh_port(),
            asset_id: None,
            notes: None,
            active: true,
        }
    }
}

fn default_ssh_port() -> Option<i32> {
    Some(22)
}

/// ComputerFlag marks computers for status and query restriction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerFlag {
    pub id: i64,
    pub slug: String,
    pub verbose_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateComputerFlagRequest {
    pub slug: String,
    pub verbose_name: String,
}

/// ComputerKey is the API access key issued to a computer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputerKey {
    pub computer_id: i64,
    pub key: String,
    pub created_at: DateTime<Utc>,
}
