use sqlx::{Row, sqlite::SqliteRow};

use crate::models::*;

/// Filter empty strings to None; the schema stores '' instead of NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

fn csv_to_sorted_vec(csv: Option<String>) -> Vec<String> {
    let mut out: Vec<String> = match csv {
        Some(s) if !s.is_empty() => s.split(',').map(|s| s.to_string()).collect(),
        _ => vec![],
    };
    out.sort();
    out
}

/// Map a SQLite row to an IpAddress struct
pub fn map_ip_address_row(row: &SqliteRow) -> IpAddress {
    IpAddress {
        address: row.get("address"),
        hostname: row.get("hostname"),
        aliases: none_if_empty(row.get("aliases")),
        in_use: row.get("in_use"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a Computer struct (flags aggregated as flag_slugs_csv)
pub fn map_computer_row(row: &SqliteRow) -> Computer {
    Computer {
        id: row.get("id"),
        common_name: row.get("common_name"),
        hardware: row.get("hardware"),
        host_id: row.get("host_id"),
        operating_system: none_if_empty(row.get("operating_system")),
        processor: none_if_empty(row.get("processor")),
        ram: none_if_empty(row.get("ram")),
        harddrive: none_if_empty(row.get("harddrive")),
        manufacturing_year: row.get("manufacturing_year"),
        admin_user: none_if_empty(row.get("admin_user")),
        admin_password: none_if_empty(row.get("admin_password")),
        ssh_port: row.get("ssh_port"),
        asset_id: row.get("asset_id"),
        notes: none_if_empty(row.get("notes")),
        active: row.get("active"),
        flags: csv_to_sorted_vec(row.try_get("flag_slugs_csv").ok().and_then(|v: Option<String>| v)),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Map a SQLite row to a ComputerFlag struct
pub fn map_computer_flag_row(row: &SqliteRow) -> ComputerFlag {
    ComputerFlag {
        id: row.get("id"),
        slug: row.get("slug"),
        verbose_name: row.get("verbose_name"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

/// Map a SQLite row to a ComputerKey struct
pub fn map_computer_key_row(row: &SqliteRow) -> ComputerKey {
    ComputerKey {
        computer_id: row.get("computer_id"),
        key: row.get("key"),
        created_at: row.get("created_at"),
    }
}

/// Map a SQLite row to a NetworkInterface struct
pub fn map_interface_row(row: &SqliteRow) -> NetworkInterface {
    let kind: String = row.get("kind");
    NetworkInterface {
        id: row.get("id"),
        computer_id: row.get("computer_id"),
        name: row.get("name"),
        // the schema CHECK constraint limits kind to known codes
        kind: InterfaceKind::from_code(&kind).unwrap_or(InterfaceKind::Ethernet),
        mac_address: row.get("mac_address"),
        primary: row.get("is_primary"),
        managed: row.get("managed"),
        ip_address: row.get("ip_address"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub fn map_work_note_row(row: &SqliteRow) -> WorkNote {
    WorkNote {
        id: row.get("id"),
        computer_id: row.get("computer_id"),
        value: row.get("value"),
        author: none_if_empty(row.get("author")),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub fn map_licence_row(row: &SqliteRow) -> Licence {
    Licence {
        id: row.get("id"),
        computer_id: row.get("computer_id"),
        value: row.get("value"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub fn map_client_identifier_row(row: &SqliteRow) -> ClientIdentifier {
    ClientIdentifier {
        id: row.get("id"),
        computer_id: row.get("computer_id"),
        key: row.get("key"),
        value: row.get("value"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn data_type_of(row: &SqliteRow) -> StatusDataType {
    let code: String = row.get("data_type");
    // the schema CHECK constraint limits data_type to known codes
    StatusDataType::from_code(&code).unwrap_or(StatusDataType::Raw)
}

pub fn map_status_key_row(row: &SqliteRow) -> StatusKey {
    StatusKey {
        id: row.get("id"),
        slug: row.get("slug"),
        verbose_name: row.get("verbose_name"),
        volatile: row.get("volatile"),
        data_type: data_type_of(row),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

/// Map a status row joined with its key (key slug as key_slug)
pub fn map_status_row(row: &SqliteRow) -> Status {
    Status {
        id: row.get("id"),
        computer_id: row.get("computer_id"),
        key: row.get("key_slug"),
        data_type: data_type_of(row),
        value: row.get("value"),
        created_at: row.get("created_at"),
    }
}
