mod computers;
mod interfaces;
mod ip_addresses;
mod records;
mod usage;

pub use computers::*;
pub use interfaces::*;
pub use ip_addresses::*;
pub use records::*;
pub use usage::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_kind_codes() {
        for kind in InterfaceKind::ALL {
            assert_eq!(InterfaceKind::from_code(kind.as_code()), Some(kind));
        }
        assert_eq!(InterfaceKind::from_code("x"), None);
        assert_eq!(InterfaceKind::Wifi.to_string(), "Wi-Fi");
    }

    #[test]
    fn test_batch_op_deserialize() {
        let ops: Vec<InterfaceBatchOp> = serde_json::from_str(
            r#"[
                {"op": "create", "computer_id": 1, "name": "en0", "kind": "ethernet", "ip_address": "10.0.0.1"},
                {"op": "update", "id": 7, "computer_id": 1, "name": "en1", "kind": "wifi", "primary": true},
                {"op": "delete", "id": 9}
            ]"#,
        )
        .unwrap();

        match &ops[0] {
            InterfaceBatchOp::Create(req) => {
                assert_eq!(req.kind, InterfaceKind::Ethernet);
                assert_eq!(req.ip_address.as_deref(), Some("10.0.0.1"));
                assert!(req.active);
                assert!(!req.primary);
            }
            other => panic!("unexpected op: {:?}", other),
        }
        match &ops[1] {
            InterfaceBatchOp::Update { id, req } => {
                assert_eq!(*id, 7);
                assert!(req.primary);
                assert_eq!(req.kind, InterfaceKind::Wifi);
            }
            other => panic!("unexpected op: {:?}", other),
        }
        assert!(matches!(ops[2], InterfaceBatchOp::Delete { id: 9 }));
    }

    #[test]
    fn test_computer_password_not_serialized() {
        let now = chrono::Utc::now();
        let computer = Computer {
            id: 1,
            common_name: "lab-01".to_string(),
            hardware: "NUC".to_string(),
            host_id: "lab-01".to_string(),
            operating_system: None,
            processor: None,
            ram: None,
            harddrive: None,
            manufacturing_year: None,
            admin_user: Some("root".to_string()),
            admin_password: Some("hunter2".to_string()),
            ssh_port: Some(22),
            asset_id: None,
            notes: None,
            active: true,
            flags: vec!["asset-owner".to_string()],
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&computer).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(computer.has_flag("asset-owner"));
        assert!(!computer.has_flag("retired"));
    }

    #[test]
    fn test_ip_address_aliases() {
        let now = chrono::Utc::now();
        let ip = IpAddress {
            address: "192.168.0.1".to_string(),
            hostname: "addr-1.local".to_string(),
            aliases: Some("www mail".to_string()),
            in_use: false,
            active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(ip.alias_list(), vec!["www", "mail"]);
        assert_eq!(ip.to_string(), "addr-1.local (192.168.0.1)");
    }
}
